//! Application state shared across the web handlers.

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::countries::{CountryDirectory, CountrySearch};
use crate::saved::{KvStore, SavedCountries, SessionMirror, SessionStore};
use crate::upstream::countries::RestCountriesClient;
use crate::upstream::encyclopedia::EncyclopediaClient;
use crate::upstream::photos::PhotoClient;
use crate::upstream::weather::WeatherClient;
use anyhow::Context;
use axum::http::HeaderName;
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub cache: ResponseCache,
    pub search: CountrySearch,
    pub countries: Arc<RestCountriesClient>,
    pub weather: Arc<WeatherClient>,
    pub photos: Arc<PhotoClient>,
    pub encyclopedia: Arc<EncyclopediaClient>,
    pub saved: Arc<SavedCountries>,
    pub sessions: Arc<SessionStore>,
    /// Trusted header carrying the signed-in user's email.
    pub identity_header: HeaderName,
    pub started_at: Instant,
}

impl AppState {
    /// Wire every client to one outbound HTTP client and one response cache.
    pub fn new(
        config: &Config,
        kv: Arc<dyn KvStore>,
        sessions: Arc<SessionStore>,
        mirror: Option<SessionMirror>,
    ) -> anyhow::Result<Self> {
        let http = crate::upstream::build_client()?;
        let cache = ResponseCache::new();

        let countries = Arc::new(RestCountriesClient::new(
            http.clone(),
            config.countries_base_url.clone(),
            cache.clone(),
        ));
        let directory =
            CountryDirectory::new(countries.clone(), cache.clone(), config.directory_ttl);

        let identity_header = HeaderName::from_bytes(config.identity_header.as_bytes())
            .with_context(|| format!("Invalid IDENTITY_HEADER '{}'", config.identity_header))?;

        Ok(Self {
            search: CountrySearch::new(directory),
            countries,
            weather: Arc::new(WeatherClient::new(
                http.clone(),
                config.weather_base_url.clone(),
                config.weather_api_key.clone(),
                cache.clone(),
            )),
            photos: Arc::new(PhotoClient::new(
                http.clone(),
                config.unsplash_base_url.clone(),
                config.unsplash_access_key.clone(),
                cache.clone(),
            )),
            encyclopedia: Arc::new(EncyclopediaClient::new(
                http,
                config.wikipedia_base_url.clone(),
                cache.clone(),
            )),
            saved: Arc::new(SavedCountries::new(kv, mirror)),
            sessions,
            identity_header,
            cache,
            started_at: Instant::now(),
        })
    }
}
