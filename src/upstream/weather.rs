//! OpenWeatherMap current-conditions lookup by place name.

use crate::cache::ResponseCache;
use crate::upstream::{FetchError, endpoint, fetch_json};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/2.5";

const WEATHER_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub main: String,
    pub description: String,
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Readings {
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weather: Vec<Condition>,
    pub main: Readings,
    #[serde(default)]
    pub wind: Option<Wind>,
    /// Metres.
    #[serde(default)]
    pub visibility: Option<u32>,
}

impl Weather {
    pub fn icon_url(&self) -> Option<String> {
        self.weather
            .first()
            .map(|c| format!("https://openweathermap.org/img/wn/{}@2x.png", c.icon))
    }
}

pub struct WeatherClient {
    http: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
    cache: ResponseCache,
}

impl WeatherClient {
    pub fn new(
        http: ClientWithMiddleware,
        base_url: impl Into<String>,
        api_key: Option<String>,
        cache: ResponseCache,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            cache,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Current conditions for `place`; `None` when unconfigured or on any failure.
    pub async fn current(&self, place: &str) -> Option<Arc<Weather>> {
        let place = place.trim();
        let Some(api_key) = self.api_key.as_deref() else {
            debug!(place, "weather lookup skipped: no API key configured");
            return None;
        };
        if place.is_empty() {
            return None;
        }

        let key = format!("weather:{}", place.to_lowercase());
        if let Some(hit) = self.cache.get::<Weather>(&key) {
            return Some(hit);
        }

        match self.fetch(place, api_key).await {
            Ok(weather) => Some(self.cache.set(key, weather, WEATHER_TTL)),
            Err(e) => {
                warn!(place, error = %e, "weather lookup failed");
                None
            }
        }
    }

    async fn fetch(&self, place: &str, api_key: &str) -> Result<Weather, FetchError> {
        let mut url = endpoint(&self.base_url, "/weather")?;
        url.query_pairs_mut()
            .append_pair("q", place)
            .append_pair("appid", api_key)
            .append_pair("units", "metric");
        fetch_json(self.http.get(url.clone()), &url).await
    }
}
