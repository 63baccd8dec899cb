//! REST Countries client: the bulk directory and by-code detail lookups.

use crate::cache::ResponseCache;
use crate::countries::directory::CountrySource;
use crate::countries::models::{Country, CountryDetail};
use crate::upstream::{FetchError, decode, endpoint, fetch_json};
use reqwest::StatusCode;
use reqwest_middleware::ClientWithMiddleware;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://restcountries.com/v3.1";

/// Field selection for the bulk fetch; the directory needs nothing else.
const DIRECTORY_FIELDS: &str = "name,capital,region,flags,cca3";

const DETAIL_TTL: Duration = Duration::from_secs(60 * 60);

/// The by-code endpoint answers with an array, but a bare object is accepted too.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

pub struct RestCountriesClient {
    http: ClientWithMiddleware,
    base_url: String,
    cache: ResponseCache,
}

impl RestCountriesClient {
    pub fn new(
        http: ClientWithMiddleware,
        base_url: impl Into<String>,
        cache: ResponseCache,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            cache,
        }
    }

    /// Full record for one country, or `None` when the upstream does not know the code.
    pub async fn fetch_by_code(
        &self,
        code: &str,
    ) -> Result<Option<Arc<CountryDetail>>, FetchError> {
        let code = code.to_ascii_uppercase();
        let key = format!("country:{code}");
        if let Some(hit) = self.cache.get::<CountryDetail>(&key) {
            return Ok(Some(hit));
        }

        let url = endpoint(
            &self.base_url,
            &format!("/alpha/{}", urlencoding::encode(&code)),
        )?;
        let response = self.http.get(url.clone()).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(code, "country code not found upstream");
            return Ok(None);
        }

        let detail = match decode::<OneOrMany<CountryDetail>>(response, &url).await? {
            OneOrMany::Many(records) => records.into_iter().next(),
            OneOrMany::One(record) => Some(record),
        };
        Ok(detail.map(|d| self.cache.set(key, d, DETAIL_TTL)))
    }

    fn directory_url(&self) -> Result<Url, FetchError> {
        let mut url = endpoint(&self.base_url, "/all")?;
        url.query_pairs_mut().append_pair("fields", DIRECTORY_FIELDS);
        Ok(url)
    }
}

#[async_trait::async_trait]
impl CountrySource for RestCountriesClient {
    async fn fetch_all(&self) -> Result<Vec<Country>, FetchError> {
        let url = self.directory_url()?;
        fetch_json(self.http.get(url.clone()), &url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_url_selects_fields() {
        let client = RestCountriesClient::new(
            crate::upstream::build_client().unwrap(),
            "https://restcountries.example/v3.1/",
            ResponseCache::new(),
        );
        let url = client.directory_url().unwrap();
        assert_eq!(url.path(), "/v3.1/all");
        assert_eq!(
            url.query(),
            Some("fields=name%2Ccapital%2Cregion%2Cflags%2Ccca3")
        );
    }
}
