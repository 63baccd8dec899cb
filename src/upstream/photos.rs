//! Unsplash photo search.

use crate::cache::ResponseCache;
use crate::upstream::{FetchError, endpoint, fetch_json};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";

const PHOTOS_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoUrls {
    pub regular: String,
    #[serde(default)]
    pub small: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageLinks {
    pub html: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photographer {
    pub name: String,
    pub links: PageLinks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub alt_description: Option<String>,
    pub urls: PhotoUrls,
    pub links: PageLinks,
    pub user: Photographer,
}

#[derive(Deserialize)]
struct SearchPage {
    #[serde(default)]
    results: Vec<Photo>,
}

pub struct PhotoClient {
    http: ClientWithMiddleware,
    base_url: String,
    access_key: Option<String>,
    cache: ResponseCache,
}

impl PhotoClient {
    pub fn new(
        http: ClientWithMiddleware,
        base_url: impl Into<String>,
        access_key: Option<String>,
        cache: ResponseCache,
    ) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            access_key: access_key.filter(|k| !k.trim().is_empty()),
            cache,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.access_key.is_some()
    }

    /// Ranked landscape photos for `query`. Never fails: errors yield an empty list.
    pub async fn search(&self, query: &str, count: u32) -> Arc<Vec<Photo>> {
        let query = query.trim();
        let Some(access_key) = self.access_key.as_deref() else {
            debug!(query, "photo search skipped: no access key configured");
            return Arc::default();
        };
        if query.is_empty() || count == 0 {
            return Arc::default();
        }

        let key = format!("photos:{query}:{count}");
        if let Some(hit) = self.cache.get::<Vec<Photo>>(&key) {
            return hit;
        }

        match self.fetch(query, count, access_key).await {
            Ok(page) => self.cache.set(key, page.results, PHOTOS_TTL),
            Err(e) => {
                warn!(query, error = %e, "photo search failed");
                Arc::default()
            }
        }
    }

    async fn fetch(
        &self,
        query: &str,
        count: u32,
        access_key: &str,
    ) -> Result<SearchPage, FetchError> {
        let mut url = endpoint(&self.base_url, "/search/photos")?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("per_page", &count.to_string())
            .append_pair("orientation", "landscape");
        let request = self
            .http
            .get(url.clone())
            .header("Authorization", format!("Client-ID {access_key}"));
        fetch_json(request, &url).await
    }
}
