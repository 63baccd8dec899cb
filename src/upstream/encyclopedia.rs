//! Wikipedia page summaries.

use crate::cache::ResponseCache;
use crate::upstream::{FetchError, endpoint, fetch_json};
use reqwest_middleware::ClientWithMiddleware;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://en.wikipedia.org/api/rest_v1";

const SUMMARY_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// Misses are remembered for a shorter time so a fixed upstream recovers quickly.
const MISSING_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub title: String,
    pub extract: String,
    pub link: Option<String>,
}

#[derive(Deserialize)]
struct RawSummary {
    title: String,
    #[serde(default)]
    extract: String,
    #[serde(default)]
    content_urls: Option<ContentUrls>,
}

#[derive(Deserialize)]
struct ContentUrls {
    desktop: PageUrl,
}

#[derive(Deserialize)]
struct PageUrl {
    page: String,
}

impl From<RawSummary> for Summary {
    fn from(raw: RawSummary) -> Self {
        Self {
            title: raw.title,
            extract: raw.extract,
            link: raw.content_urls.map(|urls| urls.desktop.page),
        }
    }
}

pub struct EncyclopediaClient {
    http: ClientWithMiddleware,
    base_url: String,
    cache: ResponseCache,
}

impl EncyclopediaClient {
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

    /// Short extract and canonical link for `subject`; `None` on 404 or failure.
    pub async fn summary(&self, subject: &str) -> Option<Summary> {
        let subject = subject.trim();
        if subject.is_empty() {
            return None;
        }

        let key = format!("wikipedia:{subject}");
        if let Some(hit) = self.cache.get::<Option<Summary>>(&key) {
            return (*hit).clone();
        }

        match self.fetch(subject).await {
            Ok(summary) => {
                let summary = Some(Summary::from(summary));
                self.cache.set(key, summary.clone(), SUMMARY_TTL);
                summary
            }
            Err(e) => {
                match e.status() {
                    Some(404) => debug!(subject, "no encyclopedia page"),
                    _ => warn!(subject, error = %e, "encyclopedia lookup failed"),
                }
                self.cache.set(key, None::<Summary>, MISSING_TTL);
                None
            }
        }
    }

    async fn fetch(&self, subject: &str) -> Result<RawSummary, FetchError> {
        let url = endpoint(
            &self.base_url,
            &format!("/page/summary/{}", urlencoding::encode(subject)),
        )?;
        fetch_json(self.http.get(url.clone()), &url).await
    }
}
