//! The canonically sorted country directory, fetched once and cached.

use crate::cache::ResponseCache;
use crate::countries::collation::locale_cmp;
use crate::countries::models::Country;
use crate::upstream::FetchError;
use crate::utils::fmt_duration;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Cache key of the sorted directory.
pub const DIRECTORY_KEY: &str = "countries:all";

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Bulk source of country records.
#[async_trait::async_trait]
pub trait CountrySource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<Country>, FetchError>;
}

#[derive(Clone)]
pub struct CountryDirectory {
    source: Arc<dyn CountrySource>,
    cache: ResponseCache,
    ttl: Duration,
    /// Serializes cold fetches so a burst of misses costs one upstream call.
    refresh: Arc<Mutex<()>>,
}

impl CountryDirectory {
    pub fn new(source: Arc<dyn CountrySource>, cache: ResponseCache, ttl: Duration) -> Self {
        Self {
            source,
            cache,
            ttl,
            refresh: Arc::new(Mutex::new(())),
        }
    }

    /// The full directory, sorted by common name.
    ///
    /// Served from cache within the TTL. Upstream failures propagate; no stale
    /// or partial data is substituted.
    pub async fn fetch_all(&self) -> Result<Arc<Vec<Country>>, FetchError> {
        if let Some(hit) = self.cache.get::<Vec<Country>>(DIRECTORY_KEY) {
            return Ok(hit);
        }

        let _guard = self.refresh.lock().await;
        if let Some(hit) = self.cache.get::<Vec<Country>>(DIRECTORY_KEY) {
            return Ok(hit);
        }

        let start = Instant::now();
        let fetched = self.source.fetch_all().await.inspect_err(|e| {
            warn!(error = %e, "failed to fetch country directory");
        })?;
        let received = fetched.len();
        let countries = canonicalize(fetched);

        info!(
            received,
            count = countries.len(),
            duration = fmt_duration(start.elapsed()),
            ttl = fmt_duration(self.ttl),
            "country directory loaded"
        );
        Ok(self.cache.set(DIRECTORY_KEY, countries, self.ttl))
    }

    /// Directory record for `code`, matched case-insensitively.
    pub async fn find(&self, code: &str) -> Result<Option<Country>, FetchError> {
        let countries = self.fetch_all().await?;
        Ok(countries
            .iter()
            .find(|c| c.cca3.eq_ignore_ascii_case(code))
            .cloned())
    }
}

/// Drop duplicate codes (first occurrence wins) and sort by collated common name.
pub fn canonicalize(countries: Vec<Country>) -> Vec<Country> {
    let mut seen = HashSet::new();
    let mut unique: Vec<Country> = countries
        .into_iter()
        .filter(|c| {
            let fresh = seen.insert(c.cca3.to_ascii_uppercase());
            if !fresh {
                warn!(code = %c.cca3, name = %c.name.common, "dropping duplicate country code");
            }
            fresh
        })
        .collect();
    unique.sort_by(|a, b| locale_cmp(&a.name.common, &b.name.common));
    unique
}
