//! Filter and pagination over the sorted directory.
//!
//! Filtering never re-sorts: results keep the directory's canonical order.
//! Paging input is normalized rather than rejected, so every query produces a
//! well-formed page (possibly empty).

use crate::countries::directory::CountryDirectory;
use crate::countries::models::{Country, CountryResponse};
use crate::upstream::FetchError;
use std::collections::BTreeSet;
use tracing::trace;

/// Region value meaning "no region restriction".
pub const REGION_ALL: &str = "all";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 250;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterQuery {
    text: String,
    region: String,
    page: u32,
    page_size: u32,
}

impl FilterQuery {
    /// Pages below 1 clamp to 1; page sizes clamp into `1..=MAX_PAGE_SIZE`.
    pub fn new(
        text: impl Into<String>,
        region: impl Into<String>,
        page: i64,
        page_size: i64,
    ) -> Self {
        Self {
            text: text.into(),
            region: region.into(),
            page: clamp_page(page),
            page_size: clamp_page_size(page_size),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The region to restrict to, or `None` for empty and the "all" sentinel.
    pub fn region_filter(&self) -> Option<&str> {
        let region = self.region.trim();
        if region.is_empty() || region.eq_ignore_ascii_case(REGION_ALL) {
            None
        } else {
            Some(region)
        }
    }

    /// Lowercased trimmed search text, or `None` when blank.
    pub fn needle(&self) -> Option<String> {
        let text = self.text.trim();
        (!text.is_empty()).then(|| text.to_lowercase())
    }
}

impl Default for FilterQuery {
    fn default() -> Self {
        Self::new("", "", 1, DEFAULT_PAGE_SIZE as i64)
    }
}

pub fn clamp_page(page: i64) -> u32 {
    page.clamp(1, u32::MAX as i64) as u32
}

pub fn clamp_page_size(page_size: i64) -> u32 {
    page_size.clamp(1, MAX_PAGE_SIZE as i64) as u32
}

/// Substring match of an already-lowercased needle against name, region and capitals.
fn matches_text(country: &Country, needle: &str) -> bool {
    country.name.common.to_lowercase().contains(needle)
        || country.region.to_lowercase().contains(needle)
        || country
            .capitals()
            .iter()
            .any(|capital| capital.to_lowercase().contains(needle))
}

/// Countries matching the query's region and text, in directory order.
pub fn filter<'a>(countries: &'a [Country], query: &FilterQuery) -> Vec<&'a Country> {
    let region = query.region_filter().map(str::to_lowercase);
    let needle = query.needle();

    countries
        .iter()
        .filter(|c| {
            region
                .as_deref()
                .is_none_or(|r| c.region.to_lowercase() == r)
        })
        .filter(|c| needle.as_deref().is_none_or(|n| matches_text(c, n)))
        .collect()
}

/// `ceil(total / page_size)`, with an empty result still reporting one page.
pub fn total_pages(total: usize, page_size: u32) -> u32 {
    let pages = total.div_ceil(page_size.max(1) as usize).max(1);
    u32::try_from(pages).unwrap_or(u32::MAX)
}

pub fn paginate(matches: &[&Country], page: u32, page_size: u32) -> CountryResponse {
    let total = matches.len();
    let start = (page.max(1) as usize - 1).saturating_mul(page_size as usize);
    let countries = matches
        .iter()
        .skip(start)
        .take(page_size as usize)
        .map(|c| (*c).clone())
        .collect();

    CountryResponse {
        countries,
        total: u32::try_from(total).unwrap_or(u32::MAX),
        page,
        limit: page_size,
        total_pages: total_pages(total, page_size),
    }
}

/// Filter then paginate.
pub fn apply(countries: &[Country], query: &FilterQuery) -> CountryResponse {
    paginate(&filter(countries, query), query.page, query.page_size)
}

/// Sorted distinct non-empty regions.
pub fn unique_regions(countries: &[Country]) -> Vec<String> {
    countries
        .iter()
        .map(|c| c.region.as_str())
        .filter(|r| !r.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Search front-end over the directory.
///
/// Pages are computed on every call from the cached directory; only the
/// directory itself lives in the response cache.
#[derive(Clone)]
pub struct CountrySearch {
    directory: CountryDirectory,
}

impl CountrySearch {
    pub fn new(directory: CountryDirectory) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &CountryDirectory {
        &self.directory
    }

    pub async fn query(&self, query: &FilterQuery) -> Result<CountryResponse, FetchError> {
        let countries = self.directory.fetch_all().await?;
        let response = apply(&countries, query);
        trace!(
            page = response.page,
            total = response.total,
            "filtered page computed"
        );
        Ok(response)
    }

    pub async fn unique_regions(&self) -> Result<Vec<String>, FetchError> {
        let countries = self.directory.fetch_all().await?;
        Ok(unique_regions(&countries))
    }
}
