//! Search state and its canonical query-string form.
//!
//! Defaults are never written: a state with no text, no region, page 1 and the
//! default page size serializes to `/`.

use crate::countries::filter::{
    DEFAULT_PAGE_SIZE, FilterQuery, REGION_ALL, clamp_page, clamp_page_size,
};
use url::form_urlencoded;

pub const PARAM_TEXT: &str = "q";
pub const PARAM_REGION: &str = "region";
pub const PARAM_PAGE: &str = "page";
pub const PARAM_LIMIT: &str = "limit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    pub text: String,
    pub region: String,
    pub page: u32,
    pub page_size: u32,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            text: String::new(),
            region: String::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// Blank and the "all" sentinel both mean no region.
pub fn normalize_region(region: &str) -> String {
    let region = region.trim();
    if region.eq_ignore_ascii_case(REGION_ALL) {
        String::new()
    } else {
        region.to_owned()
    }
}

impl SearchState {
    /// Parse a query string (leading `?` optional). Unknown keys are ignored;
    /// malformed numbers fall back to defaults.
    pub fn from_query(query: &str) -> Self {
        let mut state = Self::default();
        let query = query.strip_prefix('?').unwrap_or(query);

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                PARAM_TEXT => state.text = value.into_owned(),
                PARAM_REGION => state.region = normalize_region(&value),
                PARAM_PAGE => {
                    if let Ok(page) = value.trim().parse::<i64>() {
                        state.page = clamp_page(page);
                    }
                }
                PARAM_LIMIT => {
                    if let Ok(limit) = value.trim().parse::<i64>() {
                        state.page_size = clamp_page_size(limit);
                    }
                }
                _ => {}
            }
        }
        state
    }

    /// Minimal query string, without the leading `?`. Empty when all defaults.
    pub fn to_query(&self) -> String {
        let mut query = form_urlencoded::Serializer::new(String::new());
        let text = self.text.trim();
        if !text.is_empty() {
            query.append_pair(PARAM_TEXT, text);
        }
        let region = normalize_region(&self.region);
        if !region.is_empty() {
            query.append_pair(PARAM_REGION, &region);
        }
        if self.page != 1 {
            query.append_pair(PARAM_PAGE, &self.page.to_string());
        }
        if self.page_size != DEFAULT_PAGE_SIZE {
            query.append_pair(PARAM_LIMIT, &self.page_size.to_string());
        }
        query.finish()
    }

    pub fn href(&self) -> String {
        match self.to_query() {
            query if query.is_empty() => "/".to_owned(),
            query => format!("/?{query}"),
        }
    }

    pub fn to_filter(&self) -> FilterQuery {
        FilterQuery::new(
            self.text.clone(),
            self.region.clone(),
            self.page as i64,
            self.page_size as i64,
        )
    }
}
