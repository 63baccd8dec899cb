//! Country records as served by the directory source and the JSON API.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ts_rs::TS;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountryName {
    pub common: String,
    pub official: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Flags {
    pub png: String,
    pub svg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// A directory entry, keyed by its ISO 3166-1 alpha-3 code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Country {
    pub name: CountryName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capital: Option<Vec<String>>,
    #[serde(default)]
    pub region: String,
    pub flags: Flags,
    pub cca3: String,
}

impl Country {
    pub fn code(&self) -> &str {
        &self.cca3
    }

    /// Capitals in upstream order; empty when the country has none.
    pub fn capitals(&self) -> &[String] {
        self.capital.as_deref().unwrap_or_default()
    }

    pub fn primary_capital(&self) -> Option<&str> {
        self.capitals().first().map(String::as_str)
    }
}

/// One page of filtered directory results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CountryResponse {
    pub countries: Vec<Country>,
    pub total: u32,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Currency {
    pub name: String,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapLinks {
    #[serde(default)]
    pub google_maps: Option<String>,
    #[serde(default)]
    pub open_street_maps: Option<String>,
}

/// Full single-country record from the by-code endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountryDetail {
    #[serde(flatten)]
    pub country: Country,
    #[serde(default)]
    pub subregion: Option<String>,
    #[serde(default)]
    pub population: Option<u64>,
    #[serde(default)]
    pub area: Option<f64>,
    #[serde(default)]
    pub languages: BTreeMap<String, String>,
    #[serde(default)]
    pub currencies: BTreeMap<String, Currency>,
    #[serde(default)]
    pub maps: Option<MapLinks>,
}

/// Returns true for strings shaped like an alpha-2 or alpha-3 country code.
pub fn is_valid_code(code: &str) -> bool {
    (2..=3).contains(&code.len()) && code.bytes().all(|b| b.is_ascii_alphanumeric())
}
