//! Locale-aware ordering for country names.
//!
//! Names compare on an accent- and case-folded primary key, so "Åland Islands"
//! sorts among the A's and "Côte d'Ivoire" next to "Costa Rica". The raw string
//! breaks ties so the order stays total and deterministic.

use std::cmp::Ordering;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Decompose, drop combining marks, and lowercase.
pub fn collation_key(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    collation_key(a)
        .cmp(&collation_key(b))
        .then_with(|| a.cmp(b))
}
