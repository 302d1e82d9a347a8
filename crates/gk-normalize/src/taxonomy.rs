//! # Taxonomy Resolution
//!
//! Maps a raw category signal onto the closed [`Category`] set. Matching is
//! exact after a fixed normalization (lowercase, ASCII letters and digits
//! only), so `"near-miss"`, `"NEAR MISS"` and `"Near Miss"` all resolve, while
//! `"Chemical Spill"` or `"near misses"` never do. There is no fuzzy or
//! semantic fallback: an unrecognized signal stays unrecognized.

use std::collections::BTreeMap;

use gk_core::Category;

/// Extractor sentinel for "no value found".
pub const UNKNOWN_SENTINEL: &str = "UNKNOWN";

/// Outcome of resolving one category signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The signal names a canonical category.
    Matched(Category),
    /// There was no signal (absent, blank or the `UNKNOWN` sentinel).
    Absent,
    /// There was a signal, but it is not a canonical category.
    Unrecognized,
}

impl Resolution {
    /// The matched category, if any.
    pub fn category(&self) -> Option<Category> {
        match self {
            Self::Matched(c) => Some(*c),
            Self::Absent | Self::Unrecognized => None,
        }
    }
}

/// Resolves category signals against the canonical taxonomy.
#[derive(Debug, Clone)]
pub struct TaxonomyResolver {
    index: BTreeMap<String, Category>,
}

impl TaxonomyResolver {
    /// A resolver over the five canonical categories.
    pub fn standard() -> Self {
        let index = Category::ALL
            .into_iter()
            .map(|c| (match_key(c.label()), c))
            .collect();
        Self { index }
    }

    /// Resolve a raw signal.
    pub fn resolve(&self, signal: Option<&str>) -> Resolution {
        let Some(raw) = signal.map(str::trim) else {
            return Resolution::Absent;
        };
        if is_absent_value(raw) {
            return Resolution::Absent;
        }
        match self.index.get(&match_key(raw)) {
            Some(category) => Resolution::Matched(*category),
            None => Resolution::Unrecognized,
        }
    }
}

impl Default for TaxonomyResolver {
    fn default() -> Self {
        Self::standard()
    }
}

/// Comparison key: ASCII letters and digits, lowercased.
pub fn match_key(s: &str) -> String {
    s.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Blank strings and the `UNKNOWN` sentinel carry no value.
pub fn is_absent_value(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s.eq_ignore_ascii_case(UNKNOWN_SENTINEL)
}
