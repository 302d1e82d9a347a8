//! # Event-Time Resolution
//!
//! An event time is accepted only when the text names one absolute instant:
//! a calendar date, a time of day and an explicit offset (or `Z`/`UTC`).
//! Everything else is unresolved and is classified so the caller can log why:
//!
//! - relative or vague expressions ("yesterday afternoon", "2 hours ago",
//!   "on Monday"),
//! - a date and time without an offset,
//! - a date without a time,
//! - text that is not a time at all.
//!
//! Nothing here guesses a reference date or a timezone.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use gk_core::Timestamp;
use regex::Regex;

const WEEKDAYS: &str = "monday|tuesday|wednesday|thursday|friday|saturday|sunday";

fn relative_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        relative_pattern_sources()
            .iter()
            .filter_map(|p| Regex::new(p).ok())
            .collect()
    })
}

fn relative_pattern_sources() -> Vec<String> {
    vec![
        r"(?i)\b(?:today|tonight|yesterday|tomorrow)\b".to_string(),
        format!(
            r"(?i)\b(?:last|this|next)\s+(?:night|morning|afternoon|evening|week|weekend|month|year|shift|{WEEKDAYS})\b"
        ),
        format!(r"(?i)\bon\s+(?:{WEEKDAYS})\b"),
        r"(?i)\b(?:\d+|an?|a\s+few|a\s+couple\s+of|few|several|one|two|three)\s+(?:minutes?|hours?|days?|weeks?|months?|years?)\s+ago\b".to_string(),
        r"(?i)\b(?:just\s+now|earlier\s+today|the\s+other\s+day|recently)\b".to_string(),
    ]
}

/// The first relative-time expression in `text`, if any.
///
/// "First" is by position in the text, so the answer does not depend on the
/// order the patterns are tried in.
pub fn find_relative_time(text: &str) -> Option<&str> {
    relative_patterns()
        .iter()
        .filter_map(|re| re.find(text))
        .min_by_key(|m| (m.start(), std::cmp::Reverse(m.end())))
        .map(|m| m.as_str())
}

/// Why an event-time value could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedTime {
    /// A relative or vague expression, e.g. "yesterday".
    Relative(String),
    /// A date and time without a UTC offset.
    MissingOffset,
    /// A calendar date without a time of day.
    DateOnly,
    /// Not recognizable as a time.
    Unparseable,
}

impl UnresolvedTime {
    /// Short label for log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Relative(_) => "relative",
            Self::MissingOffset => "missing_offset",
            Self::DateOnly => "date_only",
            Self::Unparseable => "unparseable",
        }
    }
}

/// Outcome of resolving an event-time value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeResolution {
    /// One unambiguous instant.
    Absolute(Timestamp),
    /// Anything else.
    Unresolved(UnresolvedTime),
}

const OFFSET_FORMATS: [&str; 8] = [
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Resolve an event-time value to an absolute instant.
pub fn resolve_event_time(text: &str) -> TimeResolution {
    let text = text.trim();
    if text.is_empty() {
        return TimeResolution::Unresolved(UnresolvedTime::Unparseable);
    }
    if let Some(expr) = find_relative_time(text) {
        return TimeResolution::Unresolved(UnresolvedTime::Relative(expr.to_string()));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return TimeResolution::Absolute(Timestamp::from_utc(dt.with_timezone(&Utc)));
    }
    let with_offset = explicit_utc_to_offset(text);
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&with_offset, fmt) {
            return TimeResolution::Absolute(Timestamp::from_utc(dt.with_timezone(&Utc)));
        }
    }

    let naive_text = text.split('.').next().unwrap_or(text);
    if NAIVE_FORMATS
        .iter()
        .any(|fmt| NaiveDateTime::parse_from_str(naive_text, fmt).is_ok())
    {
        return TimeResolution::Unresolved(UnresolvedTime::MissingOffset);
    }
    if NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok() {
        return TimeResolution::Unresolved(UnresolvedTime::DateOnly);
    }
    TimeResolution::Unresolved(UnresolvedTime::Unparseable)
}

/// Rewrite a trailing `Z` or `UTC` designator as `+00:00`.
fn explicit_utc_to_offset(text: &str) -> String {
    for suffix in [" UTC", "UTC", "Z", "z"] {
        if let Some(stem) = text.strip_suffix(suffix) {
            return format!("{}+00:00", stem.trim_end());
        }
    }
    text.to_string()
}
