//! # Temporal Types: UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only timestamp truncated to seconds, and the
//! `Clock` seam that stage timing is read through.
//!
//! Timestamps serialize as `YYYY-MM-DDTHH:MM:SSZ`. The same instant always
//! produces the same bytes, which is what keeps stored bundles and their
//! digests reproducible.

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// A UTC-only timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string with the `Z` suffix.
    ///
    /// Explicit offsets, even `+00:00`, are rejected. Stored artifacts only
    /// ever contain `Z` timestamps, so anything else indicates tampering or a
    /// foreign producer.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.ends_with('Z') {
            return Err(ValidationError::InvalidTimestamp {
                value: s.to_string(),
                reason: "must use Z suffix (UTC only)".to_string(),
            });
        }
        Self::parse_lenient(s)
    }

    /// Parse an RFC 3339 string with any offset, converting to UTC.
    pub fn parse_lenient(s: &str) -> Result<Self, ValidationError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| ValidationError::InvalidTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Render as ISO 8601 with Z suffix (e.g., `2024-03-01T14:00:00Z`).
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Render in the compact basic format used inside run identifiers
    /// (e.g., `20240301T140000Z`).
    pub fn to_compact(&self) -> String {
        self.0.format("%Y%m%dT%H%M%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::from_utc(dt)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_iso8601())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

/// Source of stage timestamps.
///
/// The pipeline reads time only through this trait so tests can pin every
/// timestamp in a run bundle.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> Timestamp;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// A clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn from_utc_truncates() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap();
        let ts = Timestamp::from_utc(dt.with_nanosecond(987_654_321).unwrap());
        assert_eq!(ts.as_datetime().nanosecond(), 0);
        assert_eq!(ts.to_iso8601(), "2024-03-01T14:00:00Z");
    }

    #[test]
    fn parse_accepts_z_only() {
        assert!(Timestamp::parse("2024-03-01T14:00:00Z").is_ok());
        assert!(Timestamp::parse("2024-03-01T14:00:00+00:00").is_err());
        assert!(Timestamp::parse("2024-03-01T14:00:00+02:00").is_err());
    }

    #[test]
    fn parse_lenient_converts_offsets() {
        let ts = Timestamp::parse_lenient("2024-03-01T16:00:00+02:00").unwrap();
        assert_eq!(ts.to_iso8601(), "2024-03-01T14:00:00Z");
    }

    #[test]
    fn compact_form() {
        let ts = Timestamp::parse("2025-12-18T01:30:45Z").unwrap();
        assert_eq!(ts.to_compact(), "20251218T013045Z");
    }

    #[test]
    fn serde_uses_iso8601_string() {
        let ts = Timestamp::parse("2024-03-01T14:00:00Z").unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, "\"2024-03-01T14:00:00Z\"");
        let back: Timestamp = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ts);
    }

    #[test]
    fn fixed_clock_is_frozen() {
        let ts = Timestamp::parse("2024-03-01T14:00:00Z").unwrap();
        let clock = FixedClock(ts);
        assert_eq!(clock.now(), clock.now());
        assert_eq!(clock.now(), ts);
    }

    #[test]
    fn ordering_follows_time() {
        let a = Timestamp::parse("2024-03-01T14:00:00Z").unwrap();
        let b = Timestamp::parse("2024-03-01T14:00:01Z").unwrap();
        assert!(a < b);
    }
}
