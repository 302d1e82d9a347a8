//! # Identity Types: Validated Identifier Newtypes
//!
//! Run and rule identifiers are distinct types with validated constructors.
//! You cannot pass a [`RuleId`] where a [`RunId`] is expected, and neither can
//! hold a malformed value.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::temporal::Timestamp;

/// Default run identifier prefix.
pub const DEFAULT_RUN_PREFIX: &str = "gk";

// ---------------------------------------------------------------------------
// RunId
// ---------------------------------------------------------------------------

/// Unique identifier of one pipeline run.
///
/// Format: `<prefix>_<YYYYMMDDTHHMMSSZ>_<8 lowercase hex>`, e.g.
/// `gk_20251218T013045Z_8f2c1a9b`. The timestamp makes identifiers sort by
/// allocation time; the random suffix keeps concurrent runs distinct.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Allocate a fresh run identifier stamped with `at`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidRunId` if `prefix` is empty or not
    /// lowercase alphanumeric.
    pub fn generate(prefix: &str, at: Timestamp) -> Result<Self, ValidationError> {
        Self::check_prefix(prefix)?;
        let random = Uuid::new_v4();
        let suffix: String = random.as_bytes()[..4]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        Ok(Self(format!("{prefix}_{}_{suffix}", at.to_compact())))
    }

    /// Check that `prefix` can start a run identifier: 1 to 16 lowercase
    /// ASCII letters or digits.
    pub fn check_prefix(prefix: &str) -> Result<(), ValidationError> {
        if is_valid_prefix(prefix) {
            Ok(())
        } else {
            Err(ValidationError::InvalidRunId(format!("{prefix}_…")))
        }
    }

    /// Parse and validate an existing run identifier.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidRunId(s.to_string());
        let mut parts = s.rsplitn(3, '_');
        let suffix = parts.next().ok_or_else(invalid)?;
        let stamp = parts.next().ok_or_else(invalid)?;
        let prefix = parts.next().ok_or_else(invalid)?;

        let suffix_ok = suffix.len() == 8
            && suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        let stamp_ok = chrono::NaiveDateTime::parse_from_str(stamp, "%Y%m%dT%H%M%SZ").is_ok();
        if !(suffix_ok && stamp_ok && is_valid_prefix(prefix)) {
            return Err(invalid());
        }
        Ok(Self(s.to_string()))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RunId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

fn is_valid_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.len() <= 16
        && prefix
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// RuleId
// ---------------------------------------------------------------------------

/// Identifier of a policy rule, unique within one policy version.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    /// Create a rule identifier, validating `[a-z0-9._-]+`.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let valid = !id.is_empty()
            && id.len() <= 64
            && id
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
        if valid {
            Ok(Self(id))
        } else {
            Err(ValidationError::InvalidRuleId(id))
        }
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for RuleId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}
