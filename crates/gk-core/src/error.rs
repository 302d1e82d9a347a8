//! # Error Types: Structured Error Hierarchy
//!
//! Errors shared by every Gatekeeper crate. All errors use `thiserror` for
//! derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Normal ambiguity in a submission (missing fields, vague times, unknown
//!   categories) is never an error. It is represented as quality flags and
//!   policy outcomes. The types here are reserved for structural failures.
//! - Validation errors carry the rejected input and the expected format so an
//!   operator can diagnose the problem without guesswork.

use thiserror::Error;

/// Error during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values are not permitted in canonical representations.
    /// Confidence scores are carried as integer basis points instead.
    #[error("float values are not permitted in canonical representations; use integers or strings: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Validation errors for submissions and domain primitive newtypes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The raw submission text is empty or whitespace only.
    #[error("submission raw_text is empty")]
    EmptyInput,

    /// The raw submission text exceeds the configured size limit.
    #[error("submission raw_text is {actual} bytes, limit is {limit}")]
    InputTooLarge {
        /// Size of the rejected input in bytes.
        actual: usize,
        /// Configured maximum in bytes.
        limit: usize,
    },

    /// Run identifier does not match `<prefix>_<YYYYMMDDTHHMMSSZ>_<8 hex>`.
    #[error("invalid run id: {0:?} (expected <prefix>_<YYYYMMDDTHHMMSSZ>_<8 hex>)")]
    InvalidRunId(String),

    /// Rule identifier is empty or contains characters outside `[a-z0-9._-]`.
    #[error("invalid rule id: {0:?} (expected lowercase [a-z0-9._-], non-empty)")]
    InvalidRuleId(String),

    /// Reason code is not SCREAMING_SNAKE_CASE.
    #[error("invalid reason code: {0:?} (expected SCREAMING_SNAKE_CASE)")]
    InvalidReasonCode(String),

    /// Confidence score outside `0.0..=1.0` (or `0..=10000` basis points).
    #[error("invalid confidence: {0} (expected 0.0..=1.0)")]
    InvalidConfidence(String),

    /// Timestamp string is not valid UTC ISO 8601.
    #[error("invalid timestamp: {value:?} ({reason})")]
    InvalidTimestamp {
        /// The string that failed to parse.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Digest string is not `sha256:<64 lowercase hex>`.
    #[error("invalid digest: {0:?} (expected sha256:<64 lowercase hex chars>)")]
    InvalidDigest(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_rejected_display() {
        let err = CanonicalizationError::FloatRejected(0.75);
        let msg = format!("{err}");
        assert!(msg.contains("float values are not permitted"));
        assert!(msg.contains("0.75"));
    }

    #[test]
    fn input_too_large_display() {
        let err = ValidationError::InputTooLarge {
            actual: 70_000,
            limit: 65_536,
        };
        let msg = format!("{err}");
        assert!(msg.contains("70000"));
        assert!(msg.contains("65536"));
    }

    #[test]
    fn invalid_run_id_display() {
        let err = ValidationError::InvalidRunId("bogus".to_string());
        assert!(format!("{err}").contains("bogus"));
    }

    #[test]
    fn invalid_timestamp_display() {
        let err = ValidationError::InvalidTimestamp {
            value: "not-a-date".to_string(),
            reason: "parse failed".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("not-a-date"));
        assert!(msg.contains("parse failed"));
    }

    #[test]
    fn empty_input_display() {
        assert_eq!(
            ValidationError::EmptyInput.to_string(),
            "submission raw_text is empty"
        );
    }
}
