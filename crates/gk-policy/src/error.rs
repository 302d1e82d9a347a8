//! Policy error types.
//!
//! Every variant carries enough context (file path, rule id, reason code) to
//! fix the policy file without re-reading the loader.

use std::path::PathBuf;

use gk_core::{CanonicalizationError, Outcome, ReasonCode, RuleId};
use thiserror::Error;

/// A policy could not be loaded, validated or activated.
///
/// Whenever this is returned from an activation path, the previously active
/// policy stays authoritative.
#[derive(Debug, Error)]
pub enum PolicyLoadError {
    /// The policy file does not exist.
    #[error("policy file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Reading the policy file failed.
    #[error("failed to read policy file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// YAML parsing failed.
    #[error("failed to parse policy YAML{}: {source}", display_origin(.origin))]
    YamlParse {
        origin: Option<PathBuf>,
        source: serde_yaml::Error,
    },

    /// JSON parsing failed.
    #[error("failed to parse policy JSON{}: {source}", display_origin(.origin))]
    JsonParse {
        origin: Option<PathBuf>,
        source: serde_json::Error,
    },

    /// The document parsed but does not have the policy shape (unknown key,
    /// unknown flag kind or field, wrong type).
    #[error("malformed policy document: {0}")]
    Schema(#[source] serde_json::Error),

    /// The document contains a value JSON cannot represent portably.
    #[error("policy document is not JSON-compatible at {path}: {detail}")]
    JsonIncompatible { path: String, detail: String },

    /// `version` is empty.
    #[error("policy version must be a non-empty string")]
    EmptyVersion,

    /// The policy has no rules.
    #[error("policy {version} defines no rules")]
    NoRules { version: String },

    /// Two rules share an id.
    #[error("duplicate rule id: {id}")]
    DuplicateRuleId { id: RuleId },

    /// Two rules share a priority, so their order would be ambiguous.
    #[error("rules {first} and {second} share priority {priority}")]
    DuplicatePriority {
        priority: u32,
        first: RuleId,
        second: RuleId,
    },

    /// A rule's predicate is structurally invalid.
    #[error("rule {rule}: invalid predicate: {detail}")]
    InvalidPredicate { rule: RuleId, detail: String },

    /// A rule references a reason code the registry does not define.
    #[error("rule {rule}: unregistered reason code {code}")]
    UnknownReasonCode { rule: RuleId, code: ReasonCode },

    /// A rule uses a reason code that is not allowed for its outcome.
    #[error("rule {rule}: reason code {code} is not allowed for outcome {outcome}")]
    ReasonCodeNotAllowed {
        rule: RuleId,
        code: ReasonCode,
        outcome: Outcome,
    },

    /// A rule uses a code reserved for the engine.
    #[error("rule {rule}: reason code {code} is reserved for the engine")]
    ReservedReasonCode { rule: RuleId, code: ReasonCode },

    /// A non-accepting rule has no reason code.
    #[error("rule {rule}: outcome {outcome} requires a reason_code")]
    MissingReasonCode { rule: RuleId, outcome: Outcome },

    /// A reason code registry entry is invalid.
    #[error("reason code {code}: {detail}")]
    InvalidReasonCodeEntry { code: ReasonCode, detail: String },

    /// Computing the policy hash failed.
    #[error("policy hash computation failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),
}

fn display_origin(origin: &Option<PathBuf>) -> String {
    match origin {
        Some(path) => format!(" at {}", path.display()),
        None => String::new(),
    }
}

/// A decision's reason codes are inconsistent with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReasonCodeViolation {
    /// A `Rejected` decision carries no reason code.
    #[error("REJECTED decision carries no reason code")]
    RejectedWithoutReason,

    /// The decision carries a code the registry does not define.
    #[error("decision carries unregistered reason code {0}")]
    Unregistered(ReasonCode),

    /// The decision carries a code not allowed for its outcome.
    #[error("reason code {code} is not allowed for outcome {outcome}")]
    NotAllowed { code: ReasonCode, outcome: Outcome },
}
