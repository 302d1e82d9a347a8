//! # Decision Types
//!
//! A [`Decision`] is the only thing that leaves the policy stage: an outcome,
//! the reasons behind it, the rules that matched and the identity of the
//! policy that produced it. Decisions are plain values; two decisions are
//! equal exactly when every field is equal, which is what replay relies on.

use std::borrow::Cow;

use serde::{Deserialize, Deserializer, Serialize};

use crate::digest::ContentDigest;
use crate::error::ValidationError;
use crate::identity::RuleId;

/// One of the three gating outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    /// Complete, unambiguous and cleared for the system of record.
    Accepted,
    /// Needs a human before it can go anywhere.
    Escalated,
    /// Refused outright.
    Rejected,
}

impl Outcome {
    /// All outcomes, in routing order.
    pub const ALL: [Outcome; 3] = [Outcome::Accepted, Outcome::Escalated, Outcome::Rejected];

    /// Wire name, e.g. `ACCEPTED`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "ACCEPTED",
            Self::Escalated => "ESCALATED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Lowercase routing name, used for outbox directories.
    pub fn route(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Escalated => "escalated",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A machine-readable reason code in SCREAMING_SNAKE_CASE.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct ReasonCode(Cow<'static, str>);

impl ReasonCode {
    /// Emitted by the engine when no rule matched.
    pub const NO_RULE_MATCHED: ReasonCode = ReasonCode(Cow::Borrowed("NO_RULE_MATCHED"));

    /// Appended by the engine when it overrode a rule's outcome.
    pub const POLICY_INVARIANT_OVERRIDE: ReasonCode =
        ReasonCode(Cow::Borrowed("POLICY_INVARIANT_OVERRIDE"));

    /// Create a reason code, validating `[A-Z][A-Z0-9_]*` (at most 64 chars).
    pub fn new(code: impl Into<String>) -> Result<Self, ValidationError> {
        let code = code.into();
        let mut chars = code.chars();
        let valid = code.len() <= 64
            && chars.next().is_some_and(|c| c.is_ascii_uppercase())
            && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(Self(Cow::Owned(code)))
        } else {
            Err(ValidationError::InvalidReasonCode(code))
        }
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this code is reserved for the engine.
    pub fn is_reserved(&self) -> bool {
        *self == Self::NO_RULE_MATCHED || *self == Self::POLICY_INVARIANT_OVERRIDE
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ReasonCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// The result of evaluating a policy against one normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Final outcome, after any engine override.
    pub outcome: Outcome,
    /// Ordered reason codes. Non-empty for every `Rejected` decision.
    pub reason_codes: Vec<ReasonCode>,
    /// Ids of every matching rule in priority order; the decisive rule first.
    pub rules_fired: Vec<RuleId>,
    /// Version string of the deciding policy.
    pub policy_version: String,
    /// Content hash of the deciding policy.
    pub policy_hash: ContentDigest,
}

impl Decision {
    /// The rule whose outcome was applied, if any rule matched.
    pub fn decisive_rule(&self) -> Option<&RuleId> {
        self.rules_fired.first()
    }

    /// Whether the engine overrode the decisive rule's outcome.
    pub fn was_overridden(&self) -> bool {
        self.reason_codes
            .contains(&ReasonCode::POLICY_INVARIANT_OVERRIDE)
    }
}
