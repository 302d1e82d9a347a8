//! # Reason Code Registry
//!
//! Every reason code a decision can carry is registered here together with
//! the outcomes it may justify. Rules are checked against the registry when a
//! policy is loaded; decisions are checked again when a run bundle is built.

use std::collections::{BTreeMap, BTreeSet};

use gk_core::{Decision, Outcome, ReasonCode, RuleId};
use serde::{Deserialize, Serialize};

use crate::error::{PolicyLoadError, ReasonCodeViolation};

/// One registered reason code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReasonCodeEntry {
    /// The code itself.
    pub code: ReasonCode,
    /// Human-readable meaning.
    #[serde(default)]
    pub description: String,
    /// Outcomes this code may justify.
    pub outcomes: BTreeSet<Outcome>,
}

/// The set of known reason codes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonCodeRegistry {
    codes: BTreeMap<ReasonCode, ReasonCodeEntry>,
}

const STANDARD_CODES: &[(&str, &str, &[Outcome])] = &[
    (
        "INJECTION_DETECTED",
        "The submission attempted to steer the gatekeeper.",
        &[Outcome::Rejected, Outcome::Escalated],
    ),
    (
        "TIME_AMBIGUOUS",
        "The event time is relative, vague or lacks a UTC offset.",
        &[Outcome::Escalated],
    ),
    (
        "CATEGORY_OUT_OF_TAXONOMY",
        "The category signal matched no canonical category.",
        &[Outcome::Escalated],
    ),
    (
        "MISSING_REQUIRED_FIELD",
        "At least one required field is absent.",
        &[Outcome::Escalated, Outcome::Rejected],
    ),
    (
        "LOW_CONFIDENCE_CRITICAL",
        "The extractor marked a field as weakly supported.",
        &[Outcome::Escalated],
    ),
    (
        "NO_RULE_MATCHED",
        "No policy rule matched; escalated by the engine.",
        &[Outcome::Escalated],
    ),
    (
        "POLICY_INVARIANT_OVERRIDE",
        "The engine overrode a rule outcome that would break a safety invariant.",
        &[Outcome::Escalated],
    ),
];

impl ReasonCodeRegistry {
    /// A registry with no codes at all.
    pub fn empty() -> Self {
        Self {
            codes: BTreeMap::new(),
        }
    }

    /// The standard registry, including the engine-reserved codes.
    pub fn standard() -> Self {
        let codes = STANDARD_CODES
            .iter()
            .filter_map(|(code, description, outcomes)| {
                let code = ReasonCode::new(*code).ok()?;
                Some((
                    code.clone(),
                    ReasonCodeEntry {
                        code,
                        description: (*description).to_string(),
                        outcomes: outcomes.iter().copied().collect(),
                    },
                ))
            })
            .collect();
        Self { codes }
    }

    /// Register an additional code.
    ///
    /// Codes cannot be redefined and must allow at least one outcome.
    pub fn register(&mut self, entry: ReasonCodeEntry) -> Result<(), PolicyLoadError> {
        if self.codes.contains_key(&entry.code) {
            return Err(PolicyLoadError::InvalidReasonCodeEntry {
                code: entry.code,
                detail: "already registered".to_string(),
            });
        }
        if entry.outcomes.is_empty() {
            return Err(PolicyLoadError::InvalidReasonCodeEntry {
                code: entry.code,
                detail: "must allow at least one outcome".to_string(),
            });
        }
        self.codes.insert(entry.code.clone(), entry);
        Ok(())
    }

    /// Look up a code.
    pub fn get(&self, code: &ReasonCode) -> Option<&ReasonCodeEntry> {
        self.codes.get(code)
    }

    /// Whether `code` is registered.
    pub fn contains(&self, code: &ReasonCode) -> bool {
        self.codes.contains_key(code)
    }

    /// Registered entries in code order.
    pub fn entries(&self) -> impl Iterator<Item = &ReasonCodeEntry> {
        self.codes.values()
    }

    /// Check a rule's outcome and reason code at load time.
    pub fn validate_rule(
        &self,
        rule: &RuleId,
        outcome: Outcome,
        code: Option<&ReasonCode>,
    ) -> Result<(), PolicyLoadError> {
        let Some(code) = code else {
            if outcome == Outcome::Accepted {
                return Ok(());
            }
            return Err(PolicyLoadError::MissingReasonCode {
                rule: rule.clone(),
                outcome,
            });
        };
        if code.is_reserved() {
            return Err(PolicyLoadError::ReservedReasonCode {
                rule: rule.clone(),
                code: code.clone(),
            });
        }
        let entry = self
            .codes
            .get(code)
            .ok_or_else(|| PolicyLoadError::UnknownReasonCode {
                rule: rule.clone(),
                code: code.clone(),
            })?;
        if !entry.outcomes.contains(&outcome) {
            return Err(PolicyLoadError::ReasonCodeNotAllowed {
                rule: rule.clone(),
                code: code.clone(),
                outcome,
            });
        }
        Ok(())
    }

    /// Check a finished decision.
    ///
    /// Every code must be registered and, unless the engine overrode the
    /// decisive rule, allowed for the final outcome. An override keeps the
    /// rule's original code next to `POLICY_INVARIANT_OVERRIDE`, so only the
    /// reserved code is held to the final outcome in that case.
    pub fn check_decision(&self, decision: &Decision) -> Result<(), ReasonCodeViolation> {
        if decision.outcome == Outcome::Rejected && decision.reason_codes.is_empty() {
            return Err(ReasonCodeViolation::RejectedWithoutReason);
        }
        let overridden = decision.was_overridden();
        for code in &decision.reason_codes {
            let entry = self
                .codes
                .get(code)
                .ok_or_else(|| ReasonCodeViolation::Unregistered(code.clone()))?;
            let must_match = !overridden || code.is_reserved();
            if must_match && !entry.outcomes.contains(&decision.outcome) {
                return Err(ReasonCodeViolation::NotAllowed {
                    code: code.clone(),
                    outcome: decision.outcome,
                });
            }
        }
        Ok(())
    }
}

impl Default for ReasonCodeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
