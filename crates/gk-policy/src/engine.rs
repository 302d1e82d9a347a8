//! # Policy Engine
//!
//! Evaluates a [`PolicyDefinition`] against a normalized record and produces a
//! [`Decision`].
//!
//! ## Evaluation
//!
//! Every rule is evaluated in priority order. The ids of all matching rules
//! are collected, so the decisive rule is always `rules_fired[0]`; outcome and
//! reason code come from that first match. When nothing matches the result is
//! `ESCALATED` with `NO_RULE_MATCHED`.
//!
//! ## Invariant guard
//!
//! Independently of the rules, the engine never emits `ACCEPTED` for a record
//! with a missing required field or a blocking flag, and never emits
//! `REJECTED` without a reason code. A guarded outcome becomes `ESCALATED`
//! with `POLICY_INVARIANT_OVERRIDE` appended and is logged at `warn`.
//!
//! The engine is pure: the same inputs always give the same decision.

use std::collections::BTreeSet;

use gk_core::{
    Decision, Field, FlagKind, NormalizedRecord, Outcome, QualityFlag, QualityFlags, ReasonCode,
    RuleId,
};
use serde::Serialize;

use crate::definition::PolicyDefinition;

/// One rule's evaluation in an [`Explanation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleTrace {
    /// Rule id.
    pub rule_id: RuleId,
    /// Rule priority.
    pub priority: u32,
    /// Whether the predicate held.
    pub matched: bool,
}

/// A safety invariant the decisive outcome would have broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum InvariantViolation {
    /// `ACCEPTED` with a required field absent.
    AcceptedWithMissingField {
        /// The absent field.
        field: Field,
    },
    /// `ACCEPTED` with a blocking flag set.
    AcceptedWithBlockingFlag {
        /// The blocking flag.
        flag: FlagKind,
    },
    /// `REJECTED` with no reason code.
    RejectedWithoutReason,
}

/// Details of an engine override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverrideDetail {
    /// Outcome the decisive rule selected.
    pub original_outcome: Outcome,
    /// Every invariant that outcome would have broken.
    pub violations: Vec<InvariantViolation>,
}

/// A decision with the full evaluation trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    /// The decision `evaluate` returns for the same inputs.
    pub decision: Decision,
    /// Every rule in priority order.
    pub trace: Vec<RuleTrace>,
    /// Present when the invariant guard changed the outcome.
    pub override_detail: Option<OverrideDetail>,
}

/// Stateless rule evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    /// Create an engine.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate `policy` against one record.
    pub fn evaluate(
        &self,
        record: &NormalizedRecord,
        flags: &QualityFlags,
        policy: &PolicyDefinition,
    ) -> Decision {
        self.explain(record, flags, policy).decision
    }

    /// Evaluate and keep the per-rule trace and any override detail.
    pub fn explain(
        &self,
        record: &NormalizedRecord,
        flags: &QualityFlags,
        policy: &PolicyDefinition,
    ) -> Explanation {
        let mut trace = Vec::with_capacity(policy.rules().len());
        let mut decisive = None;
        let mut rules_fired = Vec::new();

        for rule in policy.rules() {
            let matched = rule.predicate.evaluate(record, flags);
            tracing::debug!(
                rule_id = %rule.id,
                priority = rule.priority,
                matched,
                "rule evaluated"
            );
            if matched {
                if decisive.is_none() {
                    decisive = Some(rule);
                }
                rules_fired.push(rule.id.clone());
            }
            trace.push(RuleTrace {
                rule_id: rule.id.clone(),
                priority: rule.priority,
                matched,
            });
        }

        let (mut outcome, mut reason_codes) = match decisive {
            Some(rule) => (rule.outcome, rule.reason_code.iter().cloned().collect::<Vec<_>>()),
            None => (Outcome::Escalated, vec![ReasonCode::NO_RULE_MATCHED]),
        };

        let violations = invariant_violations(outcome, &reason_codes, record, flags);
        let override_detail = if violations.is_empty() {
            None
        } else {
            tracing::warn!(
                policy_version = policy.version(),
                policy_hash = %policy.hash(),
                decisive_rule = decisive.map(|r| r.id.as_str()),
                original_outcome = %outcome,
                ?violations,
                "policy invariant override: outcome forced to ESCALATED"
            );
            let detail = OverrideDetail {
                original_outcome: outcome,
                violations,
            };
            outcome = Outcome::Escalated;
            reason_codes.push(ReasonCode::POLICY_INVARIANT_OVERRIDE);
            Some(detail)
        };

        Explanation {
            decision: Decision {
                outcome,
                reason_codes,
                rules_fired,
                policy_version: policy.version().to_string(),
                policy_hash: policy.hash(),
            },
            trace,
            override_detail,
        }
    }
}

fn invariant_violations(
    outcome: Outcome,
    reason_codes: &[ReasonCode],
    record: &NormalizedRecord,
    flags: &QualityFlags,
) -> Vec<InvariantViolation> {
    match outcome {
        Outcome::Accepted => {
            let missing: BTreeSet<Field> = record
                .missing_fields()
                .into_iter()
                .chain(flags.iter().filter_map(|f| match f {
                    QualityFlag::MissingField(field) => Some(*field),
                    _ => None,
                }))
                .collect();
            let blocking: BTreeSet<FlagKind> = flags.blocking().map(QualityFlag::kind).collect();
            missing
                .into_iter()
                .map(|field| InvariantViolation::AcceptedWithMissingField { field })
                .chain(
                    blocking
                        .into_iter()
                        .map(|flag| InvariantViolation::AcceptedWithBlockingFlag { flag }),
                )
                .collect()
        }
        Outcome::Rejected if reason_codes.is_empty() => {
            vec![InvariantViolation::RejectedWithoutReason]
        }
        Outcome::Rejected | Outcome::Escalated => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{PolicyFormat, PolicyLoader};
    use gk_core::{Category, Timestamp};

    fn complete() -> NormalizedRecord {
        NormalizedRecord {
            summary: Some("s".into()),
            category: Some(Category::NearMiss),
            location: Some("l".into()),
            event_time: Some(Timestamp::parse("2025-12-17T14:30:00Z").unwrap()),
        }
    }

    fn flags(fs: &[QualityFlag]) -> QualityFlags {
        fs.iter().copied().collect()
    }

    fn load(yaml: &str) -> PolicyDefinition {
        PolicyLoader::new().load_str(yaml, PolicyFormat::Yaml).unwrap()
    }

    const ACCEPT_EVERYTHING: &str = "
version: careless
rules:
  - id: accept-all
    priority: 1
    when: always
    outcome: ACCEPTED
";

    const TWO_MATCHES: &str = "
version: layered
rules:
  - id: accept-complete
    priority: 100
    when: no_blockers
    outcome: ACCEPTED
  - id: escalate-near-miss
    priority: 50
    when: { category_in: [\"Near Miss\"] }
    outcome: ESCALATED
    reason_code: MISSING_REQUIRED_FIELD
";

    #[test]
    fn decisive_rule_is_first_and_all_matches_recorded() {
        let policy = load(TWO_MATCHES);
        let d = PolicyEngine::new().evaluate(&complete(), &flags(&[]), &policy);
        assert_eq!(d.outcome, Outcome::Escalated);
        let fired: Vec<_> = d.rules_fired.iter().map(|r| r.as_str()).collect();
        assert_eq!(fired, vec!["escalate-near-miss", "accept-complete"]);
        assert_eq!(d.reason_codes, vec![ReasonCode::new("MISSING_REQUIRED_FIELD").unwrap()]);
        assert_eq!(d.policy_version, "layered");
        assert_eq!(d.policy_hash, policy.hash());
    }

    #[test]
    fn no_match_escalates() {
        let policy = load(
            "version: narrow\nrules:\n  - id: only-spills\n    priority: 1\n    when: { category_in: [\"Environmental Incident\"] }\n    outcome: ESCALATED\n    reason_code: TIME_AMBIGUOUS\n",
        );
        let d = PolicyEngine::new().evaluate(&complete(), &flags(&[]), &policy);
        assert_eq!(d.outcome, Outcome::Escalated);
        assert_eq!(d.reason_codes, vec![ReasonCode::NO_RULE_MATCHED]);
        assert!(d.rules_fired.is_empty());
    }

    #[test]
    fn guard_blocks_accepting_incomplete_record() {
        let policy = load(ACCEPT_EVERYTHING);
        let mut record = complete();
        record.location = None;
        let ex = PolicyEngine::new().explain(&record, &flags(&[]), &policy);
        assert_eq!(ex.decision.outcome, Outcome::Escalated);
        assert_eq!(ex.decision.reason_codes, vec![ReasonCode::POLICY_INVARIANT_OVERRIDE]);
        assert_eq!(ex.decision.rules_fired[0].as_str(), "accept-all");
        let detail = ex.override_detail.unwrap();
        assert_eq!(detail.original_outcome, Outcome::Accepted);
        assert_eq!(
            detail.violations,
            vec![InvariantViolation::AcceptedWithMissingField { field: Field::Location }]
        );
    }

    #[test]
    fn guard_blocks_accepting_blocking_flags() {
        let policy = load(ACCEPT_EVERYTHING);
        let ex = PolicyEngine::new().explain(
            &complete(),
            &flags(&[QualityFlag::InjectionSuspected]),
            &policy,
        );
        assert_eq!(ex.decision.outcome, Outcome::Escalated);
        assert!(ex.decision.was_overridden());
        assert_eq!(
            ex.override_detail.unwrap().violations,
            vec![InvariantViolation::AcceptedWithBlockingFlag {
                flag: FlagKind::InjectionSuspected
            }]
        );
    }

    #[test]
    fn accepts_clean_record_without_override() {
        let policy = load(ACCEPT_EVERYTHING);
        let ex = PolicyEngine::new().explain(&complete(), &flags(&[]), &policy);
        assert_eq!(ex.decision.outcome, Outcome::Accepted);
        assert!(ex.decision.reason_codes.is_empty());
        assert!(ex.override_detail.is_none());
    }

    #[test]
    fn trace_covers_every_rule() {
        let policy = load(TWO_MATCHES);
        let ex = PolicyEngine::new().explain(&complete(), &flags(&[]), &policy);
        assert_eq!(ex.trace.len(), 2);
        assert!(ex.trace.iter().all(|t| t.matched));
        assert_eq!(ex.trace[0].priority, 50);
    }

    #[test]
    fn rejected_without_reason_is_guarded() {
        let v = invariant_violations(Outcome::Rejected, &[], &complete(), &flags(&[]));
        assert_eq!(v, vec![InvariantViolation::RejectedWithoutReason]);
        let ok = invariant_violations(
            Outcome::Rejected,
            &[ReasonCode::new("INJECTION_DETECTED").unwrap()],
            &complete(),
            &flags(&[]),
        );
        assert!(ok.is_empty());
    }

    #[test]
    fn evaluation_is_deterministic() {
        let policy = load(TWO_MATCHES);
        let f = flags(&[QualityFlag::LowConfidence(Field::Summary)]);
        let a = PolicyEngine::new().evaluate(&complete(), &f, &policy);
        let b = PolicyEngine::new().evaluate(&complete(), &f, &policy);
        assert_eq!(a, b);
    }
}
