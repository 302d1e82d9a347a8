//! # Policy Definitions
//!
//! A [`PolicyDefinition`] is a validated, immutable, versioned rule set with
//! its content hash. The only way to obtain one is [`PolicyDefinition::new`],
//! which runs every structural check, so holding a `PolicyDefinition` means
//! holding a policy that may be activated.
//!
//! ## Hash
//!
//! The hash is SHA-256 over the JCS-canonical form of
//! `{version, rules: [{id, priority, predicate, outcome, reason_code}]}` with
//! rules in priority order. Descriptions, custom reason code descriptions and
//! the source text (YAML or JSON, key order, comments) do not contribute.

use std::collections::BTreeSet;

use gk_core::{sha256_digest, CanonicalBytes, ContentDigest, Outcome, ReasonCode, RuleId};
use serde::{Deserialize, Serialize};

use crate::error::PolicyLoadError;
use crate::predicate::Predicate;
use crate::reason::{ReasonCodeEntry, ReasonCodeRegistry};

/// One rule: a predicate and the outcome it selects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyRule {
    /// Unique within the policy version.
    pub id: RuleId,
    /// Evaluation order; lower runs first. Unique within the policy.
    pub priority: u32,
    /// Free-form explanation. Not hashed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Condition under which the rule matches.
    #[serde(rename = "when", alias = "predicate")]
    pub predicate: Predicate,
    /// Outcome selected when this rule is decisive.
    pub outcome: Outcome,
    /// Reason code attached to the outcome. Required unless `ACCEPTED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<ReasonCode>,
}

/// The hashed projection of a rule.
#[derive(Serialize)]
struct HashedRule<'a> {
    id: &'a RuleId,
    priority: u32,
    predicate: &'a Predicate,
    outcome: Outcome,
    reason_code: Option<&'a ReasonCode>,
}

/// The hashed projection of a policy.
#[derive(Serialize)]
struct HashedPolicy<'a> {
    version: &'a str,
    rules: Vec<HashedRule<'a>>,
}

/// The on-disk policy document.
///
/// Parsing produces this; [`PolicyDefinition::to_document`] produces it back
/// for the per-run policy snapshot, and reloading that snapshot yields the
/// same hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolicyDocument {
    /// Policy version label.
    pub version: String,
    /// Reason codes added on top of the standard registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reason_codes: Vec<ReasonCodeEntry>,
    /// Rules in any order.
    pub rules: Vec<PolicyRule>,
}

/// A validated, immutable policy.
#[derive(Debug, Clone)]
pub struct PolicyDefinition {
    version: String,
    rules: Vec<PolicyRule>,
    custom_codes: Vec<ReasonCodeEntry>,
    registry: ReasonCodeRegistry,
    hash: ContentDigest,
}

impl PolicyDefinition {
    /// Validate a document against `base` and build the definition.
    ///
    /// # Errors
    ///
    /// Any structural problem in the version, rules, predicates or reason
    /// codes. The first problem found is reported.
    pub fn new(document: PolicyDocument, base: &ReasonCodeRegistry) -> Result<Self, PolicyLoadError> {
        let PolicyDocument {
            version,
            reason_codes,
            mut rules,
        } = document;

        if version.trim().is_empty() {
            return Err(PolicyLoadError::EmptyVersion);
        }
        if rules.is_empty() {
            return Err(PolicyLoadError::NoRules { version });
        }

        let mut registry = base.clone();
        for entry in &reason_codes {
            if entry.code.is_reserved() {
                return Err(PolicyLoadError::InvalidReasonCodeEntry {
                    code: entry.code.clone(),
                    detail: "reserved for the engine".to_string(),
                });
            }
            registry.register(entry.clone())?;
        }

        rules.sort_by_key(|r| r.priority);

        let mut ids: BTreeSet<&RuleId> = BTreeSet::new();
        for rule in &rules {
            if !ids.insert(&rule.id) {
                return Err(PolicyLoadError::DuplicateRuleId {
                    id: rule.id.clone(),
                });
            }
        }
        for pair in rules.windows(2) {
            if pair[0].priority == pair[1].priority {
                return Err(PolicyLoadError::DuplicatePriority {
                    priority: pair[0].priority,
                    first: pair[0].id.clone(),
                    second: pair[1].id.clone(),
                });
            }
        }
        for rule in &rules {
            rule.predicate
                .check()
                .map_err(|detail| PolicyLoadError::InvalidPredicate {
                    rule: rule.id.clone(),
                    detail,
                })?;
            registry.validate_rule(&rule.id, rule.outcome, rule.reason_code.as_ref())?;
        }

        let hash = compute_hash(&version, &rules)?;
        Ok(Self {
            version,
            rules,
            custom_codes: reason_codes,
            registry,
            hash,
        })
    }

    /// Version label.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in priority order.
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Look up a rule by id.
    pub fn rule(&self, id: &RuleId) -> Option<&PolicyRule> {
        self.rules.iter().find(|r| &r.id == id)
    }

    /// Content hash.
    pub fn hash(&self) -> ContentDigest {
        self.hash
    }

    /// Standard registry plus this policy's custom codes.
    pub fn registry(&self) -> &ReasonCodeRegistry {
        &self.registry
    }

    /// The document form, rules in priority order.
    pub fn to_document(&self) -> PolicyDocument {
        PolicyDocument {
            version: self.version.clone(),
            reason_codes: self.custom_codes.clone(),
            rules: self.rules.clone(),
        }
    }
}

impl PartialEq for PolicyDefinition {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for PolicyDefinition {}

fn compute_hash(version: &str, rules: &[PolicyRule]) -> Result<ContentDigest, PolicyLoadError> {
    let hashed = HashedPolicy {
        version,
        rules: rules
            .iter()
            .map(|r| HashedRule {
                id: &r.id,
                priority: r.priority,
                predicate: &r.predicate,
                outcome: r.outcome,
                reason_code: r.reason_code.as_ref(),
            })
            .collect(),
    };
    let canonical = CanonicalBytes::new(&hashed)?;
    Ok(sha256_digest(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::FlagMatch;
    use gk_core::{FlagKind, Outcome};

    fn rule(id: &str, priority: u32, outcome: Outcome, code: Option<&str>) -> PolicyRule {
        PolicyRule {
            id: RuleId::new(id).unwrap(),
            priority,
            description: None,
            predicate: Predicate::Always,
            outcome,
            reason_code: code.map(|c| ReasonCode::new(c).unwrap()),
        }
    }

    fn doc(rules: Vec<PolicyRule>) -> PolicyDocument {
        PolicyDocument {
            version: "test".into(),
            reason_codes: vec![],
            rules,
        }
    }

    fn build(document: PolicyDocument) -> Result<PolicyDefinition, PolicyLoadError> {
        PolicyDefinition::new(document, &ReasonCodeRegistry::standard())
    }

    #[test]
    fn rules_are_sorted_by_priority() {
        let def = build(doc(vec![
            rule("b", 20, Outcome::Escalated, Some("TIME_AMBIGUOUS")),
            rule("a", 10, Outcome::Accepted, None),
        ]))
        .unwrap();
        let ids: Vec<_> = def.rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn hash_ignores_rule_order_and_descriptions() {
        let a = build(doc(vec![
            rule("a", 10, Outcome::Accepted, None),
            rule("b", 20, Outcome::Escalated, Some("TIME_AMBIGUOUS")),
        ]))
        .unwrap();
        let mut described = rule("b", 20, Outcome::Escalated, Some("TIME_AMBIGUOUS"));
        described.description = Some("explained at length".into());
        let b = build(doc(vec![described, rule("a", 10, Outcome::Accepted, None)])).unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    #[test]
    fn hash_changes_with_semantics() {
        let base = build(doc(vec![rule("a", 10, Outcome::Accepted, None)])).unwrap();
        let other_priority = build(doc(vec![rule("a", 11, Outcome::Accepted, None)])).unwrap();
        let mut other_version = doc(vec![rule("a", 10, Outcome::Accepted, None)]);
        other_version.version = "test2".into();
        let other_version = build(other_version).unwrap();
        assert_ne!(base.hash(), other_priority.hash());
        assert_ne!(base.hash(), other_version.hash());
    }

    #[test]
    fn rejects_duplicates() {
        assert!(matches!(
            build(doc(vec![
                rule("a", 10, Outcome::Accepted, None),
                rule("a", 20, Outcome::Accepted, None),
            ])),
            Err(PolicyLoadError::DuplicateRuleId { .. })
        ));
        assert!(matches!(
            build(doc(vec![
                rule("a", 10, Outcome::Accepted, None),
                rule("b", 10, Outcome::Accepted, None),
            ])),
            Err(PolicyLoadError::DuplicatePriority { priority: 10, .. })
        ));
    }

    #[test]
    fn rejects_empty_version_and_no_rules() {
        let mut empty_version = doc(vec![rule("a", 10, Outcome::Accepted, None)]);
        empty_version.version = "  ".into();
        assert!(matches!(build(empty_version), Err(PolicyLoadError::EmptyVersion)));
        assert!(matches!(build(doc(vec![])), Err(PolicyLoadError::NoRules { .. })));
    }

    #[test]
    fn rejects_bad_predicates_and_codes() {
        let mut bad = rule("a", 10, Outcome::Escalated, Some("TIME_AMBIGUOUS"));
        bad.predicate = Predicate::Any(vec![]);
        assert!(matches!(
            build(doc(vec![bad])),
            Err(PolicyLoadError::InvalidPredicate { .. })
        ));
        assert!(matches!(
            build(doc(vec![rule("a", 10, Outcome::Rejected, None)])),
            Err(PolicyLoadError::MissingReasonCode { .. })
        ));
        assert!(matches!(
            build(doc(vec![rule("a", 10, Outcome::Escalated, Some("POLICY_INVARIANT_OVERRIDE"))])),
            Err(PolicyLoadError::ReservedReasonCode { .. })
        ));
    }

    #[test]
    fn custom_reason_codes_extend_the_registry() {
        let mut document = doc(vec![rule("closed", 10, Outcome::Escalated, Some("SITE_CLOSED"))]);
        document.reason_codes.push(ReasonCodeEntry {
            code: ReasonCode::new("SITE_CLOSED").unwrap(),
            description: "Site closed".into(),
            outcomes: [Outcome::Escalated].into_iter().collect(),
        });
        let def = build(document).unwrap();
        assert!(def.registry().contains(&ReasonCode::new("SITE_CLOSED").unwrap()));
        assert_eq!(def.to_document().reason_codes.len(), 1);
    }

    #[test]
    fn custom_codes_cannot_shadow_reserved() {
        let mut document = doc(vec![rule("a", 10, Outcome::Accepted, None)]);
        document.reason_codes.push(ReasonCodeEntry {
            code: ReasonCode::NO_RULE_MATCHED,
            description: String::new(),
            outcomes: [Outcome::Rejected].into_iter().collect(),
        });
        assert!(matches!(
            build(document),
            Err(PolicyLoadError::InvalidReasonCodeEntry { .. })
        ));
    }

    #[test]
    fn document_round_trip_preserves_hash() {
        let mut r = rule("inj", 10, Outcome::Rejected, Some("INJECTION_DETECTED"));
        r.predicate = Predicate::FlagPresent(FlagMatch {
            kind: FlagKind::InjectionSuspected,
            field: None,
        });
        let def = build(doc(vec![r, rule("ok", 20, Outcome::Accepted, None)])).unwrap();
        let json = serde_json::to_string(&def.to_document()).unwrap();
        let reparsed: PolicyDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(build(reparsed).unwrap().hash(), def.hash());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn rules() -> Vec<PolicyRule> {
            vec![
                rule("inj", 10, Outcome::Rejected, Some("INJECTION_DETECTED")),
                rule("time", 20, Outcome::Escalated, Some("TIME_AMBIGUOUS")),
                rule("missing", 30, Outcome::Escalated, Some("MISSING_REQUIRED_FIELD")),
                rule("ok", 100, Outcome::Accepted, None),
            ]
        }

        proptest! {
            #[test]
            fn hash_is_independent_of_rule_order(shuffled in Just(rules()).prop_shuffle()) {
                let ordered = build(doc(rules())).unwrap();
                let def = build(doc(shuffled)).unwrap();
                prop_assert_eq!(def.hash(), ordered.hash());
                prop_assert_eq!(def.rules(), ordered.rules());
            }
        }
    }
}
