//! # Outbox Artifacts
//!
//! Downstream consumers never read run bundles. Each decided run also produces
//! one outbox artifact under the route for its outcome (`accepted/`,
//! `escalated/`, `rejected/`), carrying the normalized record and enough of
//! the decision to act on it.

use std::path::PathBuf;

use gk_core::{ContentDigest, NormalizedRecord, Outcome, ReasonCode, RuleId, RunId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::bundle::RunBundle;

/// The downstream view of one decided run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutboxArtifact {
    /// Run identifier; joins back to the bundle.
    pub run_id: RunId,
    /// Final outcome.
    pub outcome: Outcome,
    /// Reason codes, in decision order.
    pub reason_codes: Vec<ReasonCode>,
    /// Matched rules, decisive first.
    pub rules_fired: Vec<RuleId>,
    /// The normalized record.
    pub normalized_record: NormalizedRecord,
    /// Deciding policy version.
    pub policy_version: String,
    /// Deciding policy hash.
    pub policy_hash: ContentDigest,
    /// When the decision was made.
    pub decided_at: Timestamp,
}

impl OutboxArtifact {
    /// Project a bundle onto its outbox artifact.
    pub fn from_bundle(bundle: &RunBundle) -> Self {
        Self {
            run_id: bundle.run_id.clone(),
            outcome: bundle.decision.outcome,
            reason_codes: bundle.decision.reason_codes.clone(),
            rules_fired: bundle.decision.rules_fired.clone(),
            normalized_record: bundle.normalized_record.clone(),
            policy_version: bundle.policy_version.clone(),
            policy_hash: bundle.policy_hash,
            decided_at: bundle.timing.decided_at,
        }
    }

    /// Route directory name for this artifact's outcome.
    pub fn route(&self) -> &'static str {
        self.outcome.route()
    }

    /// Path relative to the outbox root: `<route>/<run_id>.json`.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(self.route()).join(format!("{}.json", self.run_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{DecisionRecord, StageTiming};
    use gk_core::{QualityFlags, SubmissionMetadata};

    fn bundle(outcome: Outcome) -> RunBundle {
        let at = Timestamp::parse("2025-12-18T01:30:45Z").unwrap();
        RunBundle {
            run_id: RunId::parse("gk_20251218T013045Z_8f2c1a9b").unwrap(),
            raw_text: "text".into(),
            metadata: SubmissionMetadata::received(at),
            extraction_candidates: Vec::new(),
            normalized_record: NormalizedRecord::default(),
            quality_flags: QualityFlags::new(),
            decision: DecisionRecord {
                outcome,
                reason_codes: vec![ReasonCode::NO_RULE_MATCHED],
                rules_fired: Vec::new(),
            },
            policy_version: "v1".into(),
            policy_hash: "sha256:0000000000000000000000000000000000000000000000000000000000000000"
                .parse()
                .unwrap(),
            timing: StageTiming {
                ingested_at: at,
                extracted_at: at,
                normalized_at: at,
                decided_at: at,
            },
        }
    }

    #[test]
    fn routes_by_outcome() {
        for (outcome, route) in [
            (Outcome::Accepted, "accepted"),
            (Outcome::Escalated, "escalated"),
            (Outcome::Rejected, "rejected"),
        ] {
            let artifact = OutboxArtifact::from_bundle(&bundle(outcome));
            assert_eq!(artifact.route(), route);
            assert_eq!(
                artifact.relative_path(),
                PathBuf::from(route).join("gk_20251218T013045Z_8f2c1a9b.json")
            );
        }
    }

    #[test]
    fn carries_decision_and_record() {
        let b = bundle(Outcome::Escalated);
        let artifact = OutboxArtifact::from_bundle(&b);
        assert_eq!(artifact.reason_codes, b.decision.reason_codes);
        assert_eq!(artifact.policy_hash, b.policy_hash);
        assert_eq!(artifact.decided_at, b.timing.decided_at);
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["outcome"], "ESCALATED");
        assert!(json.get("raw_text").is_none());
    }
}
