//! # Run Bundles
//!
//! A [`RunBundle`] is the complete, self-contained record of one pipeline run:
//! what came in, what the extractor proposed, what normalization made of it,
//! what the policy decided, under which policy, and when each stage finished.
//!
//! ## Invariants
//!
//! - Bundles are assembled only by [`AuditBundleBuilder::build`], which
//!   refuses incomplete input, out-of-order timing and decisions whose reason
//!   codes do not fit their outcome.
//! - A bundle is written once. Corrections produce a new run.
//! - Replay needs nothing outside the bundle except a policy whose hash equals
//!   `policy_hash`.

use gk_core::{
    sha256_digest, CanonicalBytes, CanonicalizationError, ContentDigest, Decision,
    ExtractionCandidate, NormalizedRecord, Outcome, QualityFlags, ReasonCode, RuleId, RunId,
    SubmissionMetadata, Timestamp,
};
use gk_policy::PolicyDefinition;
use serde::{Deserialize, Serialize};

use crate::error::BundleError;

/// The decision as stored in a bundle; policy identity is kept at top level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecisionRecord {
    /// Final outcome.
    pub outcome: Outcome,
    /// Ordered reason codes.
    pub reason_codes: Vec<ReasonCode>,
    /// Matched rules, decisive first.
    pub rules_fired: Vec<RuleId>,
}

/// When each stage completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageTiming {
    /// Submission accepted for processing.
    pub ingested_at: Timestamp,
    /// Extraction result received.
    pub extracted_at: Timestamp,
    /// Normalized record produced.
    pub normalized_at: Timestamp,
    /// Decision produced.
    pub decided_at: Timestamp,
}

impl StageTiming {
    fn check_order(&self) -> Result<(), BundleError> {
        let stages = [
            ("ingested_at", self.ingested_at),
            ("extracted_at", self.extracted_at),
            ("normalized_at", self.normalized_at),
            ("decided_at", self.decided_at),
        ];
        for pair in stages.windows(2) {
            let (earlier, earlier_at) = pair[0];
            let (later, later_at) = pair[1];
            if earlier_at > later_at {
                return Err(BundleError::TimingOutOfOrder {
                    earlier,
                    earlier_at: earlier_at.to_string(),
                    later,
                    later_at: later_at.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// The immutable record of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunBundle {
    /// Run identifier.
    pub run_id: RunId,
    /// Raw submission text, verbatim.
    pub raw_text: String,
    /// Intake metadata.
    pub metadata: SubmissionMetadata,
    /// Every candidate the extractor proposed, including unknown fields.
    pub extraction_candidates: Vec<ExtractionCandidate>,
    /// The normalized record.
    pub normalized_record: NormalizedRecord,
    /// Every quality flag.
    pub quality_flags: QualityFlags,
    /// The decision.
    pub decision: DecisionRecord,
    /// Version of the deciding policy.
    pub policy_version: String,
    /// Content hash of the deciding policy.
    pub policy_hash: ContentDigest,
    /// Stage completion times.
    pub timing: StageTiming,
}

impl RunBundle {
    /// The stored decision with its policy identity.
    pub fn decision(&self) -> Decision {
        Decision {
            outcome: self.decision.outcome,
            reason_codes: self.decision.reason_codes.clone(),
            rules_fired: self.decision.rules_fired.clone(),
            policy_version: self.policy_version.clone(),
            policy_hash: self.policy_hash,
        }
    }

    /// Content digest over the canonical form of the whole bundle.
    pub fn digest(&self) -> Result<ContentDigest, CanonicalizationError> {
        Ok(sha256_digest(&CanonicalBytes::new(self)?))
    }
}

/// Assembles a [`RunBundle`] from stage outputs.
#[derive(Debug, Default)]
pub struct AuditBundleBuilder {
    run_id: Option<RunId>,
    raw: Option<(String, SubmissionMetadata)>,
    candidates: Option<Vec<ExtractionCandidate>>,
    normalized: Option<(NormalizedRecord, QualityFlags)>,
    decision: Option<Decision>,
    timing: Option<StageTiming>,
}

impl AuditBundleBuilder {
    /// An empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run id.
    pub fn run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Set the raw input snapshot.
    pub fn raw_input(mut self, raw_text: impl Into<String>, metadata: SubmissionMetadata) -> Self {
        self.raw = Some((raw_text.into(), metadata));
        self
    }

    /// Set the extraction candidates.
    pub fn extraction_candidates(mut self, candidates: Vec<ExtractionCandidate>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Set the normalized record and its flags.
    pub fn normalized(mut self, record: NormalizedRecord, flags: QualityFlags) -> Self {
        self.normalized = Some((record, flags));
        self
    }

    /// Set the decision.
    pub fn decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Set the stage timing.
    pub fn timing(mut self, timing: StageTiming) -> Self {
        self.timing = Some(timing);
        self
    }

    /// Validate and assemble.
    ///
    /// `policy` must be the policy that produced the decision; its registry
    /// validates the decision's reason codes.
    pub fn build(self, policy: &PolicyDefinition) -> Result<RunBundle, BundleError> {
        let run_id = self.run_id.ok_or(BundleError::MissingArtifact("run_id"))?;
        let (raw_text, metadata) = self.raw.ok_or(BundleError::MissingArtifact("raw input snapshot"))?;
        let extraction_candidates = self
            .candidates
            .ok_or(BundleError::MissingArtifact("extraction candidates"))?;
        let (normalized_record, quality_flags) = self
            .normalized
            .ok_or(BundleError::MissingArtifact("normalized record"))?;
        let decision = self.decision.ok_or(BundleError::MissingArtifact("decision"))?;
        let timing = self.timing.ok_or(BundleError::MissingArtifact("stage timing"))?;

        timing.check_order()?;
        if decision.policy_hash != policy.hash() || decision.policy_version != policy.version() {
            return Err(BundleError::PolicyMismatch {
                decision_version: decision.policy_version,
                decision_hash: decision.policy_hash,
                policy_version: policy.version().to_string(),
                policy_hash: policy.hash(),
            });
        }
        policy.registry().check_decision(&decision)?;

        let Decision {
            outcome,
            reason_codes,
            rules_fired,
            policy_version,
            policy_hash,
        } = decision;

        Ok(RunBundle {
            run_id,
            raw_text,
            metadata,
            extraction_candidates,
            normalized_record,
            quality_flags,
            decision: DecisionRecord {
                outcome,
                reason_codes,
                rules_fired,
            },
            policy_version,
            policy_hash,
            timing,
        })
    }
}
