//! # Replay
//!
//! Re-runs the policy engine over a stored bundle's normalized record and
//! flags. Nothing upstream of the decision is recomputed: normalization and
//! extraction are taken from the bundle as recorded.
//!
//! - **Audit replay**: the supplied policy has the bundle's `policy_hash`.
//!   The result must equal the stored decision field for field; any
//!   difference is a [`ReplayError::NonDeterministic`].
//! - **What-if replay**: any other policy. The new decision is returned next
//!   to the untouched original, labelled with the other policy's identity.

use gk_core::Decision;
use gk_policy::{PolicyDefinition, PolicyEngine};
use serde::Serialize;

use crate::bundle::RunBundle;
use crate::error::ReplayError;

/// Result of a replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ReplayOutcome {
    /// Same policy, same decision.
    Verified {
        /// The reproduced decision.
        decision: Decision,
    },
    /// A different policy was applied.
    WhatIf {
        /// The decision stored in the bundle.
        original: Decision,
        /// The decision under the supplied policy.
        replayed: Decision,
        /// Whether outcome, reason codes or fired rules differ.
        changed: bool,
    },
}

impl ReplayOutcome {
    /// The decision produced by this replay.
    pub fn decision(&self) -> &Decision {
        match self {
            Self::Verified { decision } => decision,
            Self::WhatIf { replayed, .. } => replayed,
        }
    }

    /// Whether this was an audit replay under the original policy.
    pub fn is_verified(&self) -> bool {
        matches!(self, Self::Verified { .. })
    }
}

/// Deterministic re-evaluation of stored runs. Read-only and reentrant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayEngine {
    engine: PolicyEngine,
}

impl ReplayEngine {
    /// Create a replay engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay `bundle` under `policy`.
    pub fn replay(
        &self,
        bundle: &RunBundle,
        policy: &PolicyDefinition,
    ) -> Result<ReplayOutcome, ReplayError> {
        let replayed =
            self.engine
                .evaluate(&bundle.normalized_record, &bundle.quality_flags, policy);
        let original = bundle.decision();

        if policy.hash() == bundle.policy_hash {
            if replayed != original {
                tracing::warn!(
                    run_id = %bundle.run_id,
                    policy_hash = %policy.hash(),
                    stored_outcome = %original.outcome,
                    replayed_outcome = %replayed.outcome,
                    "replay diverged under the original policy"
                );
                return Err(ReplayError::NonDeterministic {
                    run_id: bundle.run_id.clone(),
                    stored: Box::new(original),
                    replayed: Box::new(replayed),
                });
            }
            tracing::info!(run_id = %bundle.run_id, outcome = %replayed.outcome, "replay verified");
            return Ok(ReplayOutcome::Verified { decision: replayed });
        }

        let changed = replayed.outcome != original.outcome
            || replayed.reason_codes != original.reason_codes
            || replayed.rules_fired != original.rules_fired;
        tracing::info!(
            run_id = %bundle.run_id,
            original_version = %original.policy_version,
            policy_version = policy.version(),
            changed,
            "what-if replay"
        );
        Ok(ReplayOutcome::WhatIf {
            original,
            replayed,
            changed,
        })
    }
}
