//! # Run Lifecycle Typestate
//!
//! One submission's path through the pipeline. Each stage is a distinct type,
//! so a stage cannot be skipped or repeated.
//!
//! ```text
//! Ingested ──extracted()──▶ Extracted ──normalize()──▶ Normalized ──decide()──▶ Decided ──seal()──▶ RunBundle
//!     │
//!     └──incomplete()──▶ Incomplete
//! ```
//!
//! Each state owns exactly the artifacts produced so far, so a later stage
//! never has to ask whether an earlier one ran. `Decided` carries the final
//! outcome (`ACCEPTED`, `ESCALATED` or `REJECTED`); `Incomplete` is the
//! terminal state for an extraction failure. `seal()` consumes the run, so
//! the bundle is produced exactly once.
//!
//! ```compile_fail
//! use gk_pipeline::run::*;
//! use gk_core::{FixedClock, RunId, SubmissionMetadata, Timestamp};
//! use gk_normalize::NormalizationEngine;
//!
//! let at = Timestamp::parse("2025-12-18T01:30:45Z").unwrap();
//! let run = Run::start(
//!     RunId::parse("gk_20251218T013045Z_8f2c1a9b").unwrap(),
//!     "text".into(),
//!     SubmissionMetadata::received(at),
//!     &FixedClock(at),
//! );
//! // ERROR: no method named `normalize` found for `Run<Ingested>`
//! let _ = run.normalize(&NormalizationEngine::default(), &FixedClock(at));
//! ```

use std::sync::Arc;

use gk_audit::{AuditBundleBuilder, BundleError, RunBundle, StageTiming};
use gk_core::{Clock, Decision, ExtractionResult, Outcome, RunId, SubmissionMetadata, Timestamp};
use gk_normalize::{NormalizationEngine, Normalized as NormalizedOutput};
use gk_policy::{PolicyDefinition, PolicyEngine};

use crate::error::ExtractionFailure;

// ─── State Types ─────────────────────────────────────────────────────

/// Run state: submission accepted, run id allocated.
#[derive(Debug)]
pub struct Ingested;

/// Run state: extraction result received.
#[derive(Debug)]
pub struct Extracted {
    extraction: ExtractionResult,
    extracted_at: Timestamp,
}

/// Run state: normalized record and flags produced.
#[derive(Debug)]
pub struct Normalized {
    extracted: Extracted,
    normalized: NormalizedOutput,
    normalized_at: Timestamp,
}

/// Run state: decision made.
#[derive(Debug)]
pub struct Decided {
    normalized: Normalized,
    decision: Decision,
    policy: Arc<PolicyDefinition>,
    decided_at: Timestamp,
}

/// Run state: extraction failed (terminal, no decision).
#[derive(Debug)]
pub struct Incomplete {
    failure: ExtractionFailure,
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Ingested {}
    impl Sealed for super::Extracted {}
    impl Sealed for super::Normalized {}
    impl Sealed for super::Decided {}
    impl Sealed for super::Incomplete {}
}

/// Marker trait for run states. Sealed.
pub trait RunState: private::Sealed + std::fmt::Debug {
    /// Canonical state name.
    fn name() -> &'static str;

    /// Whether no further transition exists.
    fn is_terminal() -> bool {
        false
    }
}

impl RunState for Ingested {
    fn name() -> &'static str {
        "INGESTED"
    }
}
impl RunState for Extracted {
    fn name() -> &'static str {
        "EXTRACTED"
    }
}
impl RunState for Normalized {
    fn name() -> &'static str {
        "NORMALIZED"
    }
}
impl RunState for Decided {
    fn name() -> &'static str {
        "DECIDED"
    }
}
impl RunState for Incomplete {
    fn name() -> &'static str {
        "INCOMPLETE"
    }
    fn is_terminal() -> bool {
        true
    }
}

/// Where a run ended, for logs and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    /// Submission accepted, nothing extracted yet.
    Ingested,
    /// Extraction result received.
    Extracted,
    /// Record normalized, no decision yet.
    Normalized,
    /// Decided `ACCEPTED`.
    Accepted,
    /// Decided `ESCALATED`.
    Escalated,
    /// Decided `REJECTED`.
    Rejected,
    /// Extraction failed; no decision.
    Incomplete,
}

impl RunStage {
    /// Upper-case name used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingested => "INGESTED",
            Self::Extracted => "EXTRACTED",
            Self::Normalized => "NORMALIZED",
            Self::Accepted => "ACCEPTED",
            Self::Escalated => "ESCALATED",
            Self::Rejected => "REJECTED",
            Self::Incomplete => "INCOMPLETE",
        }
    }
}

impl From<Outcome> for RunStage {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Accepted => Self::Accepted,
            Outcome::Escalated => Self::Escalated,
            Outcome::Rejected => Self::Rejected,
        }
    }
}

impl std::fmt::Display for RunStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── The Run ─────────────────────────────────────────────────────────

/// One pipeline run, parameterized by its stage.
#[derive(Debug)]
pub struct Run<S: RunState> {
    run_id: RunId,
    raw_text: String,
    metadata: SubmissionMetadata,
    ingested_at: Timestamp,
    state: S,
}

impl<S: RunState> Run<S> {
    /// Run identifier.
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Raw submission text.
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Canonical name of the current state.
    pub fn state_name(&self) -> &'static str {
        S::name()
    }

    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        S::is_terminal()
    }

    fn advance<T: RunState>(self, next: impl FnOnce(S) -> T) -> Run<T> {
        tracing::info!(run_id = %self.run_id, from = S::name(), to = T::name(), "run stage transition");
        Run {
            run_id: self.run_id,
            raw_text: self.raw_text,
            metadata: self.metadata,
            ingested_at: self.ingested_at,
            state: next(self.state),
        }
    }
}

impl Run<Ingested> {
    /// Begin a run for an accepted submission.
    pub fn start(
        run_id: RunId,
        raw_text: String,
        metadata: SubmissionMetadata,
        clock: &dyn Clock,
    ) -> Self {
        let ingested_at = clock.now();
        tracing::info!(run_id = %run_id, bytes = raw_text.len(), "run ingested");
        Self {
            run_id,
            raw_text,
            metadata,
            ingested_at,
            state: Ingested,
        }
    }

    /// Record the extraction result (INGESTED → EXTRACTED).
    pub fn extracted(self, extraction: ExtractionResult, clock: &dyn Clock) -> Run<Extracted> {
        let extracted_at = clock.now();
        self.advance(|Ingested| Extracted {
            extraction,
            extracted_at,
        })
    }

    /// Record an extraction failure (INGESTED → INCOMPLETE).
    pub fn incomplete(self, failure: ExtractionFailure) -> Run<Incomplete> {
        tracing::warn!(run_id = %self.run_id, error = %failure, "run incomplete");
        self.advance(|Ingested| Incomplete { failure })
    }
}

impl Run<Extracted> {
    /// The extraction result.
    pub fn extraction(&self) -> &ExtractionResult {
        &self.state.extraction
    }

    /// Normalize the extraction result (EXTRACTED → NORMALIZED).
    pub fn normalize(self, engine: &NormalizationEngine, clock: &dyn Clock) -> Run<Normalized> {
        let normalized = engine.normalize(&self.raw_text, &self.state.extraction);
        tracing::debug!(
            run_id = %self.run_id,
            flags = normalized.flags.len(),
            complete = normalized.record.is_complete(),
            "record normalized"
        );
        let normalized_at = clock.now();
        self.advance(|extracted| Normalized {
            extracted,
            normalized,
            normalized_at,
        })
    }
}

impl Run<Normalized> {
    /// The normalized record and flags.
    pub fn normalized(&self) -> &NormalizedOutput {
        &self.state.normalized
    }

    /// Evaluate `policy` (NORMALIZED → DECIDED).
    ///
    /// The run keeps the `Arc` it was handed, so a concurrent policy swap
    /// cannot change which policy this run is recorded under.
    pub fn decide(
        self,
        engine: &PolicyEngine,
        policy: Arc<PolicyDefinition>,
        clock: &dyn Clock,
    ) -> Run<Decided> {
        let NormalizedOutput { record, flags } = &self.state.normalized;
        let decision = engine.evaluate(record, flags, &policy);
        tracing::info!(
            run_id = %self.run_id,
            outcome = %decision.outcome,
            policy_version = %decision.policy_version,
            policy_hash = %decision.policy_hash,
            "decision made"
        );
        let decided_at = clock.now();
        self.advance(|normalized| Decided {
            normalized,
            decision,
            policy,
            decided_at,
        })
    }
}

impl Run<Decided> {
    /// The decision.
    pub fn decision(&self) -> &Decision {
        &self.state.decision
    }

    /// Terminal stage reached.
    pub fn stage(&self) -> RunStage {
        RunStage::from(self.state.decision.outcome)
    }

    /// Assemble the immutable bundle, returning it with the deciding policy.
    pub fn seal(self) -> Result<(RunBundle, Arc<PolicyDefinition>), BundleError> {
        let Decided {
            normalized:
                Normalized {
                    extracted:
                        Extracted {
                            extraction,
                            extracted_at,
                        },
                    normalized: NormalizedOutput { record, flags },
                    normalized_at,
                },
            decision,
            policy,
            decided_at,
        } = self.state;

        let bundle = AuditBundleBuilder::new()
            .run_id(self.run_id)
            .raw_input(self.raw_text, self.metadata)
            .extraction_candidates(extraction.candidates)
            .normalized(record, flags)
            .decision(decision)
            .timing(StageTiming {
                ingested_at: self.ingested_at,
                extracted_at,
                normalized_at,
                decided_at,
            })
            .build(&policy)?;
        Ok((bundle, policy))
    }
}

impl Run<Incomplete> {
    /// Why extraction failed.
    pub fn failure(&self) -> &ExtractionFailure {
        &self.state.failure
    }

    /// Always [`RunStage::Incomplete`].
    pub fn stage(&self) -> RunStage {
        RunStage::Incomplete
    }

    /// Give up the run, returning its id and the failure.
    pub fn into_failure(self) -> (RunId, ExtractionFailure) {
        (self.run_id, self.state.failure)
    }
}
