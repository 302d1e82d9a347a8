//! # Gatekeeper Driver
//!
//! Wires the stages together: intake, extraction, normalization, policy
//! evaluation, bundle assembly and persistence. One [`Gatekeeper`] serves any
//! number of concurrent runs; the only shared mutable state is the active
//! policy inside [`PolicyStore`].
//!
//! A run is final only once its bundle is persisted. Every error path leaves
//! nothing behind that a later run could mistake for a decision.

use std::sync::Arc;

use gk_audit::{BundleStore, PersistReceipt, ReplayEngine, ReplayError, ReplayOutcome, RunBundle};
use gk_core::{Clock, RunId, SystemClock};
use gk_normalize::NormalizationEngine;
use gk_policy::{PolicyDefinition, PolicyEngine, PolicyStore};

use crate::config::PipelineConfig;
use crate::error::{ConfigError, RunError};
use crate::extract::Extractor;
use crate::ingest::{ingest, Submission};
use crate::run::Run;

/// A completed, persisted run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The persisted bundle.
    pub bundle: RunBundle,
    /// Where and under which digest it was stored.
    pub receipt: PersistReceipt,
}

/// The pipeline driver.
pub struct Gatekeeper {
    policies: Arc<PolicyStore>,
    extractor: Arc<dyn Extractor>,
    store: Arc<dyn BundleStore>,
    clock: Arc<dyn Clock>,
    normalizer: NormalizationEngine,
    engine: PolicyEngine,
    replayer: ReplayEngine,
    max_input_bytes: usize,
    run_id_prefix: String,
}

impl std::fmt::Debug for Gatekeeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gatekeeper")
            .field("policy_version", &self.policies.current().version())
            .field("extractor", &self.extractor.name())
            .field("store", &self.store.store_name())
            .field("max_input_bytes", &self.max_input_bytes)
            .field("run_id_prefix", &self.run_id_prefix)
            .finish()
    }
}

impl Gatekeeper {
    /// A driver using the system clock.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] when `config` fails
    /// [`PipelineConfig::validate`]; a bad prefix or size limit is refused
    /// here rather than blamed on every submission.
    pub fn new(
        config: &PipelineConfig,
        policies: Arc<PolicyStore>,
        extractor: Arc<dyn Extractor>,
        store: Arc<dyn BundleStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            policies,
            extractor,
            store,
            clock: Arc::new(SystemClock),
            normalizer: NormalizationEngine::default(),
            engine: PolicyEngine::new(),
            replayer: ReplayEngine::new(),
            max_input_bytes: config.max_input_bytes,
            run_id_prefix: config.run_id_prefix.clone(),
        })
    }

    /// Replace the clock, e.g. with a `FixedClock` in tests.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The policy store this driver reads from.
    pub fn policies(&self) -> &Arc<PolicyStore> {
        &self.policies
    }

    /// Process one submission end to end.
    ///
    /// # Errors
    ///
    /// - [`RunError::Validation`]: the submission failed intake; no run id was
    ///   allocated.
    /// - [`RunError::Incomplete`]: extraction failed; retry with a fresh run.
    /// - [`RunError::Bundle`]: assembly failed; indicates an engine defect.
    /// - [`RunError::Persistence`]: the bundle was not stored; the decision is
    ///   not final and the run should be retried.
    pub fn run(&self, submission: Submission) -> Result<RunReport, RunError> {
        let clock = self.clock.as_ref();
        let intake = ingest(submission, self.max_input_bytes, clock.now())?;
        let run_id = RunId::generate(&self.run_id_prefix, clock.now())?;
        let run = Run::start(run_id, intake.raw_text, intake.metadata, clock);

        let extraction = match self.extractor.extract(run.raw_text()) {
            Ok(extraction) => extraction,
            Err(failure) => {
                let (run_id, failure) = run.incomplete(failure).into_failure();
                return Err(RunError::Incomplete { run_id, failure });
            }
        };

        let policy = self.policies.current();
        let run = run
            .extracted(extraction, clock)
            .normalize(&self.normalizer, clock)
            .decide(&self.engine, policy, clock);
        let stage = run.stage();

        let (bundle, policy) = run.seal()?;
        let receipt = self.store.persist(&bundle, &policy).map_err(|e| {
            tracing::warn!(run_id = %bundle.run_id, error = %e, "bundle persistence failed, decision not final");
            e
        })?;
        tracing::info!(
            run_id = %bundle.run_id,
            outcome = %stage,
            policy_version = %bundle.policy_version,
            bundle_digest = %receipt.bundle_digest,
            location = %receipt.location,
            "run finalized"
        );
        Ok(RunReport { bundle, receipt })
    }

    /// Replay a stored bundle under `policy`.
    pub fn replay_run(
        &self,
        bundle: &RunBundle,
        policy: &PolicyDefinition,
    ) -> Result<ReplayOutcome, ReplayError> {
        self.replayer.replay(bundle, policy)
    }
}
