//! Audit error types.

use std::path::PathBuf;

use gk_core::{CanonicalizationError, ContentDigest, Decision, RunId};
use gk_policy::{PolicyLoadError, ReasonCodeViolation};
use thiserror::Error;

/// A run bundle could not be assembled.
#[derive(Debug, Error)]
pub enum BundleError {
    /// A required artifact was never supplied to the builder.
    #[error("run bundle is missing {0}")]
    MissingArtifact(&'static str),

    /// Stage timestamps are not in pipeline order.
    #[error("stage timing out of order: {earlier} ({earlier_at}) is after {later} ({later_at})")]
    TimingOutOfOrder {
        earlier: &'static str,
        earlier_at: String,
        later: &'static str,
        later_at: String,
    },

    /// The decision's reason codes are inconsistent with its outcome.
    #[error("decision fails reason code validation: {0}")]
    InvalidDecision(#[from] ReasonCodeViolation),

    /// The decision was produced by a different policy than the one supplied.
    #[error("decision policy {decision_version} ({decision_hash}) does not match supplied policy {policy_version} ({policy_hash})")]
    PolicyMismatch {
        decision_version: String,
        decision_hash: ContentDigest,
        policy_version: String,
        policy_hash: ContentDigest,
    },
}

/// A bundle could not be stored or read back.
///
/// A persistence failure means the decision was never finalized; the caller
/// retries the whole run under a fresh run id.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// A bundle for this run id already exists. Bundles are written once.
    #[error("run bundle {0} already exists")]
    AlreadyExists(RunId),

    /// No bundle is stored under this run id.
    #[error("run bundle {0} not found")]
    NotFound(RunId),

    /// Filesystem failure.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Encoding or decoding a stored artifact failed.
    #[error("serialization failed for {what}: {source}")]
    Serialization {
        what: String,
        source: serde_json::Error,
    },

    /// Computing the bundle digest failed.
    #[error("bundle digest failed: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// The stored policy snapshot does not hash to the bundle's `policy_hash`.
    #[error("policy snapshot for run {run_id} hashes to {computed}, bundle records {recorded}")]
    SnapshotMismatch {
        run_id: RunId,
        recorded: ContentDigest,
        computed: ContentDigest,
    },

    /// The stored policy snapshot no longer validates.
    #[error("policy snapshot for run {run_id} is invalid: {source}")]
    InvalidSnapshot {
        run_id: RunId,
        source: PolicyLoadError,
    },
}

/// Replay could not reproduce a stored decision.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// The same policy produced a different decision. This is a correctness
    /// bug in the engine or tampering with the bundle, never a policy change.
    #[error("non-deterministic replay of run {run_id}: stored {stored:?}, replayed {replayed:?}")]
    NonDeterministic {
        run_id: RunId,
        stored: Box<Decision>,
        replayed: Box<Decision>,
    },
}
