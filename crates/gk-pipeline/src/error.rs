//! Pipeline error types.

use std::path::PathBuf;

use gk_audit::{BundleError, PersistenceError};
use gk_core::{RunId, ValidationError};
use thiserror::Error;

/// The extraction stage could not produce a result.
///
/// A run that hits this is `Incomplete`, not rejected: no decision is made
/// and the submission can be retried under a fresh run id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionFailure {
    /// The extractor reported an error.
    #[error("extractor {extractor} failed: {detail}")]
    Failed { extractor: String, detail: String },

    /// The extractor did not answer in time.
    #[error("extractor {extractor} timed out after {elapsed_ms} ms")]
    TimedOut { extractor: String, elapsed_ms: u64 },
}

/// A pipeline run did not produce a persisted bundle.
#[derive(Debug, Error)]
pub enum RunError {
    /// The submission is malformed; no run was started.
    #[error("submission rejected at intake: {0}")]
    Validation(#[from] ValidationError),

    /// Extraction failed; the run ended `Incomplete`.
    #[error("run {run_id} incomplete: {failure}")]
    Incomplete {
        run_id: RunId,
        failure: ExtractionFailure,
    },

    /// Bundle assembly failed.
    #[error("run bundle assembly failed: {0}")]
    Bundle(#[from] BundleError),

    /// The bundle could not be persisted; the decision is not final.
    #[error("run bundle persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

impl RunError {
    /// Whether retrying the same submission under a fresh run id can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Incomplete { .. } | Self::Persistence(_))
    }
}

/// Pipeline configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`crate::PipelineConfig`].
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    /// An environment override could not be applied.
    #[error("invalid value for {var}: {value:?} ({reason})")]
    InvalidOverride {
        var: &'static str,
        value: String,
        reason: String,
    },

    /// A setting has a value the pipeline cannot run with.
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
