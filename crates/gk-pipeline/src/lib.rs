//! # gk-pipeline: The Gatekeeper Run Driver
//!
//! Drives one submission through every stage and hands the finished bundle
//! to a [`BundleStore`](gk_audit::BundleStore):
//!
//! ```text
//! Submission ─ingest─▶ Extractor ─▶ NormalizationEngine ─▶ PolicyEngine ─▶ RunBundle ─▶ BundleStore
//! ```
//!
//! - [`ingest`]: intake validation and metadata defaults.
//! - [`extract`]: the [`Extractor`] seam and the deterministic
//!   [`HeuristicExtractor`].
//! - [`run`]: the typestate run lifecycle.
//! - [`driver`]: [`Gatekeeper`], which owns the engines and the policy store.
//! - [`config`]: [`PipelineConfig`] from YAML and environment.

pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod run;

pub use config::PipelineConfig;
pub use driver::{Gatekeeper, RunReport};
pub use error::{ConfigError, ExtractionFailure, RunError};
pub use extract::{find_injection, Extractor, HeuristicExtractor};
pub use ingest::{ingest, Intake, Submission};
pub use run::{Run, RunStage, RunState};
