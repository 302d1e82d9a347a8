//! # Replay Subcommand
//!
//! Without `--policy`, replays a run under the policy snapshot stored with
//! it (audit replay). With `--policy`, replays under that policy instead,
//! which is a what-if unless the file hashes to the run's original policy.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use gk_audit::{load_for_replay, ReplayEngine, ReplayError};
use gk_core::RunId;
use gk_pipeline::PipelineConfig;
use gk_policy::PolicyLoader;

/// Arguments for `gatekeeper replay`.
#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Run identifier.
    #[arg(value_name = "RUN_ID")]
    pub run_id: String,

    /// Replay under this policy file instead of the stored snapshot.
    #[arg(long, value_name = "FILE")]
    pub policy: Option<PathBuf>,
}

/// Execute `gatekeeper replay`.
///
/// Returns exit code: 0 on a verified or what-if replay, 1 when the stored
/// decision could not be reproduced.
pub fn run_replay(args: &ReplayArgs, config: &PipelineConfig) -> Result<u8> {
    let run_id = RunId::parse(&args.run_id)?;
    let store = crate::bundle_store(config);
    let loader = PolicyLoader::new();
    let (bundle, snapshot) = load_for_replay(&store, &run_id, &loader)
        .with_context(|| format!("failed to load run {run_id}"))?;

    let policy = match &args.policy {
        Some(path) => loader
            .load_path(path)
            .with_context(|| format!("failed to load policy {}", path.display()))?,
        None => snapshot,
    };

    match ReplayEngine::new().replay(&bundle, &policy) {
        Ok(outcome) => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(0)
        }
        Err(e @ ReplayError::NonDeterministic { .. }) => {
            println!("FAIL: {e}");
            Ok(1)
        }
    }
}
