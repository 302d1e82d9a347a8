//! # gk-cli: The `gatekeeper` Command
//!
//! ## Subcommands
//!
//! - `gatekeeper run [FILE]`: gate one submission and persist its bundle.
//! - `gatekeeper replay RUN_ID [--policy FILE]`: audit or what-if replay.
//! - `gatekeeper policy validate FILE...`: structural policy validation.
//! - `gatekeeper policy hash FILE`: print a policy's content hash.
//!
//! ```bash
//! gatekeeper run incident.txt --source email
//! gatekeeper replay gk_20251218T013045Z_8f2c1a9b
//! gatekeeper replay gk_20251218T013045Z_8f2c1a9b --policy policies/v2.yaml
//! gatekeeper policy validate policies/*.yaml
//! ```

pub mod fs_store;
pub mod policy;
pub mod replay;
pub mod run;

use std::path::Path;

use anyhow::{Context, Result};
use gk_pipeline::PipelineConfig;
use gk_policy::{standard_policy, PolicyDefinition, PolicyLoader};
use tracing_subscriber::EnvFilter;

pub use fs_store::FsBundleStore;

/// Install the global subscriber on stderr.
///
/// `-v` counts select the level; with no `-v`, `RUST_LOG` is honoured and
/// the default is `warn`.
pub fn init_tracing(verbose: u8, json: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Configuration from `path` (if any) plus environment overrides.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    PipelineConfig::load(path).context("failed to load gatekeeper configuration")
}

/// The configured policy, or the built-in standard policy.
pub fn load_active_policy(config: &PipelineConfig) -> Result<PolicyDefinition> {
    match &config.policy_path {
        Some(path) => PolicyLoader::new()
            .load_path(path)
            .with_context(|| format!("failed to load policy {}", path.display())),
        None => standard_policy().context("built-in standard policy failed to load"),
    }
}

/// The filesystem store at the configured locations.
pub fn bundle_store(config: &PipelineConfig) -> FsBundleStore {
    FsBundleStore::new(&config.runs_dir, &config.outbox_dir)
}
