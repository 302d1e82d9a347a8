//! # Policy Subcommand
//!
//! Checks policy files before they are deployed. Validation is the same
//! check activation performs, so a file that passes here will activate.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use gk_policy::{PolicyDefinition, PolicyLoader};

/// Arguments for `gatekeeper policy`.
#[derive(Args, Debug)]
pub struct PolicyArgs {
    #[command(subcommand)]
    pub command: PolicyCommand,
}

/// Policy subcommands.
#[derive(Subcommand, Debug)]
pub enum PolicyCommand {
    /// Validate one or more policy files.
    Validate {
        /// Policy files (`.yaml`, `.yml` or `.json`).
        #[arg(value_name = "FILE", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print the content hash of a policy file.
    Hash {
        /// Policy file.
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
}

/// Execute `gatekeeper policy`.
///
/// Returns exit code: 0 when every file is valid, 1 otherwise.
pub fn run_policy(args: &PolicyArgs) -> Result<u8> {
    let loader = PolicyLoader::new();
    match &args.command {
        PolicyCommand::Validate { paths } => {
            let mut failures = 0usize;
            for path in paths {
                match loader.load_path(path) {
                    Ok(definition) => println!("{}", describe(path, &definition)),
                    Err(e) => {
                        failures += 1;
                        println!("FAIL: {}: {e}", path.display());
                    }
                }
            }
            Ok(u8::from(failures > 0))
        }
        PolicyCommand::Hash { path } => {
            let definition = loader
                .load_path(path)
                .with_context(|| format!("invalid policy {}", path.display()))?;
            println!("{}", definition.hash());
            Ok(0)
        }
    }
}

/// One-line summary of a valid policy.
pub fn describe(path: &Path, definition: &PolicyDefinition) -> String {
    format!(
        "OK: {} version={} rules={} hash={}",
        path.display(),
        definition.version(),
        definition.rules().len(),
        definition.hash()
    )
}
