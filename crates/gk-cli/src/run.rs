//! # Run Subcommand
//!
//! Gates one submission and persists its bundle. The submission is read from
//! a file or stdin, either as plain text or, with `--envelope`, as a JSON
//! submission envelope carrying metadata.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use gk_pipeline::{Gatekeeper, HeuristicExtractor, PipelineConfig, RunError, Submission};
use gk_policy::PolicyStore;
use serde_json::json;

/// Arguments for `gatekeeper run`.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Submission file. Reads stdin when omitted or `-`.
    #[arg(value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Treat the input as a JSON envelope (`raw_text` plus metadata).
    #[arg(long)]
    pub envelope: bool,

    /// Intake channel, e.g. `email`.
    #[arg(long)]
    pub source: Option<String>,

    /// Submitter identity.
    #[arg(long)]
    pub submitted_by: Option<String>,

    /// Owning business unit.
    #[arg(long)]
    pub business_unit: Option<String>,
}

fn read_input(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read submission {}", path.display())),
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read submission from stdin")?;
            Ok(text)
        }
    }
}

/// Build the submission from input text and flags. Flags override envelope
/// metadata.
pub fn build_submission(args: &RunArgs, text: String) -> Result<Submission> {
    let mut submission = if args.envelope {
        serde_json::from_str::<Submission>(&text).context("invalid submission envelope")?
    } else {
        Submission::from_text(text)
    };
    if let Some(source) = &args.source {
        submission.source = Some(source.clone());
    }
    if let Some(who) = &args.submitted_by {
        submission.submitted_by = Some(who.clone());
    }
    if let Some(unit) = &args.business_unit {
        submission.business_unit = Some(unit.clone());
    }
    Ok(submission)
}

/// Execute `gatekeeper run`.
///
/// Returns exit code: 0 when a decision was persisted, 1 when intake refused
/// the submission, 3 when the run ended incomplete.
pub fn run_run(args: &RunArgs, config: &PipelineConfig) -> Result<u8> {
    let text = read_input(args.input.as_ref())?;
    let submission = build_submission(args, text)?;

    let policy = crate::load_active_policy(config)?;
    let policies = Arc::new(PolicyStore::new(policy));
    let store = Arc::new(crate::bundle_store(config));
    let extractor = Arc::new(HeuristicExtractor::new(config.low_confidence_threshold));
    let gatekeeper = Gatekeeper::new(config, policies, extractor, store)
        .context("invalid pipeline configuration")?;

    match gatekeeper.run(submission) {
        Ok(report) => {
            let bundle = &report.bundle;
            let summary = json!({
                "run_id": bundle.run_id,
                "outcome": bundle.decision.outcome,
                "reason_codes": bundle.decision.reason_codes,
                "rules_fired": bundle.decision.rules_fired,
                "policy_version": bundle.policy_version,
                "policy_hash": bundle.policy_hash,
                "bundle": report.receipt.location,
                "bundle_digest": report.receipt.bundle_digest,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(0)
        }
        Err(RunError::Validation(e)) => {
            println!("REFUSED: {e}");
            Ok(1)
        }
        Err(e @ RunError::Incomplete { .. }) => {
            println!("INCOMPLETE: {e}");
            Ok(3)
        }
        Err(e) => Err(e).context("run failed; the decision is not final, retry the submission"),
    }
}
