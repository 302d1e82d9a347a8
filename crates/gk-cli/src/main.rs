//! # gatekeeper CLI entry point
//!
//! Parses command-line arguments, installs logging, loads configuration and
//! dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use gk_cli::policy::{run_policy, PolicyArgs};
use gk_cli::replay::{run_replay, ReplayArgs};
use gk_cli::run::{run_run, RunArgs};

/// Gatekeeper: gate unstructured incident submissions against a versioned
/// policy and keep a replayable record of every decision.
#[derive(Parser, Debug)]
#[command(name = "gatekeeper", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// Path to a YAML configuration file.
    #[arg(long, global = true, env = "GATEKEEPER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Gate one submission and persist its run bundle.
    Run(RunArgs),

    /// Replay a stored run under its own or another policy.
    Replay(ReplayArgs),

    /// Validate or hash policy files.
    Policy(PolicyArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    gk_cli::init_tracing(cli.verbose, cli.log_json);

    let result = match cli.command {
        Commands::Policy(args) => run_policy(&args),
        Commands::Run(args) => {
            gk_cli::load_config(cli.config.as_deref()).and_then(|config| run_run(&args, &config))
        }
        Commands::Replay(args) => {
            gk_cli::load_config(cli.config.as_deref()).and_then(|config| run_replay(&args, &config))
        }
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}
