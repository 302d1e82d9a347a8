//! End-to-end through the subcommand handlers against a temporary directory.

use std::path::Path;

use gk_cli::replay::{run_replay, ReplayArgs};
use gk_cli::run::{run_run, RunArgs};
use gk_pipeline::PipelineConfig;

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig {
        runs_dir: root.join("runs"),
        outbox_dir: root.join("outbox"),
        ..PipelineConfig::default()
    }
}

fn run_args(input: &Path) -> RunArgs {
    RunArgs {
        input: Some(input.to_path_buf()),
        envelope: false,
        source: Some("cli".into()),
        submitted_by: None,
        business_unit: None,
    }
}

fn stored_run_ids(runs_dir: &Path) -> Vec<String> {
    let mut ids: Vec<String> = std::fs::read_dir(runs_dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect();
    ids.sort();
    ids
}

#[test]
fn run_then_replay_verifies() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let input = tmp.path().join("incident.txt");
    std::fs::write(
        &input,
        "Summary: Forklift clipped a rack\nCategory: Property Damage\nLocation: Warehouse B\nEvent time: 2025-12-17T14:30:00Z\n",
    )
    .unwrap();

    assert_eq!(run_run(&run_args(&input), &cfg).unwrap(), 0);
    let ids = stored_run_ids(&cfg.runs_dir);
    assert_eq!(ids.len(), 1);

    let accepted: Vec<_> = std::fs::read_dir(cfg.outbox_dir.join("accepted"))
        .unwrap()
        .collect();
    assert_eq!(accepted.len(), 1);

    let replay = ReplayArgs {
        run_id: ids[0].clone(),
        policy: None,
    };
    assert_eq!(run_replay(&replay, &cfg).unwrap(), 0);
}

#[test]
fn what_if_replay_under_other_policy() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let input = tmp.path().join("incident.txt");
    std::fs::write(&input, "Summary: Spill near tank 3\nCategory: Environmental Incident\n").unwrap();
    assert_eq!(run_run(&run_args(&input), &cfg).unwrap(), 0);
    let ids = stored_run_ids(&cfg.runs_dir);

    let strict = tmp.path().join("strict.yaml");
    std::fs::write(
        &strict,
        "version: v2-strict\nrules:\n  - id: reject-missing\n    priority: 1\n    when:\n      flag_present: { kind: missing_field }\n    outcome: REJECTED\n    reason_code: MISSING_REQUIRED_FIELD\n",
    )
    .unwrap();
    let replay = ReplayArgs {
        run_id: ids[0].clone(),
        policy: Some(strict),
    };
    assert_eq!(run_replay(&replay, &cfg).unwrap(), 0);
}

#[test]
fn empty_input_is_refused_without_bundle() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let input = tmp.path().join("empty.txt");
    std::fs::write(&input, "   \n").unwrap();
    assert_eq!(run_run(&run_args(&input), &cfg).unwrap(), 1);
    assert!(!cfg.runs_dir.exists());
}

#[test]
fn replay_of_unknown_run_is_error() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let replay = ReplayArgs {
        run_id: "gk_20251218T013045Z_deadbeef".into(),
        policy: None,
    };
    assert!(run_replay(&replay, &cfg).is_err());
}
