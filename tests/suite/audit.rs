//! The `af` binary's exit codes.

use std::path::Path;
use std::process::{Command, Output};

use rusqlite::Connection;

use crate::common::{Workspace, seed};

fn run_af(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_af"))
        .args(args)
        .env("HOME", home)
        .env_remove("AF_CONFIG")
        .env_remove("RUST_LOG")
        .current_dir(home)
        .output()
        .unwrap()
}

#[test]
fn healthy_ledger_reports_its_summary() {
    let workspace = Workspace::new();
    seed(&workspace.open());
    let ledger = workspace.ledger_path();

    let output = run_af(workspace.dir.path(), &["--json", ledger.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(0), "{output:?}");
    let audit: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(audit["nodes"], 3);
    assert_eq!(audit["root_state"], "pending");
    assert_eq!(audit["open_challenges"], 0);
    assert_eq!(audit["head_hash"].as_str().unwrap().len(), 64);
}

#[test]
fn corrupted_ledger_exits_with_four() {
    let workspace = Workspace::new();
    seed(&workspace.open());
    let ledger = workspace.ledger_path();
    Connection::open(&ledger)
        .unwrap()
        .execute("UPDATE ledger SET actor = 'mallory' WHERE seq = 3", [])
        .unwrap();

    let output = run_af(workspace.dir.path(), &[ledger.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(4), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("content hash mismatch at seq 3"), "{stderr}");
}

#[test]
fn usage_and_missing_ledgers_exit_with_three() {
    let workspace = Workspace::new();
    let home = workspace.dir.path();
    assert_eq!(run_af(home, &[]).status.code(), Some(3));

    let missing = home.join("missing.db");
    let output = run_af(home, &[missing.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(3));
    assert!(!missing.exists());
}
