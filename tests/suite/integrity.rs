//! Out-of-band edits to the ledger file are detected.

use std::path::Path;
use std::sync::Arc;

use af_config::EngineConfig;
use af_core::{Engine, StaticReferences};
use af_types::{ErrorClass, ErrorCode};
use rusqlite::Connection;

use crate::common::{Workspace, id, seed};

fn seeded_ledger() -> Workspace {
    let workspace = Workspace::new();
    seed(&workspace.open());
    workspace
}

fn tamper(path: &Path, sql: &str) {
    let db = Connection::open(path).unwrap();
    let changed = db.execute(sql, []).unwrap();
    assert_eq!(changed, 1, "{sql}");
}

fn open_error(path: &Path) -> af_core::Error {
    Engine::open(path, EngineConfig::default(), Arc::new(StaticReferences::default()))
        .err()
        .unwrap()
}

#[test]
fn stored_node_hashes_match_their_content() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    for node in engine.all_nodes() {
        assert_eq!(node.content_hash, node.compute_content_hash(), "{}", node.id);
        assert_eq!(node.content_hash.len(), 64);
    }
}

#[test]
fn edited_payload_is_a_hash_mismatch() {
    let workspace = seeded_ledger();
    tamper(
        &workspace.ledger_path(),
        "UPDATE ledger SET payload = replace(payload, 'n is prime', 'n is even') \
         WHERE event_type = 'node_created' AND payload LIKE '%n is prime%'",
    );

    let err = open_error(&workspace.ledger_path());
    assert_eq!(err.code(), ErrorCode::ContentHashMismatch);
    assert_eq!(err.class(), ErrorClass::Corruption);
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn deleted_entry_breaks_the_sequence() {
    let workspace = seeded_ledger();
    tamper(&workspace.ledger_path(), "DELETE FROM ledger WHERE seq = 2");

    let err = open_error(&workspace.ledger_path());
    assert_eq!(err.code(), ErrorCode::LedgerInconsistent);
    assert_eq!(err.exit_code(), 4);
}

#[test]
fn live_engine_notices_corruption_on_verify() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    engine.verify().unwrap();

    tamper(
        &workspace.ledger_path(),
        "UPDATE ledger SET actor = 'mallory' WHERE seq = 1",
    );
    assert_eq!(
        engine.verify().unwrap_err().code(),
        ErrorCode::ContentHashMismatch
    );
    assert_eq!(
        engine.replay().err().unwrap().code(),
        ErrorCode::ContentHashMismatch
    );
    // The published snapshot is left as it was.
    assert!(engine.get_node(&id("1.2")).is_some());
}
