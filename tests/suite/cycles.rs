//! Dependency edges that would close a cycle are refused.

use std::collections::BTreeSet;

use af_types::{ErrorCode, Role};

use crate::common::{Workspace, claim, id, seed};

#[test]
fn closing_a_cycle_is_rejected_and_changes_nothing() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    engine.claim(&id("1.1"), "alice", Role::Prover, None).unwrap();
    engine.claim(&id("1.2"), "alice", Role::Prover, None).unwrap();
    engine
        .add_dependencies(&id("1.1"), "alice", BTreeSet::from([id("1.2")]), BTreeSet::new())
        .unwrap();

    let before = engine.snapshot();
    let err = engine
        .add_dependencies(&id("1.2"), "alice", BTreeSet::from([id("1.1")]), BTreeSet::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DependencyCycle);
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().contains("1.2 -> 1.1 -> 1.2"), "{err}");

    let after = engine.snapshot();
    assert_eq!(after.state, before.state);
    assert_eq!(after.history.len(), before.history.len());
    assert!(engine.get_node(&id("1.2")).unwrap().dependencies.is_empty());
}

#[test]
fn self_dependency_is_a_cycle() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    engine.claim(&id("1.1"), "alice", Role::Prover, None).unwrap();
    let err = engine
        .add_dependencies(&id("1.1"), "alice", BTreeSet::from([id("1.1")]), BTreeSet::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DependencyCycle);
}

#[test]
fn longer_cycles_through_validation_dependencies() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    engine.claim(&id("1"), "alice", Role::Prover, None).unwrap();
    engine
        .refine(&id("1"), "alice", &[claim("n has a least divisor d > 1").validated_after(id("1.2"))])
        .unwrap();
    engine.release(&id("1"), "alice").unwrap();
    engine.claim(&id("1.2"), "alice", Role::Prover, None).unwrap();
    engine
        .add_dependencies(&id("1.2"), "alice", BTreeSet::from([id("1.1")]), BTreeSet::new())
        .unwrap();
    engine.claim(&id("1.1"), "alice", Role::Prover, None).unwrap();

    let before = engine.snapshot();
    let err = engine
        .add_dependencies(&id("1.1"), "alice", BTreeSet::from([id("1.3")]), BTreeSet::new())
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DependencyCycle);
    assert_eq!(engine.snapshot().state, before.state);
}
