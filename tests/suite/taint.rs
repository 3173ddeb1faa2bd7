//! Taint follows refutation, archival and replacement of a dependency.

use std::collections::BTreeSet;

use af_types::{EpistemicState, Event, NodeId, Role, TaintState};

use crate::common::{Workspace, claim, id, seed};

fn taint(engine: &af_core::Engine, raw: &str) -> TaintState {
    engine.get_node(&id(raw)).unwrap().taint_state
}

#[test]
fn refuted_dependency_taints_until_replaced() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    let root = NodeId::root();

    engine.claim(&root, "alice", Role::Prover, None).unwrap();
    engine
        .add_dependencies(&root, "alice", BTreeSet::from([id("1.1")]), BTreeSet::new())
        .unwrap();
    assert_eq!(taint(&engine, "1"), TaintState::Clean);

    engine.refute(&id("1.1"), "vera").unwrap();
    assert_eq!(taint(&engine, "1"), TaintState::Tainted);

    engine.archive(&id("1.1"), "vera").unwrap();
    assert_eq!(taint(&engine, "1"), TaintState::Clean);

    let replacement = engine
        .refine(&root, "alice", &[claim("the least divisor d > 1 of n is prime")])
        .unwrap();
    assert_eq!(replacement, [id("1.3")]);
    engine.accept(&id("1.3"), "vera").unwrap();
    engine
        .add_dependencies(&root, "alice", BTreeSet::from([id("1.3")]), BTreeSet::new())
        .unwrap();
    assert_eq!(taint(&engine, "1"), TaintState::Clean);

    engine.accept(&id("1.2"), "vera").unwrap();
    engine.accept(&root, "alice").unwrap();
    let root_node = engine.get_node(&root).unwrap();
    assert_eq!(root_node.epistemic_state, EpistemicState::Validated);
    assert_eq!(root_node.taint_state, TaintState::Clean);

    let recomputed: Vec<TaintState> = engine
        .node_history(&root)
        .into_iter()
        .filter_map(|entry| match entry.event {
            Event::TaintRecomputed { taint, .. } => Some(taint),
            _ => None,
        })
        .collect();
    assert_eq!(
        recomputed,
        [TaintState::Clean, TaintState::Tainted, TaintState::Clean]
    );
}

#[test]
fn admission_propagates_through_chains() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    engine.claim(&id("1.1"), "alice", Role::Prover, None).unwrap();
    engine.claim(&id("1.2"), "alice", Role::Prover, None).unwrap();
    engine
        .add_dependencies(&id("1.2"), "alice", BTreeSet::from([id("1.1")]), BTreeSet::new())
        .unwrap();
    engine.claim(&NodeId::root(), "alice", Role::Prover, None).unwrap();
    engine
        .add_dependencies(&NodeId::root(), "alice", BTreeSet::from([id("1.2")]), BTreeSet::new())
        .unwrap();

    engine.admit(&id("1.1"), "alice").unwrap();
    assert_eq!(taint(&engine, "1.1"), TaintState::SelfAdmitted);
    assert_eq!(taint(&engine, "1.2"), TaintState::Tainted);
    assert_eq!(taint(&engine, "1"), TaintState::Tainted);

    // An explicit recompute on settled state records nothing new.
    let entries = engine.history().len();
    assert_eq!(
        engine.recompute_taint(&id("1.2"), "alice").unwrap(),
        TaintState::Tainted
    );
    assert_eq!(engine.history().len(), entries);
}
