//! Every committed node hangs off a live parent.

use af_config::EngineConfig;
use af_types::{ErrorCode, NodeId, Role};

use crate::common::{Workspace, claim, id, seed};

fn assert_connected(engine: &af_core::Engine) {
    let nodes = engine.all_nodes();
    for node in &nodes {
        if let Some(parent) = node.id.parent() {
            assert!(
                nodes.iter().any(|candidate| candidate.id == parent),
                "{} has no parent",
                node.id
            );
        } else {
            assert!(node.id.is_root());
        }
    }
}

#[test]
fn refinement_keeps_the_tree_connected() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    engine.claim(&id("1.2"), "alice", Role::Prover, None).unwrap();
    engine
        .refine(&id("1.2"), "alice", &[claim("n = ab"), claim("a < n")])
        .unwrap();
    engine.claim(&id("1.2.1"), "alice", Role::Prover, None).unwrap();
    let deep = engine
        .refine(&id("1.2.1"), "alice", &[claim("1 < a")])
        .unwrap();
    assert_eq!(deep, [id("1.2.1.1")]);

    assert_eq!(engine.all_nodes().len(), 6);
    assert_connected(&engine);
}

#[test]
fn orphans_are_refused() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    let err = engine
        .refine(&NodeId::root(), "alice", &[claim("before init")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParent);

    seed(&engine);
    let err = engine
        .refine(&id("1.7"), "alice", &[claim("no such parent")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParent);

    engine.archive(&id("1.1"), "vera").unwrap();
    let err = engine
        .refine(&id("1.1"), "alice", &[claim("under an archived node")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidParent);
    assert_connected(&engine);
}

#[test]
fn configured_limits_bound_the_tree() {
    let workspace = Workspace::new();
    let mut config = EngineConfig::default();
    config.limits.max_depth = 2;
    config.limits.max_children = 2;
    let engine = workspace.open_with(config);
    seed(&engine);

    engine.claim(&NodeId::root(), "alice", Role::Prover, None).unwrap();
    let err = engine
        .refine(&NodeId::root(), "alice", &[claim("a third case")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::RefinementLimitExceeded);

    engine.claim(&id("1.1"), "alice", Role::Prover, None).unwrap();
    let err = engine
        .refine(&id("1.1"), "alice", &[claim("too deep")])
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::DepthExceeded);
    assert_eq!(engine.all_nodes().len(), 3);
}
