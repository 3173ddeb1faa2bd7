//! Replaying the ledger reproduces the same state, byte for byte.

use std::collections::BTreeSet;

use af_config::EngineConfig;
use af_core::Objection;
use af_types::{ChallengeSeverity, ChallengeTarget, NodeId, NonEmptyString, Role};
use chrono::TimeDelta;

use crate::common::{Workspace, claim, id, open_at, seed};

fn busy_history(workspace: &Workspace) -> af_core::Engine {
    let engine = workspace.open();
    seed(&engine);
    engine.claim(&id("1.2"), "alice", Role::Prover, None).unwrap();
    engine
        .refine(&id("1.2"), "alice", &[claim("n = ab with 1 < a, b < n")])
        .unwrap();
    engine
        .add_dependencies(&id("1.2"), "alice", BTreeSet::from([id("1.1")]), BTreeSet::new())
        .unwrap();
    let challenge = engine
        .raise_challenge(
            &id("1.1"),
            "vera",
            Objection::new(ChallengeTarget::Domain, ChallengeSeverity::Critical, "n = 1?"),
        )
        .unwrap();
    workspace.clock.advance(TimeDelta::minutes(10));
    engine
        .resolve_challenge(challenge, "alice", NonEmptyString::new("n > 1").unwrap())
        .unwrap();
    engine.admit(&id("1.1"), "vera").unwrap();
    engine.accept(&id("1.2.1"), "vera").unwrap();
    engine
}

#[test]
fn two_replays_are_bit_identical() {
    let workspace = Workspace::new();
    let engine = busy_history(&workspace);
    let live = serde_json::to_vec(&engine.snapshot().state).unwrap();

    let first = serde_json::to_vec(&engine.replay().unwrap().state).unwrap();
    let second = serde_json::to_vec(&engine.replay().unwrap().state).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, live);
}

#[test]
fn reopening_rebuilds_the_same_state() {
    let workspace = Workspace::new();
    let engine = busy_history(&workspace);
    let before = engine.snapshot();
    let report = engine.verify().unwrap();
    drop(engine);

    let reopened = open_at(
        &workspace.ledger_path(),
        EngineConfig::default(),
        workspace.clock.clone(),
    );
    let after = reopened.snapshot();
    assert_eq!(
        serde_json::to_vec(&after.state).unwrap(),
        serde_json::to_vec(&before.state).unwrap()
    );
    assert_eq!(after.history.to_vec(), before.history.to_vec());
    assert_eq!(reopened.verify().unwrap(), report);
    assert_eq!(after.state.last_seq(), report.entries);
    assert_eq!(
        after.state.node(&NodeId::root()).unwrap().statement,
        crate::common::CONJECTURE
    );
}
