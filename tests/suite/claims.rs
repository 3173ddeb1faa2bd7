//! Claim exclusivity and expiry across threads and engine handles.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use af_config::EngineConfig;
use af_core::REAPER_ACTOR;
use af_types::{ErrorCode, Role};
use chrono::TimeDelta;

use crate::common::{Workspace, id, open_at, seed};

#[test]
fn two_claimants_race_and_exactly_one_wins() {
    let workspace = Workspace::new();
    let engine = Arc::new(workspace.open());
    seed(&engine);

    for node in ["1.1", "1.2"] {
        let barrier = Arc::new(Barrier::new(2));
        let outcomes: Vec<(&str, af_core::Result<()>)> = thread::scope(|scope| {
            let handles: Vec<_> = ["alice", "bob"]
                .into_iter()
                .map(|owner| {
                    let engine = Arc::clone(&engine);
                    let barrier = Arc::clone(&barrier);
                    scope.spawn(move || {
                        barrier.wait();
                        (owner, engine.claim(&id(node), owner, Role::Prover, None))
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let winners: Vec<&str> = outcomes
            .iter()
            .filter(|(_, outcome)| outcome.is_ok())
            .map(|(owner, _)| *owner)
            .collect();
        assert_eq!(winners.len(), 1, "{node}: {outcomes:?}");
        let loser = outcomes
            .iter()
            .find_map(|(_, outcome)| outcome.as_ref().err())
            .unwrap();
        assert_eq!(loser.code(), ErrorCode::AlreadyClaimed);
        assert!(loser.is_retriable());
        assert_eq!(
            engine.get_node(&id(node)).unwrap().claimed_by(),
            Some(winners[0])
        );
    }

    let claims = engine
        .history()
        .iter()
        .filter(|entry| entry.event_type() == "nodes_claimed")
        .count();
    // One for the root while seeding, one per raced node.
    assert_eq!(claims, 3);
}

#[test]
fn expired_claims_are_reaped_for_the_next_claimant() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);

    engine
        .claim(&id("1.1"), "alice", Role::Prover, Some(Duration::from_secs(60)))
        .unwrap();
    workspace.clock.advance(TimeDelta::seconds(59));
    assert_eq!(
        engine
            .claim(&id("1.1"), "bob", Role::Prover, None)
            .unwrap_err()
            .code(),
        ErrorCode::AlreadyClaimed
    );

    workspace.clock.advance(TimeDelta::seconds(1));
    engine.claim(&id("1.1"), "bob", Role::Prover, None).unwrap();
    assert_eq!(engine.get_node(&id("1.1")).unwrap().claimed_by(), Some("bob"));

    let reaped: Vec<_> = engine
        .node_history(&id("1.1"))
        .into_iter()
        .filter(|entry| entry.event_type() == "lock_reaped")
        .collect();
    assert_eq!(reaped.len(), 1);
    assert_eq!(reaped[0].actor, REAPER_ACTOR);
}

#[test]
fn explicit_reap_returns_released_nodes() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);
    engine.claim(&id("1.1"), "alice", Role::Prover, None).unwrap();
    engine.claim(&id("1.2"), "bob", Role::Verifier, None).unwrap();

    assert!(engine.reap().unwrap().is_empty());
    workspace
        .clock
        .advance(TimeDelta::seconds(engine.config().claims.timeout_secs as i64));
    assert_eq!(engine.reap().unwrap(), [id("1.1"), id("1.2")]);
    assert!(
        engine
            .all_nodes()
            .iter()
            .all(|node| node.claimed_by().is_none())
    );
}

#[test]
fn a_second_handle_sees_claims_made_through_the_first() {
    let workspace = Workspace::new();
    let first = workspace.open();
    seed(&first);
    let second = open_at(
        &workspace.ledger_path(),
        EngineConfig::default(),
        workspace.clock.clone(),
    );

    first.claim(&id("1.1"), "alice", Role::Prover, None).unwrap();
    let err = second
        .claim(&id("1.1"), "bob", Role::Prover, None)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyClaimed);
    assert_eq!(
        second.get_node(&id("1.1")).unwrap().claimed_by(),
        Some("alice")
    );

    // The other direction: the first handle picks up the second's write.
    second.claim(&id("1.2"), "bob", Role::Verifier, None).unwrap();
    let report = first.verify().unwrap();
    assert_eq!(report.entries, second.history().len() as u64);
    assert_eq!(first.get_node(&id("1.2")).unwrap().claimed_by(), Some("bob"));
    first.release(&id("1.1"), "alice").unwrap();
    second.verify().unwrap();

    let reopened = workspace.open();
    assert_eq!(reopened.get_node(&id("1.1")).unwrap().claimed_by(), None);
    assert_eq!(
        reopened.get_node(&id("1.2")).unwrap().claimed_by(),
        Some("bob")
    );
    assert_eq!(reopened.history(), first.history());
}
