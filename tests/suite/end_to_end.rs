//! A full prover/verifier session against an on-disk ledger.

use af_core::Objection;
use af_types::{
    ChallengeSeverity, ChallengeTarget, EpistemicState, ErrorClass, ErrorCode, NodeId,
    NonEmptyString, Role, WorkflowState,
};

use crate::common::{CONJECTURE, Workspace, claim, id, seed};

#[test]
fn init_refine_conflict_release_and_blocked_acceptance() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    let root = NodeId::root();

    assert_eq!(engine.init("prover-a", CONJECTURE).unwrap(), root);
    let created = engine.get_node(&root).unwrap();
    assert_eq!(created.epistemic_state, EpistemicState::Pending);
    assert_eq!(created.workflow_state, WorkflowState::Available);

    engine.claim(&root, "prover-a", Role::Prover, None).unwrap();
    let children = engine
        .refine(&root, "prover-a", &[claim("n is prime"), claim("n is composite")])
        .unwrap();
    assert_eq!(children, [id("1.1"), id("1.2")]);
    engine.release(&root, "prover-a").unwrap();
    for child in &children {
        let node = engine.get_node(child).unwrap();
        assert_eq!(node.epistemic_state, EpistemicState::Pending);
        assert_eq!(node.workflow_state, WorkflowState::Available);
    }

    engine.claim(&id("1.1"), "prover-a", Role::Prover, None).unwrap();
    let err = engine
        .claim(&id("1.1"), "prover-b", Role::Prover, None)
        .unwrap_err();
    assert_eq!(err.code(), ErrorCode::AlreadyClaimed);
    assert_eq!(err.class(), ErrorClass::Retriable);
    assert_eq!(err.exit_code(), 1);

    let err = engine.release(&id("1.1"), "prover-b").unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotClaimHolder);
    assert_eq!(
        engine.get_node(&id("1.1")).unwrap().claimed_by(),
        Some("prover-a")
    );

    let err = engine.accept(&root, "verifier").unwrap_err();
    assert_eq!(err.code(), ErrorCode::NodeBlocked);
    assert_eq!(err.exit_code(), 2);
    assert_eq!(
        engine.get_node(&root).unwrap().epistemic_state,
        EpistemicState::Pending
    );
}

#[test]
fn challenged_proof_is_completed_after_resolution() {
    let workspace = Workspace::new();
    let engine = workspace.open();
    seed(&engine);

    let challenge = engine
        .raise_challenge(
            &id("1.2"),
            "bob",
            Objection::new(
                ChallengeTarget::Gap,
                ChallengeSeverity::Major,
                "composite n needs a smaller factor argument",
            ),
        )
        .unwrap();
    assert_eq!(
        engine.get_node(&id("1.2")).unwrap().workflow_state,
        WorkflowState::Blocked
    );
    assert_eq!(
        engine
            .claim(&id("1.2"), "alice", Role::Prover, None)
            .unwrap_err()
            .code(),
        ErrorCode::NodeBlocked
    );

    engine
        .resolve_challenge(
            challenge,
            "alice",
            NonEmptyString::new("the least divisor above 1 is prime").unwrap(),
        )
        .unwrap();
    engine.accept(&id("1.1"), "bob").unwrap();
    engine.accept(&id("1.2"), "bob").unwrap();
    assert!(engine.all_children_validated(&NodeId::root()).unwrap());
    engine.accept(&NodeId::root(), "bob").unwrap();

    let root = engine.get_node(&NodeId::root()).unwrap();
    assert_eq!(root.epistemic_state, EpistemicState::Validated);
    assert!(engine.prover_jobs().is_empty());
    assert!(engine.verifier_jobs().is_empty());
    assert!(engine.open_challenges(None).is_empty());
}
