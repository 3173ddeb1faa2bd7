//! Work available to provers and verifiers, derived from a snapshot.

use af_types::{EpistemicState, Node, NodeId, Role, WorkflowState};
use serde::Serialize;

use crate::state::ProofState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobReason {
    /// A verifier sent the node back.
    NeedsRefinement,
    /// Open challenges await an answer.
    Challenged,
    /// A pending node with nothing under it yet.
    Unrefined,
    /// Every child is accepted; the node itself awaits a verdict.
    ReadyForReview,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub node_id: NodeId,
    pub role: Role,
    pub reason: JobReason,
}

pub struct JobSelector<'a> {
    state: &'a ProofState,
}

impl<'a> JobSelector<'a> {
    #[must_use]
    pub fn new(state: &'a ProofState) -> Self {
        Self { state }
    }

    #[must_use]
    pub fn prover_jobs(&self) -> Vec<Job> {
        self.available()
            .filter_map(|node| {
                let reason = match node.epistemic_state {
                    EpistemicState::NeedsRefinement => JobReason::NeedsRefinement,
                    EpistemicState::Pending
                        if self.state.open_challenges_on(&node.id).next().is_some() =>
                    {
                        JobReason::Challenged
                    }
                    EpistemicState::Pending if self.state.is_leaf(&node.id) => {
                        JobReason::Unrefined
                    }
                    _ => return None,
                };
                Some(Job {
                    node_id: node.id.clone(),
                    role: Role::Prover,
                    reason,
                })
            })
            .collect()
    }

    #[must_use]
    pub fn verifier_jobs(&self) -> Vec<Job> {
        self.available()
            .filter(|node| {
                node.epistemic_state == EpistemicState::Pending
                    && self.state.open_blocking_count(&node.id) == 0
                    && self.state.all_children_accepted(&node.id)
            })
            .map(|node| Job {
                node_id: node.id.clone(),
                role: Role::Verifier,
                reason: JobReason::ReadyForReview,
            })
            .collect()
    }

    fn available(&self) -> impl Iterator<Item = &'a Node> + 'a {
        self.state
            .nodes()
            .filter(|node| node.workflow_state == WorkflowState::Available && !node.is_archived())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{at, claim_node, id, small_tree};
    use af_types::{
        Challenge, ChallengeId, ChallengeSeverity, ChallengeStatus, ChallengeTarget, Event,
    };

    fn ids(jobs: &[Job]) -> Vec<String> {
        jobs.iter().map(|job| job.node_id.to_string()).collect()
    }

    #[test]
    fn leaves_go_to_provers_and_finished_parents_to_verifiers() {
        let mut state = small_tree();
        let selector = JobSelector::new(&state);
        assert_eq!(ids(&selector.prover_jobs()), ["1.1", "1.2"]);
        // Leaves have no children, so they are reviewable as they stand.
        assert_eq!(ids(&selector.verifier_jobs()), ["1.1", "1.2"]);

        for event in [
            Event::NodeValidated { node_id: id("1.1") },
            Event::NodeValidated { node_id: id("1.2") },
        ] {
            state.apply(&event, at()).unwrap();
        }
        let selector = JobSelector::new(&state);
        assert!(selector.prover_jobs().is_empty());
        assert_eq!(ids(&selector.verifier_jobs()), ["1"]);
        assert_eq!(selector.verifier_jobs()[0].reason, JobReason::ReadyForReview);
    }

    #[test]
    fn claimed_blocked_and_challenged_nodes() {
        let mut state = small_tree();
        state
            .apply(&Event::NodeCreated { node: claim_node("1.1.1") }, at())
            .unwrap();
        state
            .apply(
                &Event::NodesClaimed {
                    node_ids: vec![id("1.2")],
                    owner: "alice".into(),
                    role: Role::Prover,
                    timeout_secs: 60,
                },
                at(),
            )
            .unwrap();
        state
            .apply(
                &Event::ChallengeRaised {
                    challenge: Challenge {
                        id: ChallengeId::new(1),
                        node_id: id("1.1"),
                        target: ChallengeTarget::Gap,
                        reason: "skips a case".into(),
                        severity: ChallengeSeverity::Minor,
                        blocking: false,
                        status: ChallengeStatus::Open,
                        resolution: None,
                        raised_by: "verifier".into(),
                        raised_at: at(),
                    },
                },
                at(),
            )
            .unwrap();

        let jobs = JobSelector::new(&state).prover_jobs();
        assert_eq!(ids(&jobs), ["1.1", "1.1.1"]);
        assert_eq!(jobs[0].reason, JobReason::Challenged);
        assert_eq!(jobs[1].reason, JobReason::Unrefined);
    }

    #[test]
    fn needs_refinement_is_prover_work() {
        let mut state = small_tree();
        for event in [
            Event::NodeRefuted { node_id: id("1.2") },
            Event::RefinementRequested {
                node_id: id("1.2"),
                reason: "wrong case split".into(),
            },
        ] {
            state.apply(&event, at()).unwrap();
        }
        let jobs = JobSelector::new(&state).prover_jobs();
        let job = jobs.iter().find(|job| job.node_id == id("1.2")).unwrap();
        assert_eq!(job.reason, JobReason::NeedsRefinement);
    }
}
