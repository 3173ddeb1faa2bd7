//! State-changing events recorded in the ledger.
//!
//! Events are the only input to state reconstruction. Every field needed to
//! reproduce a mutation lives in the event itself; timestamps come from the
//! enclosing ledger entry.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Challenge, ChallengeId, Lemma, Node, NodeId, NonEmptyString, Role, TaintState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ProofInitialized {
        conjecture: String,
    },
    NodeCreated {
        node: Node,
    },
    DependenciesAdded {
        node_id: NodeId,
        dependencies: BTreeSet<NodeId>,
        #[serde(default)]
        validation_deps: BTreeSet<NodeId>,
    },
    NodesClaimed {
        node_ids: Vec<NodeId>,
        owner: String,
        role: Role,
        timeout_secs: u64,
    },
    NodesReleased {
        node_ids: Vec<NodeId>,
        owner: String,
    },
    NodeValidated {
        node_id: NodeId,
    },
    NodeAdmitted {
        node_id: NodeId,
    },
    NodeRefuted {
        node_id: NodeId,
    },
    NodeArchived {
        node_id: NodeId,
    },
    RefinementRequested {
        node_id: NodeId,
        reason: String,
    },
    NodeReopened {
        node_id: NodeId,
    },
    ChallengeRaised {
        challenge: Challenge,
    },
    ChallengeResolved {
        challenge_id: ChallengeId,
        resolution: NonEmptyString,
    },
    ChallengeWithdrawn {
        challenge_id: ChallengeId,
    },
    TaintRecomputed {
        node_id: NodeId,
        taint: TaintState,
    },
    LemmaExtracted {
        lemma: Lemma,
    },
    LockReaped {
        node_id: NodeId,
        owner: String,
    },
}

impl Event {
    /// The snake_case tag stored alongside the payload.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::ProofInitialized { .. } => "proof_initialized",
            Self::NodeCreated { .. } => "node_created",
            Self::DependenciesAdded { .. } => "dependencies_added",
            Self::NodesClaimed { .. } => "nodes_claimed",
            Self::NodesReleased { .. } => "nodes_released",
            Self::NodeValidated { .. } => "node_validated",
            Self::NodeAdmitted { .. } => "node_admitted",
            Self::NodeRefuted { .. } => "node_refuted",
            Self::NodeArchived { .. } => "node_archived",
            Self::RefinementRequested { .. } => "refinement_requested",
            Self::NodeReopened { .. } => "node_reopened",
            Self::ChallengeRaised { .. } => "challenge_raised",
            Self::ChallengeResolved { .. } => "challenge_resolved",
            Self::ChallengeWithdrawn { .. } => "challenge_withdrawn",
            Self::TaintRecomputed { .. } => "taint_recomputed",
            Self::LemmaExtracted { .. } => "lemma_extracted",
            Self::LockReaped { .. } => "lock_reaped",
        }
    }

    /// Nodes named directly by this event. Challenge resolution and
    /// withdrawal name only the challenge; callers resolve its node.
    #[must_use]
    pub fn node_ids(&self) -> Vec<&NodeId> {
        match self {
            Self::ProofInitialized { .. }
            | Self::ChallengeResolved { .. }
            | Self::ChallengeWithdrawn { .. } => Vec::new(),
            Self::NodeCreated { node } => vec![&node.id],
            Self::NodesClaimed { node_ids, .. } | Self::NodesReleased { node_ids, .. } => {
                node_ids.iter().collect()
            }
            Self::DependenciesAdded { node_id, .. }
            | Self::NodeValidated { node_id }
            | Self::NodeAdmitted { node_id }
            | Self::NodeRefuted { node_id }
            | Self::NodeArchived { node_id }
            | Self::RefinementRequested { node_id, .. }
            | Self::NodeReopened { node_id }
            | Self::TaintRecomputed { node_id, .. }
            | Self::LockReaped { node_id, .. } => vec![node_id],
            Self::ChallengeRaised { challenge } => vec![&challenge.node_id],
            Self::LemmaExtracted { lemma } => vec![&lemma.source],
        }
    }
}
