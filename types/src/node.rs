//! Proof tree nodes.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::digest::ContentHasher;
use crate::{EpistemicState, InferenceType, NodeId, NodeType, Role, TaintState, WorkflowState};

/// An exclusive, time-bounded lock held by one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimHold {
    pub owner: String,
    pub role: Role,
    pub claimed_at: DateTime<Utc>,
    pub timeout_secs: u64,
}

impl ClaimHold {
    #[must_use]
    pub fn expires_at(&self) -> DateTime<Utc> {
        let secs = i64::try_from(self.timeout_secs).unwrap_or(i64::MAX);
        let timeout = Duration::try_seconds(secs).unwrap_or(Duration::MAX);
        self.claimed_at
            .checked_add_signed(timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub node_type: NodeType,
    pub statement: String,
    pub inference: InferenceType,
    pub workflow_state: WorkflowState,
    pub epistemic_state: EpistemicState,
    pub taint_state: TaintState,
    pub created: DateTime<Utc>,
    pub created_by: String,
    pub content_hash: String,
    #[serde(default)]
    pub dependencies: BTreeSet<NodeId>,
    #[serde(default)]
    pub validation_deps: BTreeSet<NodeId>,
    /// Local assumptions in force at this node.
    #[serde(default)]
    pub scope: BTreeSet<NodeId>,
    /// For `local_discharge` nodes, the assumption being closed.
    #[serde(default)]
    pub discharges: Option<NodeId>,
    #[serde(default)]
    pub definitions: BTreeSet<String>,
    #[serde(default)]
    pub assumptions: BTreeSet<String>,
    #[serde(default)]
    pub externals: BTreeSet<String>,
    #[serde(default)]
    pub claim: Option<ClaimHold>,
}

impl Node {
    /// A freshly created node: pending, available, taint not yet computed.
    #[must_use]
    pub fn new(
        id: NodeId,
        node_type: NodeType,
        statement: impl Into<String>,
        inference: InferenceType,
        created: DateTime<Utc>,
        created_by: impl Into<String>,
    ) -> Self {
        let mut node = Self {
            id,
            node_type,
            statement: statement.into(),
            inference,
            workflow_state: WorkflowState::Available,
            epistemic_state: EpistemicState::Pending,
            taint_state: TaintState::Unresolved,
            created,
            created_by: created_by.into(),
            content_hash: String::new(),
            dependencies: BTreeSet::new(),
            validation_deps: BTreeSet::new(),
            scope: BTreeSet::new(),
            discharges: None,
            definitions: BTreeSet::new(),
            assumptions: BTreeSet::new(),
            externals: BTreeSet::new(),
            claim: None,
        };
        node.refresh_content_hash();
        node
    }

    /// SHA-256 over the node's canonical content fields.
    ///
    /// Workflow, epistemic and taint state are excluded: they change over
    /// the node's life without changing what the node asserts.
    #[must_use]
    pub fn compute_content_hash(&self) -> String {
        let mut hasher = ContentHasher::new("af.node.v1");
        hasher
            .field(&self.id.to_string())
            .field(self.node_type.as_str())
            .field(&self.statement)
            .field(self.inference.as_str())
            .fields(self.dependencies.iter().map(ToString::to_string))
            .fields(self.validation_deps.iter().map(ToString::to_string))
            .fields(self.scope.iter().map(ToString::to_string))
            .fields(self.discharges.iter().map(ToString::to_string))
            .fields(&self.definitions)
            .fields(&self.assumptions)
            .fields(&self.externals);
        hasher.finish_hex()
    }

    pub fn refresh_content_hash(&mut self) {
        self.content_hash = self.compute_content_hash();
    }

    #[must_use]
    pub fn claimed_by(&self) -> Option<&str> {
        self.claim.as_ref().map(|hold| hold.owner.as_str())
    }

    #[must_use]
    pub fn claimed_at(&self) -> Option<DateTime<Utc>> {
        self.claim.as_ref().map(|hold| hold.claimed_at)
    }

    #[must_use]
    pub fn is_archived(&self) -> bool {
        self.epistemic_state == EpistemicState::Archived
    }

    /// Recompute workflow state from the claim and the number of open
    /// blocking challenges. Blocking wins over claimed.
    pub fn refresh_workflow(&mut self, open_blocking: usize) {
        self.workflow_state = if open_blocking > 0 {
            WorkflowState::Blocked
        } else if self.claim.is_some() {
            WorkflowState::Claimed
        } else {
            WorkflowState::Available
        };
    }
}
