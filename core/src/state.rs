//! The materialized node store.
//!
//! [`ProofState`] is a cache over the ledger: it is built only by applying
//! events in sequence order, and every value in it (timestamps, challenge
//! and lemma ids) comes from those events. Ordered maps keep the
//! serialized form identical across replays.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use af_ledger::LedgerEntry;
use af_types::{
    Challenge, ChallengeId, ChallengeStatus, ClaimHold, EpistemicState, ErrorCode, Event, Lemma,
    LemmaId, Node, NodeId, NodeIdError, NodeType,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// An event that cannot be applied to the current state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {event}: {detail}")]
pub struct ApplyError {
    pub event: &'static str,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProofState {
    conjecture: Option<String>,
    nodes: BTreeMap<NodeId, Node>,
    challenges: BTreeMap<ChallengeId, Challenge>,
    lemmas: BTreeMap<LemmaId, Lemma>,
    /// Reverse dependency index: dependency -> nodes that depend on it.
    dependents: BTreeMap<NodeId, BTreeSet<NodeId>>,
    last_seq: u64,
}

impl ProofState {
    /// Rebuild from scratch by applying `entries` in order.
    pub fn replay<'a>(
        entries: impl IntoIterator<Item = &'a LedgerEntry>,
    ) -> Result<Self, (u64, ApplyError)> {
        let mut state = Self::default();
        for entry in entries {
            state.apply_entry(entry).map_err(|err| (entry.seq, err))?;
        }
        Ok(state)
    }

    pub fn apply_entry(&mut self, entry: &LedgerEntry) -> Result<(), ApplyError> {
        self.apply(&entry.event, entry.timestamp)?;
        self.last_seq = entry.seq;
        Ok(())
    }

    /// Apply one event stamped `at`. Does not advance `last_seq`.
    pub fn apply(&mut self, event: &Event, at: DateTime<Utc>) -> Result<(), ApplyError> {
        let kind = event.event_type();
        match event {
            Event::ProofInitialized { conjecture } => {
                if self.conjecture.is_some() {
                    return Err(fail(kind, "proof already initialized"));
                }
                self.conjecture = Some(conjecture.clone());
            }
            Event::NodeCreated { node } => self.insert_node(kind, node.clone())?,
            Event::DependenciesAdded {
                node_id,
                dependencies,
                validation_deps,
            } => {
                for dep in dependencies.iter().chain(validation_deps) {
                    if !self.nodes.contains_key(dep) {
                        return Err(fail(kind, format!("unknown dependency {dep}")));
                    }
                }
                let node = self.node_mut(kind, node_id)?;
                node.dependencies.extend(dependencies.iter().cloned());
                node.validation_deps.extend(validation_deps.iter().cloned());
                node.refresh_content_hash();
                for dep in dependencies {
                    self.dependents
                        .entry(dep.clone())
                        .or_default()
                        .insert(node_id.clone());
                }
            }
            Event::NodesClaimed {
                node_ids,
                owner,
                role,
                timeout_secs,
            } => {
                for id in node_ids {
                    let node = self.node_mut(kind, id)?;
                    if let Some(holder) = node.claimed_by()
                        && holder != owner.as_str()
                    {
                        return Err(fail(kind, format!("{id} is held by {holder}")));
                    }
                    node.claim = Some(ClaimHold {
                        owner: owner.clone(),
                        role: *role,
                        claimed_at: at,
                        timeout_secs: *timeout_secs,
                    });
                    self.refresh_workflow(id);
                }
            }
            Event::NodesReleased { node_ids, owner } => {
                for id in node_ids {
                    let node = self.node_mut(kind, id)?;
                    if node.claimed_by() != Some(owner.as_str()) {
                        return Err(fail(kind, format!("{id} is not held by {owner}")));
                    }
                    node.claim = None;
                    self.refresh_workflow(id);
                }
            }
            Event::LockReaped { node_id, .. } => {
                self.node_mut(kind, node_id)?.claim = None;
                self.refresh_workflow(node_id);
            }
            Event::NodeValidated { node_id } => {
                self.transition(kind, node_id, EpistemicState::Validated)?;
            }
            Event::NodeAdmitted { node_id } => {
                self.transition(kind, node_id, EpistemicState::Admitted)?;
            }
            Event::NodeRefuted { node_id } => {
                self.transition(kind, node_id, EpistemicState::Refuted)?;
            }
            Event::NodeArchived { node_id } => {
                self.transition(kind, node_id, EpistemicState::Archived)?;
            }
            Event::RefinementRequested { node_id, .. } => {
                self.transition(kind, node_id, EpistemicState::NeedsRefinement)?;
            }
            Event::NodeReopened { node_id } => {
                self.transition(kind, node_id, EpistemicState::Pending)?;
            }
            Event::ChallengeRaised { challenge } => {
                if challenge.id != self.next_challenge_id() {
                    return Err(fail(
                        kind,
                        format!("expected {}, found {}", self.next_challenge_id(), challenge.id),
                    ));
                }
                if !self.nodes.contains_key(&challenge.node_id) {
                    return Err(fail(kind, format!("unknown node {}", challenge.node_id)));
                }
                let node_id = challenge.node_id.clone();
                self.challenges.insert(challenge.id, challenge.clone());
                self.refresh_workflow(&node_id);
            }
            Event::ChallengeResolved {
                challenge_id,
                resolution,
            } => {
                let challenge = self.open_challenge_mut(kind, *challenge_id)?;
                challenge.status = ChallengeStatus::Resolved;
                challenge.resolution = Some(resolution.clone());
                let node_id = challenge.node_id.clone();
                self.refresh_workflow(&node_id);
            }
            Event::ChallengeWithdrawn { challenge_id } => {
                let challenge = self.open_challenge_mut(kind, *challenge_id)?;
                challenge.status = ChallengeStatus::Withdrawn;
                let node_id = challenge.node_id.clone();
                self.refresh_workflow(&node_id);
            }
            Event::TaintRecomputed { node_id, taint } => {
                self.node_mut(kind, node_id)?.taint_state = *taint;
            }
            Event::LemmaExtracted { lemma } => {
                if lemma.id != self.next_lemma_id() {
                    return Err(fail(
                        kind,
                        format!("expected {}, found {}", self.next_lemma_id(), lemma.id),
                    ));
                }
                if !self.nodes.contains_key(&lemma.source) {
                    return Err(fail(kind, format!("unknown node {}", lemma.source)));
                }
                self.lemmas.insert(lemma.id, lemma.clone());
            }
        }
        Ok(())
    }

    fn insert_node(&mut self, kind: &'static str, node: Node) -> Result<(), ApplyError> {
        if self.nodes.contains_key(&node.id) {
            return Err(fail(kind, format!("node {} already exists", node.id)));
        }
        match node.id.parent() {
            Some(parent) if !self.nodes.contains_key(&parent) => {
                return Err(fail(kind, format!("parent {parent} of {} is missing", node.id)));
            }
            None if node.node_type != NodeType::Claim => {
                return Err(fail(kind, "root must be a claim"));
            }
            _ => {}
        }
        for dep in &node.dependencies {
            if !self.nodes.contains_key(dep) {
                return Err(fail(kind, format!("unknown dependency {dep}")));
            }
            self.dependents
                .entry(dep.clone())
                .or_default()
                .insert(node.id.clone());
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        self.refresh_workflow(&id);
        Ok(())
    }

    fn transition(
        &mut self,
        kind: &'static str,
        id: &NodeId,
        next: EpistemicState,
    ) -> Result<(), ApplyError> {
        let node = self.node_mut(kind, id)?;
        if !node.epistemic_state.can_transition_to(next) {
            return Err(fail(
                kind,
                format!("{id} cannot move from {} to {next}", node.epistemic_state),
            ));
        }
        node.epistemic_state = next;
        Ok(())
    }

    fn node_mut(&mut self, kind: &'static str, id: &NodeId) -> Result<&mut Node, ApplyError> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| fail(kind, format!("unknown node {id}")))
    }

    fn open_challenge_mut(
        &mut self,
        kind: &'static str,
        id: ChallengeId,
    ) -> Result<&mut Challenge, ApplyError> {
        self.challenges
            .get_mut(&id)
            .filter(|challenge| challenge.is_open())
            .ok_or_else(|| fail(kind, format!("no open challenge {id}")))
    }

    fn refresh_workflow(&mut self, id: &NodeId) {
        let blocking = self.open_blocking_count(id);
        if let Some(node) = self.nodes.get_mut(id) {
            node.refresh_workflow(blocking);
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[must_use]
    pub fn conjecture(&self) -> Option<&str> {
        self.conjecture.as_deref()
    }

    #[must_use]
    pub fn last_seq(&self) -> u64 {
        self.last_seq
    }

    pub(crate) fn set_last_seq(&mut self, seq: u64) {
        self.last_seq = seq;
    }

    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// The node, or `INVALID_TARGET` when it does not exist.
    pub(crate) fn require(&self, id: &NodeId) -> crate::Result<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| crate::Error::rejected(ErrorCode::InvalidTarget, format!("no node {id}")))
    }

    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Direct children of `id` in id order, archived ones included.
    ///
    /// Descendants of a node sort contiguously right after it, so this is a
    /// range scan rather than a full pass.
    pub fn children<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Node> + 'a {
        self.nodes
            .range::<NodeId, _>((Bound::Excluded(id), Bound::Unbounded))
            .take_while(move |(child, _)| id.is_ancestor_of(child))
            .filter(move |(child, _)| id.is_parent_of(child))
            .map(|(_, node)| node)
    }

    pub fn live_children<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Node> + 'a {
        self.children(id).filter(|node| !node.is_archived())
    }

    #[must_use]
    pub fn is_leaf(&self, id: &NodeId) -> bool {
        self.live_children(id).next().is_none()
    }

    /// Every non-archived child is validated or admitted.
    #[must_use]
    pub fn all_children_accepted(&self, id: &NodeId) -> bool {
        self.live_children(id)
            .all(|child| child.epistemic_state.is_accepted())
    }

    /// The id the next child of `parent` will receive. Ids are never
    /// reused, so archived children still count.
    pub fn next_child_id(&self, parent: &NodeId) -> Result<NodeId, NodeIdError> {
        let next = self
            .children(parent)
            .map(|child| child.id.last_segment())
            .max()
            .map_or(1, |last| last.saturating_add(1));
        parent.child(next)
    }

    /// Local assumptions opened among `parent`'s live children and not yet
    /// discharged by a live sibling.
    #[must_use]
    pub fn open_assumptions_at(&self, parent: &NodeId) -> BTreeSet<NodeId> {
        let mut open = BTreeSet::new();
        let mut closed = BTreeSet::new();
        for child in self.live_children(parent) {
            match child.node_type {
                NodeType::LocalAssume => {
                    open.insert(child.id.clone());
                }
                NodeType::LocalDischarge => {
                    closed.extend(child.discharges.iter().cloned());
                }
                _ => {}
            }
        }
        open.retain(|id| !closed.contains(id));
        open
    }

    /// Nodes that list `id` as a dependency.
    pub fn dependents(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.dependents.get(id).into_iter().flatten()
    }

    #[must_use]
    pub fn challenge(&self, id: ChallengeId) -> Option<&Challenge> {
        self.challenges.get(&id)
    }

    pub fn challenges(&self) -> impl Iterator<Item = &Challenge> {
        self.challenges.values()
    }

    pub fn challenges_on<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Challenge> {
        self.challenges
            .values()
            .filter(move |challenge| &challenge.node_id == id)
    }

    pub fn open_challenges_on<'a>(
        &'a self,
        id: &'a NodeId,
    ) -> impl Iterator<Item = &'a Challenge> {
        self.challenges_on(id).filter(|challenge| challenge.is_open())
    }

    #[must_use]
    pub fn open_blocking_count(&self, id: &NodeId) -> usize {
        self.challenges_on(id)
            .filter(|challenge| challenge.blocks())
            .count()
    }

    #[must_use]
    pub fn next_challenge_id(&self) -> ChallengeId {
        ChallengeId::new(self.challenges.len() as u64 + 1)
    }

    pub fn lemmas(&self) -> impl Iterator<Item = &Lemma> {
        self.lemmas.values()
    }

    #[must_use]
    pub fn lemma_for(&self, source: &NodeId) -> Option<&Lemma> {
        self.lemmas.values().find(|lemma| &lemma.source == source)
    }

    #[must_use]
    pub fn next_lemma_id(&self) -> LemmaId {
        LemmaId::new(self.lemmas.len() as u64 + 1)
    }
}

fn fail(event: &'static str, detail: impl Into<String>) -> ApplyError {
    ApplyError {
        event,
        detail: detail.into(),
    }
}
