//! Exclusive, time-bounded claims on nodes.
//!
//! Acquisition never waits: a node held by someone else fails immediately
//! with `ALREADY_CLAIMED`. Expired claims are swept by the reaper.

use af_types::{ErrorCode, Event, NodeId, Role, WorkflowState};
use chrono::{DateTime, Utc};

use crate::state::ProofState;
use crate::{Error, Result};

pub struct ClaimManager<'a> {
    state: &'a ProofState,
}

impl<'a> ClaimManager<'a> {
    #[must_use]
    pub fn new(state: &'a ProofState) -> Self {
        Self { state }
    }

    /// Build the event granting `owner` a claim on `id`. Re-claiming a node
    /// you already hold refreshes its timestamp.
    pub fn claim(
        &self,
        id: &NodeId,
        owner: &str,
        role: Role,
        timeout_secs: u64,
    ) -> Result<Event> {
        let node = self.state.require(id)?;
        if node.is_archived() {
            return Err(Error::rejected(
                ErrorCode::ValidationInvariantFailed,
                format!("node {id} is archived"),
            ));
        }
        self.ensure_not_held_by_other(id, owner)?;
        if node.workflow_state == WorkflowState::Blocked {
            return Err(Error::rejected(
                ErrorCode::NodeBlocked,
                format!("node {id} has open blocking challenges"),
            ));
        }
        Ok(Event::NodesClaimed {
            node_ids: vec![id.clone()],
            owner: owner.to_owned(),
            role,
            timeout_secs,
        })
    }

    pub fn release(&self, id: &NodeId, owner: &str) -> Result<Event> {
        self.ensure_holder(id, owner)?;
        Ok(Event::NodesReleased {
            node_ids: vec![id.clone()],
            owner: owner.to_owned(),
        })
    }

    /// One `lock_reaped` event per claim that has expired at `now`.
    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> Vec<Event> {
        self.state
            .nodes()
            .filter_map(|node| {
                let hold = node.claim.as_ref()?;
                hold.is_expired(now).then(|| Event::LockReaped {
                    node_id: node.id.clone(),
                    owner: hold.owner.clone(),
                })
            })
            .collect()
    }

    /// `actor` must currently hold the claim on `id`.
    pub fn ensure_holder(&self, id: &NodeId, actor: &str) -> Result<()> {
        let node = self.state.require(id)?;
        match node.claimed_by() {
            Some(holder) if holder == actor => Ok(()),
            Some(holder) => Err(Error::rejected(
                ErrorCode::NotClaimHolder,
                format!("node {id} is held by {holder}, not {actor}"),
            )),
            None => Err(Error::rejected(
                ErrorCode::NotClaimHolder,
                format!("node {id} is not claimed"),
            )),
        }
    }

    /// Nobody other than `actor` may hold `id`. Unclaimed is fine.
    pub fn ensure_not_held_by_other(&self, id: &NodeId, actor: &str) -> Result<()> {
        let node = self.state.require(id)?;
        match node.claimed_by() {
            Some(holder) if holder != actor => Err(Error::rejected(
                ErrorCode::AlreadyClaimed,
                format!("node {id} is claimed by {holder}"),
            )),
            _ => Ok(()),
        }
    }
}
