//! Epistemic taint propagation.
//!
//! Taint is derived, never set by hand:
//!
//! - `self_admitted` when the node itself was admitted without proof;
//! - `tainted` when a live dependency is tainted, self-admitted or refuted;
//! - `unresolved` when a live dependency is still unresolved;
//! - `clean` otherwise.
//!
//! Archived dependencies have been superseded and do not count.

use std::collections::{BTreeMap, BTreeSet};

use af_types::{EpistemicState, Event, Node, NodeId, TaintState};

use crate::graph::{topological_order, with_dependents};
use crate::state::ProofState;

/// Taint of `node`, reading dependency taint from `updated` first so a
/// single pass can build on values computed earlier in the same pass.
#[must_use]
pub fn evaluate(
    state: &ProofState,
    node: &Node,
    updated: &BTreeMap<NodeId, TaintState>,
) -> TaintState {
    if node.epistemic_state == EpistemicState::Admitted {
        return TaintState::SelfAdmitted;
    }
    let mut unresolved = false;
    for dep in node
        .dependencies
        .iter()
        .filter_map(|id| state.node(id))
        .filter(|dep| !dep.is_archived())
    {
        let taint = updated.get(&dep.id).copied().unwrap_or(dep.taint_state);
        if dep.epistemic_state == EpistemicState::Refuted
            || matches!(taint, TaintState::Tainted | TaintState::SelfAdmitted)
        {
            return TaintState::Tainted;
        }
        unresolved |= taint == TaintState::Unresolved;
    }
    if unresolved {
        TaintState::Unresolved
    } else {
        TaintState::Clean
    }
}

/// Recompute taint for `seeds` and everything depending on them, in
/// topological order. Returns one `taint_recomputed` event per node whose
/// value changed.
#[must_use]
pub fn recompute(state: &ProofState, seeds: &BTreeSet<NodeId>) -> Vec<Event> {
    let affected = with_dependents(state, seeds);
    let mut updated = BTreeMap::new();
    let mut events = Vec::new();
    for id in topological_order(state, &affected) {
        let Some(node) = state.node(&id) else {
            continue;
        };
        let taint = evaluate(state, node, &updated);
        if taint != node.taint_state {
            tracing::debug!(node = %id, from = %node.taint_state, to = %taint, "Taint changed");
            events.push(Event::TaintRecomputed {
                node_id: id.clone(),
                taint,
            });
        }
        updated.insert(id, taint);
    }
    events
}
