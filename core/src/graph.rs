//! Dependency-graph traversal.
//!
//! Edges run from a dependent to the nodes it depends on. All traversals
//! use explicit worklists so deep proofs cannot exhaust the stack.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use af_types::NodeId;

use crate::state::ProofState;

/// Edges out of `id`: its dependencies and validation dependencies, plus
/// any proposed edges starting at `id`.
fn outgoing(state: &ProofState, proposed: &[(NodeId, NodeId)], id: &NodeId) -> Vec<NodeId> {
    let mut out: BTreeSet<NodeId> = state
        .node(id)
        .map(|node| {
            node.dependencies
                .iter()
                .chain(&node.validation_deps)
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    out.extend(
        proposed
            .iter()
            .filter(|(from, _)| from == id)
            .map(|(_, to)| to.clone()),
    );
    out.into_iter().collect()
}

/// Find a cycle the `proposed` edges would close, as the path of ids from
/// the first repeated node back to itself.
#[must_use]
pub fn find_cycle(state: &ProofState, proposed: &[(NodeId, NodeId)]) -> Option<Vec<NodeId>> {
    for (from, to) in proposed {
        if let Some(path) = path_between(state, proposed, to, from) {
            let mut cycle = Vec::with_capacity(path.len() + 1);
            cycle.push(from.clone());
            cycle.extend(path);
            return Some(cycle);
        }
    }
    None
}

/// Iterative depth-first search from `start` to `goal`.
fn path_between(
    state: &ProofState,
    proposed: &[(NodeId, NodeId)],
    start: &NodeId,
    goal: &NodeId,
) -> Option<Vec<NodeId>> {
    let mut came_from: BTreeMap<NodeId, Option<NodeId>> = BTreeMap::new();
    came_from.insert(start.clone(), None);
    let mut stack = vec![start.clone()];

    while let Some(current) = stack.pop() {
        if &current == goal {
            let mut path = vec![current.clone()];
            let mut cursor = came_from.get(&current).cloned().flatten();
            while let Some(prev) = cursor {
                cursor = came_from.get(&prev).cloned().flatten();
                path.push(prev);
            }
            path.reverse();
            return Some(path);
        }
        for next in outgoing(state, proposed, &current) {
            if !came_from.contains_key(&next) {
                came_from.insert(next.clone(), Some(current.clone()));
                stack.push(next);
            }
        }
    }
    None
}

/// `seeds` plus everything that transitively depends on them.
#[must_use]
pub fn with_dependents(state: &ProofState, seeds: &BTreeSet<NodeId>) -> BTreeSet<NodeId> {
    let mut seen: BTreeSet<NodeId> = seeds
        .iter()
        .filter(|id| state.contains(id))
        .cloned()
        .collect();
    let mut queue: VecDeque<NodeId> = seen.iter().cloned().collect();
    while let Some(id) = queue.pop_front() {
        for dependent in state.dependents(&id) {
            if seen.insert(dependent.clone()) {
                queue.push_back(dependent.clone());
            }
        }
    }
    seen
}

/// Order `set` so every node comes after its dependencies within the set.
/// Ties break by id, so the order is deterministic.
#[must_use]
pub fn topological_order(state: &ProofState, set: &BTreeSet<NodeId>) -> Vec<NodeId> {
    let mut pending: BTreeMap<&NodeId, usize> = set
        .iter()
        .map(|id| {
            let inside = state.node(id).map_or(0, |node| {
                node.dependencies
                    .iter()
                    .filter(|dep| set.contains(*dep))
                    .count()
            });
            (id, inside)
        })
        .collect();
    let mut ready: BTreeSet<&NodeId> = pending
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(id, _)| *id)
        .collect();

    let mut order = Vec::with_capacity(set.len());
    while let Some(id) = ready.pop_first() {
        pending.remove(id);
        order.push(id.clone());
        for dependent in state.dependents(id) {
            if let Some((key, count)) = pending.get_key_value(dependent).map(|(k, c)| (*k, *c)) {
                let left = count.saturating_sub(1);
                pending.insert(key, left);
                if left == 0 {
                    ready.insert(key);
                }
            }
        }
    }
    // Only reachable with a cycle, which validation never admits.
    order.extend(pending.into_keys().cloned());
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::tests::{at, id, small_tree};
    use af_types::Event;

    fn depend(state: &mut ProofState, node: &str, deps: &[&str]) {
        state
            .apply(
                &Event::DependenciesAdded {
                    node_id: id(node),
                    dependencies: deps.iter().map(|raw| id(raw)).collect(),
                    validation_deps: BTreeSet::new(),
                },
                at(),
            )
            .unwrap();
    }

    fn chain() -> ProofState {
        let mut state = small_tree();
        state
            .apply(
                &Event::NodeCreated {
                    node: crate::state::tests::claim_node("1.3"),
                },
                at(),
            )
            .unwrap();
        depend(&mut state, "1.1", &["1.2"]);
        depend(&mut state, "1.2", &["1.3"]);
        state
    }

    #[test]
    fn closing_edge_reports_the_cycle_path() {
        let state = chain();
        let cycle = find_cycle(&state, &[(id("1.3"), id("1.1"))]).unwrap();
        let rendered: Vec<String> = cycle.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["1.3", "1.1", "1.2", "1.3"]);
    }

    #[test]
    fn self_edges_and_proposed_batches_are_cycles() {
        let state = small_tree();
        assert_eq!(
            find_cycle(&state, &[(id("1.1"), id("1.1"))]),
            Some(vec![id("1.1"), id("1.1")])
        );
        let batch = [(id("1.1"), id("1.2")), (id("1.2"), id("1.1"))];
        assert!(find_cycle(&state, &batch).is_some());
    }

    #[test]
    fn acyclic_additions_pass() {
        let state = chain();
        assert_eq!(find_cycle(&state, &[(id("1"), id("1.1"))]), None);
        assert_eq!(find_cycle(&state, &[(id("1.1"), id("1.3"))]), None);
    }

    #[test]
    fn dependents_and_order_follow_the_graph() {
        let state = chain();
        let affected = with_dependents(&state, &BTreeSet::from([id("1.3")]));
        assert_eq!(affected, BTreeSet::from([id("1.1"), id("1.2"), id("1.3")]));
        assert_eq!(
            topological_order(&state, &affected),
            [id("1.3"), id("1.2"), id("1.1")]
        );
    }
}
