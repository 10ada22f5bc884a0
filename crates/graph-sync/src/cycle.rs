//! Cycle detection for proposed connections
//!
//! The question asked is "is the candidate's source already reachable from
//! its target?". Traversal follows existing outgoing edges only; the
//! candidate itself is never part of the walked graph.

use std::collections::{HashMap, HashSet};

use crate::types::{EdgeEndpoints, GraphEdge};

/// Check whether adding `candidate` would close a directed cycle
///
/// A self connection always counts as a cycle. The walk uses an explicit
/// stack and a visited set keyed by node id, so it terminates on existing
/// cyclic or repeated data and does not recurse on large graphs.
pub fn would_create_cycle(candidate: &EdgeEndpoints, edges: &[GraphEdge]) -> bool {
    if candidate.is_self_loop() {
        return true;
    }

    let mut outgoing: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in edges {
        outgoing
            .entry(edge.source.as_str())
            .or_default()
            .push(edge.target.as_str());
    }

    let goal = candidate.source.as_str();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![candidate.target.as_str()];

    while let Some(node) = stack.pop() {
        if node == goal {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(next) = outgoing.get(node) {
            stack.extend(next.iter().filter(|n| !visited.contains(*n)));
        }
    }

    false
}
