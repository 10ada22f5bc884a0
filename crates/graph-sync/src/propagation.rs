//! Value propagation along edges
//!
//! When a node is created, edited, or gains or loses an input edge, it is
//! updated from the nodes plugged into its ports, and the update cascades
//! through its output ports. Each node is visited at most once per pass, so
//! a graph with edge loops still terminates.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::Result;
use crate::ports::{PortCatalog, PortDirection};
use crate::registry::NodeClassRegistry;
use crate::store::GraphStore;
use crate::types::{GraphEdge, GraphNode, NodeId};

/// Recomputes a node's payload from its plugged nodes
///
/// Returns a patch merged into the node's data, or `None` to leave it as is.
pub type NodeUpdateFn = fn(&NodeInputs<'_>) -> Option<serde_json::Value>;

/// Nodes plugged into each port, keyed by node id then port name
#[derive(Debug, Clone, Default)]
pub struct PortConnections {
    plugged: HashMap<NodeId, HashMap<String, Vec<NodeId>>>,
}

impl PortConnections {
    /// Build the map from the current edges
    ///
    /// An edge lists its target under the source port and its source under
    /// the target port.
    pub fn from_edges(edges: &[GraphEdge]) -> Self {
        let mut plugged: HashMap<NodeId, HashMap<String, Vec<NodeId>>> = HashMap::new();
        for edge in edges {
            plugged
                .entry(edge.source.clone())
                .or_default()
                .entry(edge.source_handle.clone())
                .or_default()
                .push(edge.target.clone());
            plugged
                .entry(edge.target.clone())
                .or_default()
                .entry(edge.target_handle.clone())
                .or_default()
                .push(edge.source.clone());
        }
        Self { plugged }
    }

    /// Nodes plugged into one port of a node
    pub fn plugged(&self, node_id: &str, port: &str) -> &[NodeId] {
        self.plugged
            .get(node_id)
            .and_then(|ports| ports.get(port))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// What a node sees when it is updated
#[derive(Debug)]
pub struct NodeInputs<'a> {
    pub node: &'a GraphNode,
    plugged: HashMap<&'a str, Vec<&'a GraphNode>>,
}

impl<'a> NodeInputs<'a> {
    fn gather(
        node: &'a GraphNode,
        catalog: &'a PortCatalog,
        connections: &PortConnections,
        store: &'a GraphStore,
    ) -> Self {
        let mut plugged = HashMap::new();
        for port in catalog.ports_of(&node.id).unwrap_or(&[]) {
            let nodes = connections
                .plugged(&node.id, &port.name)
                .iter()
                .filter_map(|id| store.find_node(id))
                .collect();
            plugged.insert(port.name.as_str(), nodes);
        }
        Self { node, plugged }
    }

    /// Nodes plugged into `port`, in edge order
    pub fn port(&self, port: &str) -> &[&'a GraphNode] {
        self.plugged.get(port).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Nodes reached by updating `starts`, in visit order
///
/// Starts come first, then a breadth-first walk following edges that leave
/// through source ports. Each node appears once.
pub fn propagation_order(starts: &[NodeId], edges: &[GraphEdge], catalog: &PortCatalog) -> Vec<NodeId> {
    let connections = PortConnections::from_edges(edges);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    let mut order = Vec::new();

    for id in starts {
        if visited.insert(id.as_str()) {
            queue.push_back(id.as_str());
        }
    }

    while let Some(node_id) = queue.pop_front() {
        order.push(node_id.to_string());
        let outputs = catalog
            .ports_of(node_id)
            .unwrap_or(&[])
            .iter()
            .filter(|p| p.direction == PortDirection::Source);
        for port in outputs {
            for next in connections.plugged(node_id, &port.name) {
                if visited.insert(next.as_str()) {
                    queue.push_back(next.as_str());
                }
            }
        }
    }

    order
}

/// Update `starts` and everything downstream of them
///
/// Nodes whose class has no update function pass the cascade on unchanged.
/// Returns the ids whose data actually changed.
pub fn propagate(
    store: &mut GraphStore,
    catalog: &PortCatalog,
    registry: &NodeClassRegistry,
    starts: &[NodeId],
) -> Result<Vec<NodeId>> {
    let existing: Vec<NodeId> = starts
        .iter()
        .filter(|id| store.contains_node(id))
        .cloned()
        .collect();
    if existing.is_empty() {
        return Ok(Vec::new());
    }

    let order = propagation_order(&existing, store.edges(), catalog);
    let connections = PortConnections::from_edges(store.edges());
    let mut changed = Vec::new();

    for node_id in order {
        let patch = {
            let Some(node) = store.find_node(&node_id) else {
                continue;
            };
            let Some(update) = registry.get(&node.node_type).and_then(|c| c.update) else {
                continue;
            };
            let inputs = NodeInputs::gather(node, catalog, &connections, store);
            match update(&inputs) {
                Some(patch) if patch_changes(&node.data, &patch) => patch,
                _ => continue,
            }
        };
        store.update_node_data(&node_id, patch)?;
        changed.push(node_id);
    }

    if !changed.is_empty() {
        log::debug!("Propagation updated {} node(s)", changed.len());
    }
    Ok(changed)
}

fn patch_changes(data: &serde_json::Value, patch: &serde_json::Value) -> bool {
    match (data, patch) {
        (serde_json::Value::Object(data), serde_json::Value::Object(patch)) => {
            patch.iter().any(|(key, value)| data.get(key) != Some(value))
        }
        (data, patch) => data != patch,
    }
}
