//! Semantic diff between two copies of the graph
//!
//! The backend side receives whole mirror pushes; this module turns the
//! difference between the previous and the new copy into discrete events
//! it can react to. Nodes are keyed by id and edges by edge id.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{EdgeEndpoints, GraphEdge, GraphNode, GraphSnapshot, NodeId, Position};

/// Discriminant of a [`GraphEvent`], used to register callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphEventKind {
    NodeCreated,
    NodeDeleted,
    NodeMoved,
    NodeSelected,
    NodeDeselected,
    EdgeCreated,
    EdgeDeleted,
    EdgeSelected,
    EdgeDeselected,
}

/// A change observed between two graph copies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum GraphEvent {
    NodeCreated { node_id: NodeId },
    NodeDeleted { node_id: NodeId },
    NodeMoved { node_id: NodeId, from: Position, to: Position },
    NodeSelected { node_id: NodeId },
    NodeDeselected { node_id: NodeId },
    EdgeCreated { edge: EdgeEndpoints },
    EdgeDeleted { edge: EdgeEndpoints },
    EdgeSelected { edge: EdgeEndpoints },
    EdgeDeselected { edge: EdgeEndpoints },
}

impl GraphEvent {
    pub fn kind(&self) -> GraphEventKind {
        match self {
            GraphEvent::NodeCreated { .. } => GraphEventKind::NodeCreated,
            GraphEvent::NodeDeleted { .. } => GraphEventKind::NodeDeleted,
            GraphEvent::NodeMoved { .. } => GraphEventKind::NodeMoved,
            GraphEvent::NodeSelected { .. } => GraphEventKind::NodeSelected,
            GraphEvent::NodeDeselected { .. } => GraphEventKind::NodeDeselected,
            GraphEvent::EdgeCreated { .. } => GraphEventKind::EdgeCreated,
            GraphEvent::EdgeDeleted { .. } => GraphEventKind::EdgeDeleted,
            GraphEvent::EdgeSelected { .. } => GraphEventKind::EdgeSelected,
            GraphEvent::EdgeDeselected { .. } => GraphEventKind::EdgeDeselected,
        }
    }
}

/// Events turning `old` nodes into `new` nodes
///
/// Creations come first (in `new` order), then for each old node in order
/// either its move/selection changes or its deletion.
pub fn diff_nodes(old: &[GraphNode], new: &[GraphNode]) -> Vec<GraphEvent> {
    let old_by_id: HashMap<&str, &GraphNode> = old.iter().map(|n| (n.id.as_str(), n)).collect();
    let new_by_id: HashMap<&str, &GraphNode> = new.iter().map(|n| (n.id.as_str(), n)).collect();
    let mut events = Vec::new();

    for node in new {
        if !old_by_id.contains_key(node.id.as_str()) {
            events.push(GraphEvent::NodeCreated {
                node_id: node.id.clone(),
            });
        }
    }

    for before in old {
        let Some(after) = new_by_id.get(before.id.as_str()) else {
            events.push(GraphEvent::NodeDeleted {
                node_id: before.id.clone(),
            });
            continue;
        };
        if before.position != after.position {
            events.push(GraphEvent::NodeMoved {
                node_id: before.id.clone(),
                from: before.position,
                to: after.position,
            });
        }
        match (before.selected, after.selected) {
            (false, true) => events.push(GraphEvent::NodeSelected {
                node_id: before.id.clone(),
            }),
            (true, false) => events.push(GraphEvent::NodeDeselected {
                node_id: before.id.clone(),
            }),
            _ => {}
        }
    }

    events
}

/// Events turning `old` edges into `new` edges; same ordering as [`diff_nodes`]
pub fn diff_edges(old: &[GraphEdge], new: &[GraphEdge]) -> Vec<GraphEvent> {
    let old_by_id: HashMap<&str, &GraphEdge> = old.iter().map(|e| (e.id.as_str(), e)).collect();
    let new_by_id: HashMap<&str, &GraphEdge> = new.iter().map(|e| (e.id.as_str(), e)).collect();
    let mut events = Vec::new();

    for edge in new {
        if !old_by_id.contains_key(edge.id.as_str()) {
            events.push(GraphEvent::EdgeCreated {
                edge: edge.endpoints(),
            });
        }
    }

    for before in old {
        match new_by_id.get(before.id.as_str()) {
            None => events.push(GraphEvent::EdgeDeleted {
                edge: before.endpoints(),
            }),
            Some(after) => match (before.selected, after.selected) {
                (false, true) => events.push(GraphEvent::EdgeSelected {
                    edge: before.endpoints(),
                }),
                (true, false) => events.push(GraphEvent::EdgeDeselected {
                    edge: before.endpoints(),
                }),
                _ => {}
            },
        }
    }

    events
}

/// Node events followed by edge events
pub fn diff_snapshots(old: &GraphSnapshot, new: &GraphSnapshot) -> Vec<GraphEvent> {
    let mut events = diff_nodes(&old.nodes, &new.nodes);
    events.extend(diff_edges(&old.edges, &new.edges));
    events
}
