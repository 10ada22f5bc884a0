//! UI-originated change records
//!
//! The rendering collaborator reports every gesture as a list of discrete
//! changes (a drag produces one `position` change per frame). The store
//! applies them in order and partitions out the structural ones, so only
//! additions are announced to the backend instead of every pixel of a drag.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::store::Mutation;
use crate::types::{EdgeId, GraphEdge, GraphNode, GraphSnapshot, NodeId, Position};

/// Classification of a change record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Move,
    Select,
    Remove,
    Add,
}

impl ChangeKind {
    /// Additions and removals alter the graph structure; moves and
    /// selections are cosmetic
    pub fn is_structural(self) -> bool {
        matches!(self, ChangeKind::Add | ChangeKind::Remove)
    }
}

/// A change to one node reported by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum NodeChange {
    /// Node dragged; `position` is absent on drag start/end notifications
    Position {
        id: NodeId,
        #[serde(default)]
        position: Option<Position>,
        #[serde(default)]
        dragging: bool,
    },
    Select {
        id: NodeId,
        selected: bool,
    },
    Remove {
        id: NodeId,
    },
    Add {
        item: GraphNode,
    },
}

impl NodeChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            NodeChange::Position { .. } => ChangeKind::Move,
            NodeChange::Select { .. } => ChangeKind::Select,
            NodeChange::Remove { .. } => ChangeKind::Remove,
            NodeChange::Add { .. } => ChangeKind::Add,
        }
    }
}

/// A change to one edge reported by the renderer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgeChange {
    Select { id: EdgeId, selected: bool },
    Remove { id: EdgeId },
    Add { item: GraphEdge },
}

impl EdgeChange {
    pub fn kind(&self) -> ChangeKind {
        match self {
            EdgeChange::Select { .. } => ChangeKind::Select,
            EdgeChange::Remove { .. } => ChangeKind::Remove,
            EdgeChange::Add { .. } => ChangeKind::Add,
        }
    }
}

/// Outcome of applying a change list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppliedChanges {
    /// Nodes that were genuinely new
    pub added_nodes: Vec<GraphNode>,
    /// Edges that were genuinely new
    pub added_edges: Vec<GraphEdge>,
    pub removed_nodes: Vec<NodeId>,
    pub removed_edges: Vec<EdgeId>,
    /// Move/selection changes that took effect
    pub cosmetic: usize,
    /// Position changes reported with `dragging: false` (a drag ended)
    pub moves_finished: usize,
    /// Which sides of the store changed
    pub mutation: Mutation,
}

impl AppliedChanges {
    /// Whether any item was added (the subset announced to the backend)
    pub fn has_additions(&self) -> bool {
        !self.added_nodes.is_empty() || !self.added_edges.is_empty()
    }

    /// Whether any addition or removal happened
    pub fn is_structural(&self) -> bool {
        self.has_additions() || !self.removed_nodes.is_empty() || !self.removed_edges.is_empty()
    }

    /// Structural difference between two whole graphs, e.g. around a
    /// snapshot restore
    pub fn between(old: &GraphSnapshot, new: &GraphSnapshot) -> Self {
        let old_nodes: HashSet<&str> = old.nodes.iter().map(|n| n.id.as_str()).collect();
        let new_nodes: HashSet<&str> = new.nodes.iter().map(|n| n.id.as_str()).collect();
        let old_edges: HashSet<&str> = old.edges.iter().map(|e| e.id.as_str()).collect();
        let new_edges: HashSet<&str> = new.edges.iter().map(|e| e.id.as_str()).collect();

        Self {
            added_nodes: new
                .nodes
                .iter()
                .filter(|n| !old_nodes.contains(n.id.as_str()))
                .cloned()
                .collect(),
            added_edges: new
                .edges
                .iter()
                .filter(|e| !old_edges.contains(e.id.as_str()))
                .cloned()
                .collect(),
            removed_nodes: old
                .nodes
                .iter()
                .filter(|n| !new_nodes.contains(n.id.as_str()))
                .map(|n| n.id.clone())
                .collect(),
            removed_edges: old
                .edges
                .iter()
                .filter(|e| !new_edges.contains(e.id.as_str()))
                .map(|e| e.id.clone())
                .collect(),
            cosmetic: 0,
            moves_finished: 0,
            mutation: Mutation {
                nodes: old.nodes != new.nodes,
                edges: old.edges != new.edges,
            },
        }
    }

    /// Fold the outcome of a later change list into this one
    pub fn merge(&mut self, other: AppliedChanges) {
        self.added_nodes.extend(other.added_nodes);
        self.added_edges.extend(other.added_edges);
        self.removed_nodes.extend(other.removed_nodes);
        self.removed_edges.extend(other.removed_edges);
        self.cosmetic += other.cosmetic;
        self.moves_finished += other.moves_finished;
        self.mutation |= other.mutation;
    }
}
