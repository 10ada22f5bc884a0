//! Graph state store
//!
//! The store is the only owner of mutable graph data. Every mutator returns
//! a [`Mutation`] saying which side changed, and the same flags accumulate
//! in the store until the sync bridge takes them. Nothing relies on
//! comparing whole sequences on every render.

use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::changes::{AppliedChanges, EdgeChange, NodeChange};
use crate::error::{Result, SyncError};
use crate::types::{EdgeEndpoints, GraphEdge, GraphNode, GraphSnapshot, NodeId, Position, EDGE_ID_SEPARATOR};

/// Which sides of the graph a mutation touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Mutation {
    pub nodes: bool,
    pub edges: bool,
}

impl Mutation {
    pub const NONE: Mutation = Mutation { nodes: false, edges: false };
    pub const NODES: Mutation = Mutation { nodes: true, edges: false };
    pub const EDGES: Mutation = Mutation { nodes: false, edges: true };
    pub const BOTH: Mutation = Mutation { nodes: true, edges: true };

    pub fn is_empty(self) -> bool {
        !self.nodes && !self.edges
    }
}

impl BitOr for Mutation {
    type Output = Mutation;

    fn bitor(self, rhs: Mutation) -> Mutation {
        Mutation {
            nodes: self.nodes || rhs.nodes,
            edges: self.edges || rhs.edges,
        }
    }
}

impl BitOrAssign for Mutation {
    fn bitor_assign(&mut self, rhs: Mutation) {
        *self = *self | rhs;
    }
}

/// What happens to edges touching a node removed by id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DanglingEdgePolicy {
    /// Remove every edge touching a removed node
    #[default]
    Prune,
    /// Keep such edges until something removes them explicitly
    Retain,
}

/// In-memory node and edge sequences for one editor session
#[derive(Debug, Clone, Default)]
pub struct GraphStore {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    dirty: Mutation,
}

impl GraphStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a snapshot; both sides start dirty so the
    /// first sync tick publishes them
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        Self {
            nodes: snapshot.nodes,
            edges: snapshot.edges,
            dirty: Mutation::BOTH,
        }
    }

    // =========================================================================
    // Read model
    // =========================================================================

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.find_node(id).is_some()
    }

    pub fn find_edge(&self, endpoints: &EdgeEndpoints) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.matches(endpoints))
    }

    /// Copy of the current nodes and edges
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        }
    }

    // =========================================================================
    // Dirty tracking
    // =========================================================================

    /// Sides changed since the last `take_dirty`
    pub fn dirty(&self) -> Mutation {
        self.dirty
    }

    /// Take and reset the accumulated dirty flags
    pub fn take_dirty(&mut self) -> Mutation {
        std::mem::take(&mut self.dirty)
    }

    fn record(&mut self, mutation: Mutation) -> Mutation {
        self.dirty |= mutation;
        mutation
    }

    // =========================================================================
    // Structural mutators
    // =========================================================================

    /// Insert a node; ids must be unique among live nodes and free of `:`
    pub fn add_node(&mut self, node: GraphNode) -> Result<Mutation> {
        if node.id.contains(EDGE_ID_SEPARATOR) {
            return Err(SyncError::InvalidNodeId(node.id));
        }
        if self.contains_node(&node.id) {
            return Err(SyncError::DuplicateNode(node.id));
        }
        self.nodes.push(node);
        Ok(self.record(Mutation::NODES))
    }

    /// Insert an edge between two live nodes
    ///
    /// An edge whose endpoints are already connected is a no-op.
    pub fn add_edge(&mut self, edge: GraphEdge) -> Result<Mutation> {
        for node_id in [&edge.source, &edge.target] {
            if !self.contains_node(node_id) {
                return Err(SyncError::UnknownNode(node_id.clone()));
            }
        }
        if self.edges.iter().any(|e| e.matches(&edge.endpoints())) {
            log::debug!("Edge '{}' already present, skipping", edge.id);
            return Ok(Mutation::NONE);
        }
        self.edges.push(edge);
        Ok(self.record(Mutation::EDGES))
    }

    /// Remove nodes by id; unknown ids are ignored
    pub fn remove_nodes_by_id(&mut self, ids: &[NodeId], policy: DanglingEdgePolicy) -> Mutation {
        let before = self.nodes.len();
        self.nodes.retain(|n| !ids.contains(&n.id));
        let mut mutation = Mutation::NONE;
        if self.nodes.len() != before {
            mutation |= Mutation::NODES;
        }

        if policy == DanglingEdgePolicy::Prune {
            let before = self.edges.len();
            self.edges
                .retain(|e| !ids.iter().any(|id| e.touches(id)));
            if self.edges.len() != before {
                log::debug!("Pruned {} dangling edge(s)", before - self.edges.len());
                mutation |= Mutation::EDGES;
            }
        }

        self.record(mutation)
    }

    /// Remove edges matching the endpoint tuples; absent tuples are ignored
    pub fn remove_edges_by_endpoints(&mut self, endpoints: &[EdgeEndpoints]) -> Mutation {
        let before = self.edges.len();
        self.edges
            .retain(|e| !endpoints.iter().any(|ep| e.matches(ep)));
        if self.edges.len() == before {
            return Mutation::NONE;
        }
        self.record(Mutation::EDGES)
    }

    /// Merge a JSON object patch into a node's payload
    ///
    /// A non-object patch, or a node whose payload is not an object,
    /// replaces the payload wholesale.
    pub fn update_node_data(&mut self, id: &str, patch: serde_json::Value) -> Result<Mutation> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| SyncError::UnknownNode(id.to_string()))?;

        match (&mut node.data, patch) {
            (serde_json::Value::Object(data), serde_json::Value::Object(patch)) => {
                for (key, value) in patch {
                    data.insert(key, value);
                }
            }
            (data, patch) => *data = patch,
        }
        Ok(self.record(Mutation::NODES))
    }

    /// Overwrite the whole graph (snapshot restore)
    pub fn replace(&mut self, snapshot: GraphSnapshot) -> Mutation {
        self.nodes = snapshot.nodes;
        self.edges = snapshot.edges;
        self.record(Mutation::BOTH)
    }

    /// Remove every node and edge
    pub fn clear(&mut self) -> Mutation {
        self.replace(GraphSnapshot::default())
    }

    // =========================================================================
    // Renderer change lists
    // =========================================================================

    /// Apply node changes in order, partitioning out the genuine additions
    ///
    /// Removals only drop the node; the renderer reports the removal of
    /// connected edges as separate edge changes.
    pub fn apply_node_changes(&mut self, changes: Vec<NodeChange>) -> AppliedChanges {
        let mut applied = AppliedChanges::default();

        for change in changes {
            match change {
                NodeChange::Position { id, position, dragging } => {
                    if let Some(position) = position {
                        if self.move_node(&id, position) {
                            applied.cosmetic += 1;
                            applied.mutation |= Mutation::NODES;
                        }
                    }
                    if !dragging && self.contains_node(&id) {
                        applied.moves_finished += 1;
                    }
                }
                NodeChange::Select { id, selected } => {
                    if let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) {
                        if node.selected != selected {
                            node.selected = selected;
                            applied.cosmetic += 1;
                            applied.mutation |= Mutation::NODES;
                        }
                    }
                }
                NodeChange::Remove { id } => {
                    let removed = self.remove_nodes_by_id(
                        std::slice::from_ref(&id),
                        DanglingEdgePolicy::Retain,
                    );
                    if !removed.is_empty() {
                        applied.removed_nodes.push(id);
                        applied.mutation |= removed;
                    }
                }
                NodeChange::Add { item } => match self.add_node(item.clone()) {
                    Ok(mutation) => {
                        applied.added_nodes.push(item);
                        applied.mutation |= mutation;
                    }
                    Err(e) => log::debug!("Ignoring node addition: {}", e),
                },
            }
        }

        self.record(applied.mutation);
        applied
    }

    /// Apply edge changes in order, partitioning out the genuine additions
    ///
    /// Additions are applied as-is; callers gate new connections through
    /// the validator before handing them over.
    pub fn apply_edge_changes(&mut self, changes: Vec<EdgeChange>) -> AppliedChanges {
        let mut applied = AppliedChanges::default();

        for change in changes {
            match change {
                EdgeChange::Select { id, selected } => {
                    if let Some(edge) = self.edges.iter_mut().find(|e| e.id == id) {
                        if edge.selected != selected {
                            edge.selected = selected;
                            applied.cosmetic += 1;
                            applied.mutation |= Mutation::EDGES;
                        }
                    }
                }
                EdgeChange::Remove { id } => {
                    let before = self.edges.len();
                    self.edges.retain(|e| e.id != id);
                    if self.edges.len() != before {
                        applied.removed_edges.push(id);
                        applied.mutation |= Mutation::EDGES;
                    }
                }
                EdgeChange::Add { item } => match self.add_edge(item.clone()) {
                    Ok(mutation) if !mutation.is_empty() => {
                        applied.added_edges.push(item);
                        applied.mutation |= mutation;
                    }
                    Ok(_) => {}
                    Err(e) => log::debug!("Ignoring edge addition: {}", e),
                },
            }
        }

        self.record(applied.mutation);
        applied
    }

    fn move_node(&mut self, id: &str, position: Position) -> bool {
        match self.nodes.iter_mut().find(|n| n.id == id) {
            Some(node) if node.position != position => {
                node.position = position;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str) -> GraphNode {
        GraphNode::new(id, "Test", Position::default())
    }

    fn edge(source: &str, target: &str) -> GraphEdge {
        GraphEdge::from_endpoints(EdgeEndpoints::new(source, "out", target, "in"))
    }

    fn store_with(ids: &[&str]) -> GraphStore {
        let mut store = GraphStore::new();
        for id in ids {
            store.add_node(node(id)).unwrap();
        }
        store.take_dirty();
        store
    }

    #[test]
    fn test_add_node_rejects_duplicate_id() {
        let mut store = store_with(&["a"]);
        assert!(matches!(store.add_node(node("a")), Err(SyncError::DuplicateNode(_))));
        assert_eq!(store.nodes().len(), 1);
        assert!(store.dirty().is_empty());
    }

    #[test]
    fn test_add_node_rejects_separator_in_id() {
        let mut store = store_with(&["a"]);
        assert!(matches!(store.add_node(node("a:b")), Err(SyncError::InvalidNodeId(_))));
        assert_eq!(store.nodes().len(), 1);
    }

    #[test]
    fn test_add_edge_requires_live_nodes() {
        let mut store = store_with(&["a"]);
        assert!(matches!(store.add_edge(edge("a", "ghost")), Err(SyncError::UnknownNode(_))));

        store.add_node(node("b")).unwrap();
        assert_eq!(store.add_edge(edge("a", "b")).unwrap(), Mutation::EDGES);
        assert_eq!(store.add_edge(edge("a", "b")).unwrap(), Mutation::NONE);
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.take_dirty(), Mutation::BOTH);
        assert!(store.dirty().is_empty());
    }

    #[test]
    fn test_remove_edges_by_endpoints_is_idempotent() {
        let mut store = store_with(&["a", "b", "c"]);
        store.add_edge(edge("a", "b")).unwrap();
        store.add_edge(edge("b", "c")).unwrap();
        store.take_dirty();

        let removal = vec![EdgeEndpoints::new("a", "out", "b", "in")];
        assert_eq!(store.remove_edges_by_endpoints(&removal), Mutation::EDGES);
        let after_first = store.edges().to_vec();

        assert_eq!(store.remove_edges_by_endpoints(&removal), Mutation::NONE);
        assert_eq!(store.edges(), after_first.as_slice());
    }

    #[test]
    fn test_remove_edges_matches_full_tuple() {
        let mut store = store_with(&["a", "b"]);
        store.add_edge(edge("a", "b")).unwrap();
        let wrong_handle = vec![EdgeEndpoints::new("a", "out", "b", "other")];
        assert_eq!(store.remove_edges_by_endpoints(&wrong_handle), Mutation::NONE);
        assert_eq!(store.edges().len(), 1);
    }

    #[test]
    fn test_remove_nodes_prune_and_retain() {
        let mut store = store_with(&["a", "b", "c"]);
        store.add_edge(edge("a", "b")).unwrap();
        store.add_edge(edge("b", "c")).unwrap();
        let mut retained = store.clone();

        let mutation = store.remove_nodes_by_id(&["c".to_string()], DanglingEdgePolicy::Prune);
        assert_eq!(mutation, Mutation::BOTH);
        assert_eq!(store.edges().len(), 1);
        assert_eq!(store.edges()[0].id, "a:out:b:in");

        let mutation = retained.remove_nodes_by_id(&["c".to_string()], DanglingEdgePolicy::Retain);
        assert_eq!(mutation, Mutation::NODES);
        assert_eq!(retained.edges().len(), 2);
    }

    #[test]
    fn test_apply_node_changes_partitions_additions() {
        let mut store = store_with(&["a"]);
        let changes = vec![
            NodeChange::Position {
                id: "a".into(),
                position: Some(Position::new(5.0, 5.0)),
                dragging: true,
            },
            NodeChange::Position {
                id: "a".into(),
                position: Some(Position::new(6.0, 5.0)),
                dragging: true,
            },
            NodeChange::Select {
                id: "a".into(),
                selected: true,
            },
            NodeChange::Add { item: node("b") },
            NodeChange::Add { item: node("a") },
        ];

        let applied = store.apply_node_changes(changes);
        assert_eq!(applied.added_nodes.len(), 1);
        assert_eq!(applied.added_nodes[0].id, "b");
        assert_eq!(applied.cosmetic, 3);
        assert!(applied.has_additions());
        assert_eq!(store.find_node("a").unwrap().position, Position::new(6.0, 5.0));
        assert!(store.find_node("a").unwrap().selected);
        assert_eq!(store.dirty(), Mutation::NODES);
    }

    #[test]
    fn test_move_only_changes_are_not_structural() {
        let mut store = store_with(&["a"]);
        let applied = store.apply_node_changes(vec![NodeChange::Position {
            id: "a".into(),
            position: Some(Position::new(1.0, 1.0)),
            dragging: true,
        }]);
        assert!(!applied.is_structural());
        assert_eq!(applied.mutation, Mutation::NODES);
    }

    #[test]
    fn test_drag_end_is_counted() {
        let mut store = store_with(&["a"]);
        let applied = store.apply_node_changes(vec![
            NodeChange::Position {
                id: "a".into(),
                position: Some(Position::new(1.0, 1.0)),
                dragging: true,
            },
            NodeChange::Position {
                id: "a".into(),
                position: None,
                dragging: false,
            },
            NodeChange::Position {
                id: "ghost".into(),
                position: None,
                dragging: false,
            },
        ]);
        assert_eq!(applied.moves_finished, 1);
        assert_eq!(applied.cosmetic, 1);
    }

    #[test]
    fn test_apply_edge_changes() {
        let mut store = store_with(&["a", "b"]);
        let applied = store.apply_edge_changes(vec![
            EdgeChange::Add { item: edge("a", "b") },
            EdgeChange::Select {
                id: "a:out:b:in".into(),
                selected: true,
            },
        ]);
        assert_eq!(applied.added_edges.len(), 1);
        assert_eq!(applied.cosmetic, 1);

        let applied = store.apply_edge_changes(vec![EdgeChange::Remove {
            id: "a:out:b:in".into(),
        }]);
        assert_eq!(applied.removed_edges, vec!["a:out:b:in".to_string()]);
        assert!(store.edges().is_empty());
    }

    #[test]
    fn test_update_node_data_merges_objects() {
        let mut store = store_with(&["a"]);
        store
            .update_node_data("a", serde_json::json!({"text": "hello"}))
            .unwrap();
        let data = &store.find_node("a").unwrap().data;
        assert_eq!(data["text"], "hello");
        assert_eq!(data["label"], "Test");

        assert!(store.update_node_data("ghost", serde_json::json!({})).is_err());
    }

    #[test]
    fn test_from_snapshot_starts_dirty() {
        let store = GraphStore::from_snapshot(GraphSnapshot {
            nodes: vec![node("a")],
            edges: vec![],
        });
        assert_eq!(store.dirty(), Mutation::BOTH);
    }
}
