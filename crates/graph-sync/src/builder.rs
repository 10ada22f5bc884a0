//! Fluent builder for initial graph snapshots

use crate::error::Result;
use crate::ports::PortCatalog;
use crate::types::{EdgeEndpoints, GraphEdge, GraphNode, GraphSnapshot, Position};
use crate::validation::{validate_connection, ValidationConfig};

/// Fluent builder for constructing a [`GraphSnapshot`]
///
/// # Example
///
/// ```ignore
/// let snapshot = GraphBuilder::new()
///     .add_node("1", "Text Input", (0.0, 0.0))
///     .with_data(serde_json::json!({"text": "Hello"}))
///     .add_node("2", "Print", (200.0, 0.0))
///     .add_edge("1", "Output", "2", "Input")
///     .build_validated(&catalog, &ValidationConfig::default())?;
/// ```
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<EdgeEndpoints>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; its payload starts as `{"label": node_type}`
    pub fn add_node(
        mut self,
        id: impl Into<String>,
        node_type: impl Into<String>,
        position: (f64, f64),
    ) -> Self {
        self.nodes
            .push(GraphNode::new(id, node_type, Position::new(position.0, position.1)));
        self
    }

    /// Set data on the most recently added node
    ///
    /// Must be called immediately after `add_node`.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.data = data;
        }
        self
    }

    /// Add an edge; its id is derived from the endpoints
    pub fn add_edge(
        mut self,
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        self.edges
            .push(EdgeEndpoints::new(source, source_handle, target, target_handle));
        self
    }

    /// Build without validation
    pub fn build(self) -> GraphSnapshot {
        GraphSnapshot {
            nodes: self.nodes,
            edges: self.edges.into_iter().map(GraphEdge::from_endpoints).collect(),
        }
    }

    /// Build, running each edge through the connection validator in order
    ///
    /// Each edge is checked against the edges accepted before it, so limits
    /// and cycles are enforced on the initial graph too.
    pub fn build_validated(self, catalog: &PortCatalog, config: &ValidationConfig) -> Result<GraphSnapshot> {
        let mut edges: Vec<GraphEdge> = Vec::with_capacity(self.edges.len());
        for candidate in &self.edges {
            let edge = validate_connection(candidate, &self.nodes, &edges, catalog, config)?;
            edges.push(edge);
        }
        Ok(GraphSnapshot {
            nodes: self.nodes,
            edges,
        })
    }
}
