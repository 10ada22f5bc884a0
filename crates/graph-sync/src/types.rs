//! Core types for editor graphs
//!
//! These mirror the shapes exchanged with the rendering collaborator:
//! positioned nodes with an arbitrary payload, and edges joining two named
//! ports. Field names follow the renderer's camelCase wire format.

use serde::{Deserialize, Serialize};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for an edge
pub type EdgeId = String;

/// Joins the endpoint parts of a derived edge id
pub const EDGE_ID_SEPARATOR: char = ':';

/// Name of a port, unique within its node
pub type PortName = String;

fn is_false(value: &bool) -> bool {
    !*value
}

/// A position in graph coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A node instance in the editor graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Unique, stable identifier
    pub id: NodeId,
    /// Position in the graph
    pub position: Position,
    /// Discriminator selecting the renderer (palette class name)
    #[serde(rename = "type")]
    pub node_type: String,
    /// Arbitrary payload edited inside the node body
    #[serde(default)]
    pub data: serde_json::Value,
    /// Selection state reported by the renderer
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

impl GraphNode {
    /// Create an unselected node with a `label` payload naming its type
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, position: Position) -> Self {
        let node_type = node_type.into();
        Self {
            id: id.into(),
            position,
            data: serde_json::json!({ "label": node_type }),
            node_type,
            selected: false,
        }
    }

    /// Replace the payload
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Visual attributes of an edge
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EdgeStyle {
    /// Stroke colour, taken from the port restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
}

/// The endpoint 4-tuple identifying a connection
///
/// This, not the edge id, is the key used for edge removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeEndpoints {
    pub source: NodeId,
    pub source_handle: PortName,
    pub target: NodeId,
    pub target_handle: PortName,
}

impl EdgeEndpoints {
    pub fn new(
        source: impl Into<String>,
        source_handle: impl Into<String>,
        target: impl Into<String>,
        target_handle: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        }
    }

    /// Edge id derived from the endpoints (`source:sourceHandle:target:targetHandle`)
    ///
    /// Only unambiguous while node ids and port names are free of
    /// [`EDGE_ID_SEPARATOR`]; the store and the port checks enforce that.
    pub fn edge_id(&self) -> EdgeId {
        let sep = EDGE_ID_SEPARATOR;
        format!(
            "{}{sep}{}{sep}{}{sep}{}",
            self.source, self.source_handle, self.target, self.target_handle
        )
    }

    /// Whether the connection starts and ends on the same node
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// A directed connection between two named ports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    /// Identifier, derived from the endpoints or supplied by the backend
    pub id: EdgeId,
    pub source: NodeId,
    pub source_handle: PortName,
    pub target: NodeId,
    pub target_handle: PortName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<EdgeStyle>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub selected: bool,
}

impl GraphEdge {
    /// Create an unstyled edge with an id derived from its endpoints
    pub fn from_endpoints(endpoints: EdgeEndpoints) -> Self {
        Self {
            id: endpoints.edge_id(),
            source: endpoints.source,
            source_handle: endpoints.source_handle,
            target: endpoints.target,
            target_handle: endpoints.target_handle,
            style: None,
            selected: false,
        }
    }

    /// The endpoint 4-tuple of this edge
    pub fn endpoints(&self) -> EdgeEndpoints {
        EdgeEndpoints::new(
            self.source.clone(),
            self.source_handle.clone(),
            self.target.clone(),
            self.target_handle.clone(),
        )
    }

    /// Whether this edge joins exactly the given endpoints
    pub fn matches(&self, endpoints: &EdgeEndpoints) -> bool {
        self.source == endpoints.source
            && self.source_handle == endpoints.source_handle
            && self.target == endpoints.target
            && self.target_handle == endpoints.target_handle
    }

    /// Whether this edge touches the given node on either end
    pub fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

/// The pair (nodes, edges) at one instant
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Find an edge by its endpoints
    pub fn find_edge(&self, endpoints: &EdgeEndpoints) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| e.matches(endpoints))
    }
}
