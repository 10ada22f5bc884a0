//! Drag-and-drop node creation from the palette

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::Result;
use crate::events::{EventSink, OutboundMessage};
use crate::ports::PortCatalog;
use crate::registry::NodeClassRegistry;
use crate::store::GraphStore;
use crate::types::{GraphNode, NodeId, Position};

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

/// Synthesize a node id from the process-wide counter
///
/// Ids are never reused within a process, even after the node is deleted.
pub fn next_node_id(prefix: &str) -> NodeId {
    let n = NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed);
    format!("{}{}", prefix, n)
}

/// Converts screen coordinates to graph coordinates
///
/// The rendering collaborator owns the viewport; the controller only asks
/// it to project drop positions.
pub trait CoordinateProjector {
    fn screen_to_graph(&self, screen: Position) -> Position;
}

/// Projector for a renderer whose screen and graph spaces coincide
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityProjector;

impl CoordinateProjector for IdentityProjector {
    fn screen_to_graph(&self, screen: Position) -> Position {
        screen
    }
}

/// Pan/zoom transform of the rendered canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Screen position of the graph origin
    pub x: f64,
    pub y: f64,
    /// Scale factor, graph units to pixels
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
        }
    }
}

impl CoordinateProjector for Viewport {
    fn screen_to_graph(&self, screen: Position) -> Position {
        let zoom = if self.zoom == 0.0 { 1.0 } else { self.zoom };
        Position::new((screen.x - self.x) / zoom, (screen.y - self.y) / zoom)
    }
}

/// Tracks the palette item being dragged and creates nodes on drop
#[derive(Debug, Clone)]
pub struct DragCreateController {
    dragged_type: Option<String>,
    prefix: String,
}

impl DragCreateController {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            dragged_type: None,
            prefix: prefix.into(),
        }
    }

    /// The user picked up a palette item
    pub fn begin_drag(&mut self, class_name: impl Into<String>) {
        self.dragged_type = Some(class_name.into());
    }

    /// The drag left the canvas without a drop
    pub fn cancel_drag(&mut self) {
        self.dragged_type = None;
    }

    pub fn dragged_type(&self) -> Option<&str> {
        self.dragged_type.as_deref()
    }

    /// Handle a drop at `screen`
    ///
    /// Returns the new node's id, or `None` when nothing was being dragged.
    pub fn on_drop(
        &mut self,
        screen: Position,
        projector: &dyn CoordinateProjector,
        store: &mut GraphStore,
        catalog: &mut PortCatalog,
        registry: &NodeClassRegistry,
        sink: &dyn EventSink,
    ) -> Result<Option<NodeId>> {
        let Some(class_name) = self.dragged_type.take() else {
            return Ok(None);
        };

        let position = projector.screen_to_graph(screen);
        let mut node_id = next_node_id(&self.prefix);
        while store.contains_node(&node_id) {
            node_id = next_node_id(&self.prefix);
        }

        let mut node = GraphNode::new(node_id.clone(), class_name.clone(), position);
        if let Some(class) = registry.get(&class_name) {
            node.data = class.instance_data();
        }
        store.add_node(node)?;
        registry.install_ports(catalog, &node_id, &class_name);
        log::debug!("Dropped '{}' as node '{}'", class_name, node_id);

        let message = OutboundMessage::NewNode {
            node_id: node_id.clone(),
            node_type: class_name,
            x: position.x,
            y: position.y,
        };
        if let Err(e) = sink.send(message) {
            log::warn!("Failed to announce new node '{}': {}", node_id, e);
        }

        Ok(Some(node_id))
    }
}

impl Default for DragCreateController {
    fn default() -> Self {
        Self::new("dndnode_")
    }
}
