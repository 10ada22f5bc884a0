//! Backend-side view of the editor graph
//!
//! [`BackendGraph`] is the authoritative side of the link: it validates
//! requests against what it knows, turns them into commands for the
//! session, and observes the session's outbound messages. Mirror pushes are
//! diffed against the previous copy so callers can react to discrete
//! events instead of whole sequences.

use std::collections::HashMap;
use std::sync::Arc;

use graph_sync::{
    diff_edges, diff_nodes, BackendCommand, EdgeEndpoints, GraphEdge, GraphEvent, GraphEventKind, GraphNode,
    NodeClassRegistry, NodeId, OutboundMessage, PortCatalog,
};
use tokio::sync::mpsc;

use crate::session::SessionInput;

/// Callback invoked for one kind of graph event
pub type EventCallback = Box<dyn Fn(&GraphEvent) + Send + Sync>;

/// Errors raised by backend requests; nothing is sent when one occurs
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Unknown node class: {0}")]
    UnknownClass(String),
    #[error("Node '{0}' already exists")]
    DuplicateNode(String),
    #[error("Node '{0}' is unknown")]
    UnknownNode(String),
    #[error("Port '{port}' not present on node '{node_id}'")]
    UnknownPort { node_id: String, port: String },
    #[error("Edge '{0}' is not in the current edges list")]
    UnknownEdge(String),
    #[error("Session channel closed")]
    Disconnected,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Authoritative model of the graph shown by one editor session
pub struct BackendGraph {
    registry: Arc<NodeClassRegistry>,
    session: mpsc::UnboundedSender<SessionInput>,
    /// Ports of every node the backend created or saw appear in the UI
    known: PortCatalog,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    callbacks: HashMap<GraphEventKind, Vec<EventCallback>>,
}

impl BackendGraph {
    pub fn new(registry: Arc<NodeClassRegistry>, session: mpsc::UnboundedSender<SessionInput>) -> Self {
        Self {
            registry,
            session,
            known: PortCatalog::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            callbacks: HashMap::new(),
        }
    }

    /// Last node sequence pushed by the session
    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    /// Last edge sequence pushed by the session
    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    /// Ids of the nodes the backend knows about
    pub fn node_ids(&self) -> &[NodeId] {
        self.known.node_ids()
    }

    /// Register a callback for one event kind
    pub fn on_event<F>(&mut self, kind: GraphEventKind, callback: F)
    where
        F: Fn(&GraphEvent) + Send + Sync + 'static,
    {
        self.callbacks.entry(kind).or_default().push(Box::new(callback));
    }

    /// Create a node of a registered class
    pub fn add_node(&mut self, node_id: &str, class_name: &str, x: f64, y: f64) -> Result<(), BackendError> {
        if !self.registry.has_class(class_name) {
            return Err(BackendError::UnknownClass(class_name.to_string()));
        }
        if self.known.contains_node(node_id) {
            return Err(BackendError::DuplicateNode(node_id.to_string()));
        }

        self.send(BackendCommand::NodeCreation {
            node_id: node_id.to_string(),
            x,
            y,
            class_name: class_name.to_string(),
        })?;
        self.registry.install_ports(&mut self.known, node_id, class_name);
        Ok(())
    }

    /// Remove nodes; every id must be known
    pub fn remove_nodes(&mut self, node_ids: Vec<NodeId>) -> Result<(), BackendError> {
        if let Some(unknown) = node_ids.iter().find(|id| !self.known.contains_node(id)) {
            return Err(BackendError::UnknownNode(unknown.clone()));
        }

        self.send(BackendCommand::NodesRemoval {
            node_ids: node_ids.clone(),
        })?;
        for id in &node_ids {
            self.known.remove(id);
        }
        Ok(())
    }

    /// Create edges between known nodes and ports
    pub fn add_edges(&mut self, edges: Vec<EdgeEndpoints>) -> Result<(), BackendError> {
        for edge in &edges {
            self.check_port(&edge.source, &edge.source_handle)?;
            self.check_port(&edge.target, &edge.target_handle)?;
        }

        self.send(BackendCommand::EdgesCreation {
            edges: edges.into_iter().map(GraphEdge::from_endpoints).collect(),
        })
    }

    /// Remove edges; every edge must be in the current mirror
    pub fn remove_edges(&mut self, edges: Vec<EdgeEndpoints>) -> Result<(), BackendError> {
        if let Some(missing) = edges
            .iter()
            .find(|ep| !self.edges.iter().any(|e| e.matches(ep)))
        {
            return Err(BackendError::UnknownEdge(missing.edge_id()));
        }
        self.send(BackendCommand::EdgesRemoval { edges })
    }

    /// Remove every edge, then every node
    pub fn clear(&mut self) -> Result<(), BackendError> {
        let edges: Vec<EdgeEndpoints> = self.edges.iter().map(GraphEdge::endpoints).collect();
        if !edges.is_empty() {
            self.remove_edges(edges)?;
        }
        let nodes = self.known.node_ids().to_vec();
        if !nodes.is_empty() {
            self.remove_nodes(nodes)?;
        }
        Ok(())
    }

    /// Process one outbound message from the session
    ///
    /// Returns the graph events derived from mirror pushes, after every
    /// matching callback has run.
    pub fn observe(&mut self, message: &OutboundMessage) -> Result<Vec<GraphEvent>, BackendError> {
        let events = match message {
            OutboundMessage::MirrorNodes { nodes } => {
                let events = diff_nodes(&self.nodes, nodes);
                self.nodes = nodes.clone();
                for event in &events {
                    match event {
                        GraphEvent::NodeCreated { node_id } => {
                            if let Some(node) = nodes.iter().find(|n| &n.id == node_id) {
                                self.adopt(node);
                            }
                        }
                        GraphEvent::NodeDeleted { node_id } => {
                            self.known.remove(node_id);
                        }
                        _ => {}
                    }
                }
                events
            }
            OutboundMessage::NodeChange { nodes } => {
                for node in nodes {
                    self.adopt(node);
                }
                Vec::new()
            }
            OutboundMessage::MirrorEdges { edges } => {
                let events = diff_edges(&self.edges, edges);
                self.edges = edges.clone();
                events
            }
            OutboundMessage::NewNode {
                node_id,
                node_type,
                x,
                y,
            } => {
                if self.registry.has_class(node_type) {
                    log::info!("Creating node of type {}", node_type);
                    self.add_node(node_id, node_type, *x, *y)?;
                } else {
                    log::warn!("Dropped node '{}' has unknown class '{}'", node_id, node_type);
                }
                Vec::new()
            }
            other => {
                log::debug!("Backend observed {:?}", other);
                Vec::new()
            }
        };

        for event in &events {
            if let Some(callbacks) = self.callbacks.get(&event.kind()) {
                for callback in callbacks {
                    callback(event);
                }
            }
        }
        Ok(events)
    }

    /// Start tracking a node the UI created on its own
    fn adopt(&mut self, node: &GraphNode) {
        if !self.known.contains_node(&node.id) {
            log::debug!("Adopting node '{}' of type {}", node.id, node.node_type);
            self.registry.install_ports(&mut self.known, &node.id, &node.node_type);
        }
    }

    fn check_port(&self, node_id: &str, port: &str) -> Result<(), BackendError> {
        let ports = self
            .known
            .ports_of(node_id)
            .ok_or_else(|| BackendError::UnknownNode(node_id.to_string()))?;
        if !ports.iter().any(|p| p.name == port) {
            return Err(BackendError::UnknownPort {
                node_id: node_id.to_string(),
                port: port.to_string(),
            });
        }
        Ok(())
    }

    fn send(&self, command: BackendCommand) -> Result<(), BackendError> {
        let message = serde_json::to_value(&command)?;
        self.session
            .send(SessionInput::Command { message })
            .map_err(|_| BackendError::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodes::{builtin_registry, PORT_INPUT, PORT_OUTPUT};
    use graph_sync::Position;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn backend() -> (BackendGraph, mpsc::UnboundedReceiver<SessionInput>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (BackendGraph::new(Arc::new(builtin_registry()), tx), rx)
    }

    fn command(rx: &mut mpsc::UnboundedReceiver<SessionInput>) -> serde_json::Value {
        match rx.try_recv().unwrap() {
            SessionInput::Command { message } => message,
            other => panic!("unexpected input {:?}", other),
        }
    }

    #[test]
    fn test_add_node_sends_creation() {
        let (mut backend, mut rx) = backend();
        backend.add_node("1", "Print", 5.0, 6.0).unwrap();
        let message = command(&mut rx);
        assert_eq!(message["action"], "NodeCreation");
        assert_eq!(message["node_id"], "1");
        assert_eq!(message["class_name"], "Print");

        assert!(matches!(backend.add_node("1", "Print", 0.0, 0.0), Err(BackendError::DuplicateNode(_))));
        assert!(matches!(backend.add_node("2", "Nope", 0.0, 0.0), Err(BackendError::UnknownClass(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_requests_are_checked_before_sending() {
        let (mut backend, mut rx) = backend();
        backend.add_node("t", "Text Input", 0.0, 0.0).unwrap();
        backend.add_node("p", "Print", 0.0, 0.0).unwrap();
        command(&mut rx);
        command(&mut rx);

        assert!(matches!(backend.remove_nodes(vec!["ghost".into()]), Err(BackendError::UnknownNode(_))));
        assert!(matches!(
            backend.add_edges(vec![EdgeEndpoints::new("t", "Bogus", "p", PORT_INPUT)]),
            Err(BackendError::UnknownPort { .. })
        ));
        assert!(matches!(
            backend.remove_edges(vec![EdgeEndpoints::new("t", PORT_OUTPUT, "p", PORT_INPUT)]),
            Err(BackendError::UnknownEdge(_))
        ));
        assert!(rx.try_recv().is_err());

        backend
            .add_edges(vec![EdgeEndpoints::new("t", PORT_OUTPUT, "p", PORT_INPUT)])
            .unwrap();
        let message = command(&mut rx);
        assert_eq!(message["edges"][0]["id"], "t:Output:p:Input");
    }

    #[test]
    fn test_observe_dispatches_callbacks() {
        let (mut backend, _rx) = backend();
        let moved = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&moved);
        backend.on_event(GraphEventKind::NodeMoved, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let node = GraphNode::new("a", "Print", Position::default());
        backend
            .observe(&OutboundMessage::MirrorNodes {
                nodes: vec![node.clone()],
            })
            .unwrap();
        let mut dragged = node;
        dragged.position = Position::new(10.0, 0.0);
        let events = backend
            .observe(&OutboundMessage::MirrorNodes { nodes: vec![dragged] })
            .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(moved.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_node_is_registered() {
        let (mut backend, mut rx) = backend();
        backend
            .observe(&OutboundMessage::NewNode {
                node_id: "dndnode_7".into(),
                node_type: "Button".into(),
                x: 1.0,
                y: 2.0,
            })
            .unwrap();
        assert_eq!(backend.node_ids(), ["dndnode_7".to_string()]);
        assert_eq!(command(&mut rx)["action"], "NodeCreation");
    }

    #[test]
    fn test_ui_deletion_forgets_node() {
        let (mut backend, _rx) = backend();
        backend.add_node("a", "Print", 0.0, 0.0).unwrap();
        backend
            .observe(&OutboundMessage::MirrorNodes {
                nodes: vec![GraphNode::new("a", "Print", Position::default())],
            })
            .unwrap();
        backend.observe(&OutboundMessage::MirrorNodes { nodes: vec![] }).unwrap();
        assert!(backend.node_ids().is_empty());
    }

    #[test]
    fn test_nodes_added_by_the_ui_are_adopted() {
        let (mut backend, mut rx) = backend();
        backend
            .observe(&OutboundMessage::NodeChange {
                nodes: vec![GraphNode::new("x", "Print", Position::default())],
            })
            .unwrap();
        backend
            .observe(&OutboundMessage::MirrorNodes {
                nodes: vec![
                    GraphNode::new("x", "Print", Position::default()),
                    GraphNode::new("y", "Button", Position::default()),
                ],
            })
            .unwrap();
        assert_eq!(backend.node_ids(), ["x".to_string(), "y".to_string()]);

        backend.clear().unwrap();
        let message = command(&mut rx);
        assert_eq!(message["action"], "NodesRemoval");
        assert_eq!(message["node_ids"], serde_json::json!(["x", "y"]));
    }

    #[test]
    fn test_disconnected_session() {
        let (mut backend, rx) = backend();
        drop(rx);
        assert!(matches!(
            backend.add_node("a", "Print", 0.0, 0.0),
            Err(BackendError::Disconnected)
        ));
        assert!(backend.node_ids().is_empty());
    }
}
