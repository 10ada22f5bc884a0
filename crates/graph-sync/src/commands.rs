//! Backend-originated commands
//!
//! The backend mutates the UI graph by sending tagged command objects over
//! a single-subscriber channel. The dispatcher decodes each message and
//! maps it onto exactly one store mutator. Unknown tags and lookup failures
//! are logged and skipped; nothing here is fatal to the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::ports::PortCatalog;
use crate::registry::NodeClassRegistry;
use crate::store::{GraphStore, Mutation};
use crate::types::{EdgeEndpoints, EdgeStyle, GraphEdge, GraphNode, NodeId, Position};

pub use crate::store::DanglingEdgePolicy;

/// Command tags understood by the dispatcher
const KNOWN_ACTIONS: [&str; 4] = ["NodeCreation", "NodesRemoval", "EdgesCreation", "EdgesRemoval"];

/// A mutation requested by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum BackendCommand {
    /// Create a node of a palette class at a graph position
    NodeCreation {
        #[serde(alias = "node_name")]
        node_id: NodeId,
        x: f64,
        y: f64,
        #[serde(alias = "node_class_name")]
        class_name: String,
    },

    /// Remove nodes by id
    NodesRemoval {
        #[serde(alias = "nodes_names")]
        node_ids: Vec<NodeId>,
    },

    /// Create edges; ids are supplied by the backend
    EdgesCreation { edges: Vec<GraphEdge> },

    /// Remove edges matched by their endpoint tuples
    EdgesRemoval { edges: Vec<EdgeEndpoints> },
}

impl BackendCommand {
    pub fn action(&self) -> &'static str {
        match self {
            BackendCommand::NodeCreation { .. } => "NodeCreation",
            BackendCommand::NodesRemoval { .. } => "NodesRemoval",
            BackendCommand::EdgesCreation { .. } => "EdgesCreation",
            BackendCommand::EdgesRemoval { .. } => "EdgesRemoval",
        }
    }
}

/// Decode a raw inbound message into a command
///
/// Distinguishes unknown tags (ignorable) from known tags with a bad payload.
pub fn decode_command(message: &serde_json::Value) -> Result<BackendCommand> {
    let action = message
        .get("action")
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| SyncError::MalformedCommand("missing 'action' tag".to_string()))?;

    if !KNOWN_ACTIONS.contains(&action) {
        return Err(SyncError::UnknownCommand(action.to_string()));
    }

    serde_json::from_value(message.clone())
        .map_err(|e| SyncError::MalformedCommand(format!("{}: {}", action, e)))
}

/// Applies backend commands to the store and port catalog
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    registry: Arc<NodeClassRegistry>,
    policy: DanglingEdgePolicy,
    registered: Arc<AtomicBool>,
}

/// Proof of the dispatcher's single active subscription
///
/// Dropping it releases the subscription (the session unmounted).
#[derive(Debug)]
pub struct Registration {
    flag: Arc<AtomicBool>,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
        log::debug!("Command dispatcher unregistered");
    }
}

impl CommandDispatcher {
    pub fn new(registry: Arc<NodeClassRegistry>) -> Self {
        Self {
            registry,
            policy: DanglingEdgePolicy::default(),
            registered: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set what happens to edges of removed nodes
    pub fn with_policy(mut self, policy: DanglingEdgePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DanglingEdgePolicy {
        self.policy
    }

    pub fn registry(&self) -> &NodeClassRegistry {
        &self.registry
    }

    /// Claim the inbound command channel
    ///
    /// Fails while a previous registration is still alive, so the same
    /// command can never be applied by two subscribers.
    pub fn register(&self) -> Result<Registration> {
        if self
            .registered
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::AlreadyRegistered);
        }
        log::debug!("Command dispatcher registered");
        Ok(Registration {
            flag: Arc::clone(&self.registered),
        })
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    /// Decode and apply a raw inbound message
    ///
    /// Unknown or malformed messages are logged and ignored.
    pub fn handle_message(
        &self,
        message: &serde_json::Value,
        store: &mut GraphStore,
        catalog: &mut PortCatalog,
    ) -> Mutation {
        match decode_command(message) {
            Ok(command) => self.handle_command(command, store, catalog),
            Err(SyncError::UnknownCommand(action)) => {
                log::warn!("Ignoring unknown backend command '{}'", action);
                Mutation::NONE
            }
            Err(e) => {
                log::warn!("Ignoring backend command: {}", e);
                Mutation::NONE
            }
        }
    }

    /// Apply one command to the store
    pub fn handle_command(
        &self,
        command: BackendCommand,
        store: &mut GraphStore,
        catalog: &mut PortCatalog,
    ) -> Mutation {
        log::debug!("Applying backend command {}", command.action());
        match command {
            BackendCommand::NodeCreation {
                node_id,
                x,
                y,
                class_name,
            } => self.create_node(node_id, Position::new(x, y), class_name, store, catalog),
            BackendCommand::NodesRemoval { node_ids } => {
                let mutation = store.remove_nodes_by_id(&node_ids, self.policy);
                for id in &node_ids {
                    catalog.remove(id);
                }
                mutation
            }
            BackendCommand::EdgesCreation { edges } => {
                let mut mutation = Mutation::NONE;
                for edge in edges {
                    let edge = with_restriction_style(edge, catalog);
                    match store.add_edge(edge) {
                        Ok(m) => mutation |= m,
                        Err(e) => log::warn!("Skipping backend edge: {}", e),
                    }
                }
                mutation
            }
            BackendCommand::EdgesRemoval { edges } => store.remove_edges_by_endpoints(&edges),
        }
    }

    fn create_node(
        &self,
        node_id: NodeId,
        position: Position,
        class_name: String,
        store: &mut GraphStore,
        catalog: &mut PortCatalog,
    ) -> Mutation {
        let mut node = GraphNode::new(node_id.clone(), class_name.clone(), position);
        if let Some(class) = self.registry.get(&class_name) {
            node.data = class.instance_data();
        }

        match store.add_node(node) {
            Ok(mutation) => {
                self.registry.install_ports(catalog, &node_id, &class_name);
                mutation
            }
            Err(SyncError::DuplicateNode(id)) => {
                log::debug!("Node '{}' already exists, ignoring re-issued creation", id);
                Mutation::NONE
            }
            Err(e) => {
                log::warn!("Failed to create node '{}': {}", node_id, e);
                Mutation::NONE
            }
        }
    }
}

/// Give an unstyled edge the stroke colour of its source port restriction
fn with_restriction_style(mut edge: GraphEdge, catalog: &PortCatalog) -> GraphEdge {
    if edge.style.is_none() {
        let color = catalog
            .resolve(&edge.source, &edge.source_handle)
            .and_then(|port| port.restriction_color());
        edge.style = color.map(|c| EdgeStyle {
            stroke: Some(c.to_string()),
        });
    }
    edge
}
