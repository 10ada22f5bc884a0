//! Outbound messages to the backend
//!
//! Everything the UI side tells the backend leaves through an [`EventSink`]:
//! bulk mirror pushes of the node/edge sequences, plus discrete
//! fire-and-forget notifications when the user created something.

use serde::{Deserialize, Serialize};

use crate::types::{GraphEdge, GraphNode, NodeId};

/// Trait for sending outbound messages
///
/// This abstracts over the transport (mpsc channel, stdout writer, test
/// collector) so the engine never knows how the backend is reached.
pub trait EventSink: Send + Sync {
    /// Send a message
    ///
    /// Returns an error if the message could not be sent (e.g., channel closed)
    fn send(&self, message: OutboundMessage) -> Result<(), EventError>;
}

/// Error when sending messages fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Messages sent from the UI side to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboundMessage {
    /// Full copy of the local node sequence for the backend's "nodes" slot
    MirrorNodes { nodes: Vec<GraphNode> },

    /// Full copy of the local edge sequence for the backend's "edges" slot
    MirrorEdges { edges: Vec<GraphEdge> },

    /// The user connected two ports
    Connected { edge: GraphEdge },

    /// The user added nodes through a change list
    NodeChange { nodes: Vec<GraphNode> },

    /// A node was dropped from the palette
    NewNode {
        node_id: NodeId,
        #[serde(rename = "type")]
        node_type: String,
        x: f64,
        y: f64,
    },

    /// Palette contents and side-bar visibility
    Palette { visible: bool, classes: Vec<String> },
}

impl OutboundMessage {
    /// Whether this is a bulk mirror push rather than a notification
    pub fn is_mirror_push(&self) -> bool {
        matches!(
            self,
            OutboundMessage::MirrorNodes { .. } | OutboundMessage::MirrorEdges { .. }
        )
    }
}

/// A no-op sink that discards all messages
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _message: OutboundMessage) -> Result<(), EventError> {
        Ok(())
    }
}

/// A vector-based sink that collects messages
///
/// Useful for testing to verify what was sent.
pub struct VecEventSink {
    messages: std::sync::Mutex<Vec<OutboundMessage>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self {
            messages: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Get all collected messages
    pub fn events(&self) -> Vec<OutboundMessage> {
        self.lock().clone()
    }

    /// Number of collected mirror pushes
    pub fn push_count(&self) -> usize {
        self.lock().iter().filter(|m| m.is_mirror_push()).count()
    }

    /// Clear all collected messages
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<OutboundMessage>> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for VecEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for VecEventSink {
    fn send(&self, message: OutboundMessage) -> Result<(), EventError> {
        self.lock().push(message);
        Ok(())
    }
}

/// A sink forwarding messages into a tokio unbounded channel
pub struct ChannelEventSink {
    sender: tokio::sync::mpsc::UnboundedSender<OutboundMessage>,
}

impl ChannelEventSink {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<OutboundMessage>) -> Self {
        Self { sender }
    }
}

impl EventSink for ChannelEventSink {
    fn send(&self, message: OutboundMessage) -> Result<(), EventError> {
        self.sender
            .send(message)
            .map_err(|_| EventError::channel_closed())
    }
}
