//! Error types for graph synchronization

use thiserror::Error;

use crate::validation::Rejection;

/// Result type alias using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while mutating or synchronizing the graph
#[derive(Debug, Error)]
pub enum SyncError {
    /// A node with this id is already live
    #[error("Node '{0}' already exists")]
    DuplicateNode(String),

    /// A node id contains the edge id separator
    #[error("Node id '{0}' must not contain ':'")]
    InvalidNodeId(String),

    /// A referenced node is not live
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    /// A port descriptor violates its construction rules
    #[error("Invalid port '{port}': {reason}")]
    InvalidPort { port: String, reason: String },

    /// A proposed connection was refused by the validator
    #[error("Connection rejected: {0}")]
    Rejected(#[from] Rejection),

    /// An inbound command carried an unrecognised action tag
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// An inbound command could not be decoded
    #[error("Malformed command: {0}")]
    MalformedCommand(String),

    /// The command dispatcher already has an active registration
    #[error("Command dispatcher is already registered")]
    AlreadyRegistered,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),
}

impl SyncError {
    /// Create an invalid port error with a reason
    pub fn invalid_port(port: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPort {
            port: port.into(),
            reason: reason.into(),
        }
    }
}
