//! Graph Sync - state synchronization for visual node-graph editors
//!
//! This crate keeps a UI-side node graph consistent with an external,
//! authoritative backend. It provides:
//!
//! - A graph store with explicit mutation tracking (no render-timing diffs)
//! - Connection validation (self loops, cycles, port restrictions, limits)
//! - A sync bridge that mirrors local state outward without ping-pong
//! - A command dispatcher for backend-originated mutations
//! - Drag-and-drop node creation from a palette of node classes
//! - Value propagation from updated nodes through their output ports
//!
//! # Architecture
//!
//! All mutation goes through [`GraphStore`]. Mutators return a [`Mutation`]
//! describing which side (nodes, edges) changed, and the store accumulates
//! the same flags until the [`SyncBridge`] takes them on its next tick.
//! Inbound backend traffic arrives as [`BackendCommand`]s; outbound traffic
//! leaves through an [`EventSink`] as [`OutboundMessage`]s.
//!
//! # Example
//!
//! ```ignore
//! use graph_sync::{validate_connection, EdgeEndpoints, ValidationConfig};
//!
//! let candidate = EdgeEndpoints::new("a", "Output", "b", "Input");
//! match validate_connection(&candidate, store.nodes(), store.edges(), &catalog, &config) {
//!     Ok(edge) => { store.add_edge(edge)?; }
//!     Err(reason) => log::debug!("connection rejected: {}", reason),
//! }
//! ```

pub mod builder;
pub mod changes;
pub mod commands;
pub mod cycle;
pub mod diff;
pub mod drag;
pub mod error;
pub mod events;
pub mod ports;
pub mod propagation;
pub mod registry;
pub mod store;
pub mod sync;
pub mod types;
pub mod undo;
pub mod validation;

// Re-export key types
pub use builder::GraphBuilder;
pub use changes::{AppliedChanges, ChangeKind, EdgeChange, NodeChange};
pub use commands::{BackendCommand, CommandDispatcher, DanglingEdgePolicy, Registration};
pub use cycle::would_create_cycle;
pub use diff::{diff_edges, diff_nodes, diff_snapshots, GraphEvent, GraphEventKind};
pub use drag::{next_node_id, CoordinateProjector, DragCreateController, IdentityProjector, Viewport};
pub use error::{Result, SyncError};
pub use events::{ChannelEventSink, EventError, EventSink, NullEventSink, OutboundMessage, VecEventSink};
pub use ports::{resolve_port, PortCatalog, PortDescriptor, PortDirection, PortRestriction, PortSide};
pub use propagation::{propagate, propagation_order, NodeInputs, NodeUpdateFn, PortConnections};
pub use registry::{NodeClass, NodeClassFn, NodeClassRegistry};
pub use store::{GraphStore, Mutation};
pub use sync::{MirrorSlot, SyncBridge};
pub use types::{EdgeEndpoints, EdgeStyle, GraphEdge, GraphNode, GraphSnapshot, NodeId, Position, EDGE_ID_SEPARATOR};
pub use undo::UndoStack;
pub use validation::{validate_connection, Rejection, ValidationConfig};
