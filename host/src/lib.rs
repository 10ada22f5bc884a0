//! Graph Sync Host - headless editor host for graph-sync
//!
//! Wires the graph-sync engine to explicit message channels:
//!
//! - [`session`]: one mounted editor driven by a `SessionInput` channel
//! - [`backend`]: the authoritative side issuing commands and observing pushes
//! - [`nodes`]: built-in palette node classes
//! - [`config`]: JSON configuration with defaults

pub mod backend;
pub mod config;
pub mod constants;
pub mod nodes;
pub mod session;

pub use backend::{BackendError, BackendGraph, EventCallback};
pub use config::{ConfigError, EditorConfig, HistoryConfig, HostConfig};
pub use session::{run_session, EditorSession, SessionError, SessionInput};
