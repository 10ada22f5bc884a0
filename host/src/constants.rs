//! Host-wide constants
//!
//! Single source of truth for configuration defaults.

/// Default values for host configuration
pub mod defaults {
    /// Cycle avoidance is enforced unless the backend turns it off
    pub const ALLOW_EDGE_LOOPS: bool = false;
    /// Palette side bar starts visible
    pub const DISPLAY_SIDE_BAR: bool = true;
    /// Prefix of ids synthesized for dropped nodes
    pub const NODE_ID_PREFIX: &str = "dndnode_";
    /// Undo history depth
    pub const MAX_SNAPSHOTS: usize = 100;
    /// env_logger filter when none is configured
    pub const LOG_FILTER: &str = "info";
}

/// Configuration file locations
pub mod paths {
    /// Config file read when no path is given on the command line
    pub const CONFIG_FILE: &str = "graph-sync.json";
}
