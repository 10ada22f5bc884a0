//! Host configuration storage
//!
//! A single JSON file; every field is optional and falls back to the
//! defaults in [`crate::constants::defaults`].

use std::path::Path;

use graph_sync::{DanglingEdgePolicy, ValidationConfig};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::constants::defaults;

/// Editor behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Skip cycle avoidance when validating connections
    pub allow_edge_loops: bool,
    /// Show the palette side bar
    pub display_side_bar: bool,
    /// What `NodesRemoval` does with edges of removed nodes
    pub dangling_edges: DanglingEdgePolicy,
    /// Prefix of ids given to dropped nodes
    pub node_id_prefix: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            allow_edge_loops: defaults::ALLOW_EDGE_LOOPS,
            display_side_bar: defaults::DISPLAY_SIDE_BAR,
            dangling_edges: DanglingEdgePolicy::default(),
            node_id_prefix: defaults::NODE_ID_PREFIX.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn validation(&self) -> ValidationConfig {
        ValidationConfig::with_edge_loops(self.allow_edge_loops)
    }
}

/// Undo/redo history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub max_snapshots: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_snapshots: defaults::MAX_SNAPSHOTS,
        }
    }
}

/// Full host configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub editor: EditorConfig,
    pub history: HistoryConfig,
    /// env_logger filter used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            editor: EditorConfig::default(),
            history: HistoryConfig::default(),
            log_filter: defaults::LOG_FILTER.to_string(),
        }
    }
}

impl HostConfig {
    /// Load configuration from disk, falling back to defaults when absent
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        if !fs::try_exists(path).await? {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).await?;
        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration to disk
    pub async fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).await?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        fs::write(path, contents).await?;

        log::info!("Configuration saved to {:?}", path);
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}
