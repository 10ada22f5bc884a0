//! Connection validation
//!
//! Decides whether a proposed edge may be created, by combining:
//! - self-loop rejection (always on)
//! - cycle avoidance (configurable, see [`ValidationConfig::allow_edge_loops`])
//! - port resolution against the current catalog
//! - restriction-class equality
//! - per-port connection limits, counted against the current edge set
//!
//! The first failing check determines the rejection reason.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cycle::would_create_cycle;
use crate::ports::{resolve_port, PortCatalog, PortDescriptor};
use crate::types::{EdgeEndpoints, EdgeStyle, GraphEdge, GraphNode};

/// Why a proposed connection was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("node '{node_id}' cannot connect to itself")]
    SelfLoop { node_id: String },

    #[error("edge {source_id} -> {target_id} would close a cycle")]
    WouldCreateCycle { source_id: String, target_id: String },

    #[error("node '{node_id}' is not in the graph")]
    UnknownNode { node_id: String },

    #[error("port '{port}' not found on node '{node_id}'")]
    UnknownPort { node_id: String, port: String },

    #[error("restriction mismatch: {source_class:?} cannot connect to {target_class:?}")]
    RestrictionMismatch {
        source_class: Option<String>,
        target_class: Option<String>,
    },

    #[error("port '{port}' on node '{node_id}' already holds {limit} connection(s)")]
    ConnectionLimitReached {
        node_id: String,
        port: String,
        limit: usize,
    },

    #[error("ports are already connected")]
    AlreadyConnected,
}

/// Validation settings the backend may toggle at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    /// Skip cycle avoidance; direct self connections stay forbidden
    #[serde(default)]
    pub allow_edge_loops: bool,
}

impl ValidationConfig {
    pub fn with_edge_loops(allow_edge_loops: bool) -> Self {
        Self { allow_edge_loops }
    }
}

/// Number of edges currently bound to `node_id`/`port`
pub fn connection_count(edges: &[GraphEdge], node_id: &str, port: &str) -> usize {
    edges
        .iter()
        .filter(|e| {
            (e.source == node_id && e.source_handle == port)
                || (e.target == node_id && e.target_handle == port)
        })
        .count()
}

/// Validate a proposed connection against the current graph
///
/// On accept, returns the materialized edge (derived id, stroke colour
/// taken from the source port's restriction). `nodes` and `edges` must be
/// the store's current contents.
pub fn validate_connection(
    candidate: &EdgeEndpoints,
    nodes: &[GraphNode],
    edges: &[GraphEdge],
    catalog: &PortCatalog,
    config: &ValidationConfig,
) -> Result<GraphEdge, Rejection> {
    if candidate.is_self_loop() {
        return Err(Rejection::SelfLoop {
            node_id: candidate.source.clone(),
        });
    }

    for node_id in [&candidate.target, &candidate.source] {
        if !nodes.iter().any(|n| &n.id == node_id) {
            return Err(Rejection::UnknownNode {
                node_id: node_id.clone(),
            });
        }
    }

    if !config.allow_edge_loops && would_create_cycle(candidate, edges) {
        return Err(Rejection::WouldCreateCycle {
            source_id: candidate.source.clone(),
            target_id: candidate.target.clone(),
        });
    }

    let source_port = lookup(catalog, &candidate.source, &candidate.source_handle)?;
    let target_port = lookup(catalog, &candidate.target, &candidate.target_handle)?;

    if !source_port.is_compatible_with(target_port) {
        return Err(Rejection::RestrictionMismatch {
            source_class: source_port.restriction_class().map(str::to_string),
            target_class: target_port.restriction_class().map(str::to_string),
        });
    }

    if edges.iter().any(|e| e.matches(candidate)) {
        return Err(Rejection::AlreadyConnected);
    }

    check_limit(edges, &candidate.target, target_port)?;
    check_limit(edges, &candidate.source, source_port)?;

    let mut edge = GraphEdge::from_endpoints(candidate.clone());
    edge.style = source_port.restriction_color().map(|color| EdgeStyle {
        stroke: Some(color.to_string()),
    });
    Ok(edge)
}

fn lookup<'a>(
    catalog: &'a PortCatalog,
    node_id: &str,
    port: &str,
) -> Result<&'a PortDescriptor, Rejection> {
    resolve_port(node_id, port, catalog).ok_or_else(|| Rejection::UnknownPort {
        node_id: node_id.to_string(),
        port: port.to_string(),
    })
}

fn check_limit(edges: &[GraphEdge], node_id: &str, port: &PortDescriptor) -> Result<(), Rejection> {
    if let Some(limit) = port.connection_limit {
        if connection_count(edges, node_id, &port.name) >= limit {
            return Err(Rejection::ConnectionLimitReached {
                node_id: node_id.to_string(),
                port: port.name.clone(),
                limit,
            });
        }
    }
    Ok(())
}
