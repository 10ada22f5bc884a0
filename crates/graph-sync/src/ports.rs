//! Port descriptors and the per-node port catalog
//!
//! The catalog is supplied by the backend and is read-only from the
//! validator's point of view. It may change between events, so callers
//! resolve ports against the current catalog every time instead of
//! caching descriptors.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::types::{NodeId, EDGE_ID_SEPARATOR};

/// Whether the port receives or emits connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    /// Inbound port
    Target,
    /// Outbound port
    Source,
}

/// Edge of the node box the port sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSide {
    Top,
    Bottom,
    Right,
    Left,
}

fn default_restriction_color() -> String {
    "#000".to_string()
}

/// Compatibility tag restricting what a port may be plugged into
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRestriction {
    /// Restriction class; only ports sharing it may be linked
    pub class: String,
    /// Stroke colour given to edges leaving a port with this restriction
    #[serde(default = "default_restriction_color")]
    pub color: String,
}

impl PortRestriction {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            color: default_restriction_color(),
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }
}

/// Full description of one port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortDescriptor {
    pub direction: PortDirection,
    pub side: PortSide,
    /// Unique within the owning node
    pub name: String,
    /// Render the port name next to the handle
    #[serde(default)]
    pub display_name: bool,
    /// Label placement offset in pixels; `None` centers the handle
    #[serde(default)]
    pub offset: Option<f64>,
    /// Maximum simultaneous connections; `None` is unlimited
    #[serde(default)]
    pub connection_limit: Option<usize>,
    /// `None` places the port in the shared default class
    #[serde(default)]
    pub restriction: Option<PortRestriction>,
}

impl PortDescriptor {
    fn new(direction: PortDirection, side: PortSide, name: impl Into<String>) -> Self {
        Self {
            direction,
            side,
            name: name.into(),
            display_name: false,
            offset: None,
            connection_limit: None,
            restriction: None,
        }
    }

    /// Create an inbound port
    pub fn target(name: impl Into<String>, side: PortSide) -> Self {
        Self::new(PortDirection::Target, side, name)
    }

    /// Create an outbound port
    pub fn source(name: impl Into<String>, side: PortSide) -> Self {
        Self::new(PortDirection::Source, side, name)
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_connection_limit(mut self, limit: usize) -> Self {
        self.connection_limit = Some(limit);
        self
    }

    pub fn with_restriction(mut self, restriction: PortRestriction) -> Self {
        self.restriction = Some(restriction);
        self
    }

    /// Display the port name on the node
    ///
    /// Only left/right ports with an offset can show their name.
    pub fn show_name(mut self) -> Result<Self> {
        self.display_name = true;
        self.check()?;
        Ok(self)
    }

    /// Check the construction rules of a descriptor (e.g. one decoded from JSON)
    pub fn check(&self) -> Result<()> {
        if self.name.contains(EDGE_ID_SEPARATOR) {
            return Err(SyncError::invalid_port(&self.name, "name must not contain ':'"));
        }
        if self.display_name {
            if matches!(self.side, PortSide::Top | PortSide::Bottom) {
                return Err(SyncError::invalid_port(
                    &self.name,
                    "name can only be displayed on left or right ports",
                ));
            }
            if self.offset.is_none() {
                return Err(SyncError::invalid_port(
                    &self.name,
                    "name can only be displayed when an offset is provided",
                ));
            }
        }
        Ok(())
    }

    /// Restriction class, `None` meaning the shared default class
    pub fn restriction_class(&self) -> Option<&str> {
        self.restriction.as_ref().map(|r| r.class.as_str())
    }

    /// Restriction colour, if any
    pub fn restriction_color(&self) -> Option<&str> {
        self.restriction.as_ref().map(|r| r.color.as_str())
    }

    /// Whether two ports share a restriction class (explicit or both default)
    pub fn is_compatible_with(&self, other: &PortDescriptor) -> bool {
        self.restriction_class() == other.restriction_class()
    }
}

/// Per-node ordered port lists, indexed by node id
///
/// Node ids and port lists are kept in parallel, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortCatalog {
    node_ids: Vec<NodeId>,
    ports: Vec<Vec<PortDescriptor>>,
}

impl PortCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the port list of a node
    pub fn insert(&mut self, node_id: impl Into<String>, ports: Vec<PortDescriptor>) {
        let node_id = node_id.into();
        match self.index_of(&node_id) {
            Some(index) => self.ports[index] = ports,
            None => {
                self.node_ids.push(node_id);
                self.ports.push(ports);
            }
        }
    }

    /// Drop a node's ports, returning them if the node was known
    pub fn remove(&mut self, node_id: &str) -> Option<Vec<PortDescriptor>> {
        let index = self.index_of(node_id)?;
        self.node_ids.remove(index);
        Some(self.ports.remove(index))
    }

    /// Ports of a node, in declaration order
    pub fn ports_of(&self, node_id: &str) -> Option<&[PortDescriptor]> {
        self.index_of(node_id).map(|i| self.ports[i].as_slice())
    }

    /// Look up one port of one node
    pub fn resolve(&self, node_id: &str, port_name: &str) -> Option<&PortDescriptor> {
        self.ports_of(node_id)?.iter().find(|p| p.name == port_name)
    }

    pub fn contains_node(&self, node_id: &str) -> bool {
        self.index_of(node_id).is_some()
    }

    pub fn node_ids(&self) -> &[NodeId] {
        &self.node_ids
    }

    pub fn len(&self) -> usize {
        self.node_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_ids.is_empty()
    }

    pub fn clear(&mut self) {
        self.node_ids.clear();
        self.ports.clear();
    }

    fn index_of(&self, node_id: &str) -> Option<usize> {
        self.node_ids.iter().position(|id| id == node_id)
    }
}

/// Resolve a port descriptor, `None` when the node or port is absent
///
/// Callers treat `None` as "reject the operation".
pub fn resolve_port<'a>(
    node_id: &str,
    port_name: &str,
    catalog: &'a PortCatalog,
) -> Option<&'a PortDescriptor> {
    catalog.resolve(node_id, port_name)
}
