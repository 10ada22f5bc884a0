//! Node class registry backing the palette
//!
//! A node class names a kind of node the user can drag from the palette
//! (or the backend can create) together with the ports every instance of
//! it carries. Classes can be registered manually, or collected at link
//! time with `inventory`:
//!
//! ```ignore
//! fn print_class() -> graph_sync::NodeClass {
//!     graph_sync::NodeClass::new("Print")
//!         .with_port(PortDescriptor::target("Input", PortSide::Left))
//! }
//!
//! inventory::submit!(graph_sync::NodeClassFn(print_class));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ports::{PortCatalog, PortDescriptor};
use crate::propagation::NodeUpdateFn;

/// A kind of node available in the palette
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeClass {
    /// Palette label, also used as the node's renderer type
    pub class_name: String,
    /// Ports every instance carries
    pub ports: Vec<PortDescriptor>,
    /// Payload merged into each new instance's data
    #[serde(default)]
    pub default_data: serde_json::Value,
    /// Recomputes an instance from its plugged nodes during propagation
    #[serde(skip)]
    pub update: Option<NodeUpdateFn>,
}

impl NodeClass {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ports: Vec::new(),
            default_data: serde_json::Value::Null,
            update: None,
        }
    }

    pub fn with_port(mut self, port: PortDescriptor) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_default_data(mut self, data: serde_json::Value) -> Self {
        self.default_data = data;
        self
    }

    pub fn with_update(mut self, update: NodeUpdateFn) -> Self {
        self.update = Some(update);
        self
    }

    /// Initial payload for a new instance: the default data plus a `label`
    pub fn instance_data(&self) -> serde_json::Value {
        let mut data = match &self.default_data {
            serde_json::Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        data.entry("label")
            .or_insert_with(|| serde_json::Value::String(self.class_name.clone()));
        serde_json::Value::Object(data)
    }
}

/// Link-time registration of a node class
pub struct NodeClassFn(pub fn() -> NodeClass);

inventory::collect!(NodeClassFn);

/// Ordered set of node classes, keyed by class name
#[derive(Debug, Clone, Default)]
pub struct NodeClassRegistry {
    classes: Vec<NodeClass>,
}

impl NodeClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every class submitted via `inventory`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for class_fn in inventory::iter::<NodeClassFn> {
            let class = (class_fn.0)();
            if let Err(e) = registry.register(class) {
                log::warn!("Skipping built-in node class: {}", e);
            }
        }
        registry
    }

    /// Register a class, replacing any class with the same name
    ///
    /// Every port descriptor is checked first.
    pub fn register(&mut self, class: NodeClass) -> Result<()> {
        for port in &class.ports {
            port.check()?;
        }
        match self
            .classes
            .iter_mut()
            .find(|c| c.class_name == class.class_name)
        {
            Some(existing) => *existing = class,
            None => self.classes.push(class),
        }
        Ok(())
    }

    pub fn get(&self, class_name: &str) -> Option<&NodeClass> {
        self.classes.iter().find(|c| c.class_name == class_name)
    }

    pub fn has_class(&self, class_name: &str) -> bool {
        self.get(class_name).is_some()
    }

    /// Palette labels, in registration order
    pub fn class_names(&self) -> Vec<String> {
        self.classes.iter().map(|c| c.class_name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Install the ports of `class_name` for a new node
    ///
    /// Unknown classes leave the node without ports; returns whether the
    /// class was found.
    pub fn install_ports(&self, catalog: &mut PortCatalog, node_id: &str, class_name: &str) -> bool {
        match self.get(class_name) {
            Some(class) => {
                catalog.insert(node_id, class.ports.clone());
                true
            }
            None => {
                log::warn!(
                    "Node '{}' uses unknown class '{}', it will have no ports",
                    node_id,
                    class_name
                );
                catalog.insert(node_id, Vec::new());
                false
            }
        }
    }
}
