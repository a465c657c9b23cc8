//! Type registry mapping class ids to node classes

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::graph::NodeError;

use super::{InterfaceSet, NodeClass, NodeType};

/// Prefix of the ids built-in classes are registered under
pub const BUILTIN_PREFIX: &str = "urn:X-protoscene:node:";

/// Registry id of the built-in class `name`
pub fn builtin_id(name: &str) -> String {
    format!("{}{}", BUILTIN_PREFIX, name)
}

/// Errors that can occur during registry operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// No class registered under the id
    #[error("node class not found: {id}")]
    NotFound { id: String },

    /// A class is already registered under the id
    #[error("duplicate node class: {id}")]
    Duplicate { id: String },

    /// The requested interfaces are not all supported by the class
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Node classes of one runtime context, keyed by id
#[derive(Debug, Default)]
pub struct TypeRegistry {
    classes: HashMap<String, Arc<dyn NodeClass>>,
}

impl TypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class under its own id
    pub fn register(&mut self, class: Arc<dyn NodeClass>) -> Result<(), RegistryError> {
        let id = class.id().to_string();
        if self.classes.contains_key(&id) {
            return Err(RegistryError::Duplicate { id });
        }
        log::debug!("registered node class {}", id);
        self.classes.insert(id, class);
        Ok(())
    }

    /// Get a class by id
    pub fn lookup(&self, id: &str) -> Result<Arc<dyn NodeClass>, RegistryError> {
        self.classes
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound { id: id.to_string() })
    }

    /// Check if a class is registered
    pub fn contains(&self, id: &str) -> bool {
        self.classes.contains_key(id)
    }

    /// Create a type named `type_id` of class `class_id` exposing `interfaces`
    pub fn create_type(
        &self,
        class_id: &str,
        type_id: &str,
        interfaces: InterfaceSet,
    ) -> Result<NodeType, RegistryError> {
        let class = self.lookup(class_id)?;
        Ok(NodeType::new(class, type_id, interfaces)?)
    }

    /// Create a type exposing every interface of the class
    pub fn create_full_type(&self, class_id: &str, type_id: &str) -> Result<NodeType, RegistryError> {
        Ok(NodeType::full(self.lookup(class_id)?, type_id))
    }

    /// Sorted ids of all registered classes
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.classes.keys().map(|s| s.as_str()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}
