//! Name scopes

use std::collections::HashMap;

use super::NodeId;

/// A namespace binding user-assigned names to nodes
///
/// Scopes nest: every prototype instance gets a child scope of the scope
/// it was instantiated in. Lookups are local; names in a child scope never
/// shadow or leak into the parent.
#[derive(Debug, Clone)]
pub struct Scope {
    uri: String,
    parent: Option<super::ScopeId>,
    names: HashMap<String, NodeId>,
}

impl Scope {
    pub(crate) fn new(uri: impl Into<String>, parent: Option<super::ScopeId>) -> Self {
        Self {
            uri: uri.into(),
            parent,
            names: HashMap::new(),
        }
    }

    /// Identifier of the scope, used to build prototype type ids
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn parent(&self) -> Option<super::ScopeId> {
        self.parent
    }

    /// Look a name up in this scope only
    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    /// Bind a name, replacing any earlier binding
    ///
    /// Returns the node that was previously bound to the name.
    pub fn bind(&mut self, name: impl Into<String>, node: NodeId) -> Option<NodeId> {
        self.names.insert(name.into(), node)
    }

    /// Sorted names bound in this scope
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
