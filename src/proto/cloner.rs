//! Deep copies of node graphs

use std::collections::HashMap;

use log::{debug, error};

use crate::field::FieldValue;
use crate::graph::{NodeError, NodeId, SceneGraph, ScopeId};
use crate::node::{InitialValues, Interface};

use super::class::{default_or_zero, ProtoClass};

/// Values substituted into IS'd fields while cloning a prototype template
struct Substitution<'a> {
    class: &'a ProtoClass,
    initial: &'a InitialValues,
}

/// Clones node graphs into a target scope
///
/// Every template node is cloned at most once per `Cloner`: a shared
/// sub-tree stays shared in the clone and cycles are closed onto the
/// clones already produced. A clone's slot is reserved before its fields
/// are copied, so a node referring to itself ends up referring to its own
/// clone.
pub struct Cloner<'a> {
    target_scope: ScopeId,
    visited: HashMap<NodeId, NodeId>,
    substitution: Option<Substitution<'a>>,
}

impl<'a> Cloner<'a> {
    pub fn new(target_scope: ScopeId) -> Self {
        Self {
            target_scope,
            visited: HashMap::new(),
            substitution: None,
        }
    }

    /// Substitute IS'd field values from `initial`, or the class defaults
    pub fn with_substitution(mut self, class: &'a ProtoClass, initial: &'a InitialValues) -> Self {
        self.substitution = Some(Substitution { class, initial });
        self
    }

    /// The clone produced for a template node so far, if any
    pub fn clone_of(&self, node: NodeId) -> Option<NodeId> {
        self.visited.get(&node).copied()
    }

    /// Clone a list of root nodes, in order
    pub fn clone_graph(
        &mut self,
        graph: &mut SceneGraph,
        roots: &[NodeId],
    ) -> Result<Vec<NodeId>, NodeError> {
        roots.iter().map(|&root| self.clone_node(graph, root)).collect()
    }

    /// Clone one node and everything it references
    pub fn clone_node(&mut self, graph: &mut SceneGraph, node: NodeId) -> Result<NodeId, NodeError> {
        if let Some(clone) = self.clone_of(node) {
            return Ok(clone);
        }

        let source = graph.node(node)?;
        let node_type = source.node_type().clone();
        let name = source.name().map(str::to_string);

        let clone = graph.reserve_node(self.target_scope, node_type.clone(), name.clone());
        self.visited.insert(node, clone);
        if let Some(name) = name {
            graph.bind_name(self.target_scope, name, clone);
        }

        let mut values = InitialValues::new();
        for interface in node_type.interfaces() {
            if !interface.access.has_value() {
                continue;
            }
            let source_value = self.source_value(graph, node, interface)?;
            let value = self.clone_field_value(graph, node, &source_value)?;
            values.insert(interface.id.clone(), value);
        }
        graph.construct_node(clone, values)?;
        debug!("cloned {} ({}) as {}", node, node_type.id(), clone);
        Ok(clone)
    }

    /// The value a cloned field starts from
    ///
    /// A field IS'd to a prototype field or exposedField takes the
    /// instantiation argument, else the prototype default. Everything else
    /// copies the template node's own value.
    fn source_value(
        &self,
        graph: &SceneGraph,
        node: NodeId,
        interface: &Interface,
    ) -> Result<FieldValue, NodeError> {
        if let Some(sub) = &self.substitution {
            if let Some(proto_interface) = sub.class.alias_of(node, &interface.id) {
                if proto_interface.access.has_value() {
                    let value = match sub.initial.get(&proto_interface.id) {
                        Some(value) => value.clone(),
                        None => {
                            if sub.class.default_value(&proto_interface.id).is_none() {
                                error!(
                                    "{} has no default for {}",
                                    sub.class.id(),
                                    proto_interface.id
                                );
                                debug_assert!(false, "prototype field without default");
                            }
                            default_or_zero(sub.class, proto_interface)
                        }
                    };
                    debug_assert_eq!(value.kind(), interface.kind);
                    return Ok(value);
                }
            }
        }
        graph.field(node, &interface.id)
    }

    /// Clone a single field value held by `owner`
    ///
    /// Node references to `owner` itself map to the owner's clone; other
    /// references are cloned (or reused if already cloned). Values of
    /// every other kind are plain copies.
    pub fn clone_field_value(
        &mut self,
        graph: &mut SceneGraph,
        owner: NodeId,
        value: &FieldValue,
    ) -> Result<FieldValue, NodeError> {
        match value {
            FieldValue::SfNode(Some(node)) => {
                Ok(FieldValue::SfNode(Some(self.clone_ref(graph, owner, *node)?)))
            }
            FieldValue::MfNode(nodes) => {
                let mut cloned = Vec::with_capacity(nodes.len());
                for &node in nodes {
                    cloned.push(self.clone_ref(graph, owner, node)?);
                }
                Ok(FieldValue::MfNode(cloned))
            }
            other => Ok(other.clone()),
        }
    }

    fn clone_ref(&mut self, graph: &mut SceneGraph, owner: NodeId, node: NodeId) -> Result<NodeId, NodeError> {
        if node == owner {
            if let Some(clone) = self.clone_of(owner) {
                return Ok(clone);
            }
        }
        self.clone_node(graph, node)
    }
}
