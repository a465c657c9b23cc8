//! Prototype classes: parsed-once PROTO definitions

use std::collections::HashMap;
use std::sync::Arc;

use log::warn;
use thiserror::Error;

use crate::field::FieldValue;
use crate::graph::{compute_path, NodeBody, NodeError, NodeId, SceneGraph};
use crate::node::{Access, Capability, InitialValues, Interface, InterfaceSet, NodeClass, NodeType};

use super::instance::{self, ProtoInstance};

/// Errors that can occur when building a prototype class
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtoError {
    /// An IS mapping that names something that does not exist
    #[error("invalid IS mapping {interface} -> {node}.{node_interface}: {reason}")]
    InvalidAlias {
        interface: String,
        node: NodeId,
        node_interface: String,
        reason: String,
    },

    /// An IS mapping between interfaces that cannot be connected
    #[error("incompatible IS mapping {interface} -> {node_interface}: {reason}")]
    IncompatibleAlias {
        interface: String,
        node_interface: String,
        reason: String,
    },

    /// A field or exposedField declared without a default value
    #[error("missing default value for {interface}")]
    MissingDefault { interface: String },

    /// A default value that does not fit its interface
    #[error("invalid default value for {interface}: {reason}")]
    InvalidDefault { interface: String, reason: String },

    /// A prototype without implementation nodes
    #[error("prototype {id} has no implementation nodes")]
    EmptyBody { id: String },
}

/// An IS mapping from a prototype interface to an implementation node interface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alias {
    pub interface: String,
    pub node: NodeId,
    pub node_interface: String,
}

/// A ROUTE between two implementation nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtoRoute {
    pub from: NodeId,
    pub from_output: String,
    pub to: NodeId,
    pub to_input: String,
}

/// Everything a PROTO definition declares, before validation
#[derive(Debug, Clone, Default)]
pub struct ProtoDefinition {
    /// Registry id, `<scope-uri>#<Name>`
    pub id: String,
    pub interfaces: InterfaceSet,
    pub defaults: HashMap<String, FieldValue>,
    /// Template implementation nodes; the first one defines the node's kind
    pub template_nodes: Vec<NodeId>,
    pub aliases: Vec<Alias>,
    pub routes: Vec<ProtoRoute>,
}

/// A validated prototype
///
/// Immutable after construction and shared by every instance. The template
/// nodes live in the [`SceneGraph`] the class was built against and are only
/// ever read: instances work on clones.
#[derive(Debug)]
pub struct ProtoClass {
    id: String,
    interfaces: InterfaceSet,
    defaults: HashMap<String, FieldValue>,
    template_nodes: Vec<NodeId>,
    aliases: Vec<Alias>,
    routes: Vec<ProtoRoute>,
}

/// Which implementation interface access a prototype interface may map to
fn compatible(proto: Access, implementation: Access) -> bool {
    match proto {
        Access::EventIn => implementation.is_input(),
        Access::EventOut => implementation.is_output(),
        Access::ExposedField => implementation == Access::ExposedField,
        Access::Field => implementation.has_value(),
    }
}

impl ProtoClass {
    /// Validate a definition against the graph holding its template
    pub fn new(graph: &SceneGraph, definition: ProtoDefinition) -> Result<Self, ProtoError> {
        let ProtoDefinition {
            id,
            interfaces,
            defaults,
            template_nodes,
            aliases,
            routes,
        } = definition;

        if template_nodes.is_empty() {
            return Err(ProtoError::EmptyBody { id });
        }

        for (interface_id, value) in &defaults {
            let interface = interfaces
                .find_field(interface_id)
                .ok_or_else(|| ProtoError::InvalidDefault {
                    interface: interface_id.clone(),
                    reason: "not a declared field or exposedField".into(),
                })?;
            if interface.kind != value.kind() {
                return Err(ProtoError::InvalidDefault {
                    interface: interface_id.clone(),
                    reason: format!("expected {}, found {}", interface.kind, value.kind()),
                });
            }
        }
        for interface in &interfaces {
            if interface.access.has_value() && !defaults.contains_key(&interface.id) {
                return Err(ProtoError::MissingDefault {
                    interface: interface.id.clone(),
                });
            }
        }

        let mut checked = Vec::with_capacity(aliases.len());
        for alias in aliases {
            checked.push(check_alias(graph, &interfaces, &template_nodes, alias)?);
        }

        // Unreachable endpoints are recorded per instance as wiring errors
        for route in &routes {
            for node in [route.from, route.to] {
                if compute_path(graph, &template_nodes, node).is_none() {
                    warn!("{}: route endpoint {} is not reachable from the implementation", id, node);
                }
            }
        }

        Ok(Self {
            id,
            interfaces,
            defaults,
            template_nodes,
            aliases: checked,
            routes,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn declared_interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    pub fn default_value(&self, id: &str) -> Option<&FieldValue> {
        self.defaults.get(id)
    }

    pub fn template_nodes(&self) -> &[NodeId] {
        &self.template_nodes
    }

    pub fn aliases(&self) -> &[Alias] {
        &self.aliases
    }

    /// IS mappings of one prototype interface, in declaration order
    pub fn aliases_for<'a>(&'a self, interface: &'a str) -> impl Iterator<Item = &'a Alias> + 'a {
        self.aliases.iter().filter(move |a| a.interface == interface)
    }

    /// The prototype interface a template node field is IS'd to, if any
    pub fn alias_of(&self, node: NodeId, node_interface: &str) -> Option<&Interface> {
        self.aliases
            .iter()
            .find(|a| a.node == node && a.node_interface == node_interface)
            .and_then(|a| self.interfaces.get(&a.interface))
    }

    pub fn routes(&self) -> &[ProtoRoute] {
        &self.routes
    }

    /// Create a type exposing `interfaces`, a subset of the declared ones
    pub fn create_type(
        class: &Arc<ProtoClass>,
        type_id: impl Into<String>,
        interfaces: InterfaceSet,
    ) -> Result<NodeType, NodeError> {
        NodeType::new(class.clone(), type_id, interfaces)
    }
}

fn check_alias(
    graph: &SceneGraph,
    interfaces: &InterfaceSet,
    template_nodes: &[NodeId],
    alias: Alias,
) -> Result<Alias, ProtoError> {
    let invalid = |reason: &str| ProtoError::InvalidAlias {
        interface: alias.interface.clone(),
        node: alias.node,
        node_interface: alias.node_interface.clone(),
        reason: reason.to_string(),
    };

    let proto_interface = interfaces
        .get(&alias.interface)
        .ok_or_else(|| invalid("interface is not declared"))?;
    if compute_path(graph, template_nodes, alias.node).is_none() {
        warn!(
            "IS mapping {} -> {}.{}: node is not reachable from the implementation",
            alias.interface, alias.node, alias.node_interface
        );
    }
    let node_type = graph
        .node(alias.node)
        .map_err(|e| invalid(&e.to_string()))?
        .node_type();

    let target = match node_type
        .interfaces()
        .find(proto_interface.access, &alias.node_interface)
    {
        Some(target) => target,
        None => {
            return Err(match node_type.interfaces().get(&alias.node_interface) {
                Some(other) => ProtoError::IncompatibleAlias {
                    interface: alias.interface.clone(),
                    node_interface: alias.node_interface.clone(),
                    reason: format!("cannot map {} to {}", proto_interface.access, other.access),
                },
                None => invalid("no such interface on the node"),
            })
        }
    };
    debug_assert!(compatible(proto_interface.access, target.access));
    if target.kind != proto_interface.kind {
        return Err(ProtoError::IncompatibleAlias {
            interface: alias.interface.clone(),
            node_interface: alias.node_interface.clone(),
            reason: format!("type mismatch: {} vs {}", proto_interface.kind, target.kind),
        });
    }
    Ok(Alias {
        node_interface: target.id.clone(),
        ..alias
    })
}

impl NodeClass for ProtoClass {
    fn id(&self) -> &str {
        &self.id
    }

    fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    fn capabilities(&self) -> &[Capability] {
        &[]
    }

    fn field_default(&self, id: &str) -> Option<FieldValue> {
        self.default_value(id).cloned()
    }

    fn construct(
        &self,
        graph: &mut SceneGraph,
        node: NodeId,
        node_type: &NodeType,
        initial: InitialValues,
    ) -> Result<NodeBody, NodeError> {
        let instance = ProtoInstance::instantiate(graph, node, self, node_type, initial)?;
        Ok(NodeBody::Proto(instance))
    }

    fn process_event(
        &self,
        graph: &mut SceneGraph,
        node: NodeId,
        input: &Interface,
        value: FieldValue,
        timestamp: f64,
    ) -> Result<(), NodeError> {
        instance::process_event(graph, node, input, value, timestamp)
    }
}

/// Default for a declared value-holding interface, falling back to the kind's zero
pub(crate) fn default_or_zero(class: &ProtoClass, interface: &Interface) -> FieldValue {
    class
        .default_value(&interface.id)
        .cloned()
        .unwrap_or_else(|| FieldValue::default_for(interface.kind))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::field::FieldKind;
    use crate::graph::tests::{group, leaf, test_graph};
    use crate::graph::ScopeId;
    use crate::proto::WiringError;

    fn interfaces(list: Vec<Interface>) -> InterfaceSet {
        InterfaceSet::from_interfaces(list).expect("unique ids")
    }

    fn level() -> Interface {
        Interface::new(Access::ExposedField, FieldKind::SfFloat, "level")
    }

    fn alias(interface: &str, node: NodeId, node_interface: &str) -> Alias {
        Alias {
            interface: interface.into(),
            node,
            node_interface: node_interface.into(),
        }
    }

    /// A class exposing `level` (IS size) and `out` (IS size_out) over one leaf
    fn lamp(graph: &mut SceneGraph, scope: ScopeId) -> (Arc<ProtoClass>, NodeId) {
        let template = leaf(graph, scope);
        let definition = ProtoDefinition {
            id: "test:#Lamp".into(),
            interfaces: interfaces(vec![
                level(),
                Interface::new(Access::EventOut, FieldKind::SfFloat, "out"),
            ]),
            defaults: HashMap::from([("level".to_string(), FieldValue::SfFloat(1.0))]),
            template_nodes: vec![template],
            aliases: vec![alias("level", template, "size"), alias("out", template, "size_out")],
            routes: Vec::new(),
        };
        (Arc::new(ProtoClass::new(graph, definition).unwrap()), template)
    }

    #[test]
    fn test_empty_body() {
        let (graph, _) = test_graph();
        let definition = ProtoDefinition {
            id: "test:#Empty".into(),
            ..ProtoDefinition::default()
        };
        let err = ProtoClass::new(&graph, definition).unwrap_err();
        assert_eq!(err, ProtoError::EmptyBody { id: "test:#Empty".into() });
    }

    #[test]
    fn test_missing_default() {
        let (mut graph, scope) = test_graph();
        let definition = ProtoDefinition {
            id: "test:#P".into(),
            interfaces: interfaces(vec![level()]),
            template_nodes: vec![leaf(&mut graph, scope)],
            ..ProtoDefinition::default()
        };
        let err = ProtoClass::new(&graph, definition).unwrap_err();
        assert_eq!(err, ProtoError::MissingDefault { interface: "level".into() });
    }

    #[test]
    fn test_default_of_wrong_kind() {
        let (mut graph, scope) = test_graph();
        let definition = ProtoDefinition {
            id: "test:#P".into(),
            interfaces: interfaces(vec![level()]),
            defaults: HashMap::from([("level".to_string(), FieldValue::SfBool(true))]),
            template_nodes: vec![leaf(&mut graph, scope)],
            ..ProtoDefinition::default()
        };
        let err = ProtoClass::new(&graph, definition).unwrap_err();
        assert!(matches!(err, ProtoError::InvalidDefault { .. }));
    }

    #[test]
    fn test_alias_directions() {
        let (mut graph, scope) = test_graph();
        let template = leaf(&mut graph, scope);
        let build = |graph: &SceneGraph, interface: Interface, node_interface: &str| {
            let mut defaults = HashMap::new();
            if interface.access.has_value() {
                defaults.insert(interface.id.clone(), FieldValue::default_for(interface.kind));
            }
            let definition = ProtoDefinition {
                id: "test:#P".into(),
                aliases: vec![alias(&interface.id, template, node_interface)],
                interfaces: interfaces(vec![interface]),
                defaults,
                template_nodes: vec![template],
                routes: Vec::new(),
            };
            ProtoClass::new(graph, definition)
        };

        // an eventIn may feed an exposedField
        let class = build(
            &graph,
            Interface::new(Access::EventIn, FieldKind::SfFloat, "set_size"),
            "size",
        )
        .unwrap();
        assert_eq!(class.aliases()[0].node_interface, "size");

        // a field cannot be backed by an eventOut
        let err = build(
            &graph,
            Interface::new(Access::Field, FieldKind::SfFloat, "s"),
            "size_out",
        )
        .unwrap_err();
        assert!(matches!(err, ProtoError::IncompatibleAlias { .. }));

        let err = build(
            &graph,
            Interface::new(Access::EventIn, FieldKind::SfBool, "flip"),
            "size",
        )
        .unwrap_err();
        assert!(matches!(err, ProtoError::IncompatibleAlias { ref reason, .. } if reason.contains("mismatch")));

        let err = build(
            &graph,
            Interface::new(Access::EventIn, FieldKind::SfFloat, "set_size"),
            "radius",
        )
        .unwrap_err();
        assert!(matches!(err, ProtoError::InvalidAlias { .. }));
    }

    #[test]
    fn test_unreachable_targets_are_skipped_per_instance() {
        let (mut graph, scope) = test_graph();
        let template = leaf(&mut graph, scope);
        let stray = leaf(&mut graph, scope);
        let definition = ProtoDefinition {
            id: "test:#P".into(),
            interfaces: interfaces(vec![level()]),
            defaults: HashMap::from([("level".to_string(), FieldValue::SfFloat(1.0))]),
            template_nodes: vec![template],
            aliases: vec![alias("level", stray, "size")],
            routes: vec![
                ProtoRoute {
                    from: template,
                    from_output: "size".into(),
                    to: stray,
                    to_input: "size".into(),
                },
                ProtoRoute {
                    from: template,
                    from_output: "size".into(),
                    to: template,
                    to_input: "size".into(),
                },
            ],
        };
        let class = Arc::new(ProtoClass::new(&graph, definition).unwrap());
        let node = graph
            .create_node(scope, NodeType::full(class, "P"), None, HashMap::new())
            .unwrap();

        let errors = graph.node(node).unwrap().as_proto().unwrap().wiring_errors().to_vec();
        assert_eq!(errors.len(), 2);
        assert!(matches!(
            &errors[0],
            WiringError::Route { to, source: NodeError::Unreachable(n), .. } if *to == stray && *n == stray
        ));
        assert!(matches!(
            &errors[1],
            WiringError::Alias { interface, source: NodeError::Unreachable(_), .. } if interface == "level"
        ));
        assert_eq!(graph.field(node, "level").unwrap(), FieldValue::SfFloat(1.0));
    }

    #[test]
    fn test_instances_do_not_share_nodes() {
        let (mut graph, scope) = test_graph();
        let (class, template) = lamp(&mut graph, scope);
        let node_type = NodeType::full(class.clone(), "Lamp");

        let initial = HashMap::from([("level".to_string(), FieldValue::SfFloat(0.5))]);
        let a = graph.create_node(scope, node_type.clone(), None, initial).unwrap();
        let b = graph.create_node(scope, node_type, None, HashMap::new()).unwrap();
        let a_impl = graph.node(a).unwrap().as_proto().unwrap().impl_nodes()[0];
        let b_impl = graph.node(b).unwrap().as_proto().unwrap().impl_nodes()[0];
        assert_ne!(a_impl, b_impl);
        assert_ne!(a_impl, template);

        assert_eq!(graph.field(a_impl, "size").unwrap(), FieldValue::SfFloat(0.5));
        assert_eq!(graph.field(b_impl, "size").unwrap(), FieldValue::SfFloat(1.0));

        graph.set_field(a, "level", FieldValue::SfFloat(3.0)).unwrap();
        assert_eq!(graph.field(a_impl, "size").unwrap(), FieldValue::SfFloat(3.0));
        assert_eq!(graph.field(b_impl, "size").unwrap(), FieldValue::SfFloat(1.0));
        assert_eq!(graph.field(template, "size").unwrap(), FieldValue::SfFloat(0.0));
    }

    #[test]
    fn test_partial_export() {
        let (mut graph, scope) = test_graph();
        let (class, _) = lamp(&mut graph, scope);

        let node_type = ProtoClass::create_type(&class, "Lamp", interfaces(vec![level()])).unwrap();
        let node = graph.create_node(scope, node_type, None, HashMap::new()).unwrap();
        assert_eq!(graph.field(node, "level").unwrap(), FieldValue::SfFloat(1.0));
        assert!(graph.output_value(node, "out").is_err());

        let extra = Interface::new(Access::EventIn, FieldKind::SfFloat, "set_nothing");
        let err = ProtoClass::create_type(&class, "Lamp", interfaces(vec![extra])).unwrap_err();
        assert!(matches!(err, NodeError::UnsupportedInterface { .. }));
    }

    #[test]
    fn test_capability_of_first_impl_node() {
        let (mut graph, scope) = test_graph();
        let first = group(&mut graph, scope, vec![]);
        let second = leaf(&mut graph, scope);
        let definition = ProtoDefinition {
            id: "test:#Holder".into(),
            template_nodes: vec![first, second],
            ..ProtoDefinition::default()
        };
        let class = Arc::new(ProtoClass::new(&graph, definition).unwrap());
        let node = graph
            .create_node(scope, NodeType::full(class, "Holder"), None, HashMap::new())
            .unwrap();

        assert!(graph.has_capability(node, Capability::Grouping));
        assert!(!graph.has_capability(node, Capability::Geometry));
        assert_eq!(graph.capabilities(node), &[Capability::Grouping, Capability::Child]);
    }
}
