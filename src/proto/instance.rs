//! Prototype instances
//!
//! Instantiating a prototype clones its template into a child scope,
//! re-resolves every IS mapping and internal route against the clone by
//! structural path, and builds the instance's own ports. Wiring is best
//! effort: a route or IS port that cannot be connected is skipped and
//! recorded on the instance.

use std::collections::HashMap;

use log::{debug, error, warn};
use thiserror::Error;

use crate::field::FieldValue;
use crate::graph::{
    compute_path, resolve_path, EventPort, EventSink, NodeBody, NodeError, NodeId, SceneGraph,
    ScopeId,
};
use crate::node::{Access, InitialValues, Interface, NodeType};

use super::class::{default_or_zero, ProtoClass};
use super::cloner::Cloner;

/// A route or IS port skipped while wiring an instance
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WiringError {
    #[error("route {from}.{from_output} TO {to}.{to_input} skipped: {source}")]
    Route {
        from: NodeId,
        from_output: String,
        to: NodeId,
        to_input: String,
        source: NodeError,
    },

    #[error("IS mapping {interface} -> {node}.{node_interface} skipped: {source}")]
    Alias {
        interface: String,
        node: NodeId,
        node_interface: String,
        source: NodeError,
    },
}

/// Implementation nodes and ports of one prototype instantiation
#[derive(Debug)]
pub struct ProtoInstance {
    scope: ScopeId,
    impl_nodes: Vec<NodeId>,
    /// Fan-out targets of each exported input
    inputs: HashMap<String, Vec<(NodeId, String)>>,
    outputs: HashMap<String, EventPort>,
    /// Instantiation values of fields and exposedFields
    fields: HashMap<String, FieldValue>,
    /// IS targets of fields and exposedFields, first one answers queries
    field_aliases: HashMap<String, Vec<(NodeId, String)>>,
    wiring_errors: Vec<WiringError>,
}

/// Map a template node to its clone by replaying its structural path
///
/// A node the template roots do not reach (such as a node handed to a
/// nested instance as an argument, which that instance clones) has no
/// counterpart.
fn locate(graph: &SceneGraph, template: &[NodeId], clones: &[NodeId], node: NodeId) -> Result<NodeId, NodeError> {
    let path = compute_path(graph, template, node).ok_or(NodeError::Unreachable(node))?;
    resolve_path(graph, clones, &path).ok_or_else(|| {
        error!("template node {} has no counterpart in the clone", node);
        debug_assert!(false, "clone is not congruent with its template");
        NodeError::Unreachable(node)
    })
}

impl ProtoInstance {
    pub(crate) fn instantiate(
        graph: &mut SceneGraph,
        node: NodeId,
        class: &ProtoClass,
        node_type: &NodeType,
        initial: InitialValues,
    ) -> Result<Self, NodeError> {
        for (id, value) in &initial {
            let interface = node_type
                .interfaces()
                .find_field(id)
                .ok_or_else(|| NodeError::unsupported(node_type.id(), id.as_str()))?;
            if interface.kind != value.kind() {
                return Err(NodeError::mismatch(id.as_str(), interface.kind, value.kind()));
            }
        }

        let parent = graph.node(node)?.scope();
        let scope = graph.create_scope(class.id(), Some(parent));
        let mut cloner = Cloner::new(scope).with_substitution(class, &initial);
        let impl_nodes = cloner.clone_graph(graph, class.template_nodes())?;
        let template = class.template_nodes();

        let mut instance = ProtoInstance {
            scope,
            impl_nodes,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            fields: HashMap::new(),
            field_aliases: HashMap::new(),
            wiring_errors: Vec::new(),
        };

        for route in class.routes() {
            let wired = locate(graph, template, &instance.impl_nodes, route.from)
                .and_then(|from| Ok((from, locate(graph, template, &instance.impl_nodes, route.to)?)))
                .and_then(|(from, to)| graph.add_route(from, &route.from_output, to, &route.to_input));
            if let Err(source) = wired {
                instance.skip(WiringError::Route {
                    from: route.from,
                    from_output: route.from_output.clone(),
                    to: route.to,
                    to_input: route.to_input.clone(),
                    source,
                });
            }
        }

        for interface in node_type.interfaces() {
            let mut targets: Vec<(NodeId, String)> = Vec::new();
            for alias in class.aliases_for(&interface.id) {
                match locate(graph, template, &instance.impl_nodes, alias.node) {
                    Ok(target) => targets.push((target, alias.node_interface.clone())),
                    Err(source) => instance.skip(WiringError::Alias {
                        interface: interface.id.clone(),
                        node: alias.node,
                        node_interface: alias.node_interface.clone(),
                        source,
                    }),
                }
            }

            if interface.access.has_value() {
                // Node arguments are cloned too: the instance owns what it holds
                let value = initial
                    .get(&interface.id)
                    .cloned()
                    .unwrap_or_else(|| default_or_zero(class, interface));
                let value = cloner.clone_field_value(graph, node, &value)?;
                instance.fields.insert(interface.id.clone(), value);
                if !targets.is_empty() {
                    instance
                        .field_aliases
                        .insert(interface.id.clone(), targets.clone());
                }
            }
            if interface.access.is_input() {
                let inputs = instance.checked_inputs(graph, interface, &targets);
                instance.inputs.insert(interface.id.clone(), inputs);
            }
            if interface.access.is_output() {
                instance.wire_output(graph, node, interface, &targets);
            }
        }

        debug!(
            "instantiated {} as {} with {} implementation node(s)",
            class.id(),
            node,
            instance.impl_nodes.len()
        );
        Ok(instance)
    }

    fn skip(&mut self, error: WiringError) {
        warn!("{}", error);
        self.wiring_errors.push(error);
    }

    /// Keep the IS targets of an input that accept its kind
    fn checked_inputs(
        &mut self,
        graph: &SceneGraph,
        interface: &Interface,
        targets: &[(NodeId, String)],
    ) -> Vec<(NodeId, String)> {
        let mut inputs = Vec::with_capacity(targets.len());
        for (target, target_input) in targets {
            let found = graph.node(*target).and_then(|n| {
                let node_type = n.node_type();
                node_type
                    .interfaces()
                    .find_event_in(target_input)
                    .cloned()
                    .ok_or_else(|| NodeError::unsupported(node_type.id(), target_input.as_str()))
            });
            let checked = found.and_then(|input| {
                if input.kind == interface.kind {
                    Ok(input)
                } else {
                    Err(NodeError::mismatch(target_input.as_str(), interface.kind, input.kind))
                }
            });
            match checked {
                Ok(input) => inputs.push((*target, input.id)),
                Err(source) => self.skip(WiringError::Alias {
                    interface: interface.id.clone(),
                    node: *target,
                    node_interface: target_input.clone(),
                    source,
                }),
            }
        }
        inputs
    }

    /// Create the output port of `interface` and listen on its IS targets
    fn wire_output(
        &mut self,
        graph: &mut SceneGraph,
        node: NodeId,
        interface: &Interface,
        targets: &[(NodeId, String)],
    ) {
        let current = match interface.access {
            Access::ExposedField => match self.field_aliases.get(&interface.id) {
                Some(aliased) => aliased
                    .first()
                    .and_then(|(target, id)| graph.field(*target, id).ok()),
                None => self.fields.get(&interface.id).cloned(),
            },
            _ => None,
        }
        .unwrap_or_else(|| FieldValue::default_for(interface.kind));
        self.outputs
            .insert(interface.id.clone(), EventPort::new(current));

        for (target, target_output) in targets {
            let sink = EventSink::Output {
                node,
                output: interface.id.clone(),
            };
            if let Err(source) = graph.add_sink(*target, target_output, sink, interface.kind) {
                self.skip(WiringError::Alias {
                    interface: interface.id.clone(),
                    node: *target,
                    node_interface: target_output.clone(),
                    source,
                });
            }
        }
    }

    /// Scope holding the names of the implementation nodes
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    /// Cloned implementation nodes; the first one answers capability probes
    pub fn impl_nodes(&self) -> &[NodeId] {
        &self.impl_nodes
    }

    /// Implementation inputs an exported input fans out to
    pub fn input_targets(&self, id: &str) -> &[(NodeId, String)] {
        self.inputs.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Implementation fields a field or exposedField is IS'd to
    pub fn field_targets(&self, id: &str) -> &[(NodeId, String)] {
        self.field_aliases.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn output(&self, id: &str) -> Option<&EventPort> {
        self.outputs.get(id)
    }

    pub(crate) fn output_mut(&mut self, id: &str) -> Option<&mut EventPort> {
        self.outputs.get_mut(id)
    }

    /// Value of a field that is not IS'd to any implementation field
    pub fn own_field(&self, id: &str) -> Option<&FieldValue> {
        self.fields.get(id)
    }

    pub(crate) fn set_own_field(&mut self, id: &str, value: FieldValue) {
        if let Some(slot) = self.fields.get_mut(id) {
            *slot = value;
        }
    }

    /// Routes and IS ports that could not be connected
    pub fn wiring_errors(&self) -> &[WiringError] {
        &self.wiring_errors
    }
}

/// Handle an event sent to an exported input of an instance
///
/// The event fans out to every IS'd implementation input. An exposedField
/// additionally stores the value and re-emits it, subject to the port's
/// timestamp check.
pub(crate) fn process_event(
    graph: &mut SceneGraph,
    node: NodeId,
    input: &Interface,
    value: FieldValue,
    timestamp: f64,
) -> Result<(), NodeError> {
    let n = graph.node_mut(node)?;
    let type_id = n.node_type().id().to_string();
    let NodeBody::Proto(instance) = &mut n.body else {
        return Err(NodeError::instantiate(type_id, "not a prototype instance"));
    };
    if input.access == Access::ExposedField {
        instance.set_own_field(&input.id, value.clone());
    }
    let targets = instance.input_targets(&input.id).to_vec();

    for (target, target_input) in targets {
        graph.enqueue(
            EventSink::Input {
                node: target,
                input: target_input,
            },
            value.clone(),
            timestamp,
        );
    }
    if input.access == Access::ExposedField {
        graph.emit(node, &input.id, value, timestamp)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::field::FieldKind;
    use crate::graph::tests::{group, leaf, test_graph};
    use crate::node::InterfaceSet;
    use crate::proto::{Alias, ProtoDefinition, ProtoRoute};

    fn alias(interface: &str, node: NodeId, node_interface: &str) -> Alias {
        Alias {
            interface: interface.into(),
            node,
            node_interface: node_interface.into(),
        }
    }

    fn route(from: NodeId, from_output: &str, to: NodeId, to_input: &str) -> ProtoRoute {
        ProtoRoute {
            from,
            from_output: from_output.into(),
            to,
            to_input: to_input.into(),
        }
    }

    fn instantiate(graph: &mut SceneGraph, scope: ScopeId, definition: ProtoDefinition) -> NodeId {
        let class = Arc::new(ProtoClass::new(graph, definition).unwrap());
        graph
            .create_node(scope, NodeType::full(class, "P"), None, HashMap::new())
            .unwrap()
    }

    fn instance(graph: &SceneGraph, node: NodeId) -> &ProtoInstance {
        graph.node(node).unwrap().as_proto().unwrap()
    }

    #[test]
    fn test_bad_route_does_not_stop_good_ones() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        let b = leaf(&mut graph, scope);
        let root = group(&mut graph, scope, vec![a, b]);
        let definition = ProtoDefinition {
            id: "test:#P".into(),
            template_nodes: vec![root],
            routes: vec![route(a, "size_out", b, "set_on"), route(a, "size", b, "size")],
            ..ProtoDefinition::default()
        };
        let node = instantiate(&mut graph, scope, definition);

        let errors = instance(&graph, node).wiring_errors().to_vec();
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            WiringError::Route { from_output, source: NodeError::TypeMismatch { .. }, .. }
                if from_output == "size_out"
        ));

        let root_clone = instance(&graph, node).impl_nodes()[0];
        let clones = graph.field(root_clone, "children").unwrap().as_nodes().unwrap().to_vec();
        graph.send_event(clones[0], "set_size", FieldValue::SfFloat(4.0), 1.0).unwrap();
        assert_eq!(graph.field(clones[1], "size").unwrap(), FieldValue::SfFloat(4.0));
        assert_eq!(graph.field(b, "size").unwrap(), FieldValue::SfFloat(0.0));
    }

    #[test]
    fn test_input_fans_out() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        let b = leaf(&mut graph, scope);
        let definition = ProtoDefinition {
            id: "test:#P".into(),
            interfaces: InterfaceSet::from_interfaces(vec![Interface::new(
                Access::EventIn,
                FieldKind::SfFloat,
                "resize",
            )])
            .unwrap(),
            template_nodes: vec![a, b],
            aliases: vec![alias("resize", a, "set_size"), alias("resize", b, "size")],
            ..ProtoDefinition::default()
        };
        let node = instantiate(&mut graph, scope, definition);
        assert_eq!(instance(&graph, node).input_targets("resize").len(), 2);

        graph.send_event(node, "resize", FieldValue::SfFloat(2.0), 1.0).unwrap();
        for clone in instance(&graph, node).impl_nodes().to_vec() {
            assert_eq!(graph.field(clone, "size").unwrap(), FieldValue::SfFloat(2.0));
        }
    }

    #[test]
    fn test_output_is_monotonic() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        let definition = ProtoDefinition {
            id: "test:#P".into(),
            interfaces: InterfaceSet::from_interfaces(vec![Interface::new(
                Access::EventOut,
                FieldKind::SfFloat,
                "out",
            )])
            .unwrap(),
            template_nodes: vec![a],
            aliases: vec![alias("out", a, "size_changed")],
            ..ProtoDefinition::default()
        };
        let node = instantiate(&mut graph, scope, definition);
        let clone = instance(&graph, node).impl_nodes()[0];

        graph.send_event(clone, "set_size", FieldValue::SfFloat(1.0), 2.0).unwrap();
        assert_eq!(graph.output_value(node, "out").unwrap(), &FieldValue::SfFloat(1.0));
        let port = instance(&graph, node).output("out").unwrap();
        assert_eq!(port.last_timestamp(), Some(2.0));

        // same timestamp: stored on the clone but not re-emitted
        graph.send_event(clone, "set_size", FieldValue::SfFloat(5.0), 2.0).unwrap();
        assert_eq!(graph.output_value(node, "out").unwrap(), &FieldValue::SfFloat(1.0));

        graph.send_event(clone, "set_size", FieldValue::SfFloat(6.0), 3.0).unwrap();
        assert_eq!(graph.output_value(node, "out").unwrap(), &FieldValue::SfFloat(6.0));
    }
}
