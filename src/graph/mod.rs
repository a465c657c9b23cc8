//! Scene graph arena and runtime context
//!
//! Nodes live in a single [`SceneGraph`] and are addressed by [`NodeId`]
//! handles, so node graphs may contain cycles (including a node referring
//! to itself) without any shared ownership. All mutation and event
//! propagation goes through `&mut SceneGraph`.

mod error;
mod event;
mod node;
pub mod path;
mod scope;

pub use error::NodeError;
pub use event::{EventPort, EventSink};
pub use node::{Node, NodeBody, PrimitiveNode, ReceivedEvent};
pub use path::{compute_path, resolve_path, NodePath, PathElement, RefKind};
pub use scope::Scope;

use std::collections::VecDeque;
use std::fmt;

use log::{debug, info, trace, warn};

use crate::field::{FieldKind, FieldValue};
use crate::node::{Access, Capability, InitialValues, Interface, NodeType};

/// Handle of a node in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a [`Scope`] in a [`SceneGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

#[derive(Debug)]
struct PendingEvent {
    sink: EventSink,
    value: FieldValue,
    timestamp: f64,
}

/// Node arena, scopes and the event queue
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<Node>,
    scopes: Vec<Scope>,
    queue: VecDeque<PendingEvent>,
    dispatching: bool,
    trace_events: bool,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Log every delivered event at info level instead of trace
    pub fn set_trace_events(&mut self, trace_events: bool) {
        self.trace_events = trace_events;
    }

    /// Number of nodes in the arena, templates included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // ---- scopes ----

    pub fn create_scope(&mut self, uri: impl Into<String>, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(uri, parent));
        id
    }

    pub fn scope(&self, id: ScopeId) -> Option<&Scope> {
        self.scopes.get(id.0 as usize)
    }

    /// Bind a name in a scope; returns the node previously bound to it
    pub fn bind_name(&mut self, scope: ScopeId, name: impl Into<String>, node: NodeId) -> Option<NodeId> {
        self.scopes
            .get_mut(scope.0 as usize)
            .and_then(|s| s.bind(name, node))
    }

    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<NodeId> {
        self.scope(scope).and_then(|s| s.lookup(name))
    }

    // ---- nodes ----

    pub fn node(&self, id: NodeId) -> Result<&Node, NodeError> {
        self.nodes.get(id.index()).ok_or(NodeError::UnknownNode(id))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, NodeError> {
        self.nodes.get_mut(id.index()).ok_or(NodeError::UnknownNode(id))
    }

    /// Hand out a slot for a node that is constructed later
    ///
    /// The handle can be stored in other nodes' fields before
    /// [`construct_node`](Self::construct_node) runs, which is how
    /// self-referential graphs are built and cloned.
    pub fn reserve_node(&mut self, scope: ScopeId, node_type: NodeType, name: Option<String>) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(Node {
            name,
            scope,
            node_type,
            body: NodeBody::Reserved,
            initialized: false,
        });
        id
    }

    /// Construct a reserved node from its initial field values
    pub fn construct_node(&mut self, node: NodeId, initial: InitialValues) -> Result<(), NodeError> {
        let node_type = self.node(node)?.node_type.clone();
        let body = node_type.class().construct(self, node, &node_type, initial)?;
        self.node_mut(node)?.body = body;
        Ok(())
    }

    /// Reserve, name and construct a node in one step
    pub fn create_node(
        &mut self,
        scope: ScopeId,
        node_type: NodeType,
        name: Option<String>,
        initial: InitialValues,
    ) -> Result<NodeId, NodeError> {
        let id = self.reserve_node(scope, node_type, name.clone());
        if let Some(name) = name {
            self.bind_name(scope, name, id);
        }
        self.construct_node(id, initial)?;
        Ok(id)
    }

    pub fn primitive(&self, node: NodeId) -> Result<&PrimitiveNode, NodeError> {
        let n = self.node(node)?;
        n.as_primitive()
            .ok_or_else(|| NodeError::instantiate(n.node_type.id(), "not a built-in node"))
    }

    pub(crate) fn primitive_mut(&mut self, node: NodeId) -> Result<&mut PrimitiveNode, NodeError> {
        let n = self.node_mut(node)?;
        let type_id = n.node_type.id().to_string();
        match &mut n.body {
            NodeBody::Primitive(p) => Ok(p),
            _ => Err(NodeError::instantiate(type_id, "not a built-in node")),
        }
    }

    // ---- fields ----

    fn field_interface(&self, node: NodeId, id: &str) -> Result<Interface, NodeError> {
        let node_type = &self.node(node)?.node_type;
        node_type
            .interfaces()
            .find_field(id)
            .cloned()
            .ok_or_else(|| NodeError::unsupported(node_type.id(), id))
    }

    /// Current value of a field or exposedField
    ///
    /// A prototype instance answers through its first IS target, falling back
    /// to its own stored value.
    pub fn field(&self, node: NodeId, id: &str) -> Result<FieldValue, NodeError> {
        self.field_interface(node, id)?;
        let n = self.node(node)?;
        match &n.body {
            NodeBody::Primitive(p) => p
                .field(id)
                .cloned()
                .ok_or_else(|| NodeError::unsupported(n.node_type.id(), id)),
            NodeBody::Proto(instance) => {
                if let Some((target, target_id)) = instance.field_targets(id).first() {
                    return self.field(*target, target_id);
                }
                instance
                    .own_field(id)
                    .cloned()
                    .ok_or_else(|| NodeError::unsupported(n.node_type.id(), id))
            }
            NodeBody::Reserved => Err(NodeError::instantiate(
                n.node_type.id(),
                "node is not constructed yet",
            )),
        }
    }

    /// Assign a field directly, without emitting events
    pub fn set_field(&mut self, node: NodeId, id: &str, value: FieldValue) -> Result<(), NodeError> {
        let interface = self.field_interface(node, id)?;
        if value.kind() != interface.kind {
            return Err(NodeError::mismatch(id, interface.kind, value.kind()));
        }
        let targets = match &self.node(node)?.body {
            NodeBody::Proto(instance) => instance.field_targets(id).to_vec(),
            _ => Vec::new(),
        };
        for (target, target_id) in &targets {
            self.set_field(*target, target_id, value.clone())?;
        }

        let n = self.node_mut(node)?;
        let type_id = n.node_type.id().to_string();
        match &mut n.body {
            NodeBody::Primitive(p) => match p.field_mut(id) {
                Some(slot) => slot.assign(&value)?,
                None => return Err(NodeError::unsupported(type_id, id)),
            },
            NodeBody::Proto(instance) => instance.set_own_field(id, value.clone()),
            NodeBody::Reserved => {
                return Err(NodeError::instantiate(type_id, "node is not constructed yet"))
            }
        }
        if interface.access == Access::ExposedField {
            if let Some(port) = n.output_port_mut(id) {
                port.set_value(value);
            }
        }
        Ok(())
    }

    /// Last value emitted on an eventOut or exposedField
    pub fn output_value(&self, node: NodeId, id: &str) -> Result<&FieldValue, NodeError> {
        let n = self.node(node)?;
        let interface = n
            .node_type
            .interfaces()
            .find_event_out(id)
            .ok_or_else(|| NodeError::unsupported(n.node_type.id(), id))?;
        n.output_port(&interface.id)
            .map(|port| port.value())
            .ok_or_else(|| NodeError::unsupported(n.node_type.id(), id))
    }

    // ---- routes ----

    fn event_out(&self, node: NodeId, id: &str) -> Result<Interface, NodeError> {
        let node_type = &self.node(node)?.node_type;
        node_type
            .interfaces()
            .find_event_out(id)
            .cloned()
            .ok_or_else(|| NodeError::unsupported(node_type.id(), id))
    }

    fn event_in(&self, node: NodeId, id: &str) -> Result<Interface, NodeError> {
        let node_type = &self.node(node)?.node_type;
        node_type
            .interfaces()
            .find_event_in(id)
            .cloned()
            .ok_or_else(|| NodeError::unsupported(node_type.id(), id))
    }

    /// Attach a sink to an output port after checking its kind
    pub(crate) fn add_sink(
        &mut self,
        from: NodeId,
        from_output: &str,
        sink: EventSink,
        kind: FieldKind,
    ) -> Result<bool, NodeError> {
        let output = self.event_out(from, from_output)?;
        if output.kind != kind {
            return Err(NodeError::mismatch(from_output, kind, output.kind));
        }
        let n = self.node_mut(from)?;
        let type_id = n.node_type.id().to_string();
        let port = n
            .output_port_mut(&output.id)
            .ok_or_else(|| NodeError::unsupported(type_id, from_output))?;
        Ok(port.add_sink(sink))
    }

    /// Connect `from.from_output` to `to.to_input`
    ///
    /// Returns false if the route already existed.
    pub fn add_route(
        &mut self,
        from: NodeId,
        from_output: &str,
        to: NodeId,
        to_input: &str,
    ) -> Result<bool, NodeError> {
        let input = self.event_in(to, to_input)?;
        let sink = EventSink::Input {
            node: to,
            input: input.id.clone(),
        };
        let added = self.add_sink(from, from_output, sink, input.kind)?;
        if added {
            debug!("route {}.{} TO {}.{}", from, from_output, to, input.id);
        }
        Ok(added)
    }

    /// Remove a route; returns false if it did not exist
    pub fn delete_route(
        &mut self,
        from: NodeId,
        from_output: &str,
        to: NodeId,
        to_input: &str,
    ) -> Result<bool, NodeError> {
        let output = self.event_out(from, from_output)?;
        let input = self.event_in(to, to_input)?;
        let sink = EventSink::Input {
            node: to,
            input: input.id,
        };
        let n = self.node_mut(from)?;
        Ok(n.output_port_mut(&output.id)
            .map(|port| port.remove_sink(&sink))
            .unwrap_or(false))
    }

    // ---- events ----

    /// Deliver an event to an eventIn and run the cascade to completion
    pub fn send_event(
        &mut self,
        node: NodeId,
        input: &str,
        value: FieldValue,
        timestamp: f64,
    ) -> Result<(), NodeError> {
        let interface = self.event_in(node, input)?;
        if interface.kind != value.kind() {
            return Err(NodeError::mismatch(input, interface.kind, value.kind()));
        }
        self.enqueue(
            EventSink::Input {
                node,
                input: interface.id,
            },
            value,
            timestamp,
        );
        self.dispatch();
        Ok(())
    }

    /// Emit on an output port of `node`
    ///
    /// The event is dropped unless its timestamp is newer than the port's
    /// last emission. Listeners are queued, not called, so a cascade runs
    /// breadth-first. Returns whether the event was emitted.
    pub fn emit(
        &mut self,
        node: NodeId,
        output: &str,
        value: FieldValue,
        timestamp: f64,
    ) -> Result<bool, NodeError> {
        let n = self.node_mut(node)?;
        let type_id = n.node_type.id().to_string();
        let port = n
            .output_port_mut(output)
            .ok_or_else(|| NodeError::unsupported(type_id, output))?;
        if port.kind() != value.kind() {
            return Err(NodeError::mismatch(output, port.kind(), value.kind()));
        }
        if !port.accept(value.clone(), timestamp) {
            trace!("dropped {}.{} at {}", node, output, timestamp);
            return Ok(false);
        }
        let sinks = port.sinks().to_vec();
        for sink in sinks {
            self.enqueue(sink, value.clone(), timestamp);
        }
        self.dispatch();
        Ok(true)
    }

    pub(crate) fn enqueue(&mut self, sink: EventSink, value: FieldValue, timestamp: f64) {
        self.queue.push_back(PendingEvent {
            sink,
            value,
            timestamp,
        });
    }

    /// Drain the event queue unless a drain is already running further up
    fn dispatch(&mut self) {
        if self.dispatching {
            return;
        }
        self.dispatching = true;
        while let Some(event) = self.queue.pop_front() {
            if self.trace_events {
                info!("event {:?} = {} at {}", event.sink, event.value, event.timestamp);
            } else {
                trace!("event {:?} at {}", event.sink, event.timestamp);
            }
            if let Err(e) = self.deliver(event) {
                warn!("event dropped: {}", e);
            }
        }
        self.dispatching = false;
    }

    fn deliver(&mut self, event: PendingEvent) -> Result<(), NodeError> {
        match event.sink {
            EventSink::Input { node, input } => {
                let interface = self.event_in(node, &input)?;
                let class = self.node(node)?.node_type.class().clone();
                class.process_event(self, node, &interface, event.value, event.timestamp)
            }
            EventSink::Output { node, output } => {
                self.emit(node, &output, event.value, event.timestamp)?;
                Ok(())
            }
        }
    }

    // ---- lifecycle ----

    fn lifecycle_children(&self, node: NodeId) -> Result<Vec<NodeId>, NodeError> {
        let n = self.node(node)?;
        Ok(match &n.body {
            NodeBody::Primitive(p) => n
                .node_type
                .interfaces()
                .iter()
                .filter(|i| i.kind.is_node())
                .filter_map(|i| p.field(&i.id))
                .flat_map(|v| v.node_refs())
                .collect(),
            NodeBody::Proto(instance) => instance.impl_nodes().to_vec(),
            NodeBody::Reserved => Vec::new(),
        })
    }

    /// Initialize a node and everything it contains
    ///
    /// Idempotent; a prototype instance forwards to its implementation nodes
    /// in order.
    pub fn initialize(&mut self, node: NodeId, timestamp: f64) -> Result<(), NodeError> {
        let n = self.node_mut(node)?;
        if n.initialized {
            return Ok(());
        }
        n.initialized = true;
        debug!("initialize {} ({}) at {}", node, n.node_type.id(), timestamp);
        for child in self.lifecycle_children(node)? {
            self.initialize(child, timestamp)?;
        }
        Ok(())
    }

    /// Shut a node and everything it contains down
    pub fn shutdown(&mut self, node: NodeId, timestamp: f64) -> Result<(), NodeError> {
        let n = self.node_mut(node)?;
        if !n.initialized {
            return Ok(());
        }
        n.initialized = false;
        debug!("shutdown {} ({}) at {}", node, n.node_type.id(), timestamp);
        for child in self.lifecycle_children(node)? {
            self.shutdown(child, timestamp)?;
        }
        Ok(())
    }

    // ---- capabilities ----

    /// The node answering capability probes for `node`
    ///
    /// A prototype instance is represented by its first implementation node.
    fn capability_node(&self, node: NodeId) -> Option<&Node> {
        let mut current = self.node(node).ok()?;
        for _ in 0..=self.nodes.len() {
            match &current.body {
                NodeBody::Proto(instance) => {
                    current = self.node(*instance.impl_nodes().first()?).ok()?;
                }
                _ => return Some(current),
            }
        }
        None
    }

    /// Capabilities of the node, forwarded through prototype instances
    pub fn capabilities(&self, node: NodeId) -> &[Capability] {
        self.capability_node(node)
            .map(|n| n.node_type.class().capabilities())
            .unwrap_or(&[])
    }

    /// The node that implements `capability` for `node`, if any
    pub fn to_capability(&self, node: NodeId, capability: Capability) -> Option<NodeId> {
        let n = self.capability_node(node)?;
        if !n.node_type.class().capabilities().contains(&capability) {
            return None;
        }
        // the answering node is the end of the first-impl chain
        let mut current = node;
        while let Some(instance) = self.node(current).ok()?.as_proto() {
            current = *instance.impl_nodes().first()?;
        }
        Some(current)
    }

    pub fn has_capability(&self, node: NodeId, capability: Capability) -> bool {
        self.to_capability(node, capability).is_some()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::node::{Behavior, BuiltinClass, InterfaceSet, NodeClass};

    fn class(name: &str, interfaces: Vec<Interface>, capabilities: Vec<Capability>) -> Arc<dyn NodeClass> {
        let set = InterfaceSet::from_interfaces(interfaces).expect("unique ids");
        Arc::new(BuiltinClass::new(
            name,
            set,
            HashMap::new(),
            capabilities,
            Behavior::ExposedFields,
        ))
    }

    fn leaf_type() -> NodeType {
        let class = class(
            "Leaf",
            vec![
                Interface::new(Access::ExposedField, FieldKind::SfFloat, "size"),
                Interface::new(Access::EventIn, FieldKind::SfBool, "set_on"),
                Interface::new(Access::EventOut, FieldKind::SfFloat, "size_out"),
            ],
            vec![Capability::Geometry],
        );
        NodeType::full(class, "Leaf")
    }

    fn group_type() -> NodeType {
        let class = class(
            "Group",
            vec![Interface::new(Access::ExposedField, FieldKind::MfNode, "children")],
            vec![Capability::Grouping, Capability::Child],
        );
        NodeType::full(class, "Group")
    }

    pub(crate) fn test_graph() -> (SceneGraph, ScopeId) {
        let mut graph = SceneGraph::new();
        let scope = graph.create_scope("test:", None);
        (graph, scope)
    }

    pub(crate) fn leaf(graph: &mut SceneGraph, scope: ScopeId) -> NodeId {
        graph
            .create_node(scope, leaf_type(), None, HashMap::new())
            .expect("leaf")
    }

    pub(crate) fn group(graph: &mut SceneGraph, scope: ScopeId, children: Vec<NodeId>) -> NodeId {
        let mut initial = HashMap::new();
        initial.insert("children".to_string(), FieldValue::MfNode(children));
        graph
            .create_node(scope, group_type(), None, initial)
            .expect("group")
    }

    #[test]
    fn test_create_node_binds_name() {
        let (mut graph, scope) = test_graph();
        let id = graph
            .create_node(scope, leaf_type(), Some("A".into()), HashMap::new())
            .unwrap();
        assert_eq!(graph.lookup(scope, "A"), Some(id));
        assert_eq!(graph.node(id).unwrap().name(), Some("A"));
    }

    #[test]
    fn test_field_access() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        assert_eq!(graph.field(a, "size").unwrap(), FieldValue::SfFloat(0.0));
        graph.set_field(a, "size", FieldValue::SfFloat(2.0)).unwrap();
        assert_eq!(graph.field(a, "size").unwrap(), FieldValue::SfFloat(2.0));

        assert!(matches!(
            graph.field(a, "radius"),
            Err(NodeError::UnsupportedInterface { .. })
        ));
        assert!(matches!(
            graph.set_field(a, "size", FieldValue::SfInt32(1)),
            Err(NodeError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_exposed_field_event_emits() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        let b = leaf(&mut graph, scope);
        assert!(graph.add_route(a, "size_changed", b, "set_size").unwrap());

        graph.send_event(a, "set_size", FieldValue::SfFloat(3.0), 1.0).unwrap();
        assert_eq!(graph.field(b, "size").unwrap(), FieldValue::SfFloat(3.0));
        assert_eq!(graph.output_value(b, "size_changed").unwrap(), &FieldValue::SfFloat(3.0));
    }

    #[test]
    fn test_route_cycle_terminates() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        let b = leaf(&mut graph, scope);
        graph.add_route(a, "size", b, "size").unwrap();
        graph.add_route(b, "size", a, "size").unwrap();

        graph.send_event(a, "size", FieldValue::SfFloat(5.0), 1.0).unwrap();
        assert_eq!(graph.field(a, "size").unwrap(), FieldValue::SfFloat(5.0));
        assert_eq!(graph.field(b, "size").unwrap(), FieldValue::SfFloat(5.0));
    }

    #[test]
    fn test_route_checks() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        let b = leaf(&mut graph, scope);
        assert!(matches!(
            graph.add_route(a, "size_changed", b, "set_on"),
            Err(NodeError::TypeMismatch { .. })
        ));
        assert!(matches!(
            graph.add_route(a, "missing", b, "set_size"),
            Err(NodeError::UnsupportedInterface { .. })
        ));
        assert!(graph.add_route(a, "size", b, "size").unwrap());
        assert!(!graph.add_route(a, "size_changed", b, "set_size").unwrap());
        assert!(graph.delete_route(a, "size", b, "size").unwrap());
        assert!(!graph.delete_route(a, "size", b, "size").unwrap());
    }

    #[test]
    fn test_plain_event_in_is_recorded() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        graph.send_event(a, "set_on", FieldValue::SfBool(true), 4.0).unwrap();
        let event = graph.primitive(a).unwrap().last_event().cloned().unwrap();
        assert_eq!(
            event,
            ReceivedEvent {
                input: "set_on".into(),
                value: FieldValue::SfBool(true),
                timestamp: 4.0,
            }
        );
    }

    #[test]
    fn test_initialize_descends_and_handles_cycles() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        let g = group(&mut graph, scope, vec![a]);
        graph
            .set_field(g, "children", FieldValue::MfNode(vec![a, g]))
            .unwrap();

        graph.initialize(g, 0.0).unwrap();
        assert!(graph.node(a).unwrap().is_initialized());
        assert!(graph.node(g).unwrap().is_initialized());

        graph.shutdown(g, 1.0).unwrap();
        assert!(!graph.node(a).unwrap().is_initialized());
    }

    #[test]
    fn test_capabilities_of_primitive() {
        let (mut graph, scope) = test_graph();
        let a = leaf(&mut graph, scope);
        assert_eq!(graph.capabilities(a), &[Capability::Geometry]);
        assert_eq!(graph.to_capability(a, Capability::Geometry), Some(a));
        assert!(!graph.has_capability(a, Capability::Light));
    }
}
