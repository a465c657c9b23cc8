//! Arena node storage

use std::collections::HashMap;

use crate::field::FieldValue;
use crate::node::NodeType;
use crate::proto::ProtoInstance;

use super::{EventPort, ScopeId};

/// A node in the [`SceneGraph`](super::SceneGraph) arena
#[derive(Debug)]
pub struct Node {
    pub(crate) name: Option<String>,
    pub(crate) scope: ScopeId,
    pub(crate) node_type: NodeType,
    pub(crate) body: NodeBody,
    pub(crate) initialized: bool,
}

impl Node {
    /// User-assigned (`DEF`) name, if any
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Scope the node was created in
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The prototype instance behind this node, if it is one
    pub fn as_proto(&self) -> Option<&ProtoInstance> {
        match &self.body {
            NodeBody::Proto(instance) => Some(instance),
            _ => None,
        }
    }

    pub fn as_primitive(&self) -> Option<&PrimitiveNode> {
        match &self.body {
            NodeBody::Primitive(primitive) => Some(primitive),
            _ => None,
        }
    }

    pub(crate) fn output_port_mut(&mut self, id: &str) -> Option<&mut EventPort> {
        match &mut self.body {
            NodeBody::Primitive(p) => p.outputs.get_mut(id),
            NodeBody::Proto(i) => i.output_mut(id),
            NodeBody::Reserved => None,
        }
    }

    pub(crate) fn output_port(&self, id: &str) -> Option<&EventPort> {
        match &self.body {
            NodeBody::Primitive(p) => p.outputs.get(id),
            NodeBody::Proto(i) => i.output(id),
            NodeBody::Reserved => None,
        }
    }
}

/// What implements a node
#[derive(Debug)]
pub enum NodeBody {
    /// Slot handed out before the node is constructed
    Reserved,
    /// A built-in node storing its own fields
    Primitive(PrimitiveNode),
    /// A prototype instance forwarding to its implementation nodes
    Proto(ProtoInstance),
}

/// The last event a primitive node received on a plain eventIn
#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedEvent {
    pub input: String,
    pub value: FieldValue,
    pub timestamp: f64,
}

/// Field storage and output ports of a built-in node
#[derive(Debug, Clone, Default)]
pub struct PrimitiveNode {
    pub(crate) fields: HashMap<String, FieldValue>,
    pub(crate) outputs: HashMap<String, EventPort>,
    pub(crate) last_event: Option<ReceivedEvent>,
}

impl PrimitiveNode {
    pub fn new(fields: HashMap<String, FieldValue>, outputs: HashMap<String, EventPort>) -> Self {
        Self {
            fields,
            outputs,
            last_event: None,
        }
    }

    pub fn field(&self, id: &str) -> Option<&FieldValue> {
        self.fields.get(id)
    }

    pub fn output(&self, id: &str) -> Option<&EventPort> {
        self.outputs.get(id)
    }

    pub fn last_event(&self) -> Option<&ReceivedEvent> {
        self.last_event.as_ref()
    }

    pub(crate) fn field_mut(&mut self, id: &str) -> Option<&mut FieldValue> {
        self.fields.get_mut(id)
    }

    pub(crate) fn record(&mut self, input: &str, value: FieldValue, timestamp: f64) {
        self.last_event = Some(ReceivedEvent {
            input: input.to_string(),
            value,
            timestamp,
        });
    }
}
