//! Built-in node classes defined by a profile

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::field::{FieldValue, Vec3f};
use crate::graph::{EventPort, NodeBody, NodeError, NodeId, PrimitiveNode, SceneGraph};

use super::registry::builtin_id;
use super::{Access, Capability, InitialValues, Interface, InterfaceSet, NodeClass, NodeType};

/// Event handling of a built-in class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Behavior {
    /// `set_x` on an exposedField stores the value and emits `x_changed`
    #[default]
    ExposedFields,
    /// Adds `addChildren`/`removeChildren` on the `children` field
    Grouping,
    /// `set_fraction` interpolates `keyValue` (MFFloat) into `value_changed`
    ScalarInterpolator,
    /// `set_fraction` interpolates `keyValue` (MFVec3f) into `value_changed`
    PositionInterpolator,
}

/// A primitive node class
#[derive(Debug, Clone)]
pub struct BuiltinClass {
    id: String,
    name: String,
    interfaces: InterfaceSet,
    defaults: HashMap<String, FieldValue>,
    capabilities: Vec<Capability>,
    behavior: Behavior,
}

impl BuiltinClass {
    /// Create a class registered as `urn:X-protoscene:node:<name>`
    ///
    /// Fields missing from `defaults` default to the zero value of their kind.
    pub fn new(
        name: impl Into<String>,
        interfaces: InterfaceSet,
        defaults: HashMap<String, FieldValue>,
        capabilities: Vec<Capability>,
        behavior: Behavior,
    ) -> Self {
        let name = name.into();
        Self {
            id: builtin_id(&name),
            name,
            interfaces,
            defaults,
            capabilities,
            behavior,
        }
    }

    /// Type name as written in scene syntax
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn behavior(&self) -> Behavior {
        self.behavior
    }

    /// Default value of a field or exposedField
    pub fn default_value(&self, interface: &Interface) -> FieldValue {
        self.defaults
            .get(&interface.id)
            .cloned()
            .unwrap_or_else(|| FieldValue::default_for(interface.kind))
    }
}

impl NodeClass for BuiltinClass {
    fn id(&self) -> &str {
        &self.id
    }

    fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    fn field_default(&self, id: &str) -> Option<FieldValue> {
        self.interfaces.find_field(id).map(|i| self.default_value(i))
    }

    fn construct(
        &self,
        _graph: &mut SceneGraph,
        _node: NodeId,
        node_type: &NodeType,
        mut initial: InitialValues,
    ) -> Result<NodeBody, NodeError> {
        for (id, value) in &initial {
            let interface = node_type
                .interfaces()
                .find_field(id)
                .ok_or_else(|| NodeError::unsupported(node_type.id(), id.as_str()))?;
            if interface.kind != value.kind() {
                return Err(NodeError::mismatch(id.as_str(), interface.kind, value.kind()));
            }
        }

        let mut fields = HashMap::new();
        let mut outputs = HashMap::new();
        for interface in node_type.interfaces() {
            if interface.access.has_value() {
                let value = initial
                    .remove(&interface.id)
                    .unwrap_or_else(|| self.default_value(interface));
                fields.insert(interface.id.clone(), value);
            }
            if interface.access.is_output() {
                let value = fields
                    .get(&interface.id)
                    .cloned()
                    .unwrap_or_else(|| FieldValue::default_for(interface.kind));
                outputs.insert(interface.id.clone(), EventPort::new(value));
            }
        }
        Ok(NodeBody::Primitive(PrimitiveNode::new(fields, outputs)))
    }

    fn process_event(
        &self,
        graph: &mut SceneGraph,
        node: NodeId,
        input: &Interface,
        value: FieldValue,
        timestamp: f64,
    ) -> Result<(), NodeError> {
        if value.kind() != input.kind {
            return Err(NodeError::mismatch(input.id.as_str(), input.kind, value.kind()));
        }
        match (self.behavior, input.id.as_str()) {
            (Behavior::Grouping, "addChildren") => {
                update_children(graph, node, &value, timestamp, true)
            }
            (Behavior::Grouping, "removeChildren") => {
                update_children(graph, node, &value, timestamp, false)
            }
            (Behavior::ScalarInterpolator, "set_fraction") => {
                graph.primitive_mut(node)?.record(&input.id, value.clone(), timestamp);
                let fraction = value.as_float().unwrap_or_default();
                let p = graph.primitive(node)?;
                let keys = p.field("key").and_then(FieldValue::as_floats).unwrap_or(&[]);
                let values = p.field("keyValue").and_then(FieldValue::as_floats).unwrap_or(&[]);
                if let Some(v) = interpolate(keys, values, fraction, |a, b, s| a + (b - a) * s) {
                    graph.emit(node, "value_changed", FieldValue::SfFloat(v), timestamp)?;
                }
                Ok(())
            }
            (Behavior::PositionInterpolator, "set_fraction") => {
                graph.primitive_mut(node)?.record(&input.id, value.clone(), timestamp);
                let fraction = value.as_float().unwrap_or_default();
                let p = graph.primitive(node)?;
                let keys = p.field("key").and_then(FieldValue::as_floats).unwrap_or(&[]);
                let values = p.field("keyValue").and_then(FieldValue::as_vec3fs).unwrap_or(&[]);
                if let Some(v) = interpolate(keys, values, fraction, lerp_vec3f) {
                    graph.emit(node, "value_changed", FieldValue::SfVec3f(v), timestamp)?;
                }
                Ok(())
            }
            _ if input.access == Access::ExposedField => {
                let p = graph.primitive_mut(node)?;
                match p.field_mut(&input.id) {
                    Some(slot) => slot.assign(&value)?,
                    None => return Err(NodeError::unsupported(self.name.as_str(), input.id.as_str())),
                }
                graph.emit(node, &input.id, value, timestamp)?;
                Ok(())
            }
            _ => {
                graph.primitive_mut(node)?.record(&input.id, value, timestamp);
                Ok(())
            }
        }
    }
}

fn update_children(
    graph: &mut SceneGraph,
    node: NodeId,
    value: &FieldValue,
    timestamp: f64,
    add: bool,
) -> Result<(), NodeError> {
    let nodes = value.as_nodes().unwrap_or(&[]);
    let p = graph.primitive_mut(node)?;
    let children = match p.field_mut("children") {
        Some(FieldValue::MfNode(children)) => children,
        _ => return Err(NodeError::unsupported("grouping node", "children")),
    };
    let before = children.clone();
    if add {
        for n in nodes {
            if !children.contains(n) {
                children.push(*n);
            }
        }
    } else {
        children.retain(|c| !nodes.contains(c));
    }
    if *children != before {
        let updated = FieldValue::MfNode(children.clone());
        graph.emit(node, "children", updated, timestamp)?;
    }
    Ok(())
}

fn lerp_vec3f(a: Vec3f, b: Vec3f, s: f32) -> Vec3f {
    [
        a[0] + (b[0] - a[0]) * s,
        a[1] + (b[1] - a[1]) * s,
        a[2] + (b[2] - a[2]) * s,
    ]
}

/// Piecewise-linear interpolation of `values` over `keys`
///
/// Clamped to the first and last value outside the key range. Returns None
/// when there are no keys or fewer values than keys.
pub fn interpolate<T: Copy>(
    keys: &[f32],
    values: &[T],
    fraction: f32,
    lerp: impl Fn(T, T, f32) -> T,
) -> Option<T> {
    let n = keys.len();
    if n == 0 || values.len() < n {
        return None;
    }
    if fraction <= keys[0] {
        return Some(values[0]);
    }
    if fraction >= keys[n - 1] {
        return Some(values[n - 1]);
    }
    for i in 0..n - 1 {
        if fraction >= keys[i] && fraction < keys[i + 1] {
            let span = keys[i + 1] - keys[i];
            if span <= 0.0 {
                return Some(values[i + 1]);
            }
            return Some(lerp(values[i], values[i + 1], (fraction - keys[i]) / span));
        }
    }
    Some(values[n - 1])
}
