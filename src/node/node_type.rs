//! Node classes and node types

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::field::FieldValue;
use crate::graph::{NodeBody, NodeError, NodeId, SceneGraph};

use super::{Interface, InterfaceSet};

/// Initial field values keyed by interface id
pub type InitialValues = HashMap<String, FieldValue>;

/// Node families a node can be probed for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Appearance,
    BoundedVolume,
    Child,
    Geometry,
    Grouping,
    Interpolator,
    Light,
    Material,
    Sensor,
    TimeDependent,
    Transform,
    Viewpoint,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::Appearance => "appearance",
            Capability::BoundedVolume => "bounded_volume",
            Capability::Child => "child",
            Capability::Geometry => "geometry",
            Capability::Grouping => "grouping",
            Capability::Interpolator => "interpolator",
            Capability::Light => "light",
            Capability::Material => "material",
            Capability::Sensor => "sensor",
            Capability::TimeDependent => "time_dependent",
            Capability::Transform => "transform",
            Capability::Viewpoint => "viewpoint",
        };
        f.write_str(name)
    }
}

/// A node class: the factory behind every node type with the same id
///
/// Built-in classes come from a [`Profile`](crate::profile::Profile);
/// prototype classes from `PROTO` definitions.
pub trait NodeClass: fmt::Debug {
    /// URI-style identifier the class is registered under
    fn id(&self) -> &str;

    /// Every interface the class supports
    fn interfaces(&self) -> &InterfaceSet;

    fn capabilities(&self) -> &[Capability] {
        &[]
    }

    /// Declared default of a field or exposedField, if the class has one
    fn field_default(&self, _id: &str) -> Option<FieldValue> {
        None
    }

    /// Build the body of the reserved node `node`
    fn construct(
        &self,
        graph: &mut SceneGraph,
        node: NodeId,
        node_type: &NodeType,
        initial: InitialValues,
    ) -> Result<NodeBody, NodeError>;

    /// Handle an event delivered to `input`
    fn process_event(
        &self,
        graph: &mut SceneGraph,
        node: NodeId,
        input: &Interface,
        value: FieldValue,
        timestamp: f64,
    ) -> Result<(), NodeError>;
}

/// A class bound to a set of exposed interfaces
#[derive(Clone)]
pub struct NodeType {
    class: Arc<dyn NodeClass>,
    id: String,
    interfaces: InterfaceSet,
}

impl NodeType {
    /// Bind `class` to `interfaces`, which must be a subset of the class's
    pub fn new(
        class: Arc<dyn NodeClass>,
        id: impl Into<String>,
        interfaces: InterfaceSet,
    ) -> Result<Self, NodeError> {
        let id = id.into();
        if let Some(missing) = interfaces.first_missing_from(class.interfaces()) {
            return Err(NodeError::unsupported(id, missing.to_string()));
        }
        Ok(Self {
            class,
            id,
            interfaces,
        })
    }

    /// A type exposing every interface of the class
    pub fn full(class: Arc<dyn NodeClass>, id: impl Into<String>) -> Self {
        let interfaces = class.interfaces().clone();
        Self {
            class,
            id: id.into(),
            interfaces,
        }
    }

    /// Type name as written in scene syntax
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn interfaces(&self) -> &InterfaceSet {
        &self.interfaces
    }

    pub fn class(&self) -> &Arc<dyn NodeClass> {
        &self.class
    }
}

impl fmt::Debug for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeType")
            .field("class", &self.class.id())
            .field("id", &self.id)
            .field("interfaces", &self.interfaces.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldKind;
    use crate::node::{Access, Behavior, BuiltinClass};

    fn sphere() -> Arc<dyn NodeClass> {
        let interfaces = InterfaceSet::from_interfaces(vec![
            Interface::new(Access::Field, FieldKind::SfFloat, "radius"),
            Interface::new(Access::EventOut, FieldKind::SfBool, "isActive"),
        ])
        .unwrap();
        Arc::new(BuiltinClass::new(
            "Sphere",
            interfaces,
            HashMap::new(),
            vec![Capability::Geometry],
            Behavior::ExposedFields,
        ))
    }

    #[test]
    fn test_subset_type() {
        let subset = InterfaceSet::from_interfaces(vec![Interface::new(
            Access::Field,
            FieldKind::SfFloat,
            "radius",
        )])
        .unwrap();
        let t = NodeType::new(sphere(), "Sphere", subset).unwrap();
        assert_eq!(t.interfaces().len(), 1);
    }

    #[test]
    fn test_unsupported_interface() {
        let extra = InterfaceSet::from_interfaces(vec![Interface::new(
            Access::Field,
            FieldKind::SfFloat,
            "height",
        )])
        .unwrap();
        let err = NodeType::new(sphere(), "Sphere", extra).unwrap_err();
        assert!(matches!(err, NodeError::UnsupportedInterface { .. }));
    }

    #[test]
    fn test_capability_serde_names() {
        #[derive(Deserialize)]
        struct Doc {
            caps: Vec<Capability>,
        }
        let doc: Doc = toml::from_str(r#"caps = ["bounded_volume", "time_dependent"]"#).unwrap();
        assert_eq!(doc.caps, vec![Capability::BoundedVolume, Capability::TimeDependent]);
        assert_eq!(Capability::BoundedVolume.to_string(), "bounded_volume");
    }
}
