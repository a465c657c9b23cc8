//! Node interfaces: the public fields, eventIns and eventOuts of a node type

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::field::FieldKind;

/// Direction of an interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Access {
    /// Input only
    #[serde(alias = "inputOnly")]
    EventIn,
    /// Output only
    #[serde(alias = "outputOnly")]
    EventOut,
    /// Stored value that is both an input and an output
    #[serde(alias = "inputOutput")]
    ExposedField,
    /// Stored value set at creation time only
    #[serde(alias = "initializeOnly")]
    Field,
}

impl Access {
    pub fn keyword(self) -> &'static str {
        match self {
            Access::EventIn => "eventIn",
            Access::EventOut => "eventOut",
            Access::ExposedField => "exposedField",
            Access::Field => "field",
        }
    }

    /// Parse a scene-syntax keyword, accepting the X3D spellings
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "eventIn" | "inputOnly" => Some(Access::EventIn),
            "eventOut" | "outputOnly" => Some(Access::EventOut),
            "exposedField" | "inputOutput" => Some(Access::ExposedField),
            "field" | "initializeOnly" => Some(Access::Field),
            _ => None,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, Access::EventIn | Access::ExposedField)
    }

    pub fn is_output(self) -> bool {
        matches!(self, Access::EventOut | Access::ExposedField)
    }

    /// Whether interfaces of this access hold a stored value
    pub fn has_value(self) -> bool {
        matches!(self, Access::Field | Access::ExposedField)
    }
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One declared interface
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Interface {
    pub access: Access,
    pub kind: FieldKind,
    pub id: String,
}

impl Interface {
    pub fn new(access: Access, kind: FieldKind, id: impl Into<String>) -> Self {
        Self {
            access,
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.access, self.kind, self.id)
    }
}

/// Interfaces of a node type, unique by id, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceSet {
    interfaces: Vec<Interface>,
}

impl InterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set, failing with the first interface whose id is taken
    pub fn from_interfaces(
        interfaces: impl IntoIterator<Item = Interface>,
    ) -> Result<Self, Interface> {
        let mut set = Self::new();
        for interface in interfaces {
            set.insert(interface)?;
        }
        Ok(set)
    }

    /// Add an interface; gives it back if its id is already declared
    pub fn insert(&mut self, interface: Interface) -> Result<(), Interface> {
        if self.get(&interface.id).is_some() {
            return Err(interface);
        }
        self.interfaces.push(interface);
        Ok(())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Interface> {
        self.interfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    /// Exact lookup by id
    pub fn get(&self, id: &str) -> Option<&Interface> {
        self.interfaces.iter().find(|i| i.id == id)
    }

    pub fn contains(&self, interface: &Interface) -> bool {
        self.interfaces.contains(interface)
    }

    /// Find the input addressed by `id`
    ///
    /// An exposedField `x` is also addressable as `set_x`.
    pub fn find_event_in(&self, id: &str) -> Option<&Interface> {
        self.interfaces
            .iter()
            .find(|i| i.id == id && i.access.is_input())
            .or_else(|| {
                let field = id.strip_prefix("set_")?;
                self.interfaces
                    .iter()
                    .find(|i| i.id == field && i.access == Access::ExposedField)
            })
    }

    /// Find the output addressed by `id`
    ///
    /// An exposedField `x` is also addressable as `x_changed`.
    pub fn find_event_out(&self, id: &str) -> Option<&Interface> {
        self.interfaces
            .iter()
            .find(|i| i.id == id && i.access.is_output())
            .or_else(|| {
                let field = id.strip_suffix("_changed")?;
                self.interfaces
                    .iter()
                    .find(|i| i.id == field && i.access == Access::ExposedField)
            })
    }

    /// Find a field or exposedField by id
    pub fn find_field(&self, id: &str) -> Option<&Interface> {
        self.interfaces
            .iter()
            .find(|i| i.id == id && i.access.has_value())
    }

    /// Find the interface `id` names for the given access
    pub fn find(&self, access: Access, id: &str) -> Option<&Interface> {
        match access {
            Access::EventIn => self.find_event_in(id),
            Access::EventOut => self.find_event_out(id),
            Access::ExposedField => self
                .get(id)
                .filter(|i| i.access == Access::ExposedField),
            Access::Field => self.find_field(id),
        }
    }

    /// The first interface of `self` that `other` does not declare
    pub fn first_missing_from(&self, other: &InterfaceSet) -> Option<&Interface> {
        self.interfaces.iter().find(|i| !other.contains(i))
    }

    pub fn is_subset_of(&self, other: &InterfaceSet) -> bool {
        self.first_missing_from(other).is_none()
    }
}

impl<'a> IntoIterator for &'a InterfaceSet {
    type Item = &'a Interface;
    type IntoIter = std::slice::Iter<'a, Interface>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
