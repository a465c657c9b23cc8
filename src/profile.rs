//! Profiles: TOML descriptions of the built-in node classes
//!
//! A profile lists the primitive node classes a scene may use, with their
//! interfaces, default values (written in scene syntax), capabilities and
//! event behavior. The default profile covers a small VRML97 subset.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::field::{FieldKind, FieldValue};
use crate::node::{
    Access, Behavior, BuiltinClass, Capability, Interface, InterfaceSet, RegistryError,
    TypeRegistry,
};

/// Errors that can occur when loading or registering profiles
#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Failed to read profile file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse profile TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid interface in class '{class}': {reason}")]
    InvalidInterface { class: String, reason: String },
    #[error("Invalid default for {class}.{interface}: {reason}")]
    InvalidDefault {
        class: String,
        interface: String,
        reason: String,
    },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A set of built-in node classes
#[derive(Debug, Clone)]
pub struct Profile {
    /// Optional name for the profile
    pub name: Option<String>,
    /// Optional description
    pub description: Option<String>,
    /// Classes in declaration order
    pub classes: Vec<BuiltinClass>,
}

/// TOML structure for deserializing profiles
#[derive(Deserialize)]
struct TomlProfile {
    metadata: Option<TomlMetadata>,
    #[serde(default, rename = "class")]
    classes: Vec<TomlClass>,
}

#[derive(Deserialize)]
struct TomlMetadata {
    name: Option<String>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct TomlClass {
    name: String,
    #[serde(default)]
    capabilities: Vec<Capability>,
    #[serde(default)]
    behavior: Behavior,
    #[serde(default)]
    interfaces: Vec<TomlInterface>,
}

#[derive(Deserialize)]
struct TomlInterface {
    access: Access,
    #[serde(rename = "type")]
    kind: String,
    id: String,
    default: Option<String>,
}

/// Default profile - a VRML97 subset without rendering-only nodes
const DEFAULT_PROFILE: &str = r#"
[metadata]
name = "vrml97-core"
description = "Grouping, shapes, lights, viewpoints, interpolators and sensors"

[[class]]
name = "Group"
behavior = "grouping"
capabilities = ["grouping", "child", "bounded_volume"]
interfaces = [
    { access = "eventIn", type = "MFNode", id = "addChildren" },
    { access = "eventIn", type = "MFNode", id = "removeChildren" },
    { access = "exposedField", type = "MFNode", id = "children", default = "[]" },
    { access = "field", type = "SFVec3f", id = "bboxCenter", default = "0 0 0" },
    { access = "field", type = "SFVec3f", id = "bboxSize", default = "-1 -1 -1" },
]

[[class]]
name = "Transform"
behavior = "grouping"
capabilities = ["grouping", "child", "transform", "bounded_volume"]
interfaces = [
    { access = "eventIn", type = "MFNode", id = "addChildren" },
    { access = "eventIn", type = "MFNode", id = "removeChildren" },
    { access = "exposedField", type = "SFVec3f", id = "center", default = "0 0 0" },
    { access = "exposedField", type = "MFNode", id = "children", default = "[]" },
    { access = "exposedField", type = "SFRotation", id = "rotation", default = "0 0 1 0" },
    { access = "exposedField", type = "SFVec3f", id = "scale", default = "1 1 1" },
    { access = "exposedField", type = "SFRotation", id = "scaleOrientation", default = "0 0 1 0" },
    { access = "exposedField", type = "SFVec3f", id = "translation", default = "0 0 0" },
    { access = "field", type = "SFVec3f", id = "bboxCenter", default = "0 0 0" },
    { access = "field", type = "SFVec3f", id = "bboxSize", default = "-1 -1 -1" },
]

[[class]]
name = "Shape"
capabilities = ["child", "bounded_volume"]
interfaces = [
    { access = "exposedField", type = "SFNode", id = "appearance", default = "NULL" },
    { access = "exposedField", type = "SFNode", id = "geometry", default = "NULL" },
]

[[class]]
name = "Appearance"
capabilities = ["appearance"]
interfaces = [
    { access = "exposedField", type = "SFNode", id = "material", default = "NULL" },
    { access = "exposedField", type = "SFNode", id = "texture", default = "NULL" },
    { access = "exposedField", type = "SFNode", id = "textureTransform", default = "NULL" },
]

[[class]]
name = "Material"
capabilities = ["material"]
interfaces = [
    { access = "exposedField", type = "SFFloat", id = "ambientIntensity", default = "0.2" },
    { access = "exposedField", type = "SFColor", id = "diffuseColor", default = "0.8 0.8 0.8" },
    { access = "exposedField", type = "SFColor", id = "emissiveColor", default = "0 0 0" },
    { access = "exposedField", type = "SFFloat", id = "shininess", default = "0.2" },
    { access = "exposedField", type = "SFColor", id = "specularColor", default = "0 0 0" },
    { access = "exposedField", type = "SFFloat", id = "transparency", default = "0" },
]

[[class]]
name = "Box"
capabilities = ["geometry"]
interfaces = [
    { access = "field", type = "SFVec3f", id = "size", default = "2 2 2" },
]

[[class]]
name = "Sphere"
capabilities = ["geometry"]
interfaces = [
    { access = "field", type = "SFFloat", id = "radius", default = "1" },
]

[[class]]
name = "Cone"
capabilities = ["geometry"]
interfaces = [
    { access = "field", type = "SFFloat", id = "bottomRadius", default = "1" },
    { access = "field", type = "SFFloat", id = "height", default = "2" },
    { access = "field", type = "SFBool", id = "side", default = "TRUE" },
    { access = "field", type = "SFBool", id = "bottom", default = "TRUE" },
]

[[class]]
name = "Cylinder"
capabilities = ["geometry"]
interfaces = [
    { access = "field", type = "SFBool", id = "bottom", default = "TRUE" },
    { access = "field", type = "SFFloat", id = "height", default = "2" },
    { access = "field", type = "SFFloat", id = "radius", default = "1" },
    { access = "field", type = "SFBool", id = "side", default = "TRUE" },
    { access = "field", type = "SFBool", id = "top", default = "TRUE" },
]

[[class]]
name = "DirectionalLight"
capabilities = ["light", "child"]
interfaces = [
    { access = "exposedField", type = "SFFloat", id = "ambientIntensity", default = "0" },
    { access = "exposedField", type = "SFColor", id = "color", default = "1 1 1" },
    { access = "exposedField", type = "SFVec3f", id = "direction", default = "0 0 -1" },
    { access = "exposedField", type = "SFFloat", id = "intensity", default = "1" },
    { access = "exposedField", type = "SFBool", id = "on", default = "TRUE" },
]

[[class]]
name = "PointLight"
capabilities = ["light", "child"]
interfaces = [
    { access = "exposedField", type = "SFFloat", id = "ambientIntensity", default = "0" },
    { access = "exposedField", type = "SFVec3f", id = "attenuation", default = "1 0 0" },
    { access = "exposedField", type = "SFColor", id = "color", default = "1 1 1" },
    { access = "exposedField", type = "SFFloat", id = "intensity", default = "1" },
    { access = "exposedField", type = "SFVec3f", id = "location", default = "0 0 0" },
    { access = "exposedField", type = "SFBool", id = "on", default = "TRUE" },
    { access = "exposedField", type = "SFFloat", id = "radius", default = "100" },
]

[[class]]
name = "Viewpoint"
capabilities = ["viewpoint", "child"]
interfaces = [
    { access = "eventIn", type = "SFBool", id = "set_bind" },
    { access = "exposedField", type = "SFFloat", id = "fieldOfView", default = "0.785398" },
    { access = "exposedField", type = "SFBool", id = "jump", default = "TRUE" },
    { access = "exposedField", type = "SFRotation", id = "orientation", default = "0 0 1 0" },
    { access = "exposedField", type = "SFVec3f", id = "position", default = "0 0 10" },
    { access = "field", type = "SFString", id = "description", default = '""' },
    { access = "eventOut", type = "SFTime", id = "bindTime" },
    { access = "eventOut", type = "SFBool", id = "isBound" },
]

[[class]]
name = "ScalarInterpolator"
behavior = "scalar_interpolator"
capabilities = ["interpolator", "child"]
interfaces = [
    { access = "eventIn", type = "SFFloat", id = "set_fraction" },
    { access = "exposedField", type = "MFFloat", id = "key", default = "[]" },
    { access = "exposedField", type = "MFFloat", id = "keyValue", default = "[]" },
    { access = "eventOut", type = "SFFloat", id = "value_changed" },
]

[[class]]
name = "PositionInterpolator"
behavior = "position_interpolator"
capabilities = ["interpolator", "child"]
interfaces = [
    { access = "eventIn", type = "SFFloat", id = "set_fraction" },
    { access = "exposedField", type = "MFFloat", id = "key", default = "[]" },
    { access = "exposedField", type = "MFVec3f", id = "keyValue", default = "[]" },
    { access = "eventOut", type = "SFVec3f", id = "value_changed" },
]

[[class]]
name = "TimeSensor"
capabilities = ["sensor", "time_dependent", "child"]
interfaces = [
    { access = "exposedField", type = "SFTime", id = "cycleInterval", default = "1" },
    { access = "exposedField", type = "SFBool", id = "enabled", default = "TRUE" },
    { access = "exposedField", type = "SFBool", id = "loop", default = "FALSE" },
    { access = "exposedField", type = "SFTime", id = "startTime", default = "0" },
    { access = "exposedField", type = "SFTime", id = "stopTime", default = "0" },
    { access = "eventOut", type = "SFTime", id = "cycleTime" },
    { access = "eventOut", type = "SFFloat", id = "fraction_changed" },
    { access = "eventOut", type = "SFBool", id = "isActive" },
    { access = "eventOut", type = "SFTime", id = "time" },
]

[[class]]
name = "WorldInfo"
capabilities = ["child"]
interfaces = [
    { access = "field", type = "MFString", id = "info", default = "[]" },
    { access = "field", type = "SFString", id = "title", default = '""' },
]
"#;

impl Profile {
    /// Load profile from TOML file
    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load profile from TOML string
    pub fn from_str(content: &str) -> Result<Self, ProfileError> {
        let parsed: TomlProfile = toml::from_str(content)?;

        let classes = parsed
            .classes
            .into_iter()
            .map(build_class)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Profile {
            name: parsed.metadata.as_ref().and_then(|m| m.name.clone()),
            description: parsed.metadata.as_ref().and_then(|m| m.description.clone()),
            classes,
        })
    }

    pub fn class(&self, name: &str) -> Option<&BuiltinClass> {
        self.classes.iter().find(|c| c.name() == name)
    }

    /// Register every class of this profile
    pub fn register_into(&self, registry: &mut TypeRegistry) -> Result<(), ProfileError> {
        for class in &self.classes {
            registry.register(Arc::new(class.clone()))?;
        }
        Ok(())
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::from_str(DEFAULT_PROFILE).expect("Default profile should be valid")
    }
}

fn build_class(class: TomlClass) -> Result<BuiltinClass, ProfileError> {
    let mut interfaces = InterfaceSet::new();
    let mut defaults = HashMap::new();

    for decl in class.interfaces {
        let kind = FieldKind::from_name(&decl.kind).ok_or_else(|| ProfileError::InvalidInterface {
            class: class.name.clone(),
            reason: format!("unknown field type '{}'", decl.kind),
        })?;

        match (&decl.default, decl.access.has_value()) {
            (Some(text), true) => {
                let value = parse_default(kind, text).map_err(|reason| ProfileError::InvalidDefault {
                    class: class.name.clone(),
                    interface: decl.id.clone(),
                    reason,
                })?;
                defaults.insert(decl.id.clone(), value);
            }
            (Some(_), false) => {
                return Err(ProfileError::InvalidDefault {
                    class: class.name.clone(),
                    interface: decl.id.clone(),
                    reason: format!("{} interfaces have no value", decl.access),
                })
            }
            // Missing defaults fall back to the zero value of the kind
            (None, _) => {}
        }

        interfaces
            .insert(Interface::new(decl.access, kind, decl.id))
            .map_err(|dup| ProfileError::InvalidInterface {
                class: class.name.clone(),
                reason: format!("'{}' conflicts with an earlier interface", dup.id),
            })?;
    }

    Ok(BuiltinClass::new(
        class.name,
        interfaces,
        defaults,
        class.capabilities,
        class.behavior,
    ))
}

fn parse_default(kind: FieldKind, text: &str) -> Result<FieldValue, String> {
    let value = crate::parser::parse_value(text).map_err(|errs| {
        errs.iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    })?;
    FieldValue::from_literal(kind, &value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::node::{builtin_id, NodeClass};

    #[test]
    fn test_default_profile() {
        let profile = Profile::default();
        assert_eq!(profile.name.as_deref(), Some("vrml97-core"));
        for name in ["Group", "Transform", "Shape", "Box", "TimeSensor", "WorldInfo"] {
            assert!(profile.class(name).is_some(), "missing {}", name);
        }
    }

    #[test]
    fn test_default_values_are_parsed() {
        let profile = Profile::default();
        let transform = profile.class("Transform").unwrap();
        let scale = transform.interfaces().get("scale").unwrap();
        assert_eq!(transform.default_value(scale), FieldValue::SfVec3f([1.0, 1.0, 1.0]));

        let shape = profile.class("Shape").unwrap();
        let geometry = shape.interfaces().get("geometry").unwrap();
        assert_eq!(shape.default_value(geometry), FieldValue::SfNode(None));

        let info = profile.class("WorldInfo").unwrap();
        let title = info.interfaces().get("title").unwrap();
        assert_eq!(info.default_value(title), FieldValue::SfString(String::new()));
    }

    #[test]
    fn test_register_into() {
        let mut registry = TypeRegistry::new();
        Profile::default().register_into(&mut registry).unwrap();
        assert!(registry.contains(&builtin_id("Sphere")));

        // Registering twice is a duplicate
        let err = Profile::default().register_into(&mut registry).unwrap_err();
        assert!(matches!(err, ProfileError::Registry(RegistryError::Duplicate { .. })));
    }

    #[test]
    fn test_custom_profile() {
        let toml_str = r#"
[[class]]
name = "Switch"
capabilities = ["grouping", "child"]
interfaces = [
    { access = "exposedField", type = "MFNode", id = "choice", default = "[]" },
    { access = "inputOutput", type = "SFInt32", id = "whichChoice", default = "-1" },
]
"#;
        let profile = Profile::from_str(toml_str).expect("Should parse");
        assert_eq!(profile.name, None);
        let switch = profile.class("Switch").unwrap();
        assert_eq!(switch.behavior(), Behavior::ExposedFields);
        assert_eq!(switch.capabilities(), &[Capability::Grouping, Capability::Child]);
        let which = switch.interfaces().get("whichChoice").unwrap();
        assert_eq!(which.access, Access::ExposedField);
        assert_eq!(switch.default_value(which), FieldValue::SfInt32(-1));
    }

    #[test]
    fn test_unknown_field_type() {
        let toml_str = r#"
[[class]]
name = "Bad"
interfaces = [{ access = "field", type = "SFMatrix", id = "m" }]
"#;
        let err = Profile::from_str(toml_str).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidInterface { .. }));
    }

    #[test]
    fn test_invalid_default() {
        let toml_str = r#"
[[class]]
name = "Bad"
interfaces = [{ access = "field", type = "SFVec3f", id = "v", default = "1 2" }]
"#;
        let err = Profile::from_str(toml_str).unwrap_err();
        assert!(matches!(err, ProfileError::InvalidDefault { .. }));
    }

    #[test]
    fn test_event_default_rejected() {
        let toml_str = r#"
[[class]]
name = "Bad"
interfaces = [{ access = "eventIn", type = "SFBool", id = "go", default = "TRUE" }]
"#;
        assert!(Profile::from_str(toml_str).is_err());
    }

    #[test]
    fn test_invalid_toml_error() {
        let invalid = "this is not valid toml {{{{";
        let result = Profile::from_str(invalid);
        assert!(matches!(result, Err(ProfileError::Toml(_))));
    }
}
