//! Field kinds

use std::fmt;

/// The closed set of value kinds a field, eventIn or eventOut can carry
///
/// `Sf*` kinds hold a single value, `Mf*` kinds hold an ordered list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    SfBool,
    SfColor,
    SfFloat,
    SfImage,
    SfInt32,
    SfNode,
    SfRotation,
    SfString,
    SfTime,
    SfVec2f,
    SfVec3f,
    MfColor,
    MfFloat,
    MfInt32,
    MfNode,
    MfRotation,
    MfString,
    MfTime,
    MfVec2f,
    MfVec3f,
}

impl FieldKind {
    /// Every kind, in the order the scene syntax documents them
    pub const ALL: [FieldKind; 20] = [
        FieldKind::SfBool,
        FieldKind::SfColor,
        FieldKind::SfFloat,
        FieldKind::SfImage,
        FieldKind::SfInt32,
        FieldKind::SfNode,
        FieldKind::SfRotation,
        FieldKind::SfString,
        FieldKind::SfTime,
        FieldKind::SfVec2f,
        FieldKind::SfVec3f,
        FieldKind::MfColor,
        FieldKind::MfFloat,
        FieldKind::MfInt32,
        FieldKind::MfNode,
        FieldKind::MfRotation,
        FieldKind::MfString,
        FieldKind::MfTime,
        FieldKind::MfVec2f,
        FieldKind::MfVec3f,
    ];

    /// Name used in scene syntax, e.g. `SFVec3f`
    pub fn name(self) -> &'static str {
        match self {
            FieldKind::SfBool => "SFBool",
            FieldKind::SfColor => "SFColor",
            FieldKind::SfFloat => "SFFloat",
            FieldKind::SfImage => "SFImage",
            FieldKind::SfInt32 => "SFInt32",
            FieldKind::SfNode => "SFNode",
            FieldKind::SfRotation => "SFRotation",
            FieldKind::SfString => "SFString",
            FieldKind::SfTime => "SFTime",
            FieldKind::SfVec2f => "SFVec2f",
            FieldKind::SfVec3f => "SFVec3f",
            FieldKind::MfColor => "MFColor",
            FieldKind::MfFloat => "MFFloat",
            FieldKind::MfInt32 => "MFInt32",
            FieldKind::MfNode => "MFNode",
            FieldKind::MfRotation => "MFRotation",
            FieldKind::MfString => "MFString",
            FieldKind::MfTime => "MFTime",
            FieldKind::MfVec2f => "MFVec2f",
            FieldKind::MfVec3f => "MFVec3f",
        }
    }

    /// Look a kind up by its scene-syntax name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Whether values of this kind reference nodes
    pub fn is_node(self) -> bool {
        matches!(self, FieldKind::SfNode | FieldKind::MfNode)
    }

    /// Whether this is a multi-valued kind
    pub fn is_multi(self) -> bool {
        matches!(
            self,
            FieldKind::MfColor
                | FieldKind::MfFloat
                | FieldKind::MfInt32
                | FieldKind::MfNode
                | FieldKind::MfRotation
                | FieldKind::MfString
                | FieldKind::MfTime
                | FieldKind::MfVec2f
                | FieldKind::MfVec3f
        )
    }

    /// Number of atoms that make up one element of this kind
    ///
    /// Returns None for kinds that are not made of a fixed number of atoms
    /// (images and node references).
    pub fn element_arity(self) -> Option<usize> {
        match self {
            FieldKind::SfBool
            | FieldKind::SfFloat
            | FieldKind::SfInt32
            | FieldKind::SfString
            | FieldKind::SfTime
            | FieldKind::MfFloat
            | FieldKind::MfInt32
            | FieldKind::MfString
            | FieldKind::MfTime => Some(1),
            FieldKind::SfVec2f | FieldKind::MfVec2f => Some(2),
            FieldKind::SfColor
            | FieldKind::SfVec3f
            | FieldKind::MfColor
            | FieldKind::MfVec3f => Some(3),
            FieldKind::SfRotation | FieldKind::MfRotation => Some(4),
            FieldKind::SfImage | FieldKind::SfNode | FieldKind::MfNode => None,
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_round_trips_for_every_kind() {
        for kind in FieldKind::ALL {
            assert_eq!(FieldKind::from_name(kind.name()), Some(kind));
        }
    }

    #[test]
    fn test_unknown_name() {
        assert_eq!(FieldKind::from_name("SFVec4f"), None);
        assert_eq!(FieldKind::from_name("sfbool"), None);
    }

    #[test]
    fn test_node_kinds() {
        assert!(FieldKind::SfNode.is_node());
        assert!(FieldKind::MfNode.is_node());
        assert!(!FieldKind::MfString.is_node());
        assert!(FieldKind::MfNode.is_multi());
        assert!(!FieldKind::SfNode.is_multi());
    }

    #[test]
    fn test_element_arity() {
        assert_eq!(FieldKind::SfRotation.element_arity(), Some(4));
        assert_eq!(FieldKind::MfVec2f.element_arity(), Some(2));
        assert_eq!(FieldKind::SfImage.element_arity(), None);
    }
}
