//! Field values

use std::fmt;

use crate::graph::NodeId;
use crate::parser::ast::{Atom, Value};

use super::{FieldError, FieldKind};

/// RGB color, each component in `0.0..=1.0`
pub type Color = [f32; 3];
/// Two-component vector
pub type Vec2f = [f32; 2];
/// Three-component vector
pub type Vec3f = [f32; 3];
/// Axis (x, y, z) followed by an angle in radians
pub type Rotation = [f32; 4];

/// Uncompressed image: `width * height` pixels of `components` bytes packed in a u32
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub pixels: Vec<u32>,
}

/// A tagged field value
///
/// Node-reference kinds hold [`NodeId`] handles into the owning
/// [`SceneGraph`](crate::graph::SceneGraph); cloning a value copies the
/// handles, it never copies the referenced nodes. Deep copies of node graphs
/// go through [`Cloner`](crate::proto::Cloner).
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    SfBool(bool),
    SfColor(Color),
    SfFloat(f32),
    SfImage(Image),
    SfInt32(i32),
    SfNode(Option<NodeId>),
    SfRotation(Rotation),
    SfString(String),
    SfTime(f64),
    SfVec2f(Vec2f),
    SfVec3f(Vec3f),
    MfColor(Vec<Color>),
    MfFloat(Vec<f32>),
    MfInt32(Vec<i32>),
    MfNode(Vec<NodeId>),
    MfRotation(Vec<Rotation>),
    MfString(Vec<String>),
    MfTime(Vec<f64>),
    MfVec2f(Vec<Vec2f>),
    MfVec3f(Vec<Vec3f>),
}

impl FieldValue {
    /// The default value of a kind (zero, empty, `FALSE` or `NULL`)
    pub fn default_for(kind: FieldKind) -> Self {
        match kind {
            FieldKind::SfBool => FieldValue::SfBool(false),
            FieldKind::SfColor => FieldValue::SfColor([0.0; 3]),
            FieldKind::SfFloat => FieldValue::SfFloat(0.0),
            FieldKind::SfImage => FieldValue::SfImage(Image::default()),
            FieldKind::SfInt32 => FieldValue::SfInt32(0),
            FieldKind::SfNode => FieldValue::SfNode(None),
            FieldKind::SfRotation => FieldValue::SfRotation([0.0, 0.0, 1.0, 0.0]),
            FieldKind::SfString => FieldValue::SfString(String::new()),
            FieldKind::SfTime => FieldValue::SfTime(0.0),
            FieldKind::SfVec2f => FieldValue::SfVec2f([0.0; 2]),
            FieldKind::SfVec3f => FieldValue::SfVec3f([0.0; 3]),
            FieldKind::MfColor => FieldValue::MfColor(Vec::new()),
            FieldKind::MfFloat => FieldValue::MfFloat(Vec::new()),
            FieldKind::MfInt32 => FieldValue::MfInt32(Vec::new()),
            FieldKind::MfNode => FieldValue::MfNode(Vec::new()),
            FieldKind::MfRotation => FieldValue::MfRotation(Vec::new()),
            FieldKind::MfString => FieldValue::MfString(Vec::new()),
            FieldKind::MfTime => FieldValue::MfTime(Vec::new()),
            FieldKind::MfVec2f => FieldValue::MfVec2f(Vec::new()),
            FieldKind::MfVec3f => FieldValue::MfVec3f(Vec::new()),
        }
    }

    /// The kind tag of this value
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldValue::SfBool(_) => FieldKind::SfBool,
            FieldValue::SfColor(_) => FieldKind::SfColor,
            FieldValue::SfFloat(_) => FieldKind::SfFloat,
            FieldValue::SfImage(_) => FieldKind::SfImage,
            FieldValue::SfInt32(_) => FieldKind::SfInt32,
            FieldValue::SfNode(_) => FieldKind::SfNode,
            FieldValue::SfRotation(_) => FieldKind::SfRotation,
            FieldValue::SfString(_) => FieldKind::SfString,
            FieldValue::SfTime(_) => FieldKind::SfTime,
            FieldValue::SfVec2f(_) => FieldKind::SfVec2f,
            FieldValue::SfVec3f(_) => FieldKind::SfVec3f,
            FieldValue::MfColor(_) => FieldKind::MfColor,
            FieldValue::MfFloat(_) => FieldKind::MfFloat,
            FieldValue::MfInt32(_) => FieldKind::MfInt32,
            FieldValue::MfNode(_) => FieldKind::MfNode,
            FieldValue::MfRotation(_) => FieldKind::MfRotation,
            FieldValue::MfString(_) => FieldKind::MfString,
            FieldValue::MfTime(_) => FieldKind::MfTime,
            FieldValue::MfVec2f(_) => FieldKind::MfVec2f,
            FieldValue::MfVec3f(_) => FieldKind::MfVec3f,
        }
    }

    /// Replace this value with `other`, which must be of the same kind
    pub fn assign(&mut self, other: &FieldValue) -> Result<(), FieldError> {
        other.expect_kind(self.kind())?;
        self.clone_from(other);
        Ok(())
    }

    /// Fail with a type mismatch unless this value is of `kind`
    pub fn expect_kind(&self, kind: FieldKind) -> Result<(), FieldError> {
        if self.kind() == kind {
            Ok(())
        } else {
            Err(FieldError::TypeMismatch {
                expected: kind,
                found: self.kind(),
            })
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::SfBool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            FieldValue::SfFloat(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_int32(&self) -> Option<i32> {
        match self {
            FieldValue::SfInt32(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<f64> {
        match self {
            FieldValue::SfTime(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::SfString(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_vec3f(&self) -> Option<Vec3f> {
        match self {
            FieldValue::SfVec3f(v) | FieldValue::SfColor(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_rotation(&self) -> Option<Rotation> {
        match self {
            FieldValue::SfRotation(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_floats(&self) -> Option<&[f32]> {
        match self {
            FieldValue::MfFloat(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_vec3fs(&self) -> Option<&[Vec3f]> {
        match self {
            FieldValue::MfVec3f(v) | FieldValue::MfColor(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// The referenced node of an `SFNode` value (None for `NULL` or other kinds)
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            FieldValue::SfNode(n) => *n,
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&[NodeId]> {
        match self {
            FieldValue::MfNode(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// All node handles referenced by this value, in order
    pub fn node_refs(&self) -> Vec<NodeId> {
        match self {
            FieldValue::SfNode(Some(n)) => vec![*n],
            FieldValue::MfNode(v) => v.clone(),
            _ => Vec::new(),
        }
    }

    /// Build a value of `kind` from parsed atoms
    ///
    /// `bracketed` tells whether the atoms were written inside `[ ]`, which is
    /// only legal for multi-valued kinds. Node kinds are never built from
    /// atoms; the scene builder handles them.
    pub fn from_atoms(kind: FieldKind, atoms: &[Atom], bracketed: bool) -> Result<Self, FieldError> {
        if kind.is_node() {
            return Err(FieldError::invalid(kind, "expected a node, USE or NULL"));
        }
        if bracketed && !kind.is_multi() {
            return Err(FieldError::invalid(
                kind,
                "brackets are only allowed for multi-valued fields",
            ));
        }
        if kind == FieldKind::SfImage {
            return image_from_atoms(atoms).map(FieldValue::SfImage);
        }

        let arity = kind.element_arity().unwrap_or(1);
        if kind.is_multi() {
            if atoms.len() % arity != 0 {
                return Err(FieldError::invalid(
                    kind,
                    format!("{} values is not a multiple of {}", atoms.len(), arity),
                ));
            }
        } else if atoms.len() != arity {
            return Err(FieldError::invalid(
                kind,
                format!("expected {} value(s), found {}", arity, atoms.len()),
            ));
        }

        let value = match kind {
            FieldKind::SfBool => FieldValue::SfBool(boolean(kind, &atoms[0])?),
            FieldKind::SfColor => FieldValue::SfColor(floats(kind, atoms)?),
            FieldKind::SfFloat => FieldValue::SfFloat(number(kind, &atoms[0])? as f32),
            FieldKind::SfInt32 => FieldValue::SfInt32(integer(kind, &atoms[0])?),
            FieldKind::SfRotation => FieldValue::SfRotation(floats(kind, atoms)?),
            FieldKind::SfString => FieldValue::SfString(string(kind, &atoms[0])?),
            FieldKind::SfTime => FieldValue::SfTime(number(kind, &atoms[0])?),
            FieldKind::SfVec2f => FieldValue::SfVec2f(floats(kind, atoms)?),
            FieldKind::SfVec3f => FieldValue::SfVec3f(floats(kind, atoms)?),
            FieldKind::MfColor => FieldValue::MfColor(chunks(kind, atoms)?),
            FieldKind::MfFloat => FieldValue::MfFloat(
                atoms
                    .iter()
                    .map(|a| number(kind, a).map(|n| n as f32))
                    .collect::<Result<_, _>>()?,
            ),
            FieldKind::MfInt32 => FieldValue::MfInt32(
                atoms
                    .iter()
                    .map(|a| integer(kind, a))
                    .collect::<Result<_, _>>()?,
            ),
            FieldKind::MfRotation => FieldValue::MfRotation(chunks(kind, atoms)?),
            FieldKind::MfString => FieldValue::MfString(
                atoms
                    .iter()
                    .map(|a| string(kind, a))
                    .collect::<Result<_, _>>()?,
            ),
            FieldKind::MfTime => FieldValue::MfTime(
                atoms
                    .iter()
                    .map(|a| number(kind, a))
                    .collect::<Result<_, _>>()?,
            ),
            FieldKind::MfVec2f => FieldValue::MfVec2f(chunks(kind, atoms)?),
            FieldKind::MfVec3f => FieldValue::MfVec3f(chunks(kind, atoms)?),
            FieldKind::SfImage | FieldKind::SfNode | FieldKind::MfNode => {
                return Err(FieldError::invalid(kind, "not representable as atoms"))
            }
        };
        Ok(value)
    }

    /// Build a value of `kind` from a node-free parsed value
    ///
    /// Node kinds accept only `NULL` (SFNode) and `[]` (MFNode) here.
    pub fn from_literal(kind: FieldKind, value: &Value) -> Result<Self, FieldError> {
        match (kind, value) {
            (FieldKind::SfNode, Value::Null) => Ok(FieldValue::SfNode(None)),
            (FieldKind::MfNode, Value::List(atoms)) if atoms.is_empty() => {
                Ok(FieldValue::MfNode(Vec::new()))
            }
            (_, Value::Atoms(atoms)) => Self::from_atoms(kind, atoms, false),
            (_, Value::List(atoms)) => Self::from_atoms(kind, atoms, true),
            (_, Value::Null) => Err(FieldError::invalid(kind, "NULL is only allowed for SFNode")),
            (_, Value::Node(_) | Value::NodeList(_)) => {
                Err(FieldError::invalid(kind, "node values need a scene to live in"))
            }
        }
    }
}

fn number(kind: FieldKind, atom: &Atom) -> Result<f64, FieldError> {
    match atom {
        Atom::Number(n) => Ok(*n),
        other => Err(FieldError::invalid(kind, format!("expected a number, found {}", other))),
    }
}

fn integer(kind: FieldKind, atom: &Atom) -> Result<i32, FieldError> {
    let n = number(kind, atom)?;
    if n.fract() != 0.0 || n < i32::MIN as f64 || n > i32::MAX as f64 {
        return Err(FieldError::invalid(kind, format!("{} is not a 32-bit integer", n)));
    }
    Ok(n as i32)
}

fn boolean(kind: FieldKind, atom: &Atom) -> Result<bool, FieldError> {
    match atom {
        Atom::Bool(b) => Ok(*b),
        other => Err(FieldError::invalid(kind, format!("expected TRUE or FALSE, found {}", other))),
    }
}

fn string(kind: FieldKind, atom: &Atom) -> Result<String, FieldError> {
    match atom {
        Atom::String(s) => Ok(s.clone()),
        other => Err(FieldError::invalid(kind, format!("expected a string, found {}", other))),
    }
}

fn floats<const N: usize>(kind: FieldKind, atoms: &[Atom]) -> Result<[f32; N], FieldError> {
    let mut out = [0.0f32; N];
    for (slot, atom) in out.iter_mut().zip(atoms) {
        *slot = number(kind, atom)? as f32;
    }
    Ok(out)
}

fn chunks<const N: usize>(kind: FieldKind, atoms: &[Atom]) -> Result<Vec<[f32; N]>, FieldError> {
    atoms.chunks(N).map(|chunk| floats::<N>(kind, chunk)).collect()
}

fn image_from_atoms(atoms: &[Atom]) -> Result<Image, FieldError> {
    let kind = FieldKind::SfImage;
    if atoms.len() < 3 {
        return Err(FieldError::invalid(kind, "expected width, height and components"));
    }
    let width = integer(kind, &atoms[0])?;
    let height = integer(kind, &atoms[1])?;
    let components = integer(kind, &atoms[2])?;
    if width < 0 || height < 0 || !(0..=4).contains(&components) {
        return Err(FieldError::invalid(kind, "invalid image header"));
    }
    let expected = width as usize * height as usize;
    let pixels = &atoms[3..];
    if pixels.len() != expected {
        return Err(FieldError::invalid(
            kind,
            format!("expected {} pixels, found {}", expected, pixels.len()),
        ));
    }
    let pixels = pixels
        .iter()
        .map(|a| {
            let n = number(kind, a)?;
            if n < 0.0 || n > u32::MAX as f64 || n.fract() != 0.0 {
                Err(FieldError::invalid(kind, format!("invalid pixel value {}", n)))
            } else {
                Ok(n as u32)
            }
        })
        .collect::<Result<_, _>>()?;
    Ok(Image {
        width: width as u32,
        height: height as u32,
        components: components as u8,
        pixels,
    })
}

fn write_floats(f: &mut fmt::Formatter<'_>, values: &[f32]) -> fmt::Result {
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{}", v)?;
    }
    Ok(())
}

fn write_string(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        if c == '"' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{}", c)?;
    }
    f.write_str("\"")
}

fn write_list<T>(
    f: &mut fmt::Formatter<'_>,
    items: &[T],
    mut write_item: impl FnMut(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    f.write_str("[")?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_item(f, item)?;
    }
    f.write_str("]")
}

/// Scene-syntax rendering. Node references print as their handle.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::SfBool(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            FieldValue::SfColor(v) | FieldValue::SfVec3f(v) => write_floats(f, v),
            FieldValue::SfFloat(v) => write!(f, "{}", v),
            FieldValue::SfImage(img) => {
                write!(f, "{} {} {}", img.width, img.height, img.components)?;
                for p in &img.pixels {
                    write!(f, " {:#X}", p)?;
                }
                Ok(())
            }
            FieldValue::SfInt32(v) => write!(f, "{}", v),
            FieldValue::SfNode(None) => f.write_str("NULL"),
            FieldValue::SfNode(Some(n)) => write!(f, "{}", n),
            FieldValue::SfRotation(v) => write_floats(f, v),
            FieldValue::SfString(s) => write_string(f, s),
            FieldValue::SfTime(t) => write!(f, "{}", t),
            FieldValue::SfVec2f(v) => write_floats(f, v),
            FieldValue::MfColor(v) | FieldValue::MfVec3f(v) => write_list(f, v, |f, x| write_floats(f, x)),
            FieldValue::MfFloat(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::MfInt32(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::MfNode(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::MfRotation(v) => write_list(f, v, |f, x| write_floats(f, x)),
            FieldValue::MfString(v) => write_list(f, v, |f, x| write_string(f, x)),
            FieldValue::MfTime(v) => write_list(f, v, |f, x| write!(f, "{}", x)),
            FieldValue::MfVec2f(v) => write_list(f, v, |f, x| write_floats(f, x)),
        }
    }
}
