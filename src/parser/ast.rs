//! Abstract Syntax Tree types for the scene description syntax

use std::fmt;

use crate::field::FieldKind;
use crate::node::Access;

/// Byte range in source text
pub type Span = std::ops::Range<usize>;

/// A value with its source location
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub node: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(node: T, span: Span) -> Self {
        Self { node, span }
    }
}

/// Node names, type names and interface ids
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub String);

impl Identifier {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Root AST node - a complete scene file
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub statements: Vec<Spanned<Statement>>,
}

/// Top-level statement (also the statements of a PROTO body)
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A root node
    Node(NodeStatement),
    /// `PROTO Name [ interfaces ] { body }`
    Proto(ProtoDecl),
    /// `ROUTE a.out TO b.in`
    Route(RouteDecl),
}

/// A node written in place, or a reference to a named one
#[derive(Debug, Clone, PartialEq)]
pub enum NodeStatement {
    /// `DEF name Type { ... }` or `Type { ... }`
    Node(NodeDecl),
    /// `USE name`
    Use(Spanned<Identifier>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecl {
    pub def_name: Option<Spanned<Identifier>>,
    pub type_name: Spanned<Identifier>,
    pub body: Vec<Spanned<BodyElement>>,
}

/// One entry of a node body
#[derive(Debug, Clone, PartialEq)]
pub enum BodyElement {
    /// `name value`
    Field {
        name: Spanned<Identifier>,
        value: Spanned<Value>,
    },
    /// `name IS interface`, only meaningful inside a PROTO body
    Is {
        name: Spanned<Identifier>,
        interface: Spanned<Identifier>,
    },
}

/// Scalar building blocks of field values
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    Number(f64),
    String(String),
    Bool(bool),
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Number(n) => write!(f, "{}", n),
            Atom::String(s) => write!(f, "\"{}\"", s),
            Atom::Bool(true) => f.write_str("TRUE"),
            Atom::Bool(false) => f.write_str("FALSE"),
        }
    }
}

/// A field value as written; converted by the declared field kind later
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unbracketed atoms, e.g. `1 0 0`
    Atoms(Vec<Atom>),
    /// Bracketed atoms, e.g. `[ 0, 0.5, 1 ]`; also the empty list `[]`
    List(Vec<Atom>),
    /// A single node
    Node(Box<Spanned<NodeStatement>>),
    /// Bracketed nodes
    NodeList(Vec<Spanned<NodeStatement>>),
    /// `NULL`
    Null,
}

/// `ROUTE from_node.from_event TO to_node.to_event`
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDecl {
    pub from_node: Spanned<Identifier>,
    pub from_event: Spanned<Identifier>,
    pub to_node: Spanned<Identifier>,
    pub to_event: Spanned<Identifier>,
}

/// A PROTO definition
#[derive(Debug, Clone, PartialEq)]
pub struct ProtoDecl {
    pub name: Spanned<Identifier>,
    pub interfaces: Vec<Spanned<InterfaceDecl>>,
    pub body: Vec<Spanned<Statement>>,
}

/// One interface declaration of a PROTO
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceDecl {
    pub access: Access,
    pub kind: Spanned<FieldKind>,
    pub id: Spanned<Identifier>,
    /// Default value; present exactly for fields and exposedFields
    pub default: Option<Spanned<Value>>,
}
