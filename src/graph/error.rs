//! Node contract errors

use thiserror::Error;

use crate::field::{FieldError, FieldKind};

use super::NodeId;

/// Errors raised by node accessors, routes and instantiation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    /// The node type does not declare the requested interface
    #[error("{node_type} has no interface '{interface}'")]
    UnsupportedInterface { node_type: String, interface: String },

    /// The handle does not name a node of this graph
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Connecting or sending across mismatched kinds
    #[error("type mismatch on '{interface}': expected {expected}, found {found}")]
    TypeMismatch {
        interface: String,
        expected: FieldKind,
        found: FieldKind,
    },

    #[error(transparent)]
    Field(#[from] FieldError),

    /// The node is not reachable from the roots a path was computed against
    #[error("node {0} is not reachable from the implementation roots")]
    Unreachable(NodeId),

    /// The node could not be constructed
    #[error("cannot instantiate {node_type}: {reason}")]
    Instantiate { node_type: String, reason: String },
}

impl NodeError {
    /// Create an unsupported interface error
    pub fn unsupported(node_type: impl Into<String>, interface: impl Into<String>) -> Self {
        Self::UnsupportedInterface {
            node_type: node_type.into(),
            interface: interface.into(),
        }
    }

    /// Create a type mismatch error
    pub fn mismatch(interface: impl Into<String>, expected: FieldKind, found: FieldKind) -> Self {
        Self::TypeMismatch {
            interface: interface.into(),
            expected,
            found,
        }
    }

    /// Create an instantiation error
    pub fn instantiate(node_type: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Instantiate {
            node_type: node_type.into(),
            reason: reason.into(),
        }
    }
}
