//! Field value model: kinds, tagged values and their errors

mod kind;
mod value;

pub use kind::FieldKind;
pub use value::{Color, FieldValue, Image, Rotation, Vec2f, Vec3f};

use thiserror::Error;

/// Errors raised when building or assigning field values
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    /// Assigning or routing a value of the wrong kind
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: FieldKind, found: FieldKind },

    /// Value text that does not fit the declared kind
    #[error("invalid {kind} value: {reason}")]
    InvalidValue { kind: FieldKind, reason: String },
}

impl FieldError {
    /// Create an invalid value error
    pub fn invalid(kind: FieldKind, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            kind,
            reason: reason.into(),
        }
    }
}
