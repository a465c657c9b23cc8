//! Prototypes: classes, the template cloner and live instances

mod class;
mod cloner;
mod instance;

pub use class::{Alias, ProtoClass, ProtoDefinition, ProtoError, ProtoRoute};
pub use cloner::Cloner;
pub use instance::{ProtoInstance, WiringError};
