//! Node interfaces, classes, types and the type registry

mod builtin;
mod interface;
mod node_type;
pub mod registry;

pub use builtin::{interpolate, Behavior, BuiltinClass};
pub use interface::{Access, Interface, InterfaceSet};
pub use node_type::{Capability, InitialValues, NodeClass, NodeType};
pub use registry::{builtin_id, RegistryError, TypeRegistry, BUILTIN_PREFIX};
