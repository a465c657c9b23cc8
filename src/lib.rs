//! protoscene - PROTO instantiation and event routing for VRML97-style scenes
//!
//! This library parses scenes written in the VRML97 classic syntax, builds
//! them into a node graph, instantiates user-defined PROTOs and propagates
//! events along ROUTEs.
//!
//! # Example
//!
//! ```rust
//! use protoscene::{load, FieldValue};
//!
//! let mut world = load(r#"
//!     PROTO Lamp [ exposedField SFFloat level 1 ] {
//!         PointLight { intensity IS level }
//!     }
//!     DEF L Lamp {}
//! "#).unwrap();
//!
//! world.send_event("L", "set_level", FieldValue::SfFloat(0.5), 1.0).unwrap();
//! assert_eq!(world.field("L", "level").unwrap(), FieldValue::SfFloat(0.5));
//! ```

pub mod error;
pub mod field;
pub mod graph;
pub mod node;
pub mod parser;
pub mod profile;
pub mod proto;
pub mod scene;

pub use error::ParseError;
pub use field::{FieldError, FieldKind, FieldValue};
pub use graph::{NodeError, NodeId, SceneGraph};
pub use node::{Capability, TypeRegistry};
pub use parser::{parse, Document};
pub use profile::{Profile, ProfileError};
pub use scene::{BuildError, Scene};

use log::debug;
use thiserror::Error;

/// Errors that can occur during the load pipeline
#[derive(Debug, Error)]
pub enum LoadError {
    /// Error during parsing
    #[error("parse errors: {}", format_parse_errors(.0))]
    Parse(Vec<ParseError>),

    /// Error while building nodes and PROTOs
    #[error("build error: {0}")]
    Build(#[from] BuildError),

    /// Error while registering the built-in classes
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
}

impl From<Vec<ParseError>> for LoadError {
    fn from(errors: Vec<ParseError>) -> Self {
        LoadError::Parse(errors)
    }
}

fn format_parse_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors from name-based access to a loaded world
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("no node named '{0}'")]
    UnknownName(String),

    #[error(transparent)]
    Node(#[from] NodeError),

    /// Event value text that does not parse or fit the event's kind
    #[error("invalid value for {target}: {reason}")]
    InvalidValue { target: String, reason: String },
}

/// Configuration for the load pipeline
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Profiles whose classes are registered before loading
    pub profiles: Vec<Profile>,
    /// URI of the scene; PROTO ids are `<base_uri>#<Name>`
    pub base_uri: String,
    /// Log every delivered event at info level
    pub trace_events: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            profiles: vec![Profile::default()],
            base_uri: "urn:X-protoscene:scene".to_string(),
            trace_events: false,
        }
    }
}

impl RuntimeConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an additional profile
    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profiles.push(profile);
        self
    }

    /// Set the scene URI
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = base_uri.into();
        self
    }

    /// Enable or disable event tracing
    pub fn with_trace_events(mut self, trace_events: bool) -> Self {
        self.trace_events = trace_events;
        self
    }
}

/// A loaded scene with the graph and registry it lives in
#[derive(Debug)]
pub struct World {
    graph: SceneGraph,
    registry: TypeRegistry,
    scene: Scene,
}

impl World {
    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Initialize every root node and what it references
    pub fn initialize(&mut self, timestamp: f64) -> Result<(), NodeError> {
        for &root in self.scene.roots() {
            self.graph.initialize(root, timestamp)?;
        }
        Ok(())
    }

    pub fn shutdown(&mut self, timestamp: f64) -> Result<(), NodeError> {
        for &root in self.scene.roots() {
            self.graph.shutdown(root, timestamp)?;
        }
        Ok(())
    }

    /// Node bound to a DEF name at the top level of the scene
    pub fn node(&self, name: &str) -> Option<NodeId> {
        self.graph.lookup(self.scene.scope(), name)
    }

    fn named(&self, name: &str) -> Result<NodeId, WorldError> {
        self.node(name)
            .ok_or_else(|| WorldError::UnknownName(name.to_string()))
    }

    /// Send an event to a named node and run the resulting cascade
    pub fn send_event(
        &mut self,
        name: &str,
        event_in: &str,
        value: FieldValue,
        timestamp: f64,
    ) -> Result<(), WorldError> {
        let node = self.named(name)?;
        self.graph.send_event(node, event_in, value, timestamp)?;
        Ok(())
    }

    /// Current value of a field of a named node
    pub fn field(&self, name: &str, id: &str) -> Result<FieldValue, WorldError> {
        let node = self.named(name)?;
        Ok(self.graph.field(node, id)?)
    }

    /// Parse `text` as a value for `name.event_in`
    ///
    /// Node-valued events accept `NULL` and `[]` only.
    pub fn parse_event_value(&self, name: &str, event_in: &str, text: &str) -> Result<FieldValue, WorldError> {
        let node = self.named(name)?;
        let node_type = self.graph.node(node)?.node_type();
        let interface = node_type
            .interfaces()
            .find_event_in(event_in)
            .ok_or_else(|| NodeError::unsupported(node_type.id(), event_in))?;

        let target = format!("{}.{}", name, event_in);
        let value = parser::parse_value(text).map_err(|errs| WorldError::InvalidValue {
            target: target.clone(),
            reason: format_parse_errors(&errs),
        })?;
        FieldValue::from_literal(interface.kind, &value).map_err(|e| WorldError::InvalidValue {
            target,
            reason: e.to_string(),
        })
    }

    /// The scene's nodes in scene syntax
    pub fn dump(&self) -> String {
        scene::dump(&self.graph, self.scene.roots())
    }
}

/// Load a scene with default configuration
///
/// This is the main entry point for the library. It parses the source,
/// registers the default profile and builds the scene.
pub fn load(source: &str) -> Result<World, LoadError> {
    load_with_config(source, RuntimeConfig::default())
}

/// Load a scene with custom configuration
///
/// # Example
///
/// ```rust
/// use protoscene::{load_with_config, RuntimeConfig};
///
/// let config = RuntimeConfig::new().with_base_uri("file:///lamp.wrl");
/// let world = load_with_config("PROTO Lamp [] { PointLight {} }", config).unwrap();
/// assert_eq!(world.scene().proto_id("Lamp"), Some("file:///lamp.wrl#Lamp"));
/// ```
pub fn load_with_config(source: &str, config: RuntimeConfig) -> Result<World, LoadError> {
    // Parse the source
    let doc = parse(source)?;

    // Register built-in classes
    let mut registry = TypeRegistry::new();
    for profile in &config.profiles {
        profile.register_into(&mut registry)?;
    }

    // Build nodes, PROTOs and routes
    let mut graph = SceneGraph::new();
    graph.set_trace_events(config.trace_events);
    let scene = scene::build_scene(&mut graph, &mut registry, &doc, &config.base_uri)?;
    debug!(
        "loaded {} root node(s), {} node(s) in total",
        scene.roots().len(),
        graph.len()
    );

    Ok(World {
        graph,
        registry,
        scene,
    })
}
