//! Scene builder - turns a parsed document into live nodes
//!
//! Node type names resolve against the PROTOs visible from the current
//! PROTO body (innermost definition wins) and then the built-in classes.
//! A PROTO body is built once, in its own template scope; the resulting
//! [`ProtoClass`] is registered under `<scope-uri>#<Name>`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::{debug, warn};

use crate::field::{FieldError, FieldKind, FieldValue};
use crate::graph::{NodeId, SceneGraph, ScopeId};
use crate::node::{builtin_id, InitialValues, Interface, InterfaceSet, NodeType, TypeRegistry, BUILTIN_PREFIX};
use crate::parser::ast::{
    BodyElement, Document, Identifier, NodeDecl, NodeStatement, ProtoDecl, RouteDecl, Span,
    Spanned, Statement, Value,
};
use crate::proto::{Alias, ProtoClass, ProtoDefinition, ProtoRoute};

use super::error::BuildError;
use super::suggest::find_similar;

/// A loaded scene: its root nodes and the PROTOs it defined
#[derive(Debug, Clone)]
pub struct Scene {
    scope: ScopeId,
    roots: Vec<NodeId>,
    protos: Vec<(String, String)>,
    warnings: Vec<BuildError>,
}

impl Scene {
    /// Scope holding the scene's DEF names
    pub fn scope(&self) -> ScopeId {
        self.scope
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Registry id of a top-level PROTO
    pub fn proto_id(&self, name: &str) -> Option<&str> {
        self.protos
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, id)| id.as_str())
    }

    /// Top-level PROTO names with their registry ids, sorted by name
    pub fn protos(&self) -> impl Iterator<Item = (&str, &str)> {
        self.protos.iter().map(|(n, id)| (n.as_str(), id.as_str()))
    }

    /// Scene routes that could not be connected
    pub fn warnings(&self) -> &[BuildError] {
        &self.warnings
    }
}

/// IS mappings and routes collected while building a PROTO body
#[derive(Debug, Default)]
struct Template {
    interfaces: InterfaceSet,
    aliases: Vec<Alias>,
    routes: Vec<ProtoRoute>,
}

/// Name resolution state of the scene or of one PROTO body
#[derive(Debug)]
struct Frame {
    scope: ScopeId,
    uri: String,
    /// Visible PROTO names -> registry ids
    protos: HashMap<String, String>,
    /// PROTO names defined in this frame
    local_protos: HashSet<String>,
    template: Option<Template>,
}

/// Builds documents into a graph, registering PROTO classes on the way
pub struct SceneBuilder<'a> {
    graph: &'a mut SceneGraph,
    registry: &'a mut TypeRegistry,
    frame: Frame,
    warnings: Vec<BuildError>,
}

impl<'a> SceneBuilder<'a> {
    /// Create a builder for a scene loaded from `base_uri`
    pub fn new(graph: &'a mut SceneGraph, registry: &'a mut TypeRegistry, base_uri: &str) -> Self {
        let scope = graph.create_scope(base_uri, None);
        Self {
            graph,
            registry,
            frame: Frame {
                scope,
                uri: base_uri.to_string(),
                protos: HashMap::new(),
                local_protos: HashSet::new(),
                template: None,
            },
            warnings: Vec::new(),
        }
    }

    /// Build every statement of the document
    pub fn build(mut self, document: &Document) -> Result<Scene, BuildError> {
        let roots = self.build_statements(&document.statements)?;

        let mut protos: Vec<(String, String)> = self
            .frame
            .local_protos
            .iter()
            .filter_map(|name| {
                self.frame
                    .protos
                    .get(name)
                    .map(|id| (name.clone(), id.clone()))
            })
            .collect();
        protos.sort();

        Ok(Scene {
            scope: self.frame.scope,
            roots,
            protos,
            warnings: self.warnings,
        })
    }

    fn build_statements(&mut self, statements: &[Spanned<Statement>]) -> Result<Vec<NodeId>, BuildError> {
        let mut roots = Vec::new();
        for statement in statements {
            match &statement.node {
                Statement::Node(node) => {
                    roots.push(self.build_node_statement(node, &statement.span)?);
                }
                Statement::Proto(proto) => self.build_proto(proto, &statement.span)?,
                Statement::Route(route) => self.build_route(route, &statement.span)?,
            }
        }
        Ok(roots)
    }

    // ---- nodes ----

    fn build_node_statement(&mut self, node: &NodeStatement, span: &Span) -> Result<NodeId, BuildError> {
        match node {
            NodeStatement::Use(name) => self.lookup_node(name),
            NodeStatement::Node(decl) => self.build_node(decl, span),
        }
    }

    fn build_node(&mut self, decl: &NodeDecl, span: &Span) -> Result<NodeId, BuildError> {
        let node_type = self.resolve_type(&decl.type_name)?;
        let scope = self.frame.scope;
        let name = decl.def_name.as_ref().map(|n| n.node.0.clone());

        // The name is visible to the node's own body
        let node = self.graph.reserve_node(scope, node_type.clone(), name.clone());
        if let Some(name) = name {
            if self.graph.bind_name(scope, name.as_str(), node).is_some() {
                debug!("DEF {} rebinds an earlier node", name);
            }
        }

        let mut initial = InitialValues::new();
        for element in &decl.body {
            match &element.node {
                BodyElement::Field { name, value } => {
                    let interface = node_type
                        .interfaces()
                        .find_field(name.node.as_str())
                        .cloned()
                        .ok_or_else(|| unknown_field(&node_type, name))?;
                    let value = self.build_value(&interface, value)?;
                    initial.insert(interface.id, value);
                }
                BodyElement::Is { name, interface } => {
                    self.record_alias(node, name, interface, &element.span)?;
                }
            }
        }

        self.graph
            .construct_node(node, initial)
            .map_err(|source| BuildError::Node {
                node_type: node_type.id().to_string(),
                span: span.clone(),
                source,
            })?;
        debug!("built {} {}", node_type.id(), node);
        Ok(node)
    }

    fn resolve_type(&self, type_name: &Spanned<Identifier>) -> Result<NodeType, BuildError> {
        let name = type_name.node.as_str();
        let class_id = match self.frame.protos.get(name) {
            Some(id) => id.clone(),
            None => builtin_id(name),
        };
        if !self.registry.contains(&class_id) {
            let known = self
                .frame
                .protos
                .keys()
                .map(String::as_str)
                .chain(self.registry.ids().into_iter().filter_map(|id| id.strip_prefix(BUILTIN_PREFIX)));
            return Err(BuildError::UnknownNodeType {
                name: name.to_string(),
                span: type_name.span.clone(),
                suggestions: find_similar(known, name, 2),
            });
        }
        self.registry
            .create_full_type(&class_id, name)
            .map_err(|source| BuildError::Registry {
                span: type_name.span.clone(),
                source,
            })
    }

    fn lookup_node(&self, name: &Spanned<Identifier>) -> Result<NodeId, BuildError> {
        self.graph
            .lookup(self.frame.scope, name.node.as_str())
            .ok_or_else(|| {
                let defined = self
                    .graph
                    .scope(self.frame.scope)
                    .map(|s| s.names())
                    .unwrap_or_default();
                BuildError::undefined(
                    name.node.as_str(),
                    name.span.clone(),
                    find_similar(defined, name.node.as_str(), 2),
                )
            })
    }

    /// Convert a written value to the interface's kind, building nested nodes
    fn build_value(&mut self, interface: &Interface, value: &Spanned<Value>) -> Result<FieldValue, BuildError> {
        let invalid = |source: FieldError| BuildError::InvalidValue {
            field: interface.id.clone(),
            span: value.span.clone(),
            source,
        };

        match (interface.kind, &value.node) {
            (FieldKind::SfNode, Value::Node(node)) => {
                let node = self.build_node_statement(&node.node, &node.span)?;
                Ok(FieldValue::SfNode(Some(node)))
            }
            (FieldKind::MfNode, Value::Node(node)) => {
                let node = self.build_node_statement(&node.node, &node.span)?;
                Ok(FieldValue::MfNode(vec![node]))
            }
            (FieldKind::MfNode, Value::NodeList(nodes)) => {
                let mut built = Vec::with_capacity(nodes.len());
                for node in nodes {
                    built.push(self.build_node_statement(&node.node, &node.span)?);
                }
                Ok(FieldValue::MfNode(built))
            }
            (kind, Value::Node(_) | Value::NodeList(_)) => Err(invalid(FieldError::invalid(
                kind,
                "nodes are only allowed in SFNode and MFNode fields",
            ))),
            (kind, literal) => FieldValue::from_literal(kind, literal).map_err(invalid),
        }
    }

    // ---- prototypes ----

    fn record_alias(
        &mut self,
        node: NodeId,
        name: &Spanned<Identifier>,
        interface: &Spanned<Identifier>,
        span: &Span,
    ) -> Result<(), BuildError> {
        let template = self.frame.template.as_mut().ok_or_else(|| {
            BuildError::invalid_is(interface.node.as_str(), "IS is only allowed inside a PROTO body", span.clone())
        })?;
        if template.interfaces.get(interface.node.as_str()).is_none() {
            return Err(BuildError::invalid_is(
                interface.node.as_str(),
                "not declared by the enclosing PROTO",
                interface.span.clone(),
            ));
        }
        template.aliases.push(Alias {
            interface: interface.node.0.clone(),
            node,
            node_interface: name.node.0.clone(),
        });
        Ok(())
    }

    fn build_proto(&mut self, proto: &ProtoDecl, span: &Span) -> Result<(), BuildError> {
        let name = proto.name.node.as_str();
        if self.frame.local_protos.contains(name) {
            return Err(BuildError::DuplicateProto {
                name: name.to_string(),
                span: proto.name.span.clone(),
            });
        }
        let id = format!("{}#{}", self.frame.uri, name);

        let mut interfaces = InterfaceSet::new();
        for decl in &proto.interfaces {
            let interface = Interface::new(decl.node.access, decl.node.kind.node, decl.node.id.node.as_str());
            interfaces
                .insert(interface)
                .map_err(|dup| BuildError::DuplicateInterface {
                    name: name.to_string(),
                    interface: dup.id,
                    span: decl.span.clone(),
                })?;
        }

        // The body sees the enclosing PROTOs but none of the enclosing DEF names
        let template_scope = self.graph.create_scope(id.as_str(), Some(self.frame.scope));
        let body_frame = Frame {
            scope: template_scope,
            uri: id.clone(),
            protos: self.frame.protos.clone(),
            local_protos: HashSet::new(),
            template: Some(Template {
                interfaces,
                ..Template::default()
            }),
        };
        let outer = std::mem::replace(&mut self.frame, body_frame);
        let body = self.build_proto_body(proto);
        let inner = std::mem::replace(&mut self.frame, outer);
        let (defaults, template_nodes) = body?;

        let Template {
            interfaces,
            aliases,
            routes,
        } = inner.template.unwrap_or_default();
        let definition = ProtoDefinition {
            id: id.clone(),
            interfaces,
            defaults,
            template_nodes,
            aliases,
            routes,
        };
        let class = ProtoClass::new(&*self.graph, definition).map_err(|source| BuildError::Proto {
            name: name.to_string(),
            span: span.clone(),
            source,
        })?;
        self.registry
            .register(Arc::new(class))
            .map_err(|source| BuildError::Registry {
                span: proto.name.span.clone(),
                source,
            })?;

        debug!("defined PROTO {} as {}", name, id);
        self.frame.protos.insert(name.to_string(), id);
        self.frame.local_protos.insert(name.to_string());
        Ok(())
    }

    /// Build defaults and implementation nodes inside the PROTO's own frame
    fn build_proto_body(
        &mut self,
        proto: &ProtoDecl,
    ) -> Result<(HashMap<String, FieldValue>, Vec<NodeId>), BuildError> {
        let mut defaults = HashMap::new();
        for decl in &proto.interfaces {
            if let Some(default) = &decl.node.default {
                let interface = Interface::new(decl.node.access, decl.node.kind.node, decl.node.id.node.as_str());
                let value = self.build_value(&interface, default)?;
                defaults.insert(interface.id, value);
            }
        }
        let template_nodes = self.build_statements(&proto.body)?;
        Ok((defaults, template_nodes))
    }

    // ---- routes ----

    fn build_route(&mut self, route: &RouteDecl, span: &Span) -> Result<(), BuildError> {
        if self.frame.template.is_some() {
            // Routes inside a PROTO body are wired per instance
            let from = self.lookup_node(&route.from_node)?;
            let to = self.lookup_node(&route.to_node)?;
            if let Some(template) = self.frame.template.as_mut() {
                template.routes.push(ProtoRoute {
                    from,
                    from_output: route.from_event.node.0.clone(),
                    to,
                    to_input: route.to_event.node.0.clone(),
                });
            }
            return Ok(());
        }

        let endpoints = self
            .lookup_node(&route.from_node)
            .and_then(|from| Ok((from, self.lookup_node(&route.to_node)?)));
        let (from, to) = match endpoints {
            Ok(endpoints) => endpoints,
            Err(warning) => {
                warn!("skipping ROUTE: {}", warning);
                self.warnings.push(warning);
                return Ok(());
            }
        };

        match self.graph.add_route(
            from,
            route.from_event.node.as_str(),
            to,
            route.to_event.node.as_str(),
        ) {
            Ok(_) => {}
            Err(source) => {
                let warning = BuildError::Route {
                    from: route.from_node.node.0.clone(),
                    from_event: route.from_event.node.0.clone(),
                    to: route.to_node.node.0.clone(),
                    to_event: route.to_event.node.0.clone(),
                    span: span.clone(),
                    source,
                };
                warn!("skipping {}", warning);
                self.warnings.push(warning);
            }
        }
        Ok(())
    }
}

fn unknown_field(node_type: &NodeType, name: &Spanned<Identifier>) -> BuildError {
    let fields = node_type
        .interfaces()
        .iter()
        .filter(|i| i.access.has_value())
        .map(|i| i.id.as_str());
    BuildError::UnknownField {
        node_type: node_type.id().to_string(),
        field: name.node.0.clone(),
        span: name.span.clone(),
        suggestions: find_similar(fields, name.node.as_str(), 2),
    }
}

/// Build `document` into `graph`, registering its PROTOs in `registry`
pub fn build_scene(
    graph: &mut SceneGraph,
    registry: &mut TypeRegistry,
    document: &Document,
    base_uri: &str,
) -> Result<Scene, BuildError> {
    SceneBuilder::new(graph, registry, base_uri).build(document)
}
