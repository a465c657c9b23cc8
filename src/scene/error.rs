//! Error types for the scene builder

use ariadne::{Color, Label, Report, ReportKind, Source};
use thiserror::Error;

use crate::field::FieldError;
use crate::graph::NodeError;
use crate::node::RegistryError;
use crate::parser::ast::Span;
use crate::proto::ProtoError;

/// Errors that can occur while turning a document into nodes
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BuildError {
    /// A node type that is neither a visible PROTO nor a built-in class
    #[error("unknown node type '{name}'")]
    UnknownNodeType {
        name: String,
        span: Span,
        suggestions: Vec<String>,
    },

    /// A field name the node type does not declare
    #[error("node type '{node_type}' has no field '{field}'")]
    UnknownField {
        node_type: String,
        field: String,
        span: Span,
        suggestions: Vec<String>,
    },

    /// `USE` or `ROUTE` of a name that was never defined
    #[error("undefined node name '{name}'")]
    UndefinedName {
        name: String,
        span: Span,
        suggestions: Vec<String>,
    },

    /// A value that does not fit the field's declared kind
    #[error("invalid value for '{field}': {source}")]
    InvalidValue {
        field: String,
        span: Span,
        source: FieldError,
    },

    /// `IS` outside a PROTO body, or naming an undeclared interface
    #[error("invalid IS '{interface}': {reason}")]
    InvalidIs {
        interface: String,
        reason: String,
        span: Span,
    },

    /// A PROTO definition that failed validation
    #[error("invalid PROTO '{name}': {source}")]
    Proto {
        name: String,
        span: Span,
        source: ProtoError,
    },

    /// Two PROTO interfaces sharing an id
    #[error("PROTO '{name}' declares '{interface}' twice")]
    DuplicateInterface {
        name: String,
        interface: String,
        span: Span,
    },

    /// A PROTO name defined twice in the same scope
    #[error("duplicate PROTO definition '{name}'")]
    DuplicateProto { name: String, span: Span },

    /// A ROUTE that cannot be connected
    #[error("invalid ROUTE {from}.{from_event} TO {to}.{to_event}: {source}")]
    Route {
        from: String,
        from_event: String,
        to: String,
        to_event: String,
        span: Span,
        source: NodeError,
    },

    /// Node construction or instantiation failure
    #[error("cannot create '{node_type}': {source}")]
    Node {
        node_type: String,
        span: Span,
        source: NodeError,
    },

    #[error("{source}")]
    Registry { span: Span, source: RegistryError },
}

impl BuildError {
    /// Create an undefined name error with suggestions
    pub fn undefined(name: impl Into<String>, span: Span, suggestions: Vec<String>) -> Self {
        Self::UndefinedName {
            name: name.into(),
            span,
            suggestions,
        }
    }

    pub fn invalid_is(interface: impl Into<String>, reason: impl Into<String>, span: Span) -> Self {
        Self::InvalidIs {
            interface: interface.into(),
            reason: reason.into(),
            span,
        }
    }

    /// Get the source span
    pub fn span(&self) -> &Span {
        match self {
            Self::UnknownNodeType { span, .. }
            | Self::UnknownField { span, .. }
            | Self::UndefinedName { span, .. }
            | Self::InvalidValue { span, .. }
            | Self::InvalidIs { span, .. }
            | Self::Proto { span, .. }
            | Self::DuplicateInterface { span, .. }
            | Self::DuplicateProto { span, .. }
            | Self::Route { span, .. }
            | Self::Node { span, .. }
            | Self::Registry { span, .. } => span,
        }
    }

    /// Get suggestions if available
    pub fn suggestions(&self) -> Option<&[String]> {
        match self {
            Self::UnknownNodeType { suggestions, .. }
            | Self::UnknownField { suggestions, .. }
            | Self::UndefinedName { suggestions, .. } => Some(suggestions),
            _ => None,
        }
    }

    /// Format the error with source context using ariadne
    pub fn format(&self, source: &str, filename: &str) -> String {
        self.report(ReportKind::Error, Color::Red, source, filename)
    }

    /// Format as a warning, used for skipped scene routes
    pub fn format_warning(&self, source: &str, filename: &str) -> String {
        self.report(ReportKind::Warning, Color::Yellow, source, filename)
    }

    fn report(&self, kind: ReportKind, color: Color, source: &str, filename: &str) -> String {
        let span = self.span().clone();
        let message = self.to_string();
        let mut report = Report::build(kind, filename, span.start)
            .with_message(&message)
            .with_label(
                Label::new((filename, span))
                    .with_message(&message)
                    .with_color(color),
            );
        if let Some(suggestions) = self.suggestions().filter(|s| !s.is_empty()) {
            report = report.with_help(format!("did you mean: {}?", suggestions.join(", ")));
        }

        let mut buf = Vec::new();
        report
            .finish()
            .write((filename, Source::from(source)), &mut buf)
            .expect("writing a report to a Vec cannot fail");
        String::from_utf8_lossy(&buf).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_name_display() {
        let err = BuildError::undefined("Lamp", 4..8, vec!["Lamp1".to_string()]);
        assert_eq!(err.to_string(), "undefined node name 'Lamp'");
        assert_eq!(err.span(), &(4..8));
    }

    #[test]
    fn test_format_with_suggestions() {
        let src = "USE Lamp";
        let err = BuildError::undefined("Lamp", 4..8, vec!["Lamp1".to_string()]);
        let rendered = err.format(src, "scene.wrl");
        assert!(rendered.contains("undefined node name"));
        assert!(rendered.contains("Lamp1"));
    }
}
