//! Structural node paths
//!
//! A [`NodePath`] addresses a node by position: an index into a root list,
//! then for every level the node-valued field followed and the index in
//! that field's value. The same path can be replayed against any
//! structurally congruent graph, such as a fresh clone of a template.

use std::collections::HashSet;

use crate::field::{FieldKind, FieldValue};
use crate::node::Access;

use super::{NodeId, SceneGraph};

/// How a path element's field holds node references
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Single,
    Multi,
}

/// One level of a [`NodePath`]
///
/// `index` is the node's position in its containing list (the root list,
/// or an MFNode value; always 0 under an SFNode). `kind` and `field_id`
/// name the field followed to reach the next level and are meaningless on
/// the last element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathElement {
    pub index: usize,
    pub kind: RefKind,
    pub field_id: String,
}

impl PathElement {
    fn at(index: usize) -> Self {
        Self {
            index,
            kind: RefKind::Single,
            field_id: String::new(),
        }
    }
}

pub type NodePath = Vec<PathElement>;

struct PathSearch<'g> {
    graph: &'g SceneGraph,
    objective: NodeId,
    path: NodePath,
    visited: HashSet<NodeId>,
}

impl PathSearch<'_> {
    /// Search a list; returns true once the objective has been found
    fn search_list(&mut self, nodes: &[NodeId]) -> bool {
        self.path.push(PathElement::at(0));
        for (index, &node) in nodes.iter().enumerate() {
            if let Some(back) = self.path.last_mut() {
                *back = PathElement::at(index);
            }
            if node == self.objective {
                return true;
            }
            if self.traverse_children(node) {
                return true;
            }
        }
        self.path.pop();
        false
    }

    fn search_single(&mut self, node: Option<NodeId>) -> bool {
        let Some(node) = node else {
            return false;
        };
        self.path.push(PathElement::at(0));
        if node == self.objective || self.traverse_children(node) {
            return true;
        }
        self.path.pop();
        false
    }

    fn traverse_children(&mut self, node: NodeId) -> bool {
        if !self.visited.insert(node) {
            return false;
        }
        let Ok(n) = self.graph.node(node) else {
            return false;
        };
        let candidates: Vec<(String, FieldKind)> = n
            .node_type()
            .interfaces()
            .iter()
            .filter(|i| matches!(i.access, Access::Field | Access::ExposedField))
            .filter(|i| i.kind.is_node())
            .map(|i| (i.id.clone(), i.kind))
            .collect();

        for (field_id, kind) in candidates {
            let value = match self.graph.field(node, &field_id) {
                Ok(value) => value,
                Err(e) => {
                    log::debug!("path search skipped {}.{}: {}", node, field_id, e);
                    continue;
                }
            };
            if let Some(back) = self.path.last_mut() {
                back.field_id = field_id;
                back.kind = if kind == FieldKind::MfNode {
                    RefKind::Multi
                } else {
                    RefKind::Single
                };
            }
            let found = match value {
                FieldValue::SfNode(child) => self.search_single(child),
                FieldValue::MfNode(children) => self.search_list(&children),
                _ => false,
            };
            if found {
                return true;
            }
        }
        false
    }
}

/// Find the structural path from `roots` to `objective`
///
/// Depth-first over the roots in order, following field and exposedField
/// interfaces of node kinds in declaration order. The first occurrence
/// wins. A node already visited during this search is not descended into
/// again, so cycles terminate.
pub fn compute_path(graph: &SceneGraph, roots: &[NodeId], objective: NodeId) -> Option<NodePath> {
    let mut search = PathSearch {
        graph,
        objective,
        path: Vec::new(),
        visited: HashSet::new(),
    };
    if search.search_list(roots) {
        Some(search.path)
    } else {
        None
    }
}

/// Replay a path against a structurally congruent root list
///
/// Returns None if the path does not fit the graph.
pub fn resolve_path(graph: &SceneGraph, roots: &[NodeId], path: &[PathElement]) -> Option<NodeId> {
    let (first, rest) = path.split_first()?;
    let mut current = *roots.get(first.index)?;
    let mut via = first;
    for element in rest {
        let value = graph.field(current, &via.field_id).ok()?;
        current = match (via.kind, value) {
            (RefKind::Single, FieldValue::SfNode(node)) => node?,
            (RefKind::Multi, FieldValue::MfNode(nodes)) => *nodes.get(element.index)?,
            _ => return None,
        };
        via = element;
    }
    Some(current)
}
