//! Scene syntax output for instantiated node graphs

use std::collections::HashSet;

use crate::field::FieldValue;
use crate::graph::{NodeId, SceneGraph};

const INDENT: &str = "  ";

/// Render the node forest under `roots` in scene syntax
///
/// Fields still at their declared default are left out. A node reached a
/// second time is written as `USE`; prototype instances show their public
/// fields and list their implementation nodes in a comment.
pub fn dump(graph: &SceneGraph, roots: &[NodeId]) -> String {
    let mut dumper = Dumper {
        graph,
        out: String::new(),
        seen: HashSet::new(),
    };
    for &root in roots {
        dumper.node(root, 0);
        dumper.out.push('\n');
    }
    dumper.out
}

struct Dumper<'a> {
    graph: &'a SceneGraph,
    out: String,
    seen: HashSet<NodeId>,
}

impl Dumper<'_> {
    fn pad(&mut self, depth: usize) {
        self.out.push('\n');
        for _ in 0..depth {
            self.out.push_str(INDENT);
        }
    }

    fn node(&mut self, id: NodeId, depth: usize) {
        let graph = self.graph;
        let Ok(node) = graph.node(id) else {
            self.out.push_str("NULL");
            return;
        };
        if !self.seen.insert(id) {
            match node.name() {
                Some(name) => self.out.push_str(&format!("USE {}", name)),
                None => self.out.push_str(&format!("USE {}", id)),
            }
            return;
        }

        if let Some(name) = node.name() {
            self.out.push_str(&format!("DEF {} ", name));
        }
        self.out.push_str(node.node_type().id());
        self.out.push_str(" {");

        let class = node.node_type().class();
        let mut wrote = false;
        for interface in node.node_type().interfaces() {
            if !interface.access.has_value() {
                continue;
            }
            let Ok(value) = graph.field(id, &interface.id) else {
                continue;
            };
            if class.field_default(&interface.id).as_ref() == Some(&value) {
                continue;
            }
            self.pad(depth + 1);
            self.out.push_str(&interface.id);
            self.out.push(' ');
            self.value(&value, depth + 1);
            wrote = true;
        }

        if let Some(instance) = node.as_proto() {
            let nodes: Vec<String> = instance.impl_nodes().iter().map(|n| n.to_string()).collect();
            self.pad(depth + 1);
            self.out.push_str(&format!("# implementation: {}", nodes.join(" ")));
            wrote = true;
        }

        if wrote {
            self.pad(depth);
        }
        self.out.push('}');
    }

    fn value(&mut self, value: &FieldValue, depth: usize) {
        match value {
            FieldValue::SfNode(Some(node)) => self.node(*node, depth),
            FieldValue::MfNode(nodes) if !nodes.is_empty() => {
                self.out.push('[');
                for &node in nodes {
                    self.pad(depth + 1);
                    self.node(node, depth + 1);
                }
                self.pad(depth);
                self.out.push(']');
            }
            other => self.out.push_str(&other.to_string()),
        }
    }
}
