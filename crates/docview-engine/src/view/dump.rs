use std::fmt::Write;

use super::arena::Nodes;
use super::node::{NodeId, NodeKind};

impl Nodes {
    /// Renders `id` and its subtree as an indented outline, one node per
    /// line. A trailing `+br` marks a line break after the node.
    pub fn outline(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.outline_into(id, 0, &mut out);
        out
    }

    fn outline_into(&self, id: NodeId, depth: usize, out: &mut String) {
        let node = &self[id];
        let _ = write!(out, "{:indent$}{}", "", node.kind.name(), indent = depth * 2);
        match &node.kind {
            NodeKind::Document => {}
            NodeKind::Line { attrs } => {
                for (name, value) in attrs {
                    let _ = write!(out, " {name}={value:?}");
                }
            }
            NodeKind::Mark { mark } => {
                let _ = write!(out, " {}", mark.tag);
                for (name, value) in &mark.attributes {
                    let _ = write!(out, " {name}={value:?}");
                }
            }
            NodeKind::Text { text } | NodeKind::Composition { text } => {
                let _ = write!(out, " {text:?}");
            }
            NodeKind::Widget { widget, side } => {
                let _ = write!(out, " {}:{} len={}", widget.kind, widget.key, node.length);
                if node.length == 0 {
                    let _ = write!(out, " side={side}");
                }
            }
            NodeKind::WidgetBuffer { side } => {
                let _ = write!(out, " side={side}");
            }
            NodeKind::BlockWidget { widget, .. } => {
                let _ = write!(out, " {}:{} len={}", widget.kind, widget.key, node.length);
            }
        }
        if node.break_after {
            out.push_str(" +br");
        }
        out.push('\n');
        for &child in &node.children {
            self.outline_into(child, depth + 1, out);
        }
    }

    /// Flattens the subtree back into text. Widgets appear as `[kind]`,
    /// block widgets as `[[kind]]`, and buffers not at all.
    pub fn linearize(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.linearize_into(id, &mut out);
        out
    }

    fn linearize_into(&self, id: NodeId, out: &mut String) {
        let node = &self[id];
        match &node.kind {
            NodeKind::Text { text } | NodeKind::Composition { text } => out.push_str(text),
            NodeKind::Widget { widget, .. } => {
                let _ = write!(out, "[{}]", widget.kind);
            }
            NodeKind::BlockWidget { widget, .. } => {
                let _ = write!(out, "[[{}]]", widget.kind);
            }
            NodeKind::Document
            | NodeKind::Line { .. }
            | NodeKind::Mark { .. }
            | NodeKind::WidgetBuffer { .. } => {}
        }
        for &child in &node.children {
            self.linearize_into(child, out);
        }
        if node.break_after {
            out.push('\n');
        }
    }
}
