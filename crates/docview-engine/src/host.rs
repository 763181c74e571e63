//! # Host sync
//!
//! The second phase of a pass: everything the reconciler flagged is pushed
//! to the external render tree through [`HostSync`].

use std::collections::BTreeMap;

use crate::tree::ViewTree;
use crate::view::{DirtyFlags, HostHandle, NodeId, NodeKind, ViewNode};

/// The external render tree.
pub trait HostSync {
    /// Creates a host node for `node` and returns its handle.
    fn create(&mut self, node: &ViewNode) -> HostHandle;

    /// Refreshes the host node's own content or attributes.
    fn update(&mut self, handle: HostHandle, node: &ViewNode);

    /// Replaces the host node's children.
    fn set_children(&mut self, handle: HostHandle, children: &[HostHandle]);

    /// The view node owning `handle` is gone.
    fn release(&mut self, handle: HostHandle);
}

/// Handles touched by one [`ViewTree::sync`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: Vec<HostHandle>,
    pub updated: Vec<HostHandle>,
    pub relisted: Vec<HostHandle>,
    pub released: Vec<HostHandle>,
}

impl ViewTree {
    /// Pushes every pending change to `host` and clears the dirty flags.
    pub fn sync(&mut self, host: &mut dyn HostSync) -> SyncReport {
        let mut report = SyncReport::default();
        for handle in self.nodes.drain_released() {
            host.release(handle);
            report.released.push(handle);
        }

        // Pre-order list of the nodes to visit; clean subtrees are skipped.
        let mut order: Vec<NodeId> = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            let node = &self.nodes[id];
            if node.host().is_none()
                || node
                    .flags()
                    .intersects(DirtyFlags::CHILD_LIST | DirtyFlags::SELF)
            {
                stack.extend(node.children().iter().rev());
            }
        }

        // Children before parents, so child handles exist when a parent's
        // list is written.
        for &id in order.iter().rev() {
            let fresh = self.nodes[id].host().is_none();
            let handle = match self.nodes[id].host() {
                Some(handle) => {
                    let node = &self.nodes[id];
                    let frozen_leaf = node.is_frozen() && !node.kind().is_container();
                    if node.flags().intersects(DirtyFlags::SELF | DirtyFlags::ATTRIBUTES)
                        && !frozen_leaf
                    {
                        host.update(handle, node);
                        report.updated.push(handle);
                    }
                    handle
                }
                None => {
                    let handle = host.create(&self.nodes[id]);
                    self.nodes.set_host(id, handle);
                    report.created.push(handle);
                    handle
                }
            };
            let node = &self.nodes[id];
            if node.kind().is_container() && (fresh || node.flags().contains(DirtyFlags::SELF)) {
                let children: Vec<HostHandle> = node
                    .children()
                    .iter()
                    .filter_map(|&child| self.nodes[child].host())
                    .collect();
                host.set_children(handle, &children);
                report.relisted.push(handle);
            }
        }

        for &id in &order {
            self.nodes[id].flags &= DirtyFlags::COMPOSITION;
        }
        log::debug!(
            "sync: {} created, {} updated, {} relisted, {} released",
            report.created.len(),
            report.updated.len(),
            report.relisted.len(),
            report.released.len()
        );
        report
    }
}

/// One node of a [`RecordingHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    pub kind: &'static str,
    /// Text content, widget label or tag, depending on the kind.
    pub content: String,
    pub class: Option<String>,
    pub break_after: bool,
    pub children: Vec<HostHandle>,
}

impl HostRecord {
    fn of(node: &ViewNode) -> Self {
        let (content, class) = match node.kind() {
            NodeKind::Text { text } | NodeKind::Composition { text } => (text.clone(), None),
            NodeKind::Widget { widget, .. } | NodeKind::BlockWidget { widget, .. } => {
                (widget.kind.clone(), None)
            }
            NodeKind::Mark { mark } => (mark.tag.clone(), mark.attributes.get("class").cloned()),
            NodeKind::Line { attrs } => (String::new(), attrs.get("class").cloned()),
            NodeKind::Document | NodeKind::WidgetBuffer { .. } => (String::new(), None),
        };
        Self {
            kind: node.kind().name(),
            content,
            class,
            break_after: node.break_after(),
            children: Vec::new(),
        }
    }
}

/// An in-memory host that mirrors the view tree.
#[derive(Debug, Default)]
pub struct RecordingHost {
    next: u64,
    pub nodes: BTreeMap<HostHandle, HostRecord>,
}

impl RecordingHost {
    pub fn get(&self, handle: HostHandle) -> Option<&HostRecord> {
        self.nodes.get(&handle)
    }

    /// Mutable access for simulating host-side edits, such as an input
    /// method writing into a text node.
    pub fn get_mut(&mut self, handle: HostHandle) -> Option<&mut HostRecord> {
        self.nodes.get_mut(&handle)
    }

    /// The mirrored subtree at `handle` flattened to text, in the same
    /// format as [`ViewTree::linearize`].
    pub fn linearize(&self, handle: HostHandle) -> String {
        let mut out = String::new();
        self.linearize_into(handle, &mut out);
        out
    }

    fn linearize_into(&self, handle: HostHandle, out: &mut String) {
        let Some(record) = self.nodes.get(&handle) else {
            return;
        };
        match record.kind {
            "Text" | "Composition" => out.push_str(&record.content),
            "Widget" => {
                out.push('[');
                out.push_str(&record.content);
                out.push(']');
            }
            "BlockWidget" => {
                out.push_str("[[");
                out.push_str(&record.content);
                out.push_str("]]");
            }
            _ => {}
        }
        for &child in &record.children {
            self.linearize_into(child, out);
        }
        if record.break_after {
            out.push('\n');
        }
    }
}

impl HostSync for RecordingHost {
    fn create(&mut self, node: &ViewNode) -> HostHandle {
        self.next += 1;
        let handle = HostHandle(self.next);
        self.nodes.insert(handle, HostRecord::of(node));
        handle
    }

    fn update(&mut self, handle: HostHandle, node: &ViewNode) {
        if let Some(record) = self.nodes.get_mut(&handle) {
            let children = std::mem::take(&mut record.children);
            *record = HostRecord {
                children,
                ..HostRecord::of(node)
            };
        }
    }

    fn set_children(&mut self, handle: HostHandle, children: &[HostHandle]) {
        if let Some(record) = self.nodes.get_mut(&handle) {
            record.children = children.to_vec();
        }
    }

    fn release(&mut self, handle: HostHandle) {
        self.nodes.remove(&handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangedRange;
    use crate::decoration::DecorationSet;
    use crate::options::ViewOptions;
    use pretty_assertions::assert_eq;

    #[test]
    fn first_sync_creates_everything() {
        let mut tree = ViewTree::new(&"ab\ncd", &DecorationSet::new(), ViewOptions::default()).unwrap();
        let mut host = RecordingHost::default();
        let report = tree.sync(&mut host);

        assert_eq!(report.created.len(), 5);
        assert_eq!(tree.dirty_count(), 0);
        let root = tree.nodes()[tree.root()].host().unwrap();
        assert_eq!(host.linearize(root), "ab\ncd");
    }

    #[test]
    fn second_sync_only_touches_the_edit() {
        let mut tree = ViewTree::new(&"ab\ncd", &DecorationSet::new(), ViewOptions::default()).unwrap();
        let mut host = RecordingHost::default();
        tree.sync(&mut host);

        tree.update(&"aXb\ncd", &DecorationSet::new(), &[ChangedRange::new(1, 1, 1, 2)])
            .unwrap();
        let report = tree.sync(&mut host);

        assert!(report.created.is_empty());
        assert!(report.released.is_empty());
        assert_eq!(report.updated.len(), 1);
        let root = tree.nodes()[tree.root()].host().unwrap();
        assert_eq!(host.linearize(root), "aXb\ncd");
    }

    #[test]
    fn removed_nodes_are_released() {
        let mut tree = ViewTree::new(&"ab\ncd", &DecorationSet::new(), ViewOptions::default()).unwrap();
        let mut host = RecordingHost::default();
        tree.sync(&mut host);

        tree.update(&"abcd", &DecorationSet::new(), &[ChangedRange::new(2, 3, 2, 2)])
            .unwrap();
        let report = tree.sync(&mut host);

        assert_eq!(report.released.len(), 2);
        assert_eq!(host.nodes.len(), 3);
        let root = tree.nodes()[tree.root()].host().unwrap();
        assert_eq!(host.linearize(root), "abcd");
    }
}
