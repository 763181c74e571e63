use std::collections::HashMap;
use std::ops::{Index, IndexMut};

use slotmap::SlotMap;

use super::node::{DirtyFlags, HostHandle, NodeId, NodeKind, ViewNode};
use crate::decoration::{Attrs, LineDecoration, MarkDecoration, Widget, combine_attrs};

/// Arena holding the live tree and every fragment being built for it.
///
/// Ownership runs parent to child through `children`; `parent` links are
/// only used for dirty propagation and offset walks.
pub struct Nodes {
    slots: SlotMap<NodeId, ViewNode>,
    /// Host handles of destroyed nodes, waiting for the next sync.
    released: Vec<HostHandle>,
    hosts: HashMap<HostHandle, NodeId>,
    pub(crate) max_join_len: usize,
}

impl Index<NodeId> for Nodes {
    type Output = ViewNode;

    fn index(&self, id: NodeId) -> &ViewNode {
        &self.slots[id]
    }
}

impl IndexMut<NodeId> for Nodes {
    fn index_mut(&mut self, id: NodeId) -> &mut ViewNode {
        &mut self.slots[id]
    }
}

impl Nodes {
    pub fn new(max_join_len: usize) -> Self {
        Self {
            slots: SlotMap::with_key(),
            released: Vec::new(),
            hosts: HashMap::new(),
            max_join_len,
        }
    }

    pub fn get(&self, id: NodeId) -> Option<&ViewNode> {
        self.slots.get(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn insert(&mut self, node: ViewNode) -> NodeId {
        self.slots.insert(node)
    }

    pub(crate) fn document(&mut self) -> NodeId {
        self.insert(ViewNode::new(NodeKind::Document, 0))
    }

    pub(crate) fn text(&mut self, text: String) -> NodeId {
        let len = text.len();
        self.insert(ViewNode::new(NodeKind::Text { text }, len))
    }

    /// A frozen leaf showing host text over `length` document bytes, which
    /// need not match the text.
    pub(crate) fn composition(&mut self, text: String, length: usize) -> NodeId {
        let mut node = ViewNode::new(NodeKind::Composition { text }, length);
        node.flags |= DirtyFlags::COMPOSITION;
        self.insert(node)
    }

    pub(crate) fn line(&mut self) -> NodeId {
        self.insert(ViewNode::new(
            NodeKind::Line {
                attrs: Attrs::new(),
            },
            0,
        ))
    }

    pub(crate) fn mark(
        &mut self,
        mark: MarkDecoration,
        children: Vec<NodeId>,
        length: usize,
    ) -> NodeId {
        let id = self.insert(ViewNode::new(NodeKind::Mark { mark }, length));
        for &child in &children {
            self.set_parent(child, id);
        }
        self.slots[id].children = children;
        id
    }

    pub(crate) fn widget(&mut self, widget: Widget, length: usize, side: i8) -> NodeId {
        self.insert(ViewNode::new(NodeKind::Widget { widget, side }, length))
    }

    pub(crate) fn widget_buffer(&mut self, side: i8) -> NodeId {
        self.insert(ViewNode::new(NodeKind::WidgetBuffer { side }, 0))
    }

    pub(crate) fn block_widget(
        &mut self,
        widget: Widget,
        length: usize,
        start_side: i8,
        end_side: i8,
    ) -> NodeId {
        self.insert(ViewNode::new(
            NodeKind::BlockWidget {
                widget,
                start_side,
                end_side,
            },
            length,
        ))
    }

    pub(crate) fn set_parent(&mut self, id: NodeId, parent: NodeId) {
        if self.slots[id].parent != Some(parent) {
            self.slots[id].parent = Some(parent);
            if self.slots[id].is_dirty() {
                self.mark_parents_dirty(id, true);
            }
        }
    }

    /// Flags `id` for a content resync and tells its ancestors.
    ///
    /// With `relist`, the parent's child list is resynced too.
    pub(crate) fn mark_dirty(&mut self, id: NodeId, relist: bool) {
        self.slots[id].flags |= DirtyFlags::SELF;
        self.mark_parents_dirty(id, relist);
    }

    pub(crate) fn mark_attrs_dirty(&mut self, id: NodeId) {
        self.slots[id].flags |= DirtyFlags::ATTRIBUTES;
        self.mark_parents_dirty(id, false);
    }

    fn mark_parents_dirty(&mut self, id: NodeId, mut relist: bool) {
        let mut cur = self.slots[id].parent;
        while let Some(parent) = cur {
            let node = &mut self.slots[parent];
            if relist {
                node.flags |= DirtyFlags::SELF;
            }
            if node.flags.contains(DirtyFlags::CHILD_LIST) {
                return;
            }
            node.flags |= DirtyFlags::CHILD_LIST;
            relist = false;
            cur = node.parent;
        }
    }

    /// Replaces `children[from..to]` of `parent` with `insert`.
    ///
    /// Displaced children still owned by `parent` are destroyed unless they
    /// reappear in `insert`.
    pub(crate) fn replace_children(
        &mut self,
        parent: NodeId,
        from: usize,
        to: usize,
        insert: Vec<NodeId>,
    ) {
        self.mark_dirty(parent, false);
        let removed: Vec<NodeId> = self.slots[parent].children[from..to].to_vec();
        for child in removed {
            let owned = self
                .slots
                .get(child)
                .is_some_and(|node| node.parent == Some(parent));
            if owned && !insert.contains(&child) {
                self.destroy(child);
            }
        }
        for &child in &insert {
            self.set_parent(child, parent);
        }
        self.slots[parent].children.splice(from..to, insert);
    }

    /// Appends an inline node to `parent`, descending into a trailing `Mark`
    /// equal to the node's outer mark while `open` allows.
    pub(crate) fn join_inline_into(&mut self, parent: NodeId, view: NodeId, open: usize) {
        let length = self.slots[view].length;
        let last = self.slots[parent].children.last().copied();
        let joinable = open > 0
            && last.is_some_and(|last| match (&self.slots[last].kind, &self.slots[view].kind) {
                (NodeKind::Mark { mark: a }, NodeKind::Mark { mark: b }) => {
                    a == b && self.slots[view].children.len() == 1
                }
                _ => false,
            });
        match last {
            Some(last) if joinable => {
                let inner = self.slots[view].children[0];
                self.slots[view].children.clear();
                self.join_inline_into(last, inner, open - 1);
                self.destroy(view);
            }
            _ => {
                self.slots[parent].children.push(view);
                self.set_parent(view, parent);
            }
        }
        self.slots[parent].length += length;
    }

    /// Wraps `view` in `active` marks, outermost first.
    pub(crate) fn wrap_marks(&mut self, mut view: NodeId, active: &[MarkDecoration]) -> NodeId {
        for mark in active.iter().rev() {
            let length = self.slots[view].length;
            view = self.mark(mark.clone(), vec![view], length);
        }
        view
    }

    /// Sets the line break after a block, flagging it for a resync when that
    /// changes.
    pub(crate) fn set_break_after(&mut self, id: NodeId, break_after: bool) {
        if self.slots[id].break_after != break_after {
            self.slots[id].break_after = break_after;
            self.mark_dirty(id, false);
        }
    }

    pub(crate) fn add_line_deco(&mut self, line: NodeId, deco: &LineDecoration) {
        if let NodeKind::Line { attrs } = &mut self.slots[line].kind {
            combine_attrs(&deco.attributes, attrs);
        }
    }

    pub(crate) fn set_line_attrs(&mut self, line: NodeId, new_attrs: Attrs) {
        let changed = match &mut self.slots[line].kind {
            NodeKind::Line { attrs } if *attrs != new_attrs => {
                *attrs = new_attrs;
                true
            }
            _ => false,
        };
        if changed {
            self.mark_attrs_dirty(line);
        }
    }

    /// Removes a node and the children it still owns, queueing their host
    /// handles for release.
    pub(crate) fn destroy(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let Some(node) = self.slots.remove(id) else {
                continue;
            };
            if let Some(handle) = node.host {
                self.hosts.remove(&handle);
                self.released.push(handle);
            }
            stack.extend(
                node.children
                    .into_iter()
                    .filter(|&child| self.slots.get(child).is_some_and(|c| c.parent == Some(id))),
            );
        }
    }

    pub(crate) fn set_host(&mut self, id: NodeId, handle: HostHandle) {
        self.slots[id].host = Some(handle);
        self.hosts.insert(handle, id);
    }

    /// Moves `handle` onto `target`, taking it from whichever node or release
    /// queue currently holds it.
    pub(crate) fn transplant_host(&mut self, handle: HostHandle, target: NodeId) {
        if self.slots[target].host == Some(handle) {
            return;
        }
        if let Some(owner) = self.hosts.remove(&handle) {
            if let Some(node) = self.slots.get_mut(owner) {
                node.host = None;
                self.mark_dirty(owner, true);
            }
        }
        self.released.retain(|&h| h != handle);
        if let Some(previous) = self.slots[target].host.take() {
            self.hosts.remove(&previous);
            self.released.push(previous);
        }
        self.set_host(target, handle);
        self.mark_dirty(target, true);
    }

    pub(crate) fn drain_released(&mut self) -> Vec<HostHandle> {
        std::mem::take(&mut self.released)
    }

    pub fn node_for_host(&self, handle: HostHandle) -> Option<NodeId> {
        self.hosts.get(&handle).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &ViewNode)> {
        self.slots.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_with_text(nodes: &mut Nodes, text: &str) -> (NodeId, NodeId) {
        let line = nodes.line();
        let t = nodes.text(text.to_string());
        nodes.join_inline_into(line, t, 0);
        (line, t)
    }

    fn clear_flags(nodes: &mut Nodes) {
        let ids: Vec<_> = nodes.iter().map(|(id, _)| id).collect();
        for id in ids {
            nodes[id].flags = DirtyFlags::empty();
        }
    }

    #[test]
    fn new_nodes_start_dirty() {
        let mut nodes = Nodes::new(256);
        let t = nodes.text("ab".into());
        assert!(nodes[t].flags().contains(DirtyFlags::SELF));
        assert_eq!(nodes[t].length(), 2);
    }

    #[test]
    fn mark_dirty_stops_at_flagged_ancestor() {
        let mut nodes = Nodes::new(256);
        let doc = nodes.document();
        let (line, text) = line_with_text(&mut nodes, "ab");
        nodes.replace_children(doc, 0, 0, vec![line]);
        clear_flags(&mut nodes);

        nodes.mark_dirty(text, false);
        assert_eq!(nodes[text].flags(), DirtyFlags::SELF);
        assert_eq!(nodes[line].flags(), DirtyFlags::CHILD_LIST);
        assert_eq!(nodes[doc].flags(), DirtyFlags::CHILD_LIST);

        nodes[doc].flags = DirtyFlags::empty();
        nodes.mark_dirty(text, true);
        assert_eq!(nodes[line].flags(), DirtyFlags::CHILD_LIST | DirtyFlags::SELF);
        // the line already carried CHILD_LIST, so the walk stopped there
        assert_eq!(nodes[doc].flags(), DirtyFlags::empty());
    }

    #[test]
    fn join_inline_descends_into_equal_marks() {
        let mut nodes = Nodes::new(256);
        let line = nodes.line();
        let em = MarkDecoration::new("em");

        let a = nodes.text("a".into());
        let a = nodes.wrap_marks(a, std::slice::from_ref(&em));
        nodes.join_inline_into(line, a, 0);

        let b = nodes.text("b".into());
        let b = nodes.wrap_marks(b, std::slice::from_ref(&em));
        nodes.join_inline_into(line, b, 1);

        assert_eq!(nodes[line].children().len(), 1);
        assert_eq!(nodes[line].length(), 2);
        let mark = nodes[line].children()[0];
        assert_eq!(nodes[mark].children().len(), 2);
        assert_eq!(nodes[mark].length(), 2);
        assert_eq!(nodes.len(), 4);
    }

    #[test]
    fn destroy_releases_hosts_of_owned_children() {
        let mut nodes = Nodes::new(256);
        let (line, text) = line_with_text(&mut nodes, "ab");
        nodes.set_host(line, HostHandle(1));
        nodes.set_host(text, HostHandle(2));

        nodes.destroy(line);
        assert!(nodes.is_empty());
        let mut released = nodes.drain_released();
        released.sort();
        assert_eq!(released, vec![HostHandle(1), HostHandle(2)]);
        assert_eq!(nodes.node_for_host(HostHandle(2)), None);
    }

    #[test]
    fn replace_children_keeps_reinserted_nodes() {
        let mut nodes = Nodes::new(256);
        let line = nodes.line();
        let a = nodes.text("a".into());
        let b = nodes.text("b".into());
        nodes.join_inline_into(line, a, 0);
        nodes.join_inline_into(line, b, 0);

        let c = nodes.text("c".into());
        nodes.replace_children(line, 0, 2, vec![c, b]);
        assert_eq!(nodes[line].children(), &[c, b]);
        assert!(!nodes.contains(a));
        assert!(nodes.contains(b));
    }

    #[test]
    fn transplant_moves_handle_out_of_release_queue() {
        let mut nodes = Nodes::new(256);
        let old = nodes.text("ab".into());
        nodes.set_host(old, HostHandle(7));
        nodes.destroy(old);

        let new = nodes.composition("ab".into(), 2);
        nodes.transplant_host(HostHandle(7), new);
        assert_eq!(nodes[new].host(), Some(HostHandle(7)));
        assert!(nodes.drain_released().is_empty());
        assert_eq!(nodes.node_for_host(HostHandle(7)), Some(new));
    }

    #[test]
    fn transplant_takes_handle_from_live_owner() {
        let mut nodes = Nodes::new(256);
        let owner = nodes.text("ab".into());
        let target = nodes.text("ab".into());
        nodes.set_host(owner, HostHandle(3));
        nodes.transplant_host(HostHandle(3), target);
        assert_eq!(nodes[owner].host(), None);
        assert_eq!(nodes[target].host(), Some(HostHandle(3)));
    }
}
