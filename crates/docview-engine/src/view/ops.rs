//! Per-variant split, merge and become.
//!
//! A successful merge or become consumes its source node. A refusal is a
//! `false` return and leaves both nodes untouched.

use super::arena::Nodes;
use super::cursor::child_pos;
use super::node::{DirtyFlags, NodeId, NodeKind};
use crate::reconcile::merge_children_into;

impl Nodes {
    /// Splits `id` at local offset `at`, returning the remainder as a new
    /// node. The line break after `id` moves to the remainder.
    pub(crate) fn split(&mut self, id: NodeId, at: usize) -> NodeId {
        let rest = match self[id].kind.clone() {
            NodeKind::Text { mut text } => {
                let tail = text.split_off(at);
                let rest = self.text(tail);
                let frozen = self[id].flags & DirtyFlags::COMPOSITION;
                self[rest].flags |= frozen;
                self.set_text(id, text);
                rest
            }
            NodeKind::Composition { mut text } => {
                let length = self[id].length;
                let mut cut = at.min(text.len());
                while !text.is_char_boundary(cut) {
                    cut -= 1;
                }
                let tail = text.split_off(cut);
                let rest = self.composition(tail, length - at);
                self.set_text(id, text);
                self[id].length = at;
                rest
            }
            NodeKind::Mark { mark } => {
                let (moved, length) = self.split_children(id, at);
                self.mark(mark, moved, length)
            }
            NodeKind::Line { .. } => self.split_line(id, at),
            NodeKind::Widget { widget, side } => {
                let length = self[id].length - at;
                self[id].length = at;
                self.widget(widget, length, side)
            }
            NodeKind::WidgetBuffer { side } => self.widget_buffer(side),
            NodeKind::BlockWidget {
                widget,
                start_side,
                end_side,
            } => {
                let length = self[id].length - at;
                self[id].length = at;
                self.block_widget(widget, length, start_side, end_side)
            }
            NodeKind::Document => unreachable!("the document node is never split"),
        };
        self[rest].break_after = self[id].break_after;
        self.set_break_after(id, false);
        rest
    }

    fn set_text(&mut self, id: NodeId, new_text: String) {
        let length = new_text.len();
        let changed = match &mut self[id].kind {
            NodeKind::Text { text } | NodeKind::Composition { text } if *text != new_text => {
                *text = new_text;
                true
            }
            _ => false,
        };
        self[id].length = length;
        if changed {
            self.mark_dirty(id, false);
        }
    }

    /// Moves the inline children of `id` past `at` out, splitting the child
    /// that straddles it. Returns the moved children and their length.
    fn split_children(&mut self, id: NodeId, at: usize) -> (Vec<NodeId>, usize) {
        let children = self[id].children.clone();
        let mut moved = Vec::new();
        let mut detach_from = None;
        let mut off = 0;
        for (i, &child) in children.iter().enumerate() {
            let end = off + self[child].length;
            if end > at {
                moved.push(if off < at {
                    self.split(child, at - off)
                } else {
                    child
                });
            }
            if detach_from.is_none() && off >= at {
                detach_from = Some(i);
            }
            off = end;
        }
        let length = self[id].length - at;
        self[id].length = at;
        if let Some(i) = detach_from {
            for &child in &children[i..] {
                if !moved.contains(&child) {
                    self.destroy(child);
                }
            }
            self[id].children.truncate(i);
            self.mark_dirty(id, false);
        }
        (moved, length)
    }

    fn split_line(&mut self, id: NodeId, at: usize) -> NodeId {
        let end = self.line();
        if self[id].length == 0 {
            return end;
        }
        let (mut i, off) = child_pos(self, id, at, 1);
        if off > 0 {
            let child = self[id].children[i];
            let rest = self.split(child, off);
            self.join_inline_into(end, rest, 0);
            i += 1;
        }
        let tail: Vec<NodeId> = self[id].children[i..].to_vec();
        for child in tail {
            self.join_inline_into(end, child, 0);
        }
        while i > 0 {
            let prev = self[id].children[i - 1];
            if self[prev].length > 0 {
                break;
            }
            self.destroy(prev);
            i -= 1;
        }
        self[id].children.truncate(i);
        self.mark_dirty(id, false);
        self[id].length = at;
        end
    }

    /// Replaces local range `from..to` of `id` with the content of `source`,
    /// or deletes it when `source` is `None`.
    ///
    /// `open_start`/`open_end` say how many enclosing mark layers the
    /// replacement shares with its neighbours and drop by one per nested
    /// `Mark`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn merge(
        &mut self,
        id: NodeId,
        from: usize,
        to: usize,
        source: Option<NodeId>,
        has_start: bool,
        open_start: isize,
        open_end: isize,
    ) -> bool {
        match &self[id].kind {
            NodeKind::Text { .. } => self.merge_text(id, from, to, source),
            NodeKind::Mark { .. } => self.merge_mark(id, from, to, source, open_start, open_end),
            NodeKind::Line { .. } => {
                self.merge_line(id, from, to, source, has_start, open_start, open_end)
            }
            NodeKind::Widget { .. } | NodeKind::BlockWidget { .. } => {
                self.merge_widget(id, from, to, source, open_start, open_end)
            }
            NodeKind::WidgetBuffer { .. } | NodeKind::Composition { .. } | NodeKind::Document => {
                false
            }
        }
    }

    fn merge_text(&mut self, id: NodeId, from: usize, to: usize, source: Option<NodeId>) -> bool {
        if self[id].is_frozen() {
            return false;
        }
        let insert = match source {
            None => String::new(),
            Some(src) => match &self[src].kind {
                NodeKind::Text { text } if !self[src].is_frozen() => text.clone(),
                _ => return false,
            },
        };
        if source.is_some() && self[id].length - (to - from) + insert.len() > self.max_join_len {
            return false;
        }
        if let NodeKind::Text { text } = &self[id].kind {
            let mut joined = String::with_capacity(text.len() - (to - from) + insert.len());
            joined.push_str(&text[..from]);
            joined.push_str(&insert);
            joined.push_str(&text[to..]);
            self.set_text(id, joined);
        }
        if let Some(src) = source {
            self.destroy(src);
        }
        true
    }

    fn merge_mark(
        &mut self,
        id: NodeId,
        from: usize,
        to: usize,
        source: Option<NodeId>,
        open_start: isize,
        open_end: isize,
    ) -> bool {
        if let Some(src) = source {
            let equal = match (&self[id].kind, &self[src].kind) {
                (NodeKind::Mark { mark: a }, NodeKind::Mark { mark: b }) => a == b,
                _ => false,
            };
            if !equal
                || (from > 0 && open_start <= 0)
                || (to < self[id].length && open_end <= 0)
            {
                return false;
            }
        }
        let insert = source
            .map(|src| std::mem::take(&mut self[src].children))
            .unwrap_or_default();
        merge_children_into(self, id, from, to, insert, open_start - 1, open_end - 1);
        if let Some(src) = source {
            self.destroy(src);
        }
        true
    }

    #[allow(clippy::too_many_arguments)]
    fn merge_line(
        &mut self,
        id: NodeId,
        from: usize,
        to: usize,
        source: Option<NodeId>,
        has_start: bool,
        open_start: isize,
        open_end: isize,
    ) -> bool {
        if let Some(src) = source {
            if !matches!(self[src].kind, NodeKind::Line { .. }) {
                return false;
            }
            if self[id].host.is_none() {
                if let Some(handle) = self[src].host {
                    self.transplant_host(handle, id);
                }
            }
        }
        if has_start {
            let attrs = match source.map(|src| &self[src].kind) {
                Some(NodeKind::Line { attrs }) => attrs.clone(),
                _ => Default::default(),
            };
            self.set_line_attrs(id, attrs);
        }
        let insert = source
            .map(|src| std::mem::take(&mut self[src].children))
            .unwrap_or_default();
        merge_children_into(self, id, from, to, insert, open_start, open_end);
        if let Some(src) = source {
            self.destroy(src);
        }
        true
    }

    fn merge_widget(
        &mut self,
        id: NodeId,
        from: usize,
        to: usize,
        source: Option<NodeId>,
        open_start: isize,
        open_end: isize,
    ) -> bool {
        let inserted = match source {
            None => 0,
            Some(src) => {
                let compatible = match (&self[id].kind, &self[src].kind) {
                    (NodeKind::Widget { widget: a, .. }, NodeKind::Widget { widget: b, .. })
                    | (
                        NodeKind::BlockWidget { widget: a, .. },
                        NodeKind::BlockWidget { widget: b, .. },
                    ) => a.compare(b),
                    _ => false,
                };
                if !compatible
                    || (from > 0 && open_start <= 0)
                    || (to < self[id].length && open_end <= 0)
                {
                    return false;
                }
                self[src].length
            }
        };
        let length = self[id].length;
        self[id].length = from + inserted + (length - to);
        if let Some(src) = source {
            self.destroy(src);
        }
        true
    }

    /// Turns `id` into a copy of `other` without replacing it, when both
    /// have the same shape.
    pub(crate) fn become_from(&mut self, id: NodeId, other: NodeId) -> bool {
        let became = match (self[id].kind.clone(), self[other].kind.clone()) {
            (NodeKind::Text { .. }, NodeKind::Text { text }) => {
                if self[id].is_frozen() || self[other].is_frozen() {
                    false
                } else {
                    self.set_text(id, text);
                    true
                }
            }
            (
                NodeKind::Widget { widget, side },
                NodeKind::Widget {
                    widget: new_widget,
                    side: new_side,
                },
            ) if side == new_side && widget.kind == new_widget.kind => {
                let length = self[other].length;
                if !widget.compare(&new_widget) {
                    self.mark_dirty(id, true);
                }
                self[id].kind = NodeKind::Widget {
                    widget: new_widget,
                    side,
                };
                self[id].length = length;
                true
            }
            (
                NodeKind::BlockWidget { widget, .. },
                NodeKind::BlockWidget {
                    widget: new_widget,
                    start_side,
                    end_side,
                },
            ) if widget.kind == new_widget.kind => {
                let length = self[other].length;
                let break_after = self[other].break_after;
                if !widget.compare(&new_widget) {
                    self.mark_dirty(id, true);
                }
                self[id].kind = NodeKind::BlockWidget {
                    widget: new_widget,
                    start_side,
                    end_side,
                };
                self[id].length = length;
                self.set_break_after(id, break_after);
                true
            }
            (NodeKind::WidgetBuffer { side }, NodeKind::WidgetBuffer { side: other_side }) => {
                side == other_side
            }
            (NodeKind::Line { attrs }, NodeKind::Line { attrs: other_attrs }) => {
                self[id].children.is_empty()
                    && self[other].children.is_empty()
                    && attrs == other_attrs
                    && self[id].break_after == self[other].break_after
            }
            _ => false,
        };
        if became {
            self.destroy(other);
        }
        became
    }
}
