//! # Composition grafting
//!
//! While an input method is composing text inside a host node, that node's
//! content is owned by the host. Each pass splices a frozen `Composition`
//! leaf mirroring the host text into the tree instead of rebuilding that
//! region from the document, then moves the old host handles onto the new
//! nodes so the host never sees its composing node replaced.

use crate::builder::{BuiltContent, build};
use crate::changes::{ChangedRange, map_pos};
use crate::decoration::{DecorationSource, MarkDecoration};
use crate::error::BuildError;
use crate::text::TextSource;
use crate::tree::ViewTree;
use crate::view::{DirtyFlags, HostHandle, NodeId, NodeKind, child_pos};

/// What the input layer reports about a running composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionInput {
    /// Host node the input method is writing into.
    pub host: HostHandle,
    /// Current host-side text of that node.
    pub text: String,
    /// Document position of the cursor.
    pub head: usize,
    /// Offset of the cursor inside `text`.
    pub head_offset: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CompositionState {
    #[default]
    Idle,
    Composing(CompositionInput),
}

/// A composition that could be mapped onto the current pass.
#[derive(Debug, Clone)]
pub(crate) struct Graft {
    pub(crate) range: ChangedRange,
    text: String,
    /// Marks around the composed node, outermost first, with their hosts.
    marks: Vec<(MarkDecoration, Option<HostHandle>)>,
    line_host: Option<HostHandle>,
    leaf_host: HostHandle,
}

impl ViewTree {
    pub fn begin_composition(&mut self, input: CompositionInput) {
        log::debug!(
            "composition started in {:?} at {}",
            input.host,
            input.head
        );
        self.composition = CompositionState::Composing(input);
    }

    /// Records the latest host text. Ignored unless composing.
    pub fn update_composition(&mut self, text: String, head: usize, head_offset: usize) {
        match &mut self.composition {
            CompositionState::Composing(input) => {
                input.text = text;
                input.head = head;
                input.head_offset = head_offset;
            }
            CompositionState::Idle => {
                log::debug!("composition update without a running composition ignored");
            }
        }
    }

    /// Leaves composing mode. The next pass rebuilds the composed region
    /// from the document.
    pub fn end_composition(&mut self) {
        if let CompositionState::Composing(input) = std::mem::take(&mut self.composition) {
            if let Some(leaf) = self.nodes.node_for_host(input.host) {
                let from = self.pos_at_start(leaf);
                self.pending_rebuild = Some((from, from + self.nodes[leaf].length()));
            }
        }
        let frozen: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, node)| node.is_frozen())
            .map(|(id, _)| id)
            .collect();
        for id in frozen {
            self.nodes[id].flags.remove(DirtyFlags::COMPOSITION);
        }
        log::debug!("composition ended, rebuilding {:?}", self.pending_rebuild);
    }

    /// Maps the running composition onto this pass, or gives up on it for
    /// this pass.
    pub(crate) fn prepare_graft(
        &self,
        doc: &dyn TextSource,
        ranges: &[ChangedRange],
    ) -> Option<Graft> {
        let CompositionState::Composing(input) = &self.composition else {
            return None;
        };
        let Some(leaf) = self.nodes.node_for_host(input.host) else {
            log::warn!(
                "composition host {:?} has no view node, reconciling normally",
                input.host
            );
            return None;
        };
        if !matches!(
            self.nodes[leaf].kind(),
            NodeKind::Text { .. } | NodeKind::Composition { .. }
        ) {
            log::debug!("composition host is not a text node");
            return None;
        }

        let mut marks = Vec::new();
        let mut cur = self.nodes[leaf].parent();
        let line = loop {
            let id = cur?;
            match self.nodes[id].kind() {
                NodeKind::Mark { mark } => marks.push((mark.clone(), self.nodes[id].host())),
                NodeKind::Line { .. } => break id,
                _ => return None,
            }
            cur = self.nodes[id].parent();
        };
        marks.reverse();

        let text = &input.text;
        if text.is_empty()
            || text.contains('\n')
            || text.contains(self.options.line_break_placeholder)
        {
            log::debug!("composition text {text:?} cannot be mapped to one line");
            return None;
        }

        // The region is where the composing node sat, carried through the
        // changes. Text typed at either edge belongs to it when the document
        // agrees.
        let from_a = self.pos_at_start(leaf);
        let to_a = from_a + self.nodes[leaf].length();
        let mut from_b = map_pos(ranges, from_a, 1);
        let mut to_b = map_pos(ranges, to_a, -1).max(from_b);
        if to_b > doc.len() {
            log::debug!("composition region {from_b}..{to_b} is past the document end");
            return None;
        }
        let line_from = doc.line_start(from_b);
        let region = doc.slice(line_from..doc.line_end(to_b).max(to_b));
        let bytes = region.as_bytes();
        let (start, end) = (from_b - line_from, to_b - line_from);
        if bytes[start..end].contains(&b'\n') {
            log::debug!("composition region {from_b}..{to_b} now spans a line break");
            return None;
        }
        let len = text.len();
        if end - start < len {
            if bytes.get(start..start + len) == Some(text.as_bytes()) {
                to_b = from_b + len;
            } else if end >= len && bytes.get(end - len..end) == Some(text.as_bytes()) {
                from_b = to_b - len;
            } else if from_b == to_b {
                log::debug!("composition text {text:?} has no region left at {from_b}");
                return None;
            }
        }
        let from_a = map_pos(&inverted(ranges), from_b, -1);
        let to_a = map_pos(&inverted(ranges), to_b, 1);
        Some(Graft {
            range: ChangedRange::new(from_a, to_a, from_b, to_b),
            text: text.clone(),
            marks,
            line_host: self.nodes[line].host(),
            leaf_host: input.host,
        })
    }

    /// Builds `range` with the composed region spliced in as a frozen line.
    pub(crate) fn build_grafted(
        &mut self,
        doc: &dyn TextSource,
        decorations: &dyn DecorationSource,
        range: &ChangedRange,
        graft: &Graft,
    ) -> Result<BuiltContent, BuildError> {
        let mut before = build(
            &mut self.nodes,
            doc,
            range.from_b,
            graft.range.from_b,
            decorations,
            &self.options,
            self.policy.as_ref(),
        )?;
        let mut after = match build(
            &mut self.nodes,
            doc,
            graft.range.to_b,
            range.to_b,
            decorations,
            &self.options,
            self.policy.as_ref(),
        ) {
            Ok(after) => after,
            Err(err) => {
                self.discard(before);
                return Err(err);
            }
        };

        let leaf = self
            .nodes
            .composition(graft.text.clone(), graft.range.to_b - graft.range.from_b);
        let active: Vec<MarkDecoration> = graft.marks.iter().map(|(mark, _)| mark.clone()).collect();
        let inline = self.nodes.wrap_marks(leaf, &active);
        let line = self.nodes.line();
        self.nodes.join_inline_into(line, inline, 0);

        if after.break_at_start {
            self.nodes[line].break_after = true;
        } else if let Some(&first) = after.content.first() {
            let first_break = self.nodes[first].break_after();
            let length = self.nodes[line].length();
            let open = isize::try_from(after.open_start).unwrap_or(isize::MAX);
            if self.nodes.merge(line, length, length, Some(first), false, open, 0) {
                self.nodes[line].break_after = first_break;
                after.content.remove(0);
            }
        }
        if let Some(&last) = before.content.last() {
            let open = isize::try_from(before.open_end).unwrap_or(isize::MAX);
            if self.nodes.merge(line, 0, 0, Some(last), true, 0, open) {
                before.content.pop();
            }
        }

        let mut content = before.content;
        content.push(line);
        content.append(&mut after.content);
        Ok(BuiltContent {
            content,
            break_at_start: before.break_at_start,
            open_start: before.open_start,
            open_end: after.open_end,
        })
    }

    /// Moves the old host handles onto the grafted nodes.
    pub(crate) fn fix_graft(&mut self, graft: &Graft) -> bool {
        let (i, _) = child_pos(&self.nodes, self.root, graft.range.from_b, 1);
        let Some(&line) = self.nodes[self.root].children().get(i) else {
            log::warn!("grafted line at {} not found", graft.range.from_b);
            return false;
        };

        // Mark chain from the line down to the composition leaf.
        let mut chain = Vec::new();
        let mut stack: Vec<(NodeId, usize)> = vec![(line, 0)];
        let mut leaf = None;
        while let Some((id, depth)) = stack.pop() {
            chain.truncate(depth);
            match self.nodes[id].kind() {
                NodeKind::Composition { .. } => {
                    leaf = Some(id);
                    break;
                }
                NodeKind::Mark { .. } => chain.push(id),
                _ => {}
            }
            let depth = chain.len();
            for &child in self.nodes[id].children().iter().rev() {
                stack.push((child, depth));
            }
        }
        let Some(leaf) = leaf else {
            log::warn!("grafted composition at {} not found", graft.range.from_b);
            return false;
        };

        if let Some(handle) = graft.line_host {
            self.nodes.transplant_host(handle, line);
        }
        for (&mark, (_, handle)) in chain.iter().zip(&graft.marks) {
            if let Some(handle) = *handle {
                self.nodes.transplant_host(handle, mark);
            }
            self.nodes[mark].flags |= DirtyFlags::COMPOSITION;
        }
        self.nodes.transplant_host(graft.leaf_host, leaf);
        self.nodes[line].flags |= DirtyFlags::COMPOSITION;
        self.nodes[leaf].flags |= DirtyFlags::COMPOSITION;
        log::debug!(
            "grafted composition {:?} at {}..{}",
            graft.text,
            graft.range.from_b,
            graft.range.to_b
        );
        true
    }
}

fn inverted(ranges: &[ChangedRange]) -> Vec<ChangedRange> {
    ranges.iter().map(ChangedRange::invert).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::DecorationSet;
    use crate::host::RecordingHost;
    use crate::options::ViewOptions;

    fn synced(doc: &str, deco: &DecorationSet) -> (ViewTree, RecordingHost) {
        let mut tree = ViewTree::new(&doc, deco, ViewOptions::default()).unwrap();
        let mut host = RecordingHost::default();
        tree.sync(&mut host);
        (tree, host)
    }

    fn text_host(tree: &ViewTree, line: usize) -> HostHandle {
        let line = tree.nodes()[tree.root()].children()[line];
        let text = tree.nodes()[line].children()[0];
        tree.nodes()[text].host().unwrap()
    }

    #[test]
    fn host_text_is_mirrored_over_the_node_region() {
        let (mut tree, _) = synced("ab\ncd", &DecorationSet::new());
        let handle = text_host(&tree, 0);
        tree.begin_composition(CompositionInput {
            host: handle,
            text: "aXb".into(),
            head: 2,
            head_offset: 2,
        });
        let graft = tree.prepare_graft(&"ab\ncd", &[]).unwrap();
        assert_eq!(graft.range, ChangedRange::new(0, 2, 0, 2));
        assert_eq!(graft.text, "aXb");
    }

    #[test]
    fn a_line_break_inside_the_region_abandons_the_graft() {
        let (mut tree, _) = synced("abcd", &DecorationSet::new());
        let handle = text_host(&tree, 0);
        tree.begin_composition(CompositionInput {
            host: handle,
            text: "abcd".into(),
            head: 2,
            head_offset: 2,
        });
        let changes = [ChangedRange::new(2, 2, 2, 3)];
        assert!(tree.prepare_graft(&"ab\ncd", &changes).is_none());

        let summary = tree.update(&"ab\ncd", &DecorationSet::new(), &changes).unwrap();
        assert!(!summary.grafted);
        assert_eq!(tree.linearize(), "ab\ncd");
        tree.check_invariants();
    }

    #[test]
    fn typing_at_the_edge_extends_the_region() {
        let (mut tree, _) = synced("ab\ncd", &DecorationSet::new());
        let handle = text_host(&tree, 1);
        tree.begin_composition(CompositionInput {
            host: handle,
            text: "cdX".into(),
            head: 6,
            head_offset: 3,
        });
        let graft = tree
            .prepare_graft(&"ab\ncdX", &[ChangedRange::new(5, 5, 5, 6)])
            .unwrap();
        assert_eq!(graft.range, ChangedRange::new(3, 5, 3, 6));
    }

    #[test]
    fn placeholder_text_is_never_grafted() {
        let (mut tree, _) = synced("ab\ncd", &DecorationSet::new());
        let handle = text_host(&tree, 0);
        tree.begin_composition(CompositionInput {
            host: handle,
            text: "a\u{FFFF}".into(),
            head: 2,
            head_offset: 2,
        });
        assert!(tree.prepare_graft(&"a\u{FFFF}\ncd", &[]).is_none());
    }

    #[test]
    fn graft_keeps_marks_and_hosts() {
        let doc = "abc";
        let deco = DecorationSet::new().mark(0, 3, MarkDecoration::new("em"));
        let (mut tree, mut host) = synced(doc, &deco);
        let line = tree.nodes()[tree.root()].children()[0];
        let mark = tree.nodes()[line].children()[0];
        let text = tree.nodes()[mark].children()[0];
        let (line_host, mark_host, text_host) = (
            tree.nodes()[line].host().unwrap(),
            tree.nodes()[mark].host().unwrap(),
            tree.nodes()[text].host().unwrap(),
        );

        tree.begin_composition(CompositionInput {
            host: text_host,
            text: "abXc".into(),
            head: 3,
            head_offset: 3,
        });
        let doc = "abXc";
        let mut deco = deco;
        deco.map_changes(&[ChangedRange::new(2, 2, 2, 3)]);
        let summary = tree
            .update(&doc, &deco, &[ChangedRange::new(2, 2, 2, 3)])
            .unwrap();
        assert!(summary.grafted);

        let leaf = tree.nodes().node_for_host(text_host).unwrap();
        assert!(matches!(tree.nodes()[leaf].kind(), NodeKind::Composition { .. }));
        assert!(tree.nodes()[leaf].is_frozen());
        let mark_node = tree.nodes().node_for_host(mark_host).unwrap();
        assert_eq!(tree.nodes()[leaf].parent(), Some(mark_node));
        assert_eq!(tree.nodes().node_for_host(line_host), Some(line));
        assert_eq!(tree.linearize(), "abXc");
        tree.check_invariants();

        let report = tree.sync(&mut host);
        assert!(!report.released.contains(&text_host));
        assert!(!report.updated.contains(&text_host));
    }

    #[test]
    fn ending_a_composition_rebuilds_the_region() {
        let (mut tree, mut host) = synced("ab", &DecorationSet::new());
        let handle = text_host(&tree, 0);
        tree.begin_composition(CompositionInput {
            host: handle,
            text: "aXb".into(),
            head: 2,
            head_offset: 2,
        });
        let deco = DecorationSet::new();
        tree.update(&"aXb", &deco, &[ChangedRange::new(1, 1, 1, 2)]).unwrap();
        tree.sync(&mut host);
        tree.end_composition();
        assert_eq!(tree.composition(), &CompositionState::Idle);
        assert!(tree.nodes().iter().all(|(_, node)| !node.is_frozen()));

        let summary = tree.update(&"aXb", &deco, &[]).unwrap();
        assert_eq!(summary.ranges, vec![ChangedRange::unchanged(0, 3)]);
        let line = tree.nodes()[tree.root()].children()[0];
        let leaf = tree.nodes()[line].children()[0];
        assert!(matches!(tree.nodes()[leaf].kind(), NodeKind::Text { .. }));
        tree.check_invariants();
    }
}
