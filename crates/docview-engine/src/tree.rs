use crate::builder::{AdjacencyPolicy, BuiltContent, DefaultAdjacency, build};
use crate::changes::{ChangedRange, map_pos};
use crate::composition::CompositionState;
use crate::decoration::DecorationSource;
use crate::error::BuildError;
use crate::options::ViewOptions;
use crate::reconcile::replace_range;
use crate::text::TextSource;
use crate::view::{ChildCursor, NodeId, NodeKind, Nodes};

/// What one [`ViewTree::update`] pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSummary {
    /// The ranges that were rebuilt, in ascending order.
    pub ranges: Vec<ChangedRange>,
    /// Whether a live composition was grafted into the tree.
    pub grafted: bool,
}

/// The live view of one document.
///
/// Every pass runs under `&mut self`, so nothing can observe the tree while
/// it is being patched.
pub struct ViewTree {
    pub(crate) nodes: Nodes,
    pub(crate) root: NodeId,
    pub(crate) options: ViewOptions,
    pub(crate) policy: Box<dyn AdjacencyPolicy>,
    pub(crate) composition: CompositionState,
    /// Range (in current document positions) to rebuild on the next pass.
    pub(crate) pending_rebuild: Option<(usize, usize)>,
}

impl ViewTree {
    pub fn new(
        doc: &dyn TextSource,
        decorations: &dyn DecorationSource,
        options: ViewOptions,
    ) -> Result<Self, BuildError> {
        Self::with_policy(doc, decorations, options, Box::new(DefaultAdjacency))
    }

    pub fn with_policy(
        doc: &dyn TextSource,
        decorations: &dyn DecorationSource,
        options: ViewOptions,
        policy: Box<dyn AdjacencyPolicy>,
    ) -> Result<Self, BuildError> {
        let mut nodes = Nodes::new(options.max_join_len);
        let root = nodes.document();
        let line = nodes.line();
        nodes.replace_children(root, 0, 0, vec![line]);
        let mut tree = Self {
            nodes,
            root,
            options,
            policy,
            composition: CompositionState::Idle,
            pending_rebuild: None,
        };
        tree.update(doc, decorations, &[ChangedRange::new(0, 0, 0, doc.len())])?;
        Ok(tree)
    }

    pub fn nodes(&self) -> &Nodes {
        &self.nodes
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn composition(&self) -> &CompositionState {
        &self.composition
    }

    /// Brings the tree up to date with `doc` after `changes`.
    ///
    /// `changes` describe how the document the tree currently shows became
    /// `doc`. Ranges are rebuilt from the end of the document backwards, so
    /// the positions of ranges not yet processed stay valid.
    pub fn update(
        &mut self,
        doc: &dyn TextSource,
        decorations: &dyn DecorationSource,
        changes: &[ChangedRange],
    ) -> Result<UpdateSummary, BuildError> {
        let old_len = self.nodes[self.root].length();
        let mut ranges = ChangedRange::normalize(changes);

        let pending = self.pending_rebuild.take();
        if let Some((from, to)) = pending {
            let from = map_pos(&ranges, from, -1).min(doc.len());
            let to = map_pos(&ranges, to, 1).clamp(from, doc.len());
            ranges = ChangedRange::extend_with_ranges(ranges, &[(from, to)]);
        }
        ranges = self.cover_replaced(doc, decorations, ranges);

        let graft = self.prepare_graft(doc, &ranges);
        if let Some(graft) = &graft {
            ranges = graft.range.add_to_set(ranges);
        }

        let fragments = match self.build_fragments(doc, decorations, &ranges, graft.as_ref()) {
            Ok(fragments) => fragments,
            Err(err) => {
                self.pending_rebuild = pending;
                return Err(err);
            }
        };

        let mut cursor = ChildCursor::with_length(&self.nodes, self.root, old_len);
        for (range, built) in ranges.iter().zip(fragments).rev() {
            let (to_i, to_off) = cursor.find_pos(&self.nodes, range.to_a, 1);
            let (from_i, from_off) = cursor.find_pos(&self.nodes, range.from_a, -1);
            log::trace!(
                "rebuilding {}..{} as {}..{} with {} blocks",
                range.from_a,
                range.to_a,
                range.from_b,
                range.to_b,
                built.content.len()
            );
            replace_range(
                &mut self.nodes,
                self.root,
                from_i,
                from_off,
                to_i,
                to_off,
                built.content,
                built.break_at_start,
                open_count(built.open_start),
                open_count(built.open_end),
            );
        }
        self.nodes[self.root].length = doc.len();

        let grafted = match &graft {
            Some(graft) => self.fix_graft(graft),
            None => false,
        };
        log::debug!(
            "update pass: {} ranges, {} nodes, {} dirty, grafted: {grafted}",
            ranges.len(),
            self.nodes.len(),
            self.dirty_count()
        );
        Ok(UpdateSummary { ranges, grafted })
    }

    /// Rebuilds `from..to` without any document change, e.g. after its
    /// decorations changed.
    pub fn refresh(
        &mut self,
        doc: &dyn TextSource,
        decorations: &dyn DecorationSource,
        from: usize,
        to: usize,
    ) -> Result<UpdateSummary, BuildError> {
        self.update(doc, decorations, &[ChangedRange::unchanged(from, to)])
    }

    /// Widens `ranges` until every replaced range touching one of them, as
    /// the tree shows it now or as `decorations` declare it, lies inside.
    fn cover_replaced(
        &self,
        doc: &dyn TextSource,
        decorations: &dyn DecorationSource,
        mut ranges: Vec<ChangedRange>,
    ) -> Vec<ChangedRange> {
        loop {
            let mut extents: Vec<(usize, usize)> = self
                .widget_extents(&ranges)
                .into_iter()
                .map(|(from, to)| {
                    let from = map_pos(&ranges, from, -1).min(doc.len());
                    (from, map_pos(&ranges, to, 1).clamp(from, doc.len()))
                })
                .collect();
            for range in &ranges {
                extents.extend(decorations.replaced_extents(range.from_b, range.to_b));
            }
            extents.retain(|&(from, to)| {
                !ranges
                    .iter()
                    .any(|range| range.from_b <= from && to <= range.to_b)
            });
            if extents.is_empty() {
                return ranges;
            }
            log::trace!("widening {} ranges over replaced extents {extents:?}", ranges.len());
            ranges = ChangedRange::extend_with_ranges(ranges, &extents);
        }
    }

    /// Old-document extents of the non-empty widgets that overlap or touch
    /// one of `ranges`.
    fn widget_extents(&self, ranges: &[ChangedRange]) -> Vec<(usize, usize)> {
        let touches = |from: usize, to: usize| {
            ranges
                .iter()
                .any(|range| from <= range.to_a && to >= range.from_a)
        };
        let mut extents = Vec::new();
        let mut stack = vec![(self.root, 0)];
        while let Some((id, start)) = stack.pop() {
            let node = &self.nodes[id];
            if matches!(
                node.kind(),
                NodeKind::Widget { .. } | NodeKind::BlockWidget { .. }
            ) && node.length() > 0
            {
                extents.push((start, start + node.length()));
            }
            let mut pos = start;
            for &child in node.children() {
                let length = self.nodes[child].length();
                if touches(pos, pos + length) {
                    stack.push((child, pos));
                }
                pos += self.nodes[child].extent();
            }
        }
        extents
    }

    fn build_fragments(
        &mut self,
        doc: &dyn TextSource,
        decorations: &dyn DecorationSource,
        ranges: &[ChangedRange],
        graft: Option<&crate::composition::Graft>,
    ) -> Result<Vec<BuiltContent>, BuildError> {
        let mut fragments: Vec<BuiltContent> = Vec::with_capacity(ranges.len());
        for range in ranges {
            let overlapping =
                graft.filter(|g| g.range.from_b < range.to_b && g.range.to_b > range.from_b);
            let result = match overlapping {
                Some(graft) => self.build_grafted(doc, decorations, range, graft),
                None => build(
                    &mut self.nodes,
                    doc,
                    range.from_b,
                    range.to_b,
                    decorations,
                    &self.options,
                    self.policy.as_ref(),
                ),
            };
            match result {
                Ok(built) => fragments.push(built),
                Err(err) => {
                    for built in fragments {
                        self.discard(built);
                    }
                    return Err(err);
                }
            }
        }
        Ok(fragments)
    }

    pub(crate) fn discard(&mut self, built: BuiltContent) {
        for id in built.content {
            self.nodes.destroy(id);
        }
    }

    /// Nodes the next sync has to look at.
    pub fn dirty_count(&self) -> usize {
        self.nodes.iter().filter(|(_, node)| node.is_dirty()).count()
    }

    /// Indented outline of the whole tree.
    pub fn dump(&self) -> String {
        self.nodes.outline(self.root)
    }

    /// The tree flattened back into text, with widget placeholders.
    pub fn linearize(&self) -> String {
        self.nodes.linearize(self.root)
    }

    /// Panics if the tree violates its structural invariants.
    pub fn check_invariants(&self) {
        self.nodes.check_invariants(self.root);
    }
}

fn open_count(open: usize) -> isize {
    isize::try_from(open).unwrap_or(isize::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::{DecorationSet, MarkDecoration};
    use crate::view::DirtyFlags;
    use pretty_assertions::assert_eq;

    fn clean(tree: &mut ViewTree) {
        let ids: Vec<NodeId> = tree.nodes.iter().map(|(id, _)| id).collect();
        for id in ids {
            tree.nodes[id].flags &= DirtyFlags::COMPOSITION;
        }
    }

    #[test]
    fn builds_the_whole_document() {
        let tree = ViewTree::new(&"ab\ncd", &DecorationSet::new(), ViewOptions::default()).unwrap();
        insta::assert_snapshot!(tree.dump(), @r#"
        Document
          Line +br
            Text "ab"
          Line
            Text "cd"
        "#);
        assert_eq!(tree.linearize(), "ab\ncd");
        tree.check_invariants();
    }

    #[test]
    fn refreshing_an_unchanged_range_dirties_nothing() {
        let doc = "ab\ncd";
        let deco = DecorationSet::new().mark(1, 4, MarkDecoration::new("em"));
        let mut tree = ViewTree::new(&doc, &deco, ViewOptions::default()).unwrap();
        clean(&mut tree);
        let before = tree.nodes.len();

        tree.refresh(&doc, &deco, 0, doc.len()).unwrap();

        assert_eq!(tree.dirty_count(), 0);
        assert_eq!(tree.nodes.len(), before);
        tree.check_invariants();
    }

    #[test]
    fn ranges_are_applied_from_the_end() {
        let mut tree = ViewTree::new(&"ab\ncd", &DecorationSet::new(), ViewOptions::default()).unwrap();
        let doc = "Xab\ncdY";
        let summary = tree
            .update(
                &doc,
                &DecorationSet::new(),
                &[ChangedRange::new(5, 5, 6, 7), ChangedRange::new(0, 0, 0, 1)],
            )
            .unwrap();
        assert_eq!(summary.ranges.len(), 2);
        assert_eq!(tree.linearize(), doc);
        tree.check_invariants();
    }

    #[test]
    fn failed_build_leaves_the_tree_alone() {
        let mut tree = ViewTree::new(&"ab", &DecorationSet::new(), ViewOptions::default()).unwrap();
        let before = tree.dump();
        let nodes = tree.nodes.len();
        let err = tree
            .update(&"ab", &DecorationSet::new(), &[ChangedRange::new(0, 2, 0, 4)])
            .unwrap_err();
        assert_eq!(err, BuildError::TextExhausted { pos: 2 });
        assert_eq!(tree.dump(), before);
        assert_eq!(tree.nodes.len(), nodes);
    }
}
