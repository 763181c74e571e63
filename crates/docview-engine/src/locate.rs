//! # Locator
//!
//! Maps document positions to nodes and back. Offsets are never stored on
//! nodes; a node's position is recomputed by walking its parent chain.

use crate::tree::ViewTree;
use crate::view::{HostHandle, NodeId, child_pos};

/// A position expressed as an offset into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderLocation {
    pub node: NodeId,
    pub offset: usize,
}

impl ViewTree {
    /// Finds the leaf (or empty container) holding `pos`.
    ///
    /// On a node boundary, `bias > 0` picks the node starting there and
    /// `bias <= 0` the node ending there, except across a line break.
    pub fn locate(&self, pos: usize, bias: i8) -> RenderLocation {
        let mut node = self.root;
        let mut offset = pos.min(self.nodes[self.root].length());
        loop {
            let children = self.nodes[node].children();
            if children.is_empty() {
                return RenderLocation { node, offset };
            }
            let (i, off) = child_pos(&self.nodes, node, offset, bias);
            match children.get(i) {
                Some(&child) => {
                    node = child;
                    offset = off;
                }
                None => {
                    let last = children[children.len() - 1];
                    node = last;
                    offset = self.nodes[last].length();
                }
            }
        }
    }

    /// The document position of a location.
    pub fn position_of(&self, location: RenderLocation) -> usize {
        self.pos_at_start(location.node) + location.offset
    }

    /// Document position where `id` starts.
    pub fn pos_at_start(&self, id: NodeId) -> usize {
        let mut pos = 0;
        let mut cur = id;
        while let Some(parent) = self.nodes[cur].parent() {
            for &sibling in self.nodes[parent].children() {
                if sibling == cur {
                    break;
                }
                pos += self.nodes[sibling].extent();
            }
            cur = parent;
        }
        pos
    }

    pub fn pos_at_end(&self, id: NodeId) -> usize {
        self.pos_at_start(id) + self.nodes[id].length()
    }

    /// Resolves `pos` among the children of `parent`, as
    /// `(child index, offset into child)`.
    pub fn child_pos(&self, parent: NodeId, pos: usize, bias: i8) -> (usize, usize) {
        child_pos(&self.nodes, parent, pos, bias)
    }

    pub fn node_for_host(&self, handle: HostHandle) -> Option<NodeId> {
        self.nodes.node_for_host(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::{DecorationSet, PointDecoration, Widget};
    use crate::options::ViewOptions;
    use crate::view::NodeKind;
    use rstest::rstest;

    fn tree(doc: &str) -> ViewTree {
        let deco = DecorationSet::new().replace(5, 5, PointDecoration::widget(Widget::new("chip", "c"), 1));
        ViewTree::new(&doc, &deco, ViewOptions::default()).unwrap()
    }

    fn text_at(tree: &ViewTree, location: RenderLocation) -> (&str, usize) {
        (tree.nodes()[location.node].text().unwrap_or("-"), location.offset)
    }

    #[rstest]
    #[case(0, 1, ("ab", 0))]
    #[case(2, -1, ("ab", 2))]
    #[case(3, 1, ("cd", 0))]
    #[case(3, -1, ("cd", 0))]
    #[case(4, 1, ("cd", 1))]
    fn locates_text_positions(#[case] pos: usize, #[case] bias: i8, #[case] expected: (&str, usize)) {
        let tree = tree("ab\ncd");
        let location = tree.locate(pos, bias);
        assert_eq!(text_at(&tree, location), expected);
    }

    #[test]
    fn end_of_document_lands_in_the_last_node() {
        let tree = tree("ab\ncd");
        let location = tree.locate(5, -1);
        assert_eq!(text_at(&tree, location), ("cd", 2));
        assert_eq!(tree.position_of(location), 5);
    }

    #[test]
    fn positive_bias_at_a_widget_finds_it() {
        let tree = tree("ab\ncd");
        let location = tree.locate(5, 1);
        assert!(matches!(tree.nodes()[location.node].kind(), NodeKind::Widget { .. }));
    }

    #[test]
    fn position_of_inverts_locate() {
        let tree = tree("ab\ncd\nef");
        for pos in 0..=8 {
            for bias in [-1, 1] {
                let location = tree.locate(pos, bias);
                assert_eq!(tree.position_of(location), pos, "pos {pos} bias {bias}");
            }
        }
    }

    #[test]
    fn node_bounds() {
        let tree = tree("ab\ncd");
        let second = tree.nodes()[tree.root()].children()[1];
        assert_eq!(tree.pos_at_start(second), 3);
        assert_eq!(tree.pos_at_end(second), 5);
    }
}
