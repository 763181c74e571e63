use super::arena::Nodes;
use super::node::NodeId;

/// Walks a parent's children backwards from the end, resolving positions
/// to `(child index, offset into child)`.
///
/// A cursor only moves towards the start, so several lookups made in
/// descending order share one walk.
#[derive(Debug, Clone)]
pub struct ChildCursor {
    parent: NodeId,
    /// Start position of child `i`.
    pos: usize,
    i: usize,
}

impl ChildCursor {
    pub fn new(nodes: &Nodes, parent: NodeId) -> Self {
        Self::with_length(nodes, parent, nodes[parent].length)
    }

    /// A cursor for a parent whose stored length is not current, such as the
    /// root during an update pass.
    pub fn with_length(nodes: &Nodes, parent: NodeId, length: usize) -> Self {
        Self {
            parent,
            pos: length,
            i: nodes[parent].children.len(),
        }
    }

    /// With `bias > 0` a position on a boundary resolves to the child that
    /// starts there; otherwise to the child that ends there, unless a line
    /// break separates them.
    pub fn find_pos(&mut self, nodes: &Nodes, pos: usize, bias: i8) -> (usize, usize) {
        let children = &nodes[self.parent].children;
        loop {
            if pos > self.pos
                || pos == self.pos
                    && (bias > 0 || self.i == 0 || nodes[children[self.i - 1]].break_after)
            {
                return (self.i, pos - self.pos);
            }
            self.i -= 1;
            let child = &nodes[children[self.i]];
            self.pos -= child.extent();
        }
    }
}

/// Resolves `pos` among the children of `parent`.
pub fn child_pos(nodes: &Nodes, parent: NodeId, pos: usize, bias: i8) -> (usize, usize) {
    ChildCursor::new(nodes, parent).find_pos(nodes, pos, bias)
}
