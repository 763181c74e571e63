use super::arena::Nodes;
use super::node::{NodeId, NodeKind};

impl Nodes {
    /// Asserts the structural invariants of the subtree at `id`: container
    /// lengths add up, parent links match ownership, blocks only sit in the
    /// document and inline nodes never carry a line break.
    pub fn check_invariants(&self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &self[id];
            if !node.kind.is_container() {
                assert!(node.children.is_empty(), "{} node {id:?} has children", node.kind.name());
                continue;
            }
            let block_parent = matches!(node.kind, NodeKind::Document);
            let mut sum = 0;
            for &child in &node.children {
                let child_node = self
                    .get(child)
                    .unwrap_or_else(|| panic!("{id:?} lists destroyed child {child:?}"));
                assert_eq!(child_node.parent, Some(id), "parent link of {child:?}");
                assert_eq!(
                    child_node.kind.is_block(),
                    block_parent,
                    "{} under {}",
                    child_node.kind.name(),
                    node.kind.name()
                );
                if !block_parent {
                    assert!(!child_node.break_after, "inline {child:?} has a line break");
                }
                sum += if block_parent {
                    child_node.extent()
                } else {
                    child_node.length
                };
                stack.push(child);
            }
            assert_eq!(node.length, sum, "length of {} {id:?}", node.kind.name());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_consistent_tree() {
        let mut nodes = Nodes::new(256);
        let doc = nodes.document();
        let line = nodes.line();
        let text = nodes.text("ab".into());
        nodes.join_inline_into(line, text, 0);
        nodes.replace_children(doc, 0, 0, vec![line]);
        nodes[doc].length = 2;
        nodes.check_invariants(doc);
    }

    #[test]
    #[should_panic(expected = "length of Line")]
    fn rejects_wrong_length() {
        let mut nodes = Nodes::new(256);
        let line = nodes.line();
        let text = nodes.text("ab".into());
        nodes.join_inline_into(line, text, 0);
        nodes[line].length = 3;
        nodes.check_invariants(line);
    }
}
