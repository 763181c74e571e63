//! # Reconciler
//!
//! Splices freshly built nodes into an existing child list, merging at the
//! edges so that as many old nodes as possible survive. The order of
//! preference is merge, then become, then a plain splice.

use crate::view::{ChildCursor, NodeId, Nodes};

/// Replaces the part of `parent` between `(from_i, from_off)` and
/// `(to_i, to_off)` with `insert`.
///
/// `break_at_start` says the replaced range starts with a line break, and
/// `open_start`/`open_end` how many mark layers `insert` shares with the
/// content around it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn replace_range(
    nodes: &mut Nodes,
    parent: NodeId,
    mut from_i: usize,
    from_off: usize,
    mut to_i: usize,
    mut to_off: usize,
    mut insert: Vec<NodeId>,
    mut break_at_start: bool,
    mut open_start: isize,
    mut open_end: isize,
) {
    log::trace!(
        "replace_range in {} ({from_i}+{from_off})..({to_i}+{to_off}) with {} nodes",
        nodes[parent].kind().name(),
        insert.len()
    );
    let child_count = nodes[parent].children().len();
    let before = nodes[parent].children().get(from_i).copied();
    let last = insert.last().copied();
    let break_at_end = last.map_or(break_at_start, |last| nodes[last].break_after());

    // Everything happens inside one child.
    if let Some(before) = before {
        if !break_at_start && !break_at_end && insert.len() < 2 {
            let end = if to_i == from_i {
                Some(to_off)
            } else if to_i == from_i + 1
                && to_off == 0
                && !nodes[before].break_after()
                && nodes[parent]
                    .children()
                    .get(to_i)
                    .is_none_or(|&next| nodes[next].length() > 0)
            {
                Some(nodes[before].length())
            } else {
                None
            };
            if let Some(end) = end {
                if nodes.merge(before, from_off, end, last, from_off == 0, open_start, open_end) {
                    return;
                }
            }
        }
    }

    if to_i < child_count {
        let mut after = nodes[parent].children()[to_i];
        let after_break = nodes[after].break_after();
        let last_break = last.is_some_and(|last| nodes[last].break_after());
        if to_off < nodes[after].length() || (after_break && last_break) {
            // Keep the untouched end of the child in its own node, so that
            // updating `before` does not take it along.
            if from_i == to_i {
                after = nodes.split(after, to_off);
                to_off = 0;
            }
            let mut merged = false;
            if !break_at_end {
                if let Some(last) = last {
                    merged = nodes.merge(after, 0, to_off, Some(last), true, 0, open_end);
                }
            }
            if merged {
                if let Some(slot) = insert.last_mut() {
                    *slot = after;
                }
            } else {
                let leading_empty = nodes[after]
                    .children()
                    .first()
                    .is_some_and(|&child| nodes[child].length() == 0);
                if to_off > 0 || leading_empty {
                    nodes.merge(after, 0, to_off, None, false, 0, open_end);
                }
                insert.push(after);
            }
        } else if after_break {
            // The child at `to_i` is covered entirely; keep its line break.
            match last {
                Some(last) => nodes.set_break_after(last, true),
                None => break_at_start = true,
            }
        }
        to_i += 1;
    }

    if let Some(before) = before {
        if from_off > 0 {
            let mut merged_break = None;
            if !break_at_start {
                if let Some(&first) = insert.first() {
                    let first_break = nodes[first].break_after();
                    let length = nodes[before].length();
                    if nodes.merge(before, from_off, length, Some(first), false, open_start, 0) {
                        insert.remove(0);
                        merged_break = Some(first_break);
                    }
                }
            }
            if merged_break.is_none() {
                let length = nodes[before].length();
                let trailing_empty = nodes[before]
                    .children()
                    .last()
                    .is_some_and(|&child| nodes[child].length() == 0);
                if from_off < length || trailing_empty {
                    nodes.merge(before, from_off, length, None, false, open_start, 0);
                }
            }
            nodes.set_break_after(before, merged_break.unwrap_or(break_at_start));
            from_i += 1;
        }
    }

    // Reuse old nodes on the edges of the replaced range.
    while from_i < to_i && !insert.is_empty() {
        let old_last = nodes[parent].children()[to_i - 1];
        let old_first = nodes[parent].children()[from_i];
        let new_last = insert[insert.len() - 1];
        let new_first = insert[0];
        if reuse(nodes, old_last, new_last) {
            to_i -= 1;
            insert.pop();
            open_end = if insert.is_empty() { open_start } else { 0 };
        } else if reuse(nodes, old_first, new_first) {
            from_i += 1;
            insert.remove(0);
            open_start = if insert.is_empty() { open_end } else { 0 };
        } else {
            break;
        }
    }

    // A pure deletion may leave two joinable neighbours.
    if insert.is_empty() && from_i > 0 && to_i < nodes[parent].children().len() {
        let prev = nodes[parent].children()[from_i - 1];
        let next = nodes[parent].children()[to_i];
        if !nodes[prev].break_after()
            && nodes.merge(next, 0, 0, Some(prev), false, open_start, open_end)
        {
            from_i -= 1;
        }
    }

    if from_i < to_i || !insert.is_empty() {
        nodes.replace_children(parent, from_i, to_i, insert);
    }
}

/// Lets `old` stand in for `new`, either because it is `new` or because it
/// could absorb it.
fn reuse(nodes: &mut Nodes, old: NodeId, new: NodeId) -> bool {
    if old == new {
        return true;
    }
    let new_break = nodes[new].break_after();
    let length = nodes[old].length();
    if nodes.merge(old, 0, length, Some(new), true, 0, 0) || nodes.become_from(old, new) {
        nodes.set_break_after(old, new_break);
        return true;
    }
    false
}

/// Replaces local positions `from..to` of an inline parent with `insert`.
pub(crate) fn merge_children_into(
    nodes: &mut Nodes,
    parent: NodeId,
    from: usize,
    to: usize,
    insert: Vec<NodeId>,
    open_start: isize,
    open_end: isize,
) {
    let mut cursor = ChildCursor::new(nodes, parent);
    let (to_i, to_off) = cursor.find_pos(nodes, to, 1);
    let (from_i, from_off) = cursor.find_pos(nodes, from, -1);
    // An empty range can still cover zero-width children.
    if insert.is_empty() && (from_i, from_off) == (to_i, to_off) {
        return;
    }
    let inserted: usize = insert.iter().map(|&id| nodes[id].length()).sum();
    let length = nodes[parent].length() + inserted - (to - from);
    nodes[parent].length = length;
    replace_range(
        nodes, parent, from_i, from_off, to_i, to_off, insert, false, open_start, open_end,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::{MarkDecoration, Widget};
    use crate::view::{DirtyFlags, NodeKind};
    use pretty_assertions::assert_eq;

    fn line_of(nodes: &mut Nodes, parts: &[NodeId]) -> NodeId {
        let line = nodes.line();
        for &part in parts {
            nodes.join_inline_into(line, part, 0);
        }
        line
    }

    fn clean(nodes: &mut Nodes) {
        let ids: Vec<NodeId> = nodes.iter().map(|(id, _)| id).collect();
        for id in ids {
            nodes[id].flags = DirtyFlags::empty();
        }
    }

    #[test]
    fn insertion_merges_into_the_text_node() {
        let mut nodes = Nodes::new(256);
        let ab = nodes.text("ab".into());
        let line = line_of(&mut nodes, &[ab]);
        clean(&mut nodes);

        let x = nodes.text("X".into());
        merge_children_into(&mut nodes, line, 1, 1, vec![x], 0, 0);

        assert_eq!(nodes[line].children(), &[ab]);
        assert_eq!(nodes[ab].text(), Some("aXb"));
        assert_eq!(nodes[line].length(), 3);
        nodes.check_invariants(line);
    }

    #[test]
    fn deletion_across_children_joins_the_rest() {
        let mut nodes = Nodes::new(256);
        let ab = nodes.text("ab".into());
        let chip = nodes.widget(Widget::new("chip", "c"), 1, 0);
        let cd = nodes.text("cd".into());
        let line = line_of(&mut nodes, &[ab, chip, cd]);

        merge_children_into(&mut nodes, line, 1, 4, Vec::new(), 0, 0);

        assert_eq!(nodes.linearize(line), "ad");
        assert_eq!(nodes[line].children(), &[ab]);
        assert!(!nodes.contains(chip));
        assert!(!nodes.contains(cd));
        nodes.check_invariants(line);
    }

    #[test]
    fn empty_range_still_drops_zero_width_children() {
        let mut nodes = Nodes::new(256);
        let ab = nodes.text("ab".into());
        let chip = nodes.widget(Widget::new("chip", "c"), 0, 1);
        let line = line_of(&mut nodes, &[ab, chip]);

        merge_children_into(&mut nodes, line, 2, 2, Vec::new(), 0, 0);

        assert_eq!(nodes[line].children(), &[ab]);
        assert!(!nodes.contains(chip));
        nodes.check_invariants(line);
    }

    #[test]
    fn replacing_a_widget_with_an_equal_one_keeps_it() {
        let mut nodes = Nodes::new(256);
        let ab = nodes.text("ab".into());
        let chip = nodes.widget(Widget::new("chip", "c"), 0, 1);
        let line = line_of(&mut nodes, &[ab, chip]);
        clean(&mut nodes);

        let again = nodes.widget(Widget::new("chip", "c"), 0, 1);
        merge_children_into(&mut nodes, line, 2, 2, vec![again], 0, 0);

        assert!(nodes.contains(chip));
        assert!(!nodes.contains(again));
        nodes.check_invariants(line);
    }

    #[test]
    fn text_inside_a_mark_is_edited_in_place() {
        let mut nodes = Nodes::new(256);
        let bc = nodes.text("bc".into());
        let em = nodes.mark(MarkDecoration::new("em"), vec![bc], 2);
        let a = nodes.text("a".into());
        let line = line_of(&mut nodes, &[a, em]);

        let y = nodes.text("Y".into());
        let wrapped = nodes.mark(MarkDecoration::new("em"), vec![y], 1);
        merge_children_into(&mut nodes, line, 2, 2, vec![wrapped], 1, 1);

        assert_eq!(nodes[line].children(), &[a, em]);
        assert_eq!(nodes[bc].text(), Some("bYc"));
        assert!(!nodes.contains(wrapped));
        nodes.check_invariants(line);
    }

    #[test]
    fn closed_marks_are_not_extended() {
        let mut nodes = Nodes::new(256);
        let ab = nodes.text("ab".into());
        let em = nodes.mark(MarkDecoration::new("em"), vec![ab], 2);
        let line = line_of(&mut nodes, &[em]);

        let x = nodes.text("X".into());
        merge_children_into(&mut nodes, line, 2, 2, vec![x], 0, 0);

        assert_eq!(nodes[line].children().len(), 2);
        assert_eq!(nodes[em].length(), 2);
        assert!(matches!(nodes[nodes[line].children()[1]].kind(), NodeKind::Text { .. }));
        nodes.check_invariants(line);
    }

    #[test]
    fn splitting_a_line_keeps_the_head_node() {
        let mut nodes = Nodes::new(256);
        let doc = nodes.document();
        let abcd = nodes.text("abcd".into());
        let line = line_of(&mut nodes, &[abcd]);
        nodes.replace_children(doc, 0, 0, vec![line]);
        nodes[doc].length = 4;

        // Replace position 2..2 with a break: two lines, "ab" and "cd".
        let first = nodes.line();
        nodes[first].break_after = true;
        let second = nodes.line();
        replace_range(&mut nodes, doc, 0, 2, 0, 2, vec![first, second], false, 0, 0);
        nodes[doc].length = 5;

        assert_eq!(nodes[doc].children()[0], line);
        assert_eq!(nodes.linearize(doc), "ab\ncd");
        nodes.check_invariants(doc);
    }
}
