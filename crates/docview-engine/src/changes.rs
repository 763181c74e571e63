//! Changed ranges between an old document (`a`) and a new one (`b`).

use xi_rope::RopeInfo;
use xi_rope::delta::{Delta, DeltaElement};

/// A replaced region: `from_a..to_a` in the old document became
/// `from_b..to_b` in the new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangedRange {
    pub from_a: usize,
    pub to_a: usize,
    pub from_b: usize,
    pub to_b: usize,
}

impl ChangedRange {
    pub fn new(from_a: usize, to_a: usize, from_b: usize, to_b: usize) -> Self {
        Self {
            from_a,
            to_a,
            from_b,
            to_b,
        }
    }

    /// A range that rebuilds `from..to` without any document change.
    pub fn unchanged(from: usize, to: usize) -> Self {
        Self::new(from, to, from, to)
    }

    pub fn join(&self, other: &ChangedRange) -> ChangedRange {
        ChangedRange::new(
            self.from_a.min(other.from_a),
            self.to_a.max(other.to_a),
            self.from_b.min(other.from_b),
            self.to_b.max(other.to_b),
        )
    }

    /// Inserts this range into a sorted set, absorbing every range it
    /// overlaps or touches.
    pub fn add_to_set(self, mut set: Vec<ChangedRange>) -> Vec<ChangedRange> {
        let mut me = self;
        let mut i = set.len();
        while i > 0 {
            let range = set[i - 1];
            if range.from_a > me.to_a {
                i -= 1;
                continue;
            }
            if range.to_a < me.from_a {
                break;
            }
            me = me.join(&range);
            set.remove(i - 1);
            i -= 1;
        }
        set.insert(i, me);
        set
    }

    /// Sorts and unions a list of ranges.
    pub fn normalize(changes: &[ChangedRange]) -> Vec<ChangedRange> {
        changes
            .iter()
            .fold(Vec::new(), |set, range| range.add_to_set(set))
    }

    /// The same change seen from the new document.
    pub fn invert(&self) -> ChangedRange {
        ChangedRange::new(self.from_b, self.to_b, self.from_a, self.to_a)
    }

    /// Adds ranges given in new-document coordinates, e.g. where decorations
    /// changed without a text change.
    pub fn extend_with_ranges(
        set: Vec<ChangedRange>,
        ranges: &[(usize, usize)],
    ) -> Vec<ChangedRange> {
        let inverted: Vec<_> = set.iter().map(ChangedRange::invert).collect();
        ranges.iter().fold(set, |set, &(from_b, to_b)| {
            let from_a = map_pos(&inverted, from_b, -1);
            let to_a = map_pos(&inverted, to_b, 1);
            ChangedRange::new(from_a, to_a, from_b, to_b).add_to_set(set)
        })
    }
}

/// Maps an old-document position through sorted changes.
///
/// Positions inside a replaced region go to its start when `assoc < 0` and
/// to its end otherwise; so do positions at an insertion point.
pub fn map_pos(changes: &[ChangedRange], pos: usize, assoc: i8) -> usize {
    let mut last_a = 0;
    let mut last_b = 0;
    for change in changes {
        if pos < change.from_a {
            break;
        }
        if pos <= change.to_a {
            if change.from_a == change.to_a {
                return if assoc < 0 { change.from_b } else { change.to_b };
            }
            if pos == change.from_a {
                return change.from_b;
            }
            if pos == change.to_a {
                return change.to_b;
            }
            return if assoc < 0 { change.from_b } else { change.to_b };
        }
        last_a = change.to_a;
        last_b = change.to_b;
    }
    last_b + (pos - last_a)
}

/// Collects the changed ranges described by an xi-rope delta.
///
/// Gaps between `Copy` elements are deletions; adjacent deletions and
/// insertions fold into one range.
pub fn from_delta(delta: &Delta<RopeInfo>) -> Vec<ChangedRange> {
    let mut ranges = Vec::new();
    let mut current: Option<ChangedRange> = None;
    let mut pos_a = 0;
    let mut pos_b = 0;

    let extend = |current: &mut Option<ChangedRange>, range: ChangedRange| {
        *current = Some(match current {
            Some(existing) => existing.join(&range),
            None => range,
        });
    };

    for el in &delta.els {
        match el {
            DeltaElement::Copy(from, to) => {
                if *from > pos_a {
                    extend(
                        &mut current,
                        ChangedRange::new(pos_a, *from, pos_b, pos_b),
                    );
                }
                if let Some(range) = current.take() {
                    ranges.push(range);
                }
                pos_b += to - from;
                pos_a = *to;
            }
            DeltaElement::Insert(node) => {
                let len = node.len();
                extend(
                    &mut current,
                    ChangedRange::new(pos_a, pos_a, pos_b, pos_b + len),
                );
                pos_b += len;
            }
        }
    }
    if pos_a < delta.base_len {
        extend(
            &mut current,
            ChangedRange::new(pos_a, delta.base_len, pos_b, pos_b),
        );
    }
    if let Some(range) = current {
        ranges.push(range);
    }
    ranges
}
