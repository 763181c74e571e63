use serde::{Deserialize, Serialize};

use super::event::{DecorationSource, SpanSink};
use super::types::{Decoration, DecorationOrigin, LineDecoration, MarkDecoration, PointDecoration};
use crate::changes::{ChangedRange, map_pos};
use crate::error::BuildError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkRange {
    pub from: usize,
    pub to: usize,
    #[serde(flatten)]
    pub mark: MarkDecoration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplaceRange {
    pub from: usize,
    pub to: usize,
    #[serde(flatten)]
    pub point: PointDecoration,
    #[serde(default)]
    pub origin: DecorationOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRange {
    pub pos: usize,
    #[serde(flatten)]
    pub deco: LineDecoration,
}

/// A plain in-memory decoration set.
///
/// Overlapping marks are emitted outermost first, ordered by start and then
/// by descending end. Points are ordered by position and start side; line
/// decorations come before anything else at their position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecorationSet {
    #[serde(default)]
    pub marks: Vec<MarkRange>,
    #[serde(default)]
    pub replacements: Vec<ReplaceRange>,
    #[serde(default)]
    pub lines: Vec<LineRange>,
}

struct PointEvent {
    from: usize,
    to: usize,
    side: i8,
    deco: Decoration,
    origin: DecorationOrigin,
}

impl DecorationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(mut self, from: usize, to: usize, mark: MarkDecoration) -> Self {
        self.marks.push(MarkRange { from, to, mark });
        self
    }

    pub fn replace(mut self, from: usize, to: usize, point: PointDecoration) -> Self {
        self.replacements.push(ReplaceRange {
            from,
            to,
            point,
            origin: DecorationOrigin::Trusted,
        });
        self
    }

    /// Adds a replacement from a source that may not produce block effects.
    pub fn restricted(mut self, from: usize, to: usize, point: PointDecoration) -> Self {
        self.replacements.push(ReplaceRange {
            from,
            to,
            point,
            origin: DecorationOrigin::Restricted,
        });
        self
    }

    pub fn line(mut self, pos: usize, deco: LineDecoration) -> Self {
        self.lines.push(LineRange { pos, deco });
        self
    }

    /// Moves every decoration through a document change.
    pub fn map_changes(&mut self, changes: &[ChangedRange]) {
        for range in &mut self.marks {
            let (start_assoc, end_assoc) = if range.mark.inclusive {
                (-1, 1)
            } else {
                (1, -1)
            };
            range.from = map_pos(changes, range.from, start_assoc);
            range.to = map_pos(changes, range.to, end_assoc).max(range.from);
        }
        self.marks.retain(|range| range.from < range.to);

        // A replacement whose whole range was deleted goes with it.
        self.replacements.retain_mut(|range| {
            if range.from == range.to {
                let assoc = if range.point.start_side < 0 { -1 } else { 1 };
                range.from = map_pos(changes, range.from, assoc);
                range.to = range.from;
                true
            } else {
                range.from = map_pos(changes, range.from, 1);
                range.to = map_pos(changes, range.to, -1).max(range.from);
                range.from < range.to
            }
        });

        for range in &mut self.lines {
            range.pos = map_pos(changes, range.pos, -1);
        }
    }

    fn sorted_marks(&self) -> Vec<&MarkRange> {
        let mut marks: Vec<&MarkRange> = self.marks.iter().filter(|m| m.from < m.to).collect();
        marks.sort_by(|a, b| a.from.cmp(&b.from).then(b.to.cmp(&a.to)));
        marks
    }

    fn points_in(&self, from: usize, to: usize) -> Vec<PointEvent> {
        let replacements = self
            .replacements
            .iter()
            .filter(|r| {
                if r.from == r.to {
                    from <= r.from && r.from <= to
                } else {
                    r.from < to && r.to > from
                }
            })
            .map(|r| PointEvent {
                from: r.from,
                to: r.to,
                side: r.point.start_side,
                deco: Decoration::Replace(r.point.clone()),
                origin: r.origin,
            });
        let lines = self
            .lines
            .iter()
            .filter(|l| from <= l.pos && l.pos <= to)
            .map(|l| PointEvent {
                from: l.pos,
                to: l.pos,
                side: i8::MIN,
                deco: Decoration::Line(l.deco.clone()),
                origin: DecorationOrigin::Trusted,
            });
        let mut points: Vec<PointEvent> = replacements.chain(lines).collect();
        points.sort_by_key(|p| (p.from.max(from), p.side));
        points
    }
}

fn point_marks(marks: &[&MarkRange], point: &PointEvent) -> Vec<usize> {
    (0..marks.len())
        .filter(|&i| {
            let m = marks[i];
            if point.from < point.to {
                return m.from <= point.from && m.to > point.from;
            }
            let p = point.from;
            if p < m.from || p > m.to {
                return false;
            }
            let outside_start = p == m.from && point.side < 0;
            let outside_end = p == m.to && point.side > 0;
            m.mark.inclusive || !(outside_start || outside_end)
        })
        .collect()
}

fn span_marks(marks: &[&MarkRange], from: usize, to: usize) -> Vec<usize> {
    (0..marks.len())
        .filter(|&i| marks[i].from <= from && marks[i].to >= to)
        .collect()
}

fn open_count(prev: Option<&[usize]>, active: &[usize], marks: &[&MarkRange], from: usize) -> usize {
    match prev {
        Some(prev) => prev
            .iter()
            .zip(active)
            .take_while(|(a, b)| a == b)
            .count(),
        None => active.iter().take_while(|&&i| marks[i].from < from).count(),
    }
}

fn decorations(marks: &[&MarkRange], active: &[usize]) -> Vec<MarkDecoration> {
    active.iter().map(|&i| marks[i].mark.clone()).collect()
}

impl DecorationSource for DecorationSet {
    fn spans(&self, from: usize, to: usize, sink: &mut dyn SpanSink) -> Result<usize, BuildError> {
        let marks = self.sorted_marks();
        let points = self.points_in(from, to);
        let mut pos = from;
        let mut replaced_to = from;
        let mut prev: Option<Vec<usize>> = None;
        let mut open_past_end = None;
        let mut next_point = 0;

        loop {
            while let Some(point) = points.get(next_point) {
                let start = point.from.max(from);
                if start > pos {
                    break;
                }
                next_point += 1;
                if start < pos || start < replaced_to {
                    continue;
                }
                let end = point.to.min(to);
                let active = point_marks(&marks, point);
                let open = if point.from < from {
                    active.len() + 1
                } else {
                    open_count(prev.as_deref(), &active, &marks, from)
                };
                sink.point(
                    start,
                    end,
                    &point.deco,
                    &decorations(&marks, &active),
                    open,
                    point.origin,
                )?;
                open_past_end = (point.to > to).then_some(active.len() + 1);
                replaced_to = replaced_to.max(point.to);
                prev = Some(active);
                pos = end;
            }
            if pos >= to {
                break;
            }

            let mut next = to;
            if let Some(point) = points.get(next_point) {
                next = next.min(point.from.max(from));
            }
            for m in &marks {
                if m.from > pos {
                    next = next.min(m.from);
                }
                if m.to > pos {
                    next = next.min(m.to);
                }
            }
            let active = span_marks(&marks, pos, next);
            let open = open_count(prev.as_deref(), &active, &marks, from);
            sink.span(pos, next, &decorations(&marks, &active), open)?;
            open_past_end = None;
            prev = Some(active);
            pos = next;
        }

        if let Some(open) = open_past_end {
            return Ok(open);
        }
        let last = prev.unwrap_or_else(|| {
            (0..marks.len())
                .filter(|&i| marks[i].from < to && marks[i].to > to)
                .collect()
        });
        Ok(last.iter().take_while(|&&i| marks[i].to > to).count())
    }

    fn replaced_extents(&self, from: usize, to: usize) -> Vec<(usize, usize)> {
        self.replacements
            .iter()
            .filter(|r| r.from < r.to && r.from <= to && r.to >= from)
            .map(|r| (r.from, r.to))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::event::{DecorationEvent, EventRecorder};
    use crate::decoration::types::Widget;
    use pretty_assertions::assert_eq;

    fn span(from: usize, to: usize, active: &[&str], open_start: usize) -> DecorationEvent {
        DecorationEvent::Span {
            from,
            to,
            active: active.iter().map(|s| s.to_string()).collect(),
            open_start,
        }
    }

    fn record(set: &DecorationSet, from: usize, to: usize) -> (Vec<DecorationEvent>, usize) {
        let mut recorder = EventRecorder::default();
        let open_end = set.spans(from, to, &mut recorder).unwrap();
        (recorder.events, open_end)
    }

    #[test]
    fn plain_text_is_one_span() {
        let (events, open_end) = record(&DecorationSet::new(), 0, 4);
        assert_eq!(events, vec![span(0, 4, &[], 0)]);
        assert_eq!(open_end, 0);
    }

    #[test]
    fn mark_splits_spans() {
        let set = DecorationSet::new().mark(1, 3, MarkDecoration::new("em"));
        let (events, _) = record(&set, 0, 4);
        assert_eq!(
            events,
            vec![
                span(0, 1, &[], 0),
                span(1, 3, &["em"], 0),
                span(3, 4, &[], 0)
            ]
        );
    }

    #[test]
    fn nested_marks_are_outermost_first() {
        let set = DecorationSet::new()
            .mark(2, 4, MarkDecoration::new("strong"))
            .mark(0, 6, MarkDecoration::new("em"));
        let (events, _) = record(&set, 0, 6);
        assert_eq!(
            events,
            vec![
                span(0, 2, &["em"], 0),
                span(2, 4, &["em", "strong"], 1),
                span(4, 6, &["em"], 1)
            ]
        );
    }

    #[test]
    fn ranges_inside_a_mark_are_open() {
        let set = DecorationSet::new().mark(0, 4, MarkDecoration::new("em"));
        let (events, open_end) = record(&set, 1, 3);
        assert_eq!(events, vec![span(1, 3, &["em"], 1)]);
        assert_eq!(open_end, 1);

        let (_, open_end) = record(&set, 2, 4);
        assert_eq!(open_end, 0);
    }

    #[test]
    fn zero_width_widget_between_spans() {
        let point = PointDecoration::widget(Widget::new("chip", "a"), 1);
        let set = DecorationSet::new().replace(2, 2, point.clone());
        let (events, _) = record(&set, 0, 4);
        assert_eq!(events.len(), 3);
        assert_eq!(events[0], span(0, 2, &[], 0));
        assert_eq!(
            events[1],
            DecorationEvent::Point {
                from: 2,
                to: 2,
                deco: Decoration::Replace(point),
                active: vec![],
                open_start: 0,
                origin: DecorationOrigin::Trusted,
            }
        );
        assert_eq!(events[2], span(2, 4, &[], 0));
    }

    #[test]
    fn replacement_from_before_the_range_is_open() {
        let set = DecorationSet::new().replace(1, 5, PointDecoration::replace(Widget::new("fold", "f")));
        let (events, _) = record(&set, 3, 8);
        match &events[0] {
            DecorationEvent::Point {
                from,
                to,
                open_start,
                ..
            } => assert_eq!((*from, *to, *open_start), (3, 5, 1)),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(events[1], span(5, 8, &[], 0));
    }

    #[test]
    fn replacement_past_the_end_reports_open_end() {
        let set = DecorationSet::new().replace(2, 6, PointDecoration::replace(Widget::new("fold", "f")));
        let (events, open_end) = record(&set, 0, 4);
        assert_eq!(events.len(), 2);
        assert_eq!(open_end, 1);
    }

    #[test]
    fn points_inside_a_replacement_are_skipped() {
        let set = DecorationSet::new()
            .replace(1, 5, PointDecoration::replace(Widget::new("fold", "f")))
            .replace(3, 3, PointDecoration::widget(Widget::new("chip", "c"), 1));
        let (events, _) = record(&set, 0, 6);
        assert_eq!(events.len(), 3);
    }

    #[test]
    fn map_changes_moves_non_inclusive_edges_away() {
        let mut set = DecorationSet::new().mark(1, 3, MarkDecoration::new("em"));
        set.map_changes(&[ChangedRange::new(1, 1, 1, 2)]);
        assert_eq!((set.marks[0].from, set.marks[0].to), (2, 4));
        set.map_changes(&[ChangedRange::new(4, 4, 4, 5)]);
        assert_eq!((set.marks[0].from, set.marks[0].to), (2, 4));
        set.map_changes(&[ChangedRange::new(3, 3, 3, 4)]);
        assert_eq!((set.marks[0].from, set.marks[0].to), (2, 5));
    }

    #[test]
    fn deleted_replacements_are_dropped() {
        let mut set = DecorationSet::new()
            .replace(2, 4, PointDecoration::replace(Widget::new("fold", "f")))
            .replace(3, 3, PointDecoration::widget(Widget::new("chip", "c"), 1));
        set.map_changes(&[ChangedRange::new(1, 5, 1, 1)]);
        assert_eq!(set.replacements.len(), 1);
        assert_eq!(set.replacements[0].point.widget.kind, "chip");
        assert_eq!((set.replacements[0].from, set.replacements[0].to), (1, 1));
    }

    #[test]
    fn replaced_extents_include_touching_replacements() {
        let set = DecorationSet::new()
            .replace(1, 3, PointDecoration::replace(Widget::new("fold", "f")))
            .replace(5, 5, PointDecoration::widget(Widget::new("chip", "c"), 1))
            .replace(6, 9, PointDecoration::replace(Widget::new("fold", "g")));
        assert_eq!(set.replaced_extents(3, 5), vec![(1, 3)]);
        assert_eq!(set.replaced_extents(4, 6), vec![(6, 9)]);
        assert_eq!(set.replaced_extents(4, 5), Vec::<(usize, usize)>::new());
    }

    #[test]
    fn loads_from_toml() {
        let set: DecorationSet = toml::from_str(
            r#"
            [[marks]]
            from = 0
            to = 2
            tag = "em"

            [[replacements]]
            from = 3
            to = 3
            start_side = 1
            widget = { kind = "chip", key = "a" }

            [[lines]]
            pos = 0
            attributes = { class = "title" }
            "#,
        )
        .unwrap();
        assert_eq!(set.marks[0].mark.tag, "em");
        assert_eq!(set.replacements[0].point.widget.kind, "chip");
        assert_eq!(set.replacements[0].origin, DecorationOrigin::Trusted);
        assert_eq!(set.lines[0].deco.attributes["class"], "title");
    }
}
