use super::event::SpanSink;
use super::types::{Decoration, DecorationOrigin, MarkDecoration};
use crate::error::BuildError;

/// Checks the event contract before passing events on: events must tile
/// the range without gaps or overlap, stay inside it, and carry sane open
/// counts. Empty spans are dropped.
pub struct EventConsumer<'s> {
    sink: &'s mut dyn SpanSink,
    from: usize,
    to: usize,
    pos: usize,
}

impl<'s> EventConsumer<'s> {
    pub fn new(sink: &'s mut dyn SpanSink, from: usize, to: usize) -> Self {
        Self {
            sink,
            from,
            to,
            pos: from,
        }
    }

    fn check(&self, from: usize, to: usize) -> Result<(), BuildError> {
        if from > to || from < self.from || to > self.to {
            return Err(BuildError::EventOutsideRange {
                from,
                to,
                range_from: self.from,
                range_to: self.to,
            });
        }
        if from != self.pos {
            return Err(BuildError::EventOutOfOrder {
                expected: self.pos,
                found: from,
            });
        }
        Ok(())
    }

    /// Fails unless the events reached the end of the range.
    pub fn finish(&self) -> Result<(), BuildError> {
        if self.pos != self.to {
            return Err(BuildError::IncompleteCoverage {
                reached: self.pos,
                end: self.to,
            });
        }
        Ok(())
    }
}

impl SpanSink for EventConsumer<'_> {
    fn span(
        &mut self,
        from: usize,
        to: usize,
        active: &[MarkDecoration],
        open_start: usize,
    ) -> Result<(), BuildError> {
        self.check(from, to)?;
        if from == to {
            return Ok(());
        }
        self.pos = to;
        self.sink
            .span(from, to, active, open_start.min(active.len()))
    }

    fn point(
        &mut self,
        from: usize,
        to: usize,
        deco: &Decoration,
        active: &[MarkDecoration],
        open_start: usize,
        origin: DecorationOrigin,
    ) -> Result<(), BuildError> {
        self.check(from, to)?;
        self.pos = to;
        self.sink.point(
            from,
            to,
            deco,
            active,
            open_start.min(active.len() + 1),
            origin,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoration::event::{DecorationEvent, EventRecorder};
    use crate::decoration::types::{PointDecoration, Widget};

    fn widget() -> Decoration {
        Decoration::Replace(PointDecoration::widget(Widget::new("chip", "a"), 1))
    }

    #[test]
    fn forwards_tiled_events_and_drops_empty_spans() {
        let mut recorder = EventRecorder::default();
        let mut consumer = EventConsumer::new(&mut recorder, 2, 6);
        consumer.span(2, 2, &[], 0).unwrap();
        consumer.span(2, 4, &[], 0).unwrap();
        consumer
            .point(4, 4, &widget(), &[], 0, DecorationOrigin::Trusted)
            .unwrap();
        consumer.span(4, 6, &[], 0).unwrap();
        consumer.finish().unwrap();

        assert_eq!(recorder.events.len(), 3);
        assert!(matches!(
            recorder.events[0],
            DecorationEvent::Span { from: 2, to: 4, .. }
        ));
    }

    #[test]
    fn rejects_gaps() {
        let mut recorder = EventRecorder::default();
        let mut consumer = EventConsumer::new(&mut recorder, 0, 6);
        consumer.span(0, 2, &[], 0).unwrap();
        assert_eq!(
            consumer.span(3, 6, &[], 0),
            Err(BuildError::EventOutOfOrder {
                expected: 2,
                found: 3
            })
        );
    }

    #[test]
    fn rejects_events_outside_the_range() {
        let mut recorder = EventRecorder::default();
        let mut consumer = EventConsumer::new(&mut recorder, 2, 4);
        assert!(matches!(
            consumer.span(2, 5, &[], 0),
            Err(BuildError::EventOutsideRange { .. })
        ));
    }

    #[test]
    fn reports_incomplete_coverage() {
        let mut recorder = EventRecorder::default();
        let mut consumer = EventConsumer::new(&mut recorder, 0, 4);
        consumer.span(0, 3, &[], 0).unwrap();
        assert_eq!(
            consumer.finish(),
            Err(BuildError::IncompleteCoverage { reached: 3, end: 4 })
        );
    }

    #[test]
    fn clamps_open_counts() {
        let mut recorder = EventRecorder::default();
        let mut consumer = EventConsumer::new(&mut recorder, 0, 2);
        let em = [MarkDecoration::new("em")];
        consumer.span(0, 2, &em, 5).unwrap();
        match &recorder.events[0] {
            DecorationEvent::Span { open_start, .. } => assert_eq!(*open_start, 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
