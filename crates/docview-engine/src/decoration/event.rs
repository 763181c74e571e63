use super::types::{Decoration, DecorationOrigin, MarkDecoration};
use crate::error::BuildError;

/// Receiver of decoration events, in ascending position order.
///
/// `active` lists the marks wrapping the event, outermost first.
/// `open_start` is how many of the leading active marks continue from the
/// previous event (or from before the range, for the first event). For a
/// point that started before the range it is `active.len() + 1`.
pub trait SpanSink {
    fn span(
        &mut self,
        from: usize,
        to: usize,
        active: &[MarkDecoration],
        open_start: usize,
    ) -> Result<(), BuildError>;

    fn point(
        &mut self,
        from: usize,
        to: usize,
        deco: &Decoration,
        active: &[MarkDecoration],
        open_start: usize,
        origin: DecorationOrigin,
    ) -> Result<(), BuildError>;
}

/// An overlaid set of decorations that can replay itself as events.
pub trait DecorationSource {
    /// Emits the events covering `from..to` and returns how many mark layers
    /// (plus one for a point running past `to`) stay open at `to`.
    fn spans(&self, from: usize, to: usize, sink: &mut dyn SpanSink) -> Result<usize, BuildError>;

    /// Extents of the non-empty replacements that overlap or touch
    /// `from..to`. A pass widens its ranges over these so that no replaced
    /// range is built in pieces.
    fn replaced_extents(&self, _from: usize, _to: usize) -> Vec<(usize, usize)> {
        Vec::new()
    }
}

/// A captured event, for inspecting what a source emits.
#[derive(Debug, Clone, PartialEq)]
pub enum DecorationEvent {
    Span {
        from: usize,
        to: usize,
        active: Vec<String>,
        open_start: usize,
    },
    Point {
        from: usize,
        to: usize,
        deco: Decoration,
        active: Vec<String>,
        open_start: usize,
        origin: DecorationOrigin,
    },
}

/// A sink that records every event, naming marks by tag.
#[derive(Debug, Default)]
pub struct EventRecorder {
    pub events: Vec<DecorationEvent>,
}

fn tags(active: &[MarkDecoration]) -> Vec<String> {
    active.iter().map(|m| m.tag.clone()).collect()
}

impl SpanSink for EventRecorder {
    fn span(
        &mut self,
        from: usize,
        to: usize,
        active: &[MarkDecoration],
        open_start: usize,
    ) -> Result<(), BuildError> {
        self.events.push(DecorationEvent::Span {
            from,
            to,
            active: tags(active),
            open_start,
        });
        Ok(())
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
        self.events.push(DecorationEvent::Point {
            from,
            to,
            deco: deco.clone(),
            active: tags(active),
            open_start,
            origin,
        });
        Ok(())
    }
}
