use crate::decoration::Widget;

/// What the builder knows when placing an inline widget.
#[derive(Debug, Clone, Copy)]
pub struct AdjacencyContext<'a> {
    pub widget: &'a Widget,
    /// The widget replaces a non-empty range.
    pub replaces: bool,
    /// Start side of the decoration, only meaningful when `replaces` is false.
    pub side: i8,
    /// The previous content is something the cursor can sit after.
    pub at_cursor_pos: bool,
    pub open_start: usize,
    /// Number of marks wrapping the widget.
    pub active: usize,
}

/// Decides where inline widgets get [`WidgetBuffer`] landing spots.
///
/// [`WidgetBuffer`]: crate::view::NodeKind::WidgetBuffer
pub trait AdjacencyPolicy {
    /// Whether a buffer goes directly before the widget.
    fn cursor_before(&self, cx: &AdjacencyContext<'_>) -> bool;

    /// Whether the cursor may land directly after the widget. When it may, a
    /// buffer is queued and flushed before whatever comes next.
    fn cursor_after(&self, cx: &AdjacencyContext<'_>) -> bool;
}

/// Buffers around every non-editable widget the cursor can reach.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAdjacency;

impl AdjacencyPolicy for DefaultAdjacency {
    fn cursor_before(&self, cx: &AdjacencyContext<'_>) -> bool {
        cx.at_cursor_pos
            && !cx.widget.editable
            && cx.open_start <= cx.active
            && (cx.replaces || cx.side > 0)
    }

    fn cursor_after(&self, cx: &AdjacencyContext<'_>) -> bool {
        !cx.widget.editable && (cx.replaces || cx.open_start > cx.active || cx.side <= 0)
    }
}

/// Never adds buffers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBuffers;

impl AdjacencyPolicy for NoBuffers {
    fn cursor_before(&self, _cx: &AdjacencyContext<'_>) -> bool {
        false
    }

    fn cursor_after(&self, _cx: &AdjacencyContext<'_>) -> bool {
        false
    }
}
