//! # Tree builder
//!
//! Walks the document text and the decoration events of a range in
//! lockstep and produces detached block nodes (`Line` and `BlockWidget`)
//! in the shared arena. The reconciler then splices them into the tree.

mod adjacency;

pub use adjacency::{AdjacencyContext, AdjacencyPolicy, DefaultAdjacency, NoBuffers};

use crate::decoration::{
    Decoration, DecorationOrigin, DecorationSource, EventConsumer, MarkDecoration, SpanSink,
};
use crate::error::BuildError;
use crate::options::ViewOptions;
use crate::text::{TextChunk, TextCursor, TextSource};
use crate::view::{NodeId, NodeKind, Nodes};

/// Freshly built content for one range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltContent {
    /// Top-level `Line`/`BlockWidget` nodes, not yet attached to a parent.
    pub content: Vec<NodeId>,
    /// The range starts with a line break closing the line before it.
    pub break_at_start: bool,
    /// Mark layers shared with the content before the range.
    pub open_start: usize,
    /// Mark layers shared with the content after the range, plus one when a
    /// replacement runs past its end.
    pub open_end: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingBuffer {
    No,
    Yes,
    /// Only needed if the next content is not itself a cursor position.
    IfCursor,
}

pub(crate) struct ContentBuilder<'a> {
    nodes: &'a mut Nodes,
    doc: &'a dyn TextSource,
    options: &'a ViewOptions,
    policy: &'a dyn AdjacencyPolicy,
    cursor: TextCursor<'a>,
    skip: usize,
    text: String,
    text_off: usize,
    pos: usize,
    content: Vec<NodeId>,
    cur_line: Option<NodeId>,
    break_at_start: bool,
    open_start: Option<usize>,
    at_cursor_pos: bool,
    pending: PendingBuffer,
    buffer_marks: Vec<MarkDecoration>,
}

impl<'a> ContentBuilder<'a> {
    pub(crate) fn new(
        nodes: &'a mut Nodes,
        doc: &'a dyn TextSource,
        pos: usize,
        options: &'a ViewOptions,
        policy: &'a dyn AdjacencyPolicy,
    ) -> Self {
        let policy: &'a dyn AdjacencyPolicy = if options.widget_buffers {
            policy
        } else {
            &NoBuffers
        };
        Self {
            nodes,
            doc,
            options,
            policy,
            cursor: TextCursor::new(doc),
            skip: pos,
            text: String::new(),
            text_off: 0,
            pos,
            content: Vec::new(),
            cur_line: None,
            break_at_start: false,
            open_start: None,
            at_cursor_pos: true,
            pending: PendingBuffer::No,
            buffer_marks: Vec::new(),
        }
    }

    /// Whether the current position already sits inside a block, either one
    /// built here or the one before the range.
    fn pos_covered(&self) -> bool {
        match self.content.last() {
            None => !self.break_at_start && self.doc.line_start(self.pos) != self.pos,
            Some(&last) => {
                let node = &self.nodes[last];
                let open_block = matches!(node.kind, NodeKind::BlockWidget { end_side, .. } if end_side < 0);
                !(node.break_after || open_block)
            }
        }
    }

    fn get_line(&mut self) -> NodeId {
        if let Some(line) = self.cur_line {
            return line;
        }
        let line = self.nodes.line();
        self.content.push(line);
        self.cur_line = Some(line);
        self.at_cursor_pos = true;
        line
    }

    /// Emits the queued after-widget buffer, wrapped in `marks` (or in the
    /// marks active when it was queued).
    fn flush_buffer(&mut self, marks: Option<&[MarkDecoration]>) {
        if self.pending == PendingBuffer::No {
            return;
        }
        self.pending = PendingBuffer::No;
        let Some(line) = self.cur_line else {
            return;
        };
        let marks = marks.map_or_else(|| self.buffer_marks.clone(), <[_]>::to_vec);
        let buffer = self.nodes.widget_buffer(1);
        let wrapped = self.nodes.wrap_marks(buffer, &marks);
        self.nodes.join_inline_into(line, wrapped, marks.len());
    }

    fn add_block_widget(&mut self, view: NodeId) {
        self.flush_buffer(None);
        self.cur_line = None;
        self.content.push(view);
    }

    fn next_chunk_len(&self, length: usize) -> usize {
        let limit = (self.text.len() - self.text_off).min(length);
        let mut take = limit.min(self.options.text_chunk.max(1));
        if take < limit {
            while take > 0 && !self.text.is_char_boundary(self.text_off + take) {
                take -= 1;
            }
            if take == 0 {
                take = 1;
                while take < limit && !self.text.is_char_boundary(self.text_off + take) {
                    take += 1;
                }
            }
        }
        take
    }

    fn build_text(
        &mut self,
        mut length: usize,
        active: &[MarkDecoration],
        mut open_start: usize,
    ) -> Result<(), BuildError> {
        while length > 0 {
            if self.text_off == self.text.len() {
                let chunk = self.cursor.next(self.skip);
                self.skip = 0;
                match chunk {
                    TextChunk::Done => return Err(BuildError::TextExhausted { pos: self.pos }),
                    TextChunk::LineBreak => {
                        if !self.pos_covered() {
                            self.get_line();
                        }
                        match self.content.last() {
                            Some(&last) => self.nodes[last].break_after = true,
                            None => self.break_at_start = true,
                        }
                        self.flush_buffer(None);
                        self.cur_line = None;
                        self.at_cursor_pos = true;
                        self.text.clear();
                        self.text_off = 0;
                        self.pos += 1;
                        length -= 1;
                        continue;
                    }
                    TextChunk::Text(text) => {
                        self.text = text.into_owned();
                        self.text_off = 0;
                    }
                }
            }
            let take = self.next_chunk_len(length);
            self.flush_buffer(Some(&active[..open_start.min(active.len())]));
            let leaf = self
                .nodes
                .text(self.text[self.text_off..self.text_off + take].to_string());
            let view = self.nodes.wrap_marks(leaf, active);
            let line = self.get_line();
            self.nodes.join_inline_into(line, view, open_start);
            self.at_cursor_pos = true;
            self.text_off += take;
            self.pos += take;
            length -= take;
            open_start = 0;
        }
        Ok(())
    }

    /// Moves the text cursor past `len` replaced positions.
    fn skip_replaced(&mut self, len: usize) {
        let buffered = self.text.len() - self.text_off;
        if len <= buffered {
            self.text_off += len;
        } else {
            self.skip += len - buffered;
            self.text.clear();
            self.text_off = 0;
        }
    }

    fn finish(mut self, open_end: usize) -> BuiltContent {
        if self.pending != PendingBuffer::No && open_end <= self.buffer_marks.len() {
            self.flush_buffer(None);
        } else {
            self.pending = PendingBuffer::No;
        }
        let ends_in_block = open_end > 0
            && self
                .content
                .last()
                .is_some_and(|&last| matches!(self.nodes[last].kind, NodeKind::BlockWidget { .. }));
        if !self.pos_covered() && !ends_in_block {
            self.get_line();
        }
        BuiltContent {
            content: self.content,
            break_at_start: self.break_at_start,
            open_start: self.open_start.unwrap_or(open_end),
            open_end,
        }
    }

    fn discard(self) {
        for id in self.content {
            self.nodes.destroy(id);
        }
    }
}

impl SpanSink for ContentBuilder<'_> {
    fn span(
        &mut self,
        _from: usize,
        to: usize,
        active: &[MarkDecoration],
        open_start: usize,
    ) -> Result<(), BuildError> {
        self.build_text(to - self.pos, active, open_start)?;
        self.pos = to;
        self.open_start.get_or_insert(open_start);
        Ok(())
    }

    fn point(
        &mut self,
        from: usize,
        to: usize,
        deco: &Decoration,
        active: &[MarkDecoration],
        mut open_start: usize,
        origin: DecorationOrigin,
    ) -> Result<(), BuildError> {
        if origin == DecorationOrigin::Restricted {
            if let Decoration::Replace(point) = deco {
                if point.block {
                    return Err(BuildError::BlockFromRestrictedSource { from, to });
                }
                if to > self.doc.line_end(self.pos) {
                    return Err(BuildError::RestrictedReplacesLineBreak { from, to });
                }
            }
        }
        let len = to - from;
        match deco {
            Decoration::Replace(point) if point.block => {
                if point.start_side > 0 && !self.pos_covered() {
                    self.get_line();
                }
                let view = self.nodes.block_widget(
                    point.widget.clone(),
                    len,
                    point.start_side,
                    point.end_side,
                );
                self.add_block_widget(view);
            }
            Decoration::Replace(point) => {
                let side = if len > 0 { 0 } else { point.start_side };
                let cx = AdjacencyContext {
                    widget: &point.widget,
                    replaces: len > 0,
                    side: point.start_side,
                    at_cursor_pos: self.at_cursor_pos,
                    open_start,
                    active: active.len(),
                };
                let cursor_before = self.policy.cursor_before(&cx);
                let cursor_after = self.policy.cursor_after(&cx);
                let line = self.get_line();
                if self.pending == PendingBuffer::IfCursor && !cursor_before && !point.widget.editable {
                    self.pending = PendingBuffer::No;
                }
                self.flush_buffer(Some(active));
                if cursor_before {
                    let buffer = self.nodes.widget_buffer(-1);
                    let wrapped = self.nodes.wrap_marks(buffer, active);
                    self.nodes.join_inline_into(line, wrapped, open_start);
                    open_start = active.len() + open_start.saturating_sub(active.len());
                }
                let widget = self.nodes.widget(point.widget.clone(), len, side);
                let view = self.nodes.wrap_marks(widget, active);
                self.nodes.join_inline_into(line, view, open_start);
                self.at_cursor_pos = cursor_after;
                self.pending = if !cursor_after {
                    PendingBuffer::No
                } else if len > 0 || open_start > active.len() {
                    PendingBuffer::Yes
                } else {
                    PendingBuffer::IfCursor
                };
                if self.pending != PendingBuffer::No {
                    self.buffer_marks = active.to_vec();
                }
            }
            Decoration::Line(line_deco) => {
                if self.doc.line_start(self.pos) == self.pos {
                    let line = self.get_line();
                    self.nodes.add_line_deco(line, line_deco);
                }
            }
        }
        if len > 0 {
            self.skip_replaced(len);
            self.pos = to;
        }
        self.open_start.get_or_insert(open_start);
        Ok(())
    }
}

fn replay(
    builder: &mut ContentBuilder<'_>,
    decorations: &dyn DecorationSource,
    from: usize,
    to: usize,
) -> Result<usize, BuildError> {
    let mut consumer = EventConsumer::new(builder, from, to);
    let open_end = decorations.spans(from, to, &mut consumer)?;
    consumer.finish()?;
    Ok(open_end)
}

/// Builds detached content for `from..to` of `doc`.
///
/// On error every node built so far is destroyed again.
pub fn build(
    nodes: &mut Nodes,
    doc: &dyn TextSource,
    from: usize,
    to: usize,
    decorations: &dyn DecorationSource,
    options: &ViewOptions,
    policy: &dyn AdjacencyPolicy,
) -> Result<BuiltContent, BuildError> {
    let mut builder = ContentBuilder::new(nodes, doc, from, options, policy);
    match replay(&mut builder, decorations, from, to) {
        Ok(open_end) => Ok(builder.finish(open_end)),
        Err(err) => {
            builder.discard();
            Err(err)
        }
    }
}
