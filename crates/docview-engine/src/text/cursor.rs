use std::borrow::Cow;

use super::TextSource;

/// One step of a [`TextCursor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextChunk<'a> {
    /// Text up to (not including) the next line break.
    Text(Cow<'a, str>),
    /// A single line break, one position long.
    LineBreak,
    Done,
}

/// A forward cursor over a [`TextSource`].
///
/// The only way to move it is `next(skip)`, which first jumps `skip`
/// positions ahead and then yields the chunk found there.
pub struct TextCursor<'a> {
    source: &'a dyn TextSource,
    pos: usize,
}

impl<'a> TextCursor<'a> {
    pub fn new(source: &'a dyn TextSource) -> Self {
        Self { source, pos: 0 }
    }

    /// Position of the next unread byte.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn next(&mut self, skip: usize) -> TextChunk<'a> {
        self.pos += skip;
        let len = self.source.len();
        if self.pos >= len {
            self.pos = len;
            return TextChunk::Done;
        }
        let end = self.source.line_end(self.pos);
        if end == self.pos {
            self.pos += 1;
            return TextChunk::LineBreak;
        }
        let text = self.source.slice(self.pos..end);
        self.pos = end;
        TextChunk::Text(text)
    }
}
