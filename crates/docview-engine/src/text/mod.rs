//! # Text accessors
//!
//! The builder reads document text through [`TextSource`], positioned in
//! UTF-8 byte offsets, and walks it with a forward-only [`TextCursor`].

mod cursor;

pub use cursor::{TextChunk, TextCursor};

use std::borrow::Cow;
use std::ops::Range;

use xi_rope::{LinesMetric, Rope};

/// Random-access view of document text.
pub trait TextSource {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slice(&self, range: Range<usize>) -> Cow<'_, str>;

    /// Start of the line containing `pos`.
    fn line_start(&self, pos: usize) -> usize;

    /// End of the line containing `pos`: the offset of its line break, or
    /// the document length on the last line.
    fn line_end(&self, pos: usize) -> usize;
}

impl TextSource for str {
    fn len(&self) -> usize {
        str::len(self)
    }

    fn slice(&self, range: Range<usize>) -> Cow<'_, str> {
        Cow::Borrowed(&self[range])
    }

    fn line_start(&self, pos: usize) -> usize {
        self[..pos].rfind('\n').map_or(0, |i| i + 1)
    }

    fn line_end(&self, pos: usize) -> usize {
        self[pos..].find('\n').map_or(str::len(self), |i| pos + i)
    }
}

impl TextSource for &str {
    fn len(&self) -> usize {
        str::len(self)
    }

    fn slice(&self, range: Range<usize>) -> Cow<'_, str> {
        Cow::Borrowed(&self[range])
    }

    fn line_start(&self, pos: usize) -> usize {
        (**self).line_start(pos)
    }

    fn line_end(&self, pos: usize) -> usize {
        (**self).line_end(pos)
    }
}

impl TextSource for String {
    fn len(&self) -> usize {
        self.as_str().len()
    }

    fn slice(&self, range: Range<usize>) -> Cow<'_, str> {
        self.as_str().slice(range)
    }

    fn line_start(&self, pos: usize) -> usize {
        self.as_str().line_start(pos)
    }

    fn line_end(&self, pos: usize) -> usize {
        self.as_str().line_end(pos)
    }
}

impl TextSource for Rope {
    fn len(&self) -> usize {
        Rope::len(self)
    }

    fn slice(&self, range: Range<usize>) -> Cow<'_, str> {
        self.slice_to_cow(range)
    }

    fn line_start(&self, pos: usize) -> usize {
        self.offset_of_line(self.line_of_offset(pos))
    }

    fn line_end(&self, pos: usize) -> usize {
        let line = self.line_of_offset(pos);
        if line < self.measure::<LinesMetric>() {
            self.offset_of_line(line + 1) - 1
        } else {
            Rope::len(self)
        }
    }
}
