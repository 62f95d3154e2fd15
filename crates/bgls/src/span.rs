//
// span.rs
//
// Byte spans and offset <-> LSP position conversion
//

use tower_lsp::lsp_types::{Position, Range};

/// A byte range `[start, end)` within a document's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} after end {end}");
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// True when `offset` lies inside the span or directly after its last byte.
    ///
    /// Editors report the cursor *between* characters, so a cursor placed right
    /// after a token still counts as being on it.
    pub fn contains_offset(&self, offset: usize) -> bool {
        self.start <= offset && offset <= self.end
    }

    /// True when `other` lies entirely within this span.
    pub fn encloses(&self, other: &SourceSpan) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Shift a span that was computed relative to a slice starting at `base`.
    pub fn shifted(self, base: usize) -> Self {
        Self::new(self.start + base, self.end + base)
    }

    pub fn slice<'a>(&self, text: &'a str) -> &'a str {
        text.get(self.start..self.end).unwrap_or("")
    }
}

/// Round `offset` down to the closest char boundary that is not past the end of `text`.
pub fn floor_char_boundary(text: &str, offset: usize) -> usize {
    let mut offset = offset.min(text.len());
    while !text.is_char_boundary(offset) {
        offset -= 1;
    }
    offset
}

/// Span of the line containing `offset`, without its line terminator.
pub fn line_span_at(text: &str, offset: usize) -> SourceSpan {
    let offset = floor_char_boundary(text, offset);
    let start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let mut end = text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len());
    if end > start && text.as_bytes()[end - 1] == b'\r' {
        end -= 1;
    }
    SourceSpan::new(start, end.max(start))
}

/// Convert a UTF-16 column offset (from LSP Position.character) to a byte
/// offset within the given line.
pub fn utf16_column_to_byte_offset(line: &str, utf16_col: u32) -> usize {
    let mut utf16_count = 0;
    for (byte_idx, ch) in line.char_indices() {
        if utf16_count >= utf16_col as usize {
            return byte_idx;
        }
        utf16_count += ch.len_utf16();
    }
    line.len()
}

fn utf16_len(text: &str) -> u32 {
    text.chars().map(|c| c.len_utf16() as u32).sum()
}

/// Line table for one document, mapping byte offsets to LSP positions and back.
pub struct LineIndex<'a> {
    text: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { text, line_starts }
    }

    /// Zero-based line number containing `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        let offset = offset.min(self.text.len());
        self.line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }

    /// Span of a line without its terminator; `None` past the last line.
    pub fn line_span(&self, line: usize) -> Option<SourceSpan> {
        let start = *self.line_starts.get(line)?;
        Some(line_span_at(self.text, start))
    }

    pub fn position_at(&self, offset: usize) -> Position {
        let offset = floor_char_boundary(self.text, offset);
        let line = self.line_of(offset);
        let line_start = self.line_starts[line];
        Position::new(line as u32, utf16_len(&self.text[line_start..offset]))
    }

    /// Byte offset for an LSP position. Positions past the end of a line clamp
    /// to the line end; positions past the last line clamp to the text end.
    pub fn offset_at(&self, position: Position) -> usize {
        match self.line_span(position.line as usize) {
            Some(line) => {
                line.start + utf16_column_to_byte_offset(line.slice(self.text), position.character)
            }
            None => self.text.len(),
        }
    }

    pub fn range_of(&self, span: SourceSpan) -> Range {
        Range::new(self.position_at(span.start), self.position_at(span.end))
    }
}
