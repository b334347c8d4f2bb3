/// Source lines and the line regions accumulated by candidate blocks
use serde::Serialize;

use crate::ast::Span;

/// One input line as presented to a block parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLine<'a> {
    /// 1-based line number
    pub number: usize,
    /// Byte offset of `text` in the source
    pub start: usize,
    /// Column of `text` within its physical line
    pub column: usize,
    /// Line content, without the line ending
    pub text: &'a str,
}

impl<'a> SourceLine<'a> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim_matches([' ', '\t']).is_empty()
    }

    /// Number of leading spaces
    pub fn indent(&self) -> usize {
        count_leading_spaces(self.text)
    }

    /// Drop the first `bytes` bytes of the line, keeping offsets aligned with the source
    pub fn advance(&self, bytes: usize) -> SourceLine<'a> {
        let bytes = bytes.min(self.text.len());
        SourceLine {
            number: self.number,
            start: self.start + bytes,
            column: self.column + self.text[..bytes].chars().count(),
            text: &self.text[bytes..],
        }
    }

    pub fn to_string_line(&self) -> StringLine<'a> {
        StringLine {
            line: self.number,
            position: self.start,
            text: self.text,
        }
    }
}

fn count_leading_spaces(text: &str) -> usize {
    text.len() - text.trim_start_matches(' ').len()
}

/// Pull-based iterator over the lines of a source text.
#[derive(Debug, Clone)]
pub struct LineCursor<'a> {
    source: &'a str,
    offset: usize,
    number: usize,
}

impl<'a> LineCursor<'a> {
    pub fn new(source: &'a str) -> Self {
        LineCursor {
            source,
            offset: 0,
            number: 0,
        }
    }

    /// Look at the next line without consuming it
    pub fn peek(&self) -> Option<SourceLine<'a>> {
        self.clone().next()
    }
}

impl<'a> Iterator for LineCursor<'a> {
    type Item = SourceLine<'a>;

    fn next(&mut self) -> Option<SourceLine<'a>> {
        if self.offset >= self.source.len() {
            return None;
        }

        let rest = &self.source[self.offset..];
        let (raw, advance) = match rest.find('\n') {
            Some(newline) => (&rest[..newline], newline + 1),
            None => (rest, rest.len()),
        };
        // CRLF endings: keep the '\r' out of the line text
        let text = raw.strip_suffix('\r').unwrap_or(raw);

        self.number += 1;
        let line = SourceLine {
            number: self.number,
            start: self.offset,
            column: 0,
            text,
        };
        self.offset += advance;
        Some(line)
    }
}

/// A slice of one source line held by a line region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StringLine<'a> {
    pub line: usize,
    /// Absolute byte offset of `text` in the source
    pub position: usize,
    pub text: &'a str,
}

impl StringLine<'_> {
    pub fn span(&self) -> Span {
        Span::new(self.position, self.position + self.text.len())
    }
}

/// Ordered lines of text accumulated for one candidate block.
///
/// Lines are kept in source order and never overlap. The region reads as the
/// lines joined with `\n`; offsets into that joined text can be mapped back to
/// source offsets with [`LineRegion::source_offset`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct LineRegion<'a> {
    lines: Vec<StringLine<'a>>,
}

impl<'a> LineRegion<'a> {
    pub fn new() -> Self {
        LineRegion { lines: Vec::new() }
    }

    pub fn push(&mut self, line: StringLine<'a>) {
        debug_assert!(
            self.lines
                .last()
                .is_none_or(|last| last.position + last.text.len() <= line.position),
            "line regions must grow in source order"
        );
        self.lines.push(line);
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[StringLine<'a>] {
        &self.lines
    }

    pub fn first(&self) -> Option<&StringLine<'a>> {
        self.lines.first()
    }

    /// Source range from the start of the first line to the end of the last
    pub fn span(&self) -> Option<Span> {
        let first = self.lines.first()?;
        let last = self.lines.last()?;
        Some(Span::new(first.position, last.span().end))
    }

    pub fn to_text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Remove leading spaces and tabs from the first line
    pub fn trim_start(&mut self) {
        if let Some(first) = self.lines.first_mut() {
            let trimmed = first.text.trim_start_matches([' ', '\t']);
            first.position += first.text.len() - trimmed.len();
            first.text = trimmed;
        }
    }

    /// Remove trailing spaces and tabs from the last line
    pub fn trim_end(&mut self) {
        if let Some(last) = self.lines.last_mut() {
            last.text = last.text.trim_end_matches([' ', '\t']);
        }
    }

    pub fn trim(&mut self) {
        self.trim_start();
        self.trim_end();
    }

    /// Map an offset into [`to_text`](Self::to_text) to an absolute source offset.
    ///
    /// The `\n` joining two lines maps to the end of the line before it.
    pub fn source_offset(&self, offset: usize) -> usize {
        self.joined().source_offset(offset)
    }

    /// Join the lines once, keeping an index from joined offsets back to lines
    pub fn joined(&self) -> JoinedText<'_, 'a> {
        let capacity = self.lines.iter().map(|line| line.text.len() + 1).sum();
        let mut text = String::with_capacity(capacity);
        let mut starts = Vec::with_capacity(self.lines.len());
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            starts.push(text.len());
            text.push_str(line.text);
        }
        JoinedText {
            lines: &self.lines,
            text,
            starts,
        }
    }

    /// Consume the first `consumed` bytes of the joined text and return what is left.
    ///
    /// Lines consumed entirely (or up to their end) are dropped; a line cut in the
    /// middle keeps its tail with the position moved forward.
    pub fn remove_prefix(self, consumed: usize) -> LineRegion<'a> {
        let mut lines = Vec::with_capacity(self.lines.len());
        let mut line_start = 0;

        for line in self.lines {
            let len = line.text.len();
            if consumed <= line_start {
                lines.push(line);
            } else if consumed - line_start < len {
                let cut = consumed - line_start;
                lines.push(StringLine {
                    line: line.line,
                    position: line.position + cut,
                    text: &line.text[cut..],
                });
            }
            line_start += len + 1;
        }

        LineRegion { lines }
    }
}

/// The text of a [`LineRegion`] with its lines joined by `\n`.
#[derive(Debug)]
pub struct JoinedText<'r, 'a> {
    lines: &'r [StringLine<'a>],
    text: String,
    /// Offset in `text` where each line begins
    starts: Vec<usize>,
}

impl<'a> JoinedText<'_, 'a> {
    pub fn text(&self) -> &str {
        &self.text
    }

    fn line_index(&self, offset: usize) -> usize {
        self.starts.partition_point(|&start| start <= offset).saturating_sub(1)
    }

    /// The line holding the byte at `offset`
    pub fn line_at(&self, offset: usize) -> Option<&StringLine<'a>> {
        self.lines.get(self.line_index(offset))
    }

    /// Absolute source offset of a joined-text offset
    pub fn source_offset(&self, offset: usize) -> usize {
        let index = self.line_index(offset);
        match self.lines.get(index) {
            Some(line) => line.position + (offset - self.starts[index]).min(line.text.len()),
            None => offset,
        }
    }
}

impl<'a> FromIterator<StringLine<'a>> for LineRegion<'a> {
    fn from_iter<I: IntoIterator<Item = StringLine<'a>>>(iter: I) -> Self {
        let mut region = LineRegion::new();
        for line in iter {
            region.push(line);
        }
        region
    }
}
