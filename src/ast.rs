/// AST node types produced by the paragraph layer
use serde::Serialize;

use crate::lines::LineRegion;
use crate::reference::ReferenceTable;

/// Half-open `[start, end)` byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start {start} past end {end}");
        Span { start, end }
    }

    pub fn contains(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Block<'a> {
    Paragraph {
        lines: LineRegion<'a>,
        span: Span,
        column: usize,
    },
    Heading {
        level: u8, // 1 for '=' underlines, 2 for '-'
        lines: LineRegion<'a>,
        span: Span,
        column: usize,
    },
    BlockQuote {
        children: Vec<Block<'a>>,
        span: Span,
    },
}

impl Block<'_> {
    pub fn span(&self) -> Span {
        match self {
            Block::Paragraph { span, .. }
            | Block::Heading { span, .. }
            | Block::BlockQuote { span, .. } => *span,
        }
    }

    /// Text of a leaf block, lines joined with `\n`
    pub fn text(&self) -> Option<String> {
        match self {
            Block::Paragraph { lines, .. } | Block::Heading { lines, .. } => Some(lines.to_text()),
            Block::BlockQuote { .. } => None,
        }
    }
}

/// A `[label]: url "title"` declaration lifted out of paragraph text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReferenceDefinition {
    /// Case-folded, whitespace-collapsed label
    pub label: String,
    pub label_span: Span,
    pub url: String,
    pub url_span: Span,
    pub title: Option<String>,
    pub title_span: Option<Span>,
    /// From the opening `[` to the last consumed character
    pub span: Span,
    /// Line number the definition starts on
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document<'a> {
    pub blocks: Vec<Block<'a>>,
    pub references: ReferenceTable,
}
