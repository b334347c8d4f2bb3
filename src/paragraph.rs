/// Paragraph accumulation and setext heading reclassification
use log::{debug, trace};

use crate::ast::{Block, Span};
use crate::lines::{LineRegion, SourceLine};
use crate::reference::{ReferenceTable, extract_definitions};

/// Kind of container a line belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContainerKind {
    #[default]
    Document,
    BlockQuote,
}

/// A paragraph under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    lines: LineRegion<'a>,
    column: usize,
    span: Span,
}

impl<'a> Candidate<'a> {
    fn open(line: &SourceLine<'a>) -> Self {
        let mut lines = LineRegion::new();
        lines.push(line.to_string_line());
        Candidate {
            lines,
            column: line.column,
            span: Span::new(line.start, line.end()),
        }
    }

    fn append(&mut self, line: &SourceLine<'a>) {
        trace!("Paragraph continues on line {}", line.number);
        self.lines.push(line.to_string_line());
        self.span.end = line.end();
    }

    pub fn lines(&self) -> &LineRegion<'a> {
        &self.lines
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

/// Outcome of offering a line to an open candidate
#[derive(Debug, Clone, PartialEq)]
pub enum Continuation<'a> {
    /// The line was appended to the candidate
    Continue(Candidate<'a>),
    /// Blank line: close the candidate; the line itself was not consumed
    Break(Candidate<'a>),
    /// The line was a setext underline; it was consumed and the candidate became this heading
    Heading(Block<'a>),
}

/// Block parser for paragraphs and the setext headings they can turn into.
#[derive(Debug, Clone, Copy)]
pub struct ParagraphParser {
    setext_headings: bool,
}

impl Default for ParagraphParser {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ParagraphParser {
    pub fn new(setext_headings: bool) -> Self {
        ParagraphParser { setext_headings }
    }

    /// Open a candidate on a non-blank line; blank lines are skipped
    pub fn try_open<'a>(&self, line: &SourceLine<'a>) -> Option<Candidate<'a>> {
        if line.is_blank() {
            return None;
        }
        debug!("Opening paragraph at line {}", line.number);
        Some(Candidate::open(line))
    }

    pub fn try_continue<'a>(
        &self,
        mut candidate: Candidate<'a>,
        line: &SourceLine<'a>,
        container: ContainerKind,
        references: &mut ReferenceTable,
    ) -> Continuation<'a> {
        if line.is_blank() {
            trace!("Blank line {} ends the paragraph", line.number);
            return Continuation::Break(candidate);
        }

        if self.setext_headings && container != ContainerKind::BlockQuote {
            if let Some(level) = underline_level(line) {
                let lines = extract_definitions(candidate.lines).register_into(references);
                if !lines.is_empty() {
                    return Continuation::Heading(into_heading(lines, level, candidate.column));
                }

                // Only definitions preceded the underline: it is ordinary text now
                debug!(
                    "Setext underline on line {} has no heading text, continuing paragraph",
                    line.number
                );
                candidate.lines = lines;
            }
        }

        candidate.append(line);
        Continuation::Continue(candidate)
    }

    /// Finish a candidate. `None` means nothing survived definition extraction.
    pub fn close<'a>(
        &self,
        candidate: Candidate<'a>,
        references: &mut ReferenceTable,
    ) -> Option<Block<'a>> {
        let extraction = extract_definitions(candidate.lines);
        let extracted = extraction.definitions.len();
        let mut lines = extraction.register_into(references);

        if lines.is_empty() {
            debug!(
                "Discarding paragraph at {:?}: {} reference definition(s) and no text",
                candidate.span, extracted
            );
            return None;
        }

        lines.trim();
        let span = lines.span().unwrap_or(candidate.span);
        debug!("Closing paragraph at {:?} with {} line(s)", span, lines.len());
        Some(Block::Paragraph {
            lines,
            span,
            column: candidate.column,
        })
    }
}

fn into_heading(mut lines: LineRegion<'_>, level: u8, column: usize) -> Block<'_> {
    lines.trim();
    let span = lines.span().unwrap_or_default();
    debug!("Paragraph at {:?} becomes a level {} setext heading", span, level);
    Block::Heading {
        level,
        lines,
        span,
        column,
    }
}

/// Setext level of a line, ignoring up to 3 spaces of indentation
fn underline_level(line: &SourceLine<'_>) -> Option<u8> {
    if line.indent() >= 4 {
        return None;
    }
    setext_level(line.text.trim_start_matches(' '))
}

/// Check whether `text` is a setext underline.
///
/// The text must be one or more `=` (level 1) or `-` (level 2) characters,
/// optionally followed by spaces and tabs only.
pub fn setext_level(text: &str) -> Option<u8> {
    let underline = text.trim_end_matches([' ', '\t']);
    let marker = underline.chars().next()?;

    let level = match marker {
        '=' => 1,
        '-' => 2,
        _ => return None,
    };

    // Whitespace inside the run or any other character cancels the marker
    underline
        .chars()
        .all(|ch| ch == marker)
        .then_some(level)
}
