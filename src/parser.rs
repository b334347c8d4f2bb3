/// Document driver: feeds source lines to the paragraph parser
use log::{debug, trace};

use crate::ast::{Block, Document, Span};
use crate::lines::{LineCursor, SourceLine};
use crate::options::ParseOptions;
use crate::paragraph::{Candidate, ContainerKind, Continuation, ParagraphParser};
use crate::reference::ReferenceTable;

pub struct Parser {
    options: ParseOptions,
}

impl Parser {
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Parser { options }
    }

    pub fn parse<'a>(&self, input: &'a str) -> Document<'a> {
        let mut builder = DocumentBuilder {
            paragraphs: ParagraphParser::new(self.options.setext_headings),
            references: ReferenceTable::new(self.options.duplicate_labels),
            blocks: Vec::new(),
            quote: None,
            candidate: None,
        };

        for line in LineCursor::new(input) {
            trace!("Line {}: {:?}", line.number, line.text);
            match strip_quote_marker(&line) {
                Some(content) => builder.quote_line(&line, content),
                None => builder.document_line(&line),
            }
        }

        builder.finish()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

/// Block quote collecting its children
struct OpenQuote<'a> {
    children: Vec<Block<'a>>,
    span: Span,
}

struct DocumentBuilder<'a> {
    paragraphs: ParagraphParser,
    references: ReferenceTable,
    blocks: Vec<Block<'a>>,
    quote: Option<OpenQuote<'a>>,
    /// Open paragraph and the container it lives in
    candidate: Option<(Candidate<'a>, ContainerKind)>,
}

impl<'a> DocumentBuilder<'a> {
    fn document_line(&mut self, line: &SourceLine<'a>) {
        if line.is_blank() {
            self.close_candidate();
            self.close_quote();
            return;
        }

        // Lazy continuation: an unmarked line extends a paragraph inside the quote
        if let Some((candidate, container)) = self
            .candidate
            .take_if(|(_, container)| *container == ContainerKind::BlockQuote)
        {
            self.continue_candidate(candidate, line, container);
            if let Some(quote) = self.quote.as_mut() {
                quote.span.end = line.end();
            }
            return;
        }

        self.close_quote();
        self.offer(line, ContainerKind::Document);
    }

    fn quote_line(&mut self, line: &SourceLine<'a>, content: SourceLine<'a>) {
        // A quote interrupts a paragraph in the enclosing document
        if matches!(self.candidate, Some((_, ContainerKind::Document))) {
            self.close_candidate();
        }

        let quote = self.quote.get_or_insert_with(|| {
            debug!("Opening block quote at line {}", line.number);
            OpenQuote {
                children: Vec::new(),
                span: Span::new(line.start, line.end()),
            }
        });
        quote.span.end = line.end();

        self.offer(&content, ContainerKind::BlockQuote);
    }

    /// Hand a line to the open candidate, or try to open one
    fn offer(&mut self, line: &SourceLine<'a>, container: ContainerKind) {
        match self.candidate.take() {
            Some((candidate, _)) => self.continue_candidate(candidate, line, container),
            None => {
                self.candidate = self
                    .paragraphs
                    .try_open(line)
                    .map(|candidate| (candidate, container));
            }
        }
    }

    fn continue_candidate(
        &mut self,
        candidate: Candidate<'a>,
        line: &SourceLine<'a>,
        container: ContainerKind,
    ) {
        match self
            .paragraphs
            .try_continue(candidate, line, container, &mut self.references)
        {
            Continuation::Continue(candidate) => self.candidate = Some((candidate, container)),
            Continuation::Break(candidate) => {
                self.candidate = Some((candidate, container));
                self.close_candidate();
            }
            Continuation::Heading(heading) => self.push(heading, container),
        }
    }

    fn close_candidate(&mut self) {
        if let Some((candidate, container)) = self.candidate.take() {
            if let Some(block) = self.paragraphs.close(candidate, &mut self.references) {
                self.push(block, container);
            }
        }
    }

    fn close_quote(&mut self) {
        if let Some(quote) = self.quote.take() {
            debug!("Closing block quote at {:?}", quote.span);
            self.blocks.push(Block::BlockQuote {
                children: quote.children,
                span: quote.span,
            });
        }
    }

    fn push(&mut self, block: Block<'a>, container: ContainerKind) {
        match (container, self.quote.as_mut()) {
            (ContainerKind::BlockQuote, Some(quote)) => quote.children.push(block),
            _ => self.blocks.push(block),
        }
    }

    fn finish(mut self) -> Document<'a> {
        self.close_candidate();
        self.close_quote();
        Document {
            blocks: self.blocks,
            references: self.references,
        }
    }
}

/// Strip a `>` marker (after up to 3 spaces) and one optional following space
fn strip_quote_marker<'a>(line: &SourceLine<'a>) -> Option<SourceLine<'a>> {
    let indent = line.indent();
    if indent > 3 || line.text[indent..].chars().next() != Some('>') {
        return None;
    }

    let mut consumed = indent + 1;
    if matches!(line.text[consumed..].chars().next(), Some(' ' | '\t')) {
        consumed += 1;
    }
    Some(line.advance(consumed))
}
