/// Paragraph, setext heading and link reference definition parsing for Markdown
pub mod ast;
pub mod lines;
pub mod options;
pub mod paragraph;
pub mod parser;
pub mod reference;

pub use ast::{Block, Document, ReferenceDefinition, Span};
pub use options::{DuplicateLabelPolicy, OptionsError, ParseOptions};
pub use parser::Parser;
pub use reference::ReferenceTable;

/// Parse markdown text with the default options
pub fn parse_document(markdown: &str) -> Document<'_> {
    Parser::new().parse(markdown)
}

/// Parse markdown text with the given options
pub fn parse_document_with<'a>(markdown: &'a str, options: &ParseOptions) -> Document<'a> {
    Parser::with_options(options.clone()).parse(markdown)
}
