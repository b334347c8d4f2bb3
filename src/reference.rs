/// Link reference definitions: grammar, extraction from paragraph text, and the label table
use std::collections::HashMap;

use log::{debug, trace};
use serde::Serialize;
use unicode_casefold::UnicodeCaseFold;

use crate::ast::{ReferenceDefinition, Span};
use crate::lines::{JoinedText, LineRegion};
use crate::options::DuplicateLabelPolicy;

/// Document-wide mapping from normalized label to reference definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceTable {
    policy: DuplicateLabelPolicy,
    /// Every registration, in source order
    definitions: Vec<ReferenceDefinition>,
    /// label -> index of the definition that label resolves to
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl ReferenceTable {
    pub fn new(policy: DuplicateLabelPolicy) -> Self {
        ReferenceTable {
            policy,
            ..Default::default()
        }
    }

    /// Register a definition under its label.
    ///
    /// Returns `true` if the label now resolves to this definition.
    pub fn register(&mut self, definition: ReferenceDefinition) -> bool {
        let position = self.definitions.len();
        let label = definition.label.clone();
        self.definitions.push(definition);

        let defined = self.index.contains_key(&label);
        match (defined, self.policy) {
            (true, DuplicateLabelPolicy::FirstWins) => {
                debug!("Label [{}] already defined, keeping the first definition", label);
                false
            }
            (defined, _) => {
                if defined {
                    debug!("Label [{}] redefined, replacing the earlier definition", label);
                }
                self.index.insert(label, position);
                true
            }
        }
    }

    /// Look up a label as written in the document
    pub fn get(&self, label: &str) -> Option<&ReferenceDefinition> {
        self.index
            .get(&normalize_label(label))
            .map(|&position| &self.definitions[position])
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    /// Number of distinct labels
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// All registered definitions in source order, duplicates included
    pub fn iter(&self) -> impl Iterator<Item = &ReferenceDefinition> {
        self.definitions.iter()
    }
}

/// Normalize a label for matching (Unicode case fold, collapse whitespace)
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .case_fold()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Result of stripping the leading run of definitions from a line region.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction<'a> {
    /// Text left after the last definition
    pub region: LineRegion<'a>,
    /// Extracted definitions, in source order
    pub definitions: Vec<ReferenceDefinition>,
}

impl<'a> Extraction<'a> {
    /// Whether at least one definition was extracted
    pub fn found(&self) -> bool {
        !self.definitions.is_empty()
    }

    /// Register the definitions in source order and hand back the remaining text
    pub fn register_into(self, table: &mut ReferenceTable) -> LineRegion<'a> {
        for definition in self.definitions {
            debug!(
                "Registering reference [{}] -> {} from line {}",
                definition.label, definition.url, definition.line
            );
            table.register(definition);
        }
        self.region
    }
}

/// Repeatedly parse definitions from the start of `region` until one fails to match.
///
/// Only a contiguous prefix of definitions is taken; everything from the first
/// non-matching position onward is left untouched. The region is joined once and
/// scanned with a moving offset, so the work is linear in the region's length.
pub fn extract_definitions(region: LineRegion<'_>) -> Extraction<'_> {
    if !opens_definition(&region) {
        return Extraction {
            region,
            definitions: Vec::new(),
        };
    }

    let joined = region.joined();
    let mut definitions = Vec::new();
    let mut consumed = 0;
    while let Some(raw) = scan_definition(joined.text(), consumed) {
        consumed = raw.end;
        let definition = raw.locate(&joined);
        trace!("Matched reference definition [{}]", definition.label);
        definitions.push(definition);
    }

    let region = if consumed > 0 {
        region.remove_prefix(consumed)
    } else {
        region
    };
    Extraction {
        region,
        definitions,
    }
}

/// Parse one definition from the start of `region`.
///
/// Returns the definition, with spans in absolute source coordinates, and the
/// unconsumed remainder of the region.
pub fn parse_definition<'a>(
    region: &LineRegion<'a>,
) -> Option<(ReferenceDefinition, LineRegion<'a>)> {
    if !opens_definition(region) {
        return None;
    }

    let joined = region.joined();
    let raw = scan_definition(joined.text(), 0)?;
    let end = raw.end;
    let definition = raw.locate(&joined);
    Some((definition, region.clone().remove_prefix(end)))
}

fn opens_definition(region: &LineRegion<'_>) -> bool {
    region
        .first()
        .is_some_and(|first| first.text.trim_start_matches([' ', '\t']).starts_with('['))
}

/// A definition matched in joined region text; spans are relative to that text
#[derive(Debug)]
struct RawDefinition {
    label_span: Span,
    url: String,
    url_span: Span,
    title: Option<String>,
    title_span: Option<Span>,
    span: Span,
    /// Offset just past the definition, including its line ending
    end: usize,
}

impl RawDefinition {
    /// Resolve the label and move every span into source coordinates
    fn locate(self, joined: &JoinedText<'_, '_>) -> ReferenceDefinition {
        let locate = |span: Span| {
            Span::new(
                joined.source_offset(span.start),
                joined.source_offset(span.end),
            )
        };

        ReferenceDefinition {
            label: normalize_label(&joined.text()[self.label_span.start..self.label_span.end]),
            label_span: locate(self.label_span),
            url: self.url,
            url_span: locate(self.url_span),
            title: self.title,
            title_span: self.title_span.map(locate),
            span: locate(self.span),
            line: joined.line_at(self.span.start).map_or(0, |line| line.line),
        }
    }
}

/// Match a definition starting at `from`, which must be the start of a line
fn scan_definition(text: &str, from: usize) -> Option<RawDefinition> {
    let bytes = text.as_bytes();
    let start = skip_spaces(bytes, from);
    if bytes.get(start) != Some(&b'[') {
        return None;
    }

    // Label: no unescaped brackets, at least one non-whitespace character
    let label_start = start + 1;
    let mut i = label_start;
    loop {
        match *bytes.get(i)? {
            b']' => break,
            b'[' => return None,
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => i += 2,
            _ => i += 1,
        }
    }
    let label_end = i;
    let label = &text[label_start..label_end];
    if label.chars().count() > 999 || label.trim().is_empty() {
        return None;
    }
    i += 1;

    if bytes.get(i) != Some(&b':') {
        return None;
    }
    i = skip_spaces_and_optional_newline(bytes, i + 1);

    let (url, url_span) = scan_destination(text, i)?;
    let dest_end = url_span.end;

    // Title must be separated from the destination by whitespace
    let title_start = skip_spaces_and_optional_newline(bytes, dest_end);
    if title_start > dest_end && title_start < bytes.len() {
        if let Some((title, title_end)) = scan_title(text, title_start) {
            let after = skip_spaces(bytes, title_end);
            if at_line_end(bytes, after) {
                return Some(RawDefinition {
                    label_span: Span::new(label_start, label_end),
                    url,
                    url_span,
                    title: Some(title),
                    title_span: Some(Span::new(title_start, title_end)),
                    span: Span::new(start, title_end),
                    end: consume_line_end(bytes, after),
                });
            }
        }
    }

    // No usable title: the destination has to finish its line
    let after = skip_spaces(bytes, dest_end);
    if !at_line_end(bytes, after) {
        return None;
    }

    Some(RawDefinition {
        label_span: Span::new(label_start, label_end),
        url,
        url_span,
        title: None,
        title_span: None,
        span: Span::new(start, dest_end),
        end: consume_line_end(bytes, after),
    })
}

/// Parse a link destination starting at `start`.
/// Returns the unescaped destination and the span it occupies as written.
fn scan_destination(text: &str, start: usize) -> Option<(String, Span)> {
    let bytes = text.as_bytes();
    if start >= bytes.len() {
        return None;
    }

    // Angle-bracket form: <...>, may be empty
    if bytes[start] == b'<' {
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'>' => {
                    let url = unescape(&text[start + 1..i]);
                    return Some((url, Span::new(start, i + 1)));
                }
                b'<' | b'\n' => return None,
                b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => i += 2,
                _ => i += 1,
            }
        }
        return None;
    }

    // Bare form: non-empty, no spaces or control characters, balanced parens
    let mut i = start;
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b' ' | b'\t' | b'\n' => break,
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => {
                i += 2;
                continue;
            }
            b'(' => depth += 1,
            b')' => {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            b if b.is_ascii_control() => return None,
            _ => {}
        }
        i += 1;
    }

    if i == start || depth != 0 {
        return None;
    }
    Some((unescape(&text[start..i]), Span::new(start, i)))
}

/// Parse a quoted or parenthesized title starting at `start`.
/// Returns the unescaped title and the offset just past its closing delimiter.
/// Within one text an opener can only run unclosed to the end once per delimiter:
/// any later opener of the same delimiter would have closed it.
fn scan_title(text: &str, start: usize) -> Option<(String, usize)> {
    let bytes = text.as_bytes();
    let closing = match bytes.get(start)? {
        b'"' => b'"',
        b'\'' => b'\'',
        b'(' => b')',
        _ => return None,
    };

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if bytes.get(i + 1).is_some_and(u8::is_ascii_punctuation) => {
                i += 2;
                continue;
            }
            b if b == closing => return Some((unescape(&text[start + 1..i]), i + 1)),
            b'(' if closing == b')' => return None,
            _ => {}
        }
        i += 1;
    }
    None
}

/// Resolve backslash escapes of ASCII punctuation
fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(&next) = chars.peek() {
                if next.is_ascii_punctuation() {
                    out.push(next);
                    chars.next();
                    continue;
                }
            }
        }
        out.push(c);
    }
    out
}

fn skip_spaces(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b' ' || bytes[i] == b'\t') {
        i += 1;
    }
    i
}

fn skip_spaces_and_optional_newline(bytes: &[u8], i: usize) -> usize {
    let i = skip_spaces(bytes, i);
    if i < bytes.len() && bytes[i] == b'\n' {
        skip_spaces(bytes, i + 1)
    } else {
        i
    }
}

fn at_line_end(bytes: &[u8], i: usize) -> bool {
    i >= bytes.len() || bytes[i] == b'\n'
}

fn consume_line_end(bytes: &[u8], i: usize) -> usize {
    if i < bytes.len() { i + 1 } else { i }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::LineCursor;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::time::{Duration, Instant};

    fn region(source: &str) -> LineRegion<'_> {
        LineCursor::new(source)
            .map(|line| line.to_string_line())
            .collect()
    }

    fn definition(label: &str, url: &str, line: usize) -> ReferenceDefinition {
        ReferenceDefinition {
            label: label.to_string(),
            label_span: Span::default(),
            url: url.to_string(),
            url_span: Span::default(),
            title: None,
            title_span: None,
            span: Span::default(),
            line,
        }
    }

    #[test]
    fn test_parse_definition_with_title() {
        let source = "[foo]: /url \"title\"";
        let (def, rest) = parse_definition(&region(source)).unwrap();
        assert_eq!(def.label, "foo");
        assert_eq!(def.url, "/url");
        assert_eq!(def.title.as_deref(), Some("title"));
        assert_eq!(def.line, 1);
        assert_eq!(&source[def.label_span.start..def.label_span.end], "foo");
        assert_eq!(&source[def.url_span.start..def.url_span.end], "/url");
        let title_span = def.title_span.unwrap();
        assert_eq!(&source[title_span.start..title_span.end], "\"title\"");
        assert_eq!(def.span, Span::new(0, source.len()));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_spans_are_absolute_after_earlier_lines() {
        let source = "[a]: /a\n[b]: /b 'B'";
        let (first, rest) = parse_definition(&region(source)).unwrap();
        assert_eq!(first.span, Span::new(0, 7));
        let (second, rest) = parse_definition(&rest).unwrap();
        assert_eq!(second.line, 2);
        assert_eq!(second.span, Span::new(8, 19));
        assert_eq!(&source[second.url_span.start..second.url_span.end], "/b");
        assert!(rest.is_empty());
    }

    #[rstest]
    #[case("[foo]: <my url>", "my url", None)]
    #[case("[foo]: <>", "", None)]
    #[case("[foo]: /url 'single'", "/url", Some("single"))]
    #[case("[foo]: /url (paren)", "/url", Some("paren"))]
    #[case("[foo]:\n/url\n\"on its own line\"", "/url", Some("on its own line"))]
    #[case("[foo]: /a(b)c", "/a(b)c", None)]
    #[case("[foo]: /url\\_x \"t\\\"q\"", "/url_x", Some("t\"q"))]
    #[case("   [foo]: /url   ", "/url", None)]
    fn test_definition_forms(
        #[case] source: &str,
        #[case] url: &str,
        #[case] title: Option<&str>,
    ) {
        let (def, rest) = parse_definition(&region(source)).unwrap();
        assert_eq!(def.label, "foo");
        assert_eq!(def.url, url);
        assert_eq!(def.title.as_deref(), title);
        assert!(rest.is_empty());
    }

    #[rstest]
    #[case("Some text")]
    #[case("[foo] /url")]
    #[case("[foo]:")]
    #[case("[]: /url")]
    #[case("[ ]: /url")]
    #[case("[a[b]: /url")]
    #[case("[foo]: /url \"title\" trailing")]
    #[case("[foo]: <bad\nurl>")]
    #[case("[foo]: /a(b")]
    fn test_non_definitions(#[case] source: &str) {
        assert!(parse_definition(&region(source)).is_none());
    }

    #[test]
    fn test_invalid_title_on_next_line_stays_in_region() {
        let (def, rest) = parse_definition(&region("[foo]: /url\n\"title\" ok")).unwrap();
        assert_eq!(def.title, None);
        assert_eq!(rest.to_text(), "\"title\" ok");
        assert_eq!(rest.first().unwrap().line, 2);
    }

    #[test]
    fn test_multiline_title() {
        let (def, rest) = parse_definition(&region("[foo]: /url '\ntitle\nline\n'\ntext")).unwrap();
        assert_eq!(def.title.as_deref(), Some("\ntitle\nline\n"));
        assert_eq!(rest.to_text(), "text");
    }

    #[test]
    fn test_extraction_stops_at_first_non_definition() {
        let source = "[a]: /a\n[b]: /b\nSome text\n[c]: /c";
        let extraction = extract_definitions(region(source));
        assert!(extraction.found());
        let labels: Vec<_> = extraction.definitions.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["a", "b"]);
        assert_eq!(extraction.region.to_text(), "Some text\n[c]: /c");
    }

    #[test]
    fn test_extraction_without_definitions_keeps_region() {
        let lines = region("plain\ntext");
        let extraction = extract_definitions(lines.clone());
        assert!(!extraction.found());
        assert_eq!(extraction.region, lines);
    }

    #[test]
    fn test_label_limit_counts_characters() {
        let wide = format!("[{}]: /url", "é".repeat(600));
        let (def, _) = parse_definition(&region(&wide)).unwrap();
        assert_eq!(def.label.chars().count(), 600);

        let longest = format!("[{}]: /url", "a".repeat(999));
        assert!(parse_definition(&region(&longest)).is_some());

        let too_long = format!("[{}]: /url", "a".repeat(1000));
        assert!(parse_definition(&region(&too_long)).is_none());
    }

    #[test]
    fn test_long_definition_run_extracts_in_linear_time() {
        let count = 20_000;
        let source: String = (0..count).map(|i| format!("[l{i}]: /u{i}\n")).collect();
        let started = Instant::now();
        let extraction = extract_definitions(region(&source));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(extraction.definitions.len(), count);
        assert!(extraction.region.is_empty());

        let last = &extraction.definitions[count - 1];
        assert_eq!(last.line, count);
        assert_eq!(&source[last.url_span.start..last.url_span.end], "/u19999");
    }

    #[test]
    fn test_open_titles_pair_across_lines() {
        // Each `'` closes the title opened on the line before
        let count = 20_000;
        let source: String = (0..count).map(|i| format!("[a{i}]: /a '\n")).collect();
        let started = Instant::now();
        let extraction = extract_definitions(region(&source));
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(extraction.definitions.len(), count / 2);
        assert_eq!(
            extraction.definitions[0].title.as_deref(),
            Some("\n[a1]: /a ")
        );
        assert!(extraction.region.is_empty());
    }

    #[rstest]
    #[case("Foo", "foo")]
    #[case("  Foo \n\t BAR  ", "foo bar")]
    #[case("ẞ", "ss")]
    #[case("ΑΓΩ", "αγω")]
    fn test_normalize_label(#[case] label: &str, #[case] expected: &str) {
        assert_eq!(normalize_label(label), expected);
    }

    #[test]
    fn test_first_definition_wins_by_default() {
        let mut table = ReferenceTable::default();
        assert!(table.register(definition("foo", "/first", 1)));
        assert!(!table.register(definition("foo", "/second", 3)));
        assert_eq!(table.get("FOO").unwrap().url, "/first");
        assert_eq!(table.len(), 1);
        assert_eq!(table.iter().count(), 2);
    }

    #[test]
    fn test_last_definition_wins_when_configured() {
        let mut table = ReferenceTable::new(DuplicateLabelPolicy::LastWins);
        table.register(definition("foo", "/first", 1));
        assert!(table.register(definition("foo", "/second", 3)));
        assert_eq!(table.get("foo").unwrap().url, "/second");
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_register_into_preserves_source_order() {
        let mut table = ReferenceTable::default();
        let rest = extract_definitions(region("[b]: /b\n[a]: /a\n[c]: /c\ntext"))
            .register_into(&mut table);
        let order: Vec<_> = table.iter().map(|d| (d.label.as_str(), d.line)).collect();
        assert_eq!(order, [("b", 1), ("a", 2), ("c", 3)]);
        assert_eq!(rest.to_text(), "text");
    }
}
