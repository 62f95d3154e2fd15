//
// scanner.rs
//
// Tolerant tag/attribute scanner for BuildGraph scripts
//
// The scanner never validates. It walks the text once, emitting open tags,
// close tags and comment delimiters in document order. Anything it cannot
// make sense of is skipped and scanning resumes just after the offending `<`.
//

use regex::Regex;
use std::sync::OnceLock;

use crate::span::SourceSpan;

/// One attribute of an open tag. `value` excludes the quotes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute<'a> {
    pub name: &'a str,
    pub name_span: SourceSpan,
    pub value: &'a str,
    pub value_span: SourceSpan,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenTag<'a> {
    pub name: &'a str,
    pub name_span: SourceSpan,
    pub attributes: Vec<Attribute<'a>>,
    pub self_closing: bool,
    /// From the opening `<` to the closing `>` inclusive.
    pub span: SourceSpan,
}

impl<'a> OpenTag<'a> {
    /// Case-insensitive tag name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// First attribute with the given name, compared case-insensitively.
    pub fn attribute(&self, name: &str) -> Option<&Attribute<'a>> {
        self.attributes
            .iter()
            .find(|attr| attr.name.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagEvent<'a> {
    Open(OpenTag<'a>),
    Close { name: &'a str, span: SourceSpan },
    CommentStart { span: SourceSpan },
    CommentEnd { span: SourceSpan },
}

/// Lazy iterator over the tag events of a document.
///
/// Scanning is restartable: calling [`scan`] again on the same text yields the
/// same events, nothing is carried between scans.
#[derive(Debug, Clone)]
pub struct TagScanner<'a> {
    text: &'a str,
    pos: usize,
    in_comment: bool,
    /// Offset of the `-->` ending the open comment, found once when the
    /// comment starts. `None` inside an unterminated comment.
    comment_close: Option<usize>,
}

pub fn scan(text: &str) -> TagScanner<'_> {
    TagScanner {
        text,
        pos: 0,
        in_comment: false,
        comment_close: None,
    }
}

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

impl<'a> Iterator for TagScanner<'a> {
    type Item = TagEvent<'a>;

    fn next(&mut self) -> Option<TagEvent<'a>> {
        loop {
            let rest = self.text.get(self.pos..)?;
            if rest.is_empty() {
                return None;
            }

            let next_lt = rest.find('<').map(|i| self.pos + i);
            let comment_close = if self.in_comment {
                self.comment_close
            } else {
                None
            };

            if let Some(close) = comment_close {
                if next_lt.map_or(true, |lt| close < lt) {
                    self.in_comment = false;
                    self.comment_close = None;
                    self.pos = close + COMMENT_CLOSE.len();
                    return Some(TagEvent::CommentEnd {
                        span: SourceSpan::new(close, self.pos),
                    });
                }
            }

            let Some(at) = next_lt else {
                self.pos = self.text.len();
                return None;
            };

            if let Some(event) = self.markup_at(at, comment_close) {
                return Some(event);
            }
        }
    }
}

impl<'a> TagScanner<'a> {
    /// Try to read markup starting at the `<` at `at`, advancing `pos` past
    /// whatever was consumed. Returns `None` when nothing should be emitted.
    fn markup_at(&mut self, at: usize, comment_close: Option<usize>) -> Option<TagEvent<'a>> {
        let text = self.text;
        let rest = &text[at..];

        if rest.starts_with(COMMENT_OPEN) {
            if self.in_comment {
                self.pos = at + 1;
                return None;
            }
            self.in_comment = true;
            self.pos = at + COMMENT_OPEN.len();
            self.comment_close = text[self.pos..]
                .find(COMMENT_CLOSE)
                .map(|i| self.pos + i);
            return Some(TagEvent::CommentStart {
                span: SourceSpan::new(at, self.pos),
            });
        }

        if rest.starts_with("<![CDATA[") && !self.in_comment {
            self.pos = rest
                .find("]]>")
                .map(|i| at + i + 3)
                .unwrap_or(self.text.len());
            return None;
        }

        if (rest.starts_with("<!") || rest.starts_with("<?")) && !self.in_comment {
            self.pos = rest.find('>').map(|i| at + i + 1).unwrap_or(self.text.len());
            return None;
        }

        let parsed = if rest.starts_with("</") {
            parse_close_tag(text, at)
        } else {
            parse_open_tag(text, at).map(|tag| {
                let end = tag.span.end;
                (TagEvent::Open(tag), end)
            })
        };

        match parsed {
            // A tag inside a comment must not swallow the comment terminator.
            Some((_, end)) if comment_close.is_some_and(|close| end > close) => {
                self.pos = at + 1;
                None
            }
            Some((event, end)) => {
                self.pos = end;
                Some(event)
            }
            None => {
                self.pos = at + 1;
                None
            }
        }
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b':' || b >= 0x80
}

fn is_name_char(b: u8) -> bool {
    is_name_start(b) || b.is_ascii_digit() || b == b'-' || b == b'.'
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

fn read_name(bytes: &[u8], start: usize) -> Option<usize> {
    if start >= bytes.len() || !is_name_start(bytes[start]) {
        return None;
    }
    let mut i = start + 1;
    while i < bytes.len() && is_name_char(bytes[i]) {
        i += 1;
    }
    Some(i)
}

fn parse_close_tag(text: &str, at: usize) -> Option<(TagEvent<'_>, usize)> {
    let bytes = text.as_bytes();
    let name_start = at + 2;
    let name_end = read_name(bytes, name_start)?;
    let i = skip_whitespace(bytes, name_end);
    if bytes.get(i) != Some(&b'>') {
        return None;
    }
    let span = SourceSpan::new(at, i + 1);
    Some((
        TagEvent::Close {
            name: &text[name_start..name_end],
            span,
        },
        span.end,
    ))
}

fn parse_open_tag(text: &str, at: usize) -> Option<OpenTag<'_>> {
    let bytes = text.as_bytes();
    let name_start = at + 1;
    let name_end = read_name(bytes, name_start)?;
    let mut attributes = Vec::new();
    let mut i = name_end;

    loop {
        i = skip_whitespace(bytes, i);
        match *bytes.get(i)? {
            b'>' => {
                return Some(open_tag(text, at, name_start, name_end, attributes, false, i + 1));
            }
            b'/' if bytes.get(i + 1) == Some(&b'>') => {
                return Some(open_tag(text, at, name_start, name_end, attributes, true, i + 2));
            }
            b if is_name_start(b) => {
                let (attribute, next) = parse_attribute(text, i)?;
                attributes.push(attribute);
                i = next;
            }
            _ => return None,
        }
    }
}

fn open_tag<'a>(
    text: &'a str,
    at: usize,
    name_start: usize,
    name_end: usize,
    attributes: Vec<Attribute<'a>>,
    self_closing: bool,
    end: usize,
) -> OpenTag<'a> {
    OpenTag {
        name: &text[name_start..name_end],
        name_span: SourceSpan::new(name_start, name_end),
        attributes,
        self_closing,
        span: SourceSpan::new(at, end),
    }
}

/// Parse `name = "value"` starting at `start`; returns the attribute and the
/// index just past the closing quote.
fn parse_attribute(text: &str, start: usize) -> Option<(Attribute<'_>, usize)> {
    let bytes = text.as_bytes();
    let name_end = read_name(bytes, start)?;
    let mut i = skip_whitespace(bytes, name_end);
    if bytes.get(i) != Some(&b'=') {
        return None;
    }
    i = skip_whitespace(bytes, i + 1);
    let quote = *bytes.get(i)?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let value_start = i + 1;
    let value_len = bytes.get(value_start..)?.iter().position(|&b| b == quote)?;
    let value_end = value_start + value_len;
    let value = &text[value_start..value_end];
    // An unterminated quote would otherwise run into the next tag.
    if value.contains('<') {
        return None;
    }
    Some((
        Attribute {
            name: &text[start..name_end],
            name_span: SourceSpan::new(start, name_end),
            value,
            value_span: SourceSpan::new(value_start, value_end),
        },
        value_end + 1,
    ))
}

// ============================================================================
// Comment-aware helpers
// ============================================================================

/// Spans of every comment, from `<!--` through `-->` (or end of text when the
/// comment is never closed).
pub fn comment_spans(text: &str) -> Vec<SourceSpan> {
    let mut spans = Vec::new();
    let mut open: Option<usize> = None;
    for event in scan(text) {
        match event {
            TagEvent::CommentStart { span } => open = Some(span.start),
            TagEvent::CommentEnd { span } => {
                if let Some(start) = open.take() {
                    spans.push(SourceSpan::new(start, span.end));
                }
            }
            _ => {}
        }
    }
    if let Some(start) = open {
        spans.push(SourceSpan::new(start, text.len()));
    }
    spans
}

/// True when `offset` falls strictly inside one of the comment spans.
pub fn in_comment(comments: &[SourceSpan], offset: usize) -> bool {
    comments
        .iter()
        .any(|span| span.start <= offset && offset < span.end)
}

/// Open tags that are not inside a comment, in document order.
pub fn open_tags(text: &str) -> Vec<OpenTag<'_>> {
    let mut tags = Vec::new();
    let mut commented = false;
    for event in scan(text) {
        match event {
            TagEvent::CommentStart { .. } => commented = true,
            TagEvent::CommentEnd { .. } => commented = false,
            TagEvent::Open(tag) if !commented => tags.push(tag),
            _ => {}
        }
    }
    tags
}

/// An `<Include Script="...">` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRef<'a> {
    pub path: &'a str,
    pub path_span: SourceSpan,
    pub tag_span: SourceSpan,
}

/// Every include reference outside comments, in document order.
pub fn include_references(text: &str) -> Vec<IncludeRef<'_>> {
    open_tags(text)
        .into_iter()
        .filter(|tag| tag.is("Include"))
        .filter_map(|tag| {
            let script = tag.attribute("Script")?;
            Some(IncludeRef {
                path: script.value,
                path_span: script.value_span,
                tag_span: tag.span,
            })
        })
        .collect()
}

// ============================================================================
// Inline tokens: #Tag and $(Variable)
// ============================================================================

/// A `#name` or `$(name)` token found in free text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InlineToken<'a> {
    /// Identifier without the `#` / `$(` `)` decoration.
    pub name: &'a str,
    /// Whole token including decoration.
    pub span: SourceSpan,
    pub name_span: SourceSpan,
}

struct InlinePatterns {
    tag: Regex,
    variable: Regex,
}

fn patterns() -> &'static InlinePatterns {
    static PATTERNS: OnceLock<InlinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| InlinePatterns {
        tag: Regex::new(r"#([A-Za-z0-9_]+)").unwrap(),
        variable: Regex::new(r"\$\(([A-Za-z0-9_]+)\)").unwrap(),
    })
}

fn tokens<'a>(pattern: &'static Regex, text: &'a str) -> impl Iterator<Item = InlineToken<'a>> + 'a {
    pattern.captures_iter(text).filter_map(|caps| {
        let whole = caps.get(0)?;
        let name = caps.get(1)?;
        Some(InlineToken {
            name: name.as_str(),
            span: SourceSpan::new(whole.start(), whole.end()),
            name_span: SourceSpan::new(name.start(), name.end()),
        })
    })
}

/// `#name` tokens in `text`, left to right. Spans are relative to `text`.
pub fn tag_tokens(text: &str) -> impl Iterator<Item = InlineToken<'_>> + '_ {
    tokens(&patterns().tag, text)
}

/// `$(name)` tokens in `text`, left to right. Spans are relative to `text`.
pub fn variable_tokens(text: &str) -> impl Iterator<Item = InlineToken<'_>> + '_ {
    tokens(&patterns().variable, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_names(text: &str) -> Vec<&str> {
        scan(text)
            .filter_map(|event| match event {
                TagEvent::Open(tag) => Some(tag.name),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_open_tag_with_attributes() {
        let text = r##"<Node Name="Compile Editor" Requires="#Tools">"##;
        let events: Vec<_> = scan(text).collect();
        assert_eq!(events.len(), 1);
        let TagEvent::Open(tag) = &events[0] else {
            panic!("expected open tag, got {:?}", events[0]);
        };
        assert_eq!(tag.name, "Node");
        assert!(!tag.self_closing);
        assert_eq!(tag.span, SourceSpan::new(0, text.len()));
        let name = tag.attribute("name").unwrap();
        assert_eq!(name.value, "Compile Editor");
        assert_eq!(name.value_span.slice(text), "Compile Editor");
        assert_eq!(tag.attribute("REQUIRES").unwrap().value, "#Tools");
    }

    #[test]
    fn test_self_closing_and_close_tags() {
        let text = "<Agent Name=\"A\">\n  <Property Name=\"X\" Value=\"1\"/>\n</Agent>";
        let events: Vec<_> = scan(text).collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(&events[1], TagEvent::Open(tag) if tag.self_closing && tag.is("property")));
        match &events[2] {
            TagEvent::Close { name, span } => {
                assert_eq!(*name, "Agent");
                assert_eq!(span.slice(text), "</Agent>");
            }
            other => panic!("expected close tag, got {:?}", other),
        }
    }

    #[test]
    fn test_single_quotes_and_gt_inside_value() {
        let text = "<Do If='$(Count) > 1'><Log Message=\"a\"/></Do>";
        assert_eq!(open_names(text), vec!["Do", "Log"]);
        let tags = open_tags(text);
        assert_eq!(tags[0].attribute("If").unwrap().value, "$(Count) > 1");
    }

    #[test]
    fn test_comment_events_surround_inner_tags() {
        let text = "<!-- <Node Name=\"Dead\"/> --><Node Name=\"Live\"/>";
        let events: Vec<_> = scan(text).collect();
        assert!(matches!(events[0], TagEvent::CommentStart { span } if span == SourceSpan::new(0, 4)));
        assert!(matches!(&events[1], TagEvent::Open(tag) if tag.attribute("Name").unwrap().value == "Dead"));
        assert!(matches!(events[2], TagEvent::CommentEnd { .. }));
        assert!(matches!(&events[3], TagEvent::Open(tag) if tag.attribute("Name").unwrap().value == "Live"));

        let live: Vec<_> = open_tags(text)
            .iter()
            .map(|tag| tag.attribute("Name").unwrap().value)
            .collect();
        assert_eq!(live, vec!["Live"]);
    }

    #[test]
    fn test_unterminated_comment_runs_to_end() {
        let text = "<Node Name=\"A\"/><!-- <Node Name=\"B\"/>";
        assert_eq!(comment_spans(text), vec![SourceSpan::new(16, text.len())]);
        assert_eq!(open_tags(text).len(), 1);
    }

    #[test]
    fn test_unterminated_comment_with_many_tags() {
        let mut text = String::from("<Node Name=\"A\"/><!--");
        for _ in 0..20_000 {
            text.push_str("<Log/> < ");
        }
        let events: Vec<_> = scan(&text).collect();
        assert!(matches!(events[1], TagEvent::CommentStart { span } if span == SourceSpan::new(16, 20)));
        assert!(events[2..].iter().all(|e| matches!(e, TagEvent::Open(tag) if tag.is("Log"))));
        assert_eq!(comment_spans(&text), vec![SourceSpan::new(16, text.len())]);
        assert_eq!(open_tags(&text).len(), 1);
    }

    #[test]
    fn test_consecutive_comments_each_find_their_own_end() {
        let text = "<!-- <!-- a --><Node Name=\"X\"/><!-- b --><!-- c";
        let spans: Vec<_> = comment_spans(text).iter().map(|s| s.slice(text)).collect();
        assert_eq!(spans, vec!["<!-- <!-- a -->", "<!-- b -->", "<!-- c"]);
        assert_eq!(open_tags(text).len(), 1);
    }

    #[test]
    fn test_malformed_tags_are_skipped() {
        let text = "<Node Name=\"A\" <Macro Name=\"M\"/> < 3 <Bare attr> </ > <Option Name=\"O\"/>";
        assert_eq!(open_names(text), vec!["Macro", "Option"]);
    }

    #[test]
    fn test_unterminated_quote_does_not_swallow_next_tag() {
        let text = "<Node Name=\"A/>\n<Macro Name=\"M\"/>";
        assert_eq!(open_names(text), vec!["Macro"]);
    }

    #[test]
    fn test_declarations_and_cdata_are_skipped() {
        let text = "<?xml version=\"1.0\"?><!DOCTYPE x><![CDATA[<Node Name=\"X\"/>]]><BuildGraph>";
        assert_eq!(open_names(text), vec!["BuildGraph"]);
    }

    #[test]
    fn test_multiline_tag() {
        let text = "<Node\n    Name=\"Build\"\n    Produces=\"#Out\"\n/>";
        let tags = open_tags(text);
        assert_eq!(tags.len(), 1);
        assert!(tags[0].self_closing);
        assert_eq!(tags[0].attribute("Produces").unwrap().value, "#Out");
    }

    #[test]
    fn test_include_references() {
        let text = "<Include Script=\"Common.xml\"/>\n<!-- <Include Script=\"Old.xml\"/> -->\n<include script='../Shared/Tasks.xml'/>";
        let includes = include_references(text);
        let paths: Vec<_> = includes.iter().map(|i| i.path).collect();
        assert_eq!(paths, vec!["Common.xml", "../Shared/Tasks.xml"]);
        assert_eq!(includes[0].path_span.slice(text), "Common.xml");
    }

    #[test]
    fn test_inline_tokens() {
        let text = "Produces=\"#Editor;#Tools\" Value=\"$(Root)/$(Platform)\"";
        let tags: Vec<_> = tag_tokens(text).map(|t| t.name).collect();
        assert_eq!(tags, vec!["Editor", "Tools"]);
        let vars: Vec<_> = variable_tokens(text).collect();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars[0].name, "Root");
        assert_eq!(vars[0].span.slice(text), "$(Root)");
        assert_eq!(vars[1].name_span.slice(text), "Platform");
    }

    #[test]
    fn test_scan_is_restartable() {
        let text = "<A><!-- x --><B/></A>";
        let first: Vec<_> = scan(text).collect();
        let second: Vec<_> = scan(text).collect();
        assert_eq!(first, second);
    }
}
