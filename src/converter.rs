//! Markdown converter - transforms body markup trees to Markdown
//!
//! This module provides the core conversion logic for turning an article body,
//! parsed into [`MarkupNode`]s, into Markdown.
//!
//! # Conversion Strategy
//!
//! The converter uses a depth-first traversal in document order. Each element
//! is dispatched by tag name to an [`ElementHandler`]; text nodes are copied
//! verbatim after percent-decoding. Nothing is reordered or deduplicated.
//!
//! # Element Handlers
//!
//! | tag | output |
//! |---|---|
//! | `h1`..`h6` | `#`×level, a space, the heading text, then a blank line |
//! | `p` | paragraph text, then a blank line |
//! | `a` | `[text](href)`; the href itself stands in for missing text |
//! | `img` | `![alt](src)` |
//!
//! A missing `href`, `src` or `alt` attribute counts as empty, so `<a>x</a>`
//! still becomes `[x]()` and an empty heading still emits its markers.
//! | `ul` / `ol` | one `- ` / `N. ` line per `li`, numbered from 1 per list |
//! | `figure` | the figure content, then the `figcaption` in italics below it |
//! | `br` | a line break |
//!
//! Any other tag is transparent: its children are converted in place, the tag
//! contributes no markup, and the unsupported-tag counter goes up. This never
//! fails a conversion.
//!
//! # Examples
//!
//! ## Headings and Paragraphs
//!
//! Input HTML:
//! ```html
//! <h2>Subtitle</h2>
//! <p>Some <a href="https://example.com">linked</a> content.</p>
//! ```
//!
//! Output Markdown:
//! ```markdown
//! ## Subtitle
//!
//! Some [linked](https://example.com) content.
//! ```
//!
//! ## Lists
//!
//! Input HTML:
//! ```html
//! <ol><li>First</li><li>Second <ul><li>Nested</li></ul></li></ol>
//! ```
//!
//! Output Markdown:
//! ```markdown
//! 1. First
//! 2. Second
//!    - Nested
//! ```
//!
//! # Output Normalization
//!
//! After traversal, line endings become LF, trailing whitespace is removed from
//! every line, runs of blank lines collapse to one, and leading and trailing
//! blank lines are dropped. The result has no trailing newline.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::RecordError;
use crate::parser::{MarkupElement, MarkupNode, parse_fragment};
use crate::security::{MAX_NESTING_DEPTH, SecurityValidator};

/// Conversion options
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Maximum element nesting accepted in a body
    pub max_nesting_depth: usize,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: MAX_NESTING_DEPTH,
        }
    }
}

/// Markdown produced for one article body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversionResult {
    pub markdown: String,
    /// Number of elements whose tag has no handler
    pub unsupported_tags: usize,
    /// Distinct tag names behind `unsupported_tags`
    pub unsupported_names: BTreeSet<String>,
}

/// Handler selected for a supported tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementHandler {
    Heading(usize),
    Paragraph,
    Link,
    Image,
    UnorderedList,
    OrderedList,
    Figure,
    LineBreak,
}

impl ElementHandler {
    /// Look up the handler for a tag; `None` means the tag is unsupported
    pub fn for_tag(tag: &str) -> Option<Self> {
        let handler = match tag {
            "h1" => ElementHandler::Heading(1),
            "h2" => ElementHandler::Heading(2),
            "h3" => ElementHandler::Heading(3),
            "h4" => ElementHandler::Heading(4),
            "h5" => ElementHandler::Heading(5),
            "h6" => ElementHandler::Heading(6),
            "p" => ElementHandler::Paragraph,
            "a" => ElementHandler::Link,
            "img" => ElementHandler::Image,
            "ul" => ElementHandler::UnorderedList,
            "ol" => ElementHandler::OrderedList,
            "figure" => ElementHandler::Figure,
            "br" => ElementHandler::LineBreak,
            _ => return None,
        };
        Some(handler)
    }
}

/// Per-call traversal state
#[derive(Default)]
struct Traversal {
    unsupported_tags: usize,
    unsupported_names: BTreeSet<String>,
    /// Number of `figure` bodies currently being rendered
    figure_depth: usize,
}

impl Traversal {
    fn record_unsupported(&mut self, tag: &str) {
        self.unsupported_tags += 1;
        if !self.unsupported_names.contains(tag) {
            self.unsupported_names.insert(tag.to_string());
        }
    }
}

/// Main Markdown converter
///
/// Stateless between calls: every conversion owns its own counters, so one
/// converter can serve a whole export run.
///
/// ```rust
/// use article_export_markdown::converter::MarkdownConverter;
///
/// let converter = MarkdownConverter::new();
/// let result = converter.convert_html("<h1>Hello</h1><p>World</p>").unwrap();
/// assert_eq!(result.markdown, "# Hello\n\nWorld");
/// ```
pub struct MarkdownConverter {
    security_validator: SecurityValidator,
}

impl MarkdownConverter {
    /// Create a new converter with default options
    pub fn new() -> Self {
        Self::with_options(ConversionOptions::default())
    }

    /// Create a new converter with custom options
    pub fn with_options(options: ConversionOptions) -> Self {
        Self {
            security_validator: SecurityValidator::with_max_depth(options.max_nesting_depth),
        }
    }

    /// Parse an HTML body fragment and convert it
    ///
    /// # Errors
    ///
    /// `RecordError::Markup` if the fragment nests too deeply.
    pub fn convert_html(&self, html: &str) -> Result<ConversionResult, RecordError> {
        let nodes = parse_fragment(html, &self.security_validator)?;
        Ok(self.convert(&nodes))
    }

    /// Convert a markup tree to Markdown
    pub fn convert(&self, nodes: &[MarkupNode]) -> ConversionResult {
        let mut state = Traversal::default();
        let mut output = String::with_capacity(1024);

        self.traverse_nodes(nodes, &mut output, &mut state);

        ConversionResult {
            markdown: normalize_output(&output),
            unsupported_tags: state.unsupported_tags,
            unsupported_names: state.unsupported_names,
        }
    }

    fn traverse_nodes(&self, nodes: &[MarkupNode], output: &mut String, state: &mut Traversal) {
        for node in nodes {
            self.traverse_node(node, output, state);
        }
    }

    /// Convert one node, appending to `output`
    fn traverse_node(&self, node: &MarkupNode, output: &mut String, state: &mut Traversal) {
        match node {
            MarkupNode::Text(text) => output.push_str(&decode_text(text)),
            // Rendered by the enclosing figure
            MarkupNode::Element(element)
                if element.tag == "figcaption" && state.figure_depth > 0 => {}
            MarkupNode::Element(element) => match ElementHandler::for_tag(&element.tag) {
                Some(handler) => self.handle_element(handler, element, output, state),
                None => {
                    // Unsupported: transparent container
                    state.record_unsupported(&element.tag);
                    self.traverse_nodes(&element.children, output, state);
                }
            },
        }
    }

    fn handle_element(
        &self,
        handler: ElementHandler,
        element: &MarkupElement,
        output: &mut String,
        state: &mut Traversal,
    ) {
        match handler {
            ElementHandler::Heading(level) => self.handle_heading(element, level, output, state),
            ElementHandler::Paragraph => self.handle_paragraph(element, output, state),
            ElementHandler::Link => self.handle_link(element, output, state),
            ElementHandler::Image => self.handle_image(element, output),
            ElementHandler::UnorderedList => self.handle_list(element, false, output, state),
            ElementHandler::OrderedList => self.handle_list(element, true, output, state),
            ElementHandler::Figure => self.handle_figure(element, output, state),
            ElementHandler::LineBreak => output.push('\n'),
        }
    }

    /// Convert children into a fresh buffer
    fn render_children(&self, element: &MarkupElement, state: &mut Traversal) -> String {
        let mut buffer = String::new();
        self.traverse_nodes(&element.children, &mut buffer, state);
        buffer
    }

    /// Handle heading elements (h1-h6)
    ///
    /// The heading text is folded onto a single line. An empty heading keeps
    /// its `#` markers.
    fn handle_heading(
        &self,
        element: &MarkupElement,
        level: usize,
        output: &mut String,
        state: &mut Traversal,
    ) {
        let content = fold_line(&self.render_children(element, state));

        ensure_block_start(output);
        for _ in 0..level {
            output.push('#');
        }
        output.push(' ');
        output.push_str(&content);
        output.push_str("\n\n");
    }

    /// Handle paragraph elements
    ///
    /// No inline markup is added; line breaks from `br` survive inside the
    /// paragraph.
    fn handle_paragraph(&self, element: &MarkupElement, output: &mut String, state: &mut Traversal) {
        let content = self.render_children(element, state);
        let content = content.trim();
        if content.is_empty() {
            return;
        }

        ensure_block_start(output);
        output.push_str(content);
        output.push_str("\n\n");
    }

    /// Handle anchor (link) elements
    ///
    /// `<a href="X">text</a>` becomes `[text](X)`. A link without text shows
    /// its href.
    fn handle_link(&self, element: &MarkupElement, output: &mut String, state: &mut Traversal) {
        let text = fold_line(&self.render_children(element, state));
        let href = element.attr("href").unwrap_or_default();

        output.push('[');
        if text.is_empty() {
            output.push_str(href);
        } else {
            output.push_str(&text);
        }
        output.push_str("](");
        output.push_str(href);
        output.push(')');
    }

    /// Handle image elements
    ///
    /// `<img src="Y" alt="Z">` becomes `![Z](Y)`.
    fn handle_image(&self, element: &MarkupElement, output: &mut String) {
        let src = element.attr("src").unwrap_or_default();
        let alt = element.attr("alt").map(fold_line).unwrap_or_default();

        output.push_str("![");
        output.push_str(&alt);
        output.push_str("](");
        output.push_str(src);
        output.push(')');
    }

    /// Handle list elements (ul/ol)
    ///
    /// Each direct `li` child becomes one item. Ordered lists are numbered
    /// from 1 regardless of a `start` attribute. Continuation lines of an item
    /// (line breaks, nested lists) are indented under the marker. Anything
    /// else directly inside the list is converted and kept on its own line.
    fn handle_list(
        &self,
        element: &MarkupElement,
        ordered: bool,
        output: &mut String,
        state: &mut Traversal,
    ) {
        if ordered && element.attr("start").is_some() {
            debug!("ignoring <ol start>, list numbered from 1");
        }

        let mut lines: Vec<String> = Vec::new();
        let mut position = 0;

        for child in &element.children {
            match child {
                MarkupNode::Element(item) if item.tag == "li" => {
                    position += 1;
                    let marker = if ordered {
                        format!("{position}. ")
                    } else {
                        "- ".to_string()
                    };
                    let content = self.render_children(item, state);
                    lines.push(list_item(&marker, &content));
                }
                other => {
                    let mut buffer = String::new();
                    self.traverse_node(other, &mut buffer, state);
                    let buffer = buffer.trim();
                    if !buffer.is_empty() {
                        lines.push(buffer.to_string());
                    }
                }
            }
        }

        if lines.is_empty() {
            return;
        }

        ensure_block_start(output);
        output.push_str(&lines.join("\n"));
        output.push_str("\n\n");
    }

    /// Handle figure elements
    ///
    /// The figure body (normally an `img`, possibly wrapped in a link) is
    /// converted first; a `figcaption` follows on the next line in italics.
    /// Captions nested anywhere in the body are left out of it.
    fn handle_figure(&self, element: &MarkupElement, output: &mut String, state: &mut Traversal) {
        let mut body = String::new();
        state.figure_depth += 1;
        self.traverse_nodes(&element.children, &mut body, state);
        state.figure_depth -= 1;

        let caption = element
            .find_descendant("figcaption")
            .map(|caption| fold_line(&self.render_children(caption, state)))
            .unwrap_or_default();

        let body = body.trim();
        if body.is_empty() && caption.is_empty() {
            return;
        }

        ensure_block_start(output);
        output.push_str(body);
        if !caption.is_empty() {
            if !body.is_empty() {
                output.push('\n');
            }
            output.push('*');
            output.push_str(&caption);
            output.push('*');
        }
        output.push_str("\n\n");
    }
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode percent-encoded sequences in a text node
///
/// Character references were already resolved by the HTML parser. Each run
/// of `%XX` sequences is decoded on its own; bytes that do not form valid
/// UTF-8 keep their original `%XX` spelling, and stray `%` signs are left
/// alone.
///
/// ```rust
/// use article_export_markdown::converter::decode_text;
///
/// assert_eq!(decode_text("caf%C3%A9 and %FF"), "café and %FF");
/// assert_eq!(decode_text("100%"), "100%");
/// ```
pub fn decode_text(text: &str) -> String {
    if !text.contains('%') {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let mut result = String::with_capacity(text.len());
    let mut plain_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if !is_percent_sequence(bytes, i) {
            i += 1;
            continue;
        }
        // `%` is ASCII, so both ends of the run are char boundaries
        result.push_str(&text[plain_start..i]);
        let run_start = i;
        while is_percent_sequence(bytes, i) {
            i += 3;
        }
        push_decoded_run(&mut result, &text[run_start..i]);
        plain_start = i;
    }

    result.push_str(&text[plain_start..]);
    result
}

fn is_percent_sequence(bytes: &[u8], at: usize) -> bool {
    matches!(
        bytes.get(at..at + 3),
        Some([b'%', high, low]) if high.is_ascii_hexdigit() && low.is_ascii_hexdigit()
    )
}

/// Append a run of `%XX` sequences, decoded where the bytes are UTF-8
fn push_decoded_run(result: &mut String, run: &str) {
    let decoded = urlencoding::decode_binary(run.as_bytes());
    let mut rest: &[u8] = &decoded;
    // Every decoded byte came from exactly three characters of `run`
    let mut consumed = 0;

    loop {
        match std::str::from_utf8(rest) {
            Ok(valid) => {
                result.push_str(valid);
                return;
            }
            Err(err) => {
                let valid_len = err.valid_up_to();
                let invalid_len = err.error_len().unwrap_or(rest.len() - valid_len);
                result.push_str(&String::from_utf8_lossy(&rest[..valid_len]));

                let source_start = (consumed + valid_len) * 3;
                let source_end = source_start + invalid_len * 3;
                result.push_str(&run[source_start..source_end]);

                consumed += valid_len + invalid_len;
                rest = &rest[valid_len + invalid_len..];
            }
        }
    }
}

/// Ensure a blank line before a block (if not at start)
fn ensure_block_start(output: &mut String) {
    if output.trim().is_empty() {
        output.clear();
        return;
    }
    if !output.ends_with("\n\n") {
        if output.ends_with('\n') {
            output.push('\n');
        } else {
            output.push_str("\n\n");
        }
    }
}

/// Fold converted content onto one line
fn fold_line(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render one list item: marker + first line, then indented continuation lines
fn list_item(marker: &str, content: &str) -> String {
    let indent = " ".repeat(marker.len());
    let mut lines = content
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty());

    let mut item = String::new();
    match lines.next() {
        Some(first) => {
            item.push_str(marker);
            item.push_str(first.trim_start());
        }
        None => item.push_str(marker.trim_end()),
    }
    for line in lines {
        item.push('\n');
        item.push_str(&indent);
        item.push_str(line);
    }
    item
}

/// Normalize final output
///
/// 1. **Line Endings**: CRLF becomes LF
/// 2. **Trailing Whitespace**: removed from every line
/// 3. **Blank Lines**: consecutive blank lines collapse to one
/// 4. **Edges**: leading and trailing blank lines are dropped, no final newline
pub fn normalize_output(output: &str) -> String {
    let output = output.replace("\r\n", "\n");

    let mut result = String::with_capacity(output.len());
    let mut pending_blank = false;

    for line in output.lines() {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            pending_blank = !result.is_empty();
            continue;
        }
        if !result.is_empty() {
            result.push('\n');
            if pending_blank {
                result.push('\n');
            }
        }
        result.push_str(trimmed);
        pending_blank = false;
    }

    result
}
