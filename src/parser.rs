//! Body fragment parsing using html5ever
//!
//! Article bodies are HTML/XHTML fragments. They are parsed with html5ever,
//! which follows the WHATWG parsing algorithm and therefore accepts whatever
//! an export happens to contain, then copied into an owned [`MarkupNode`] tree
//! that the converter walks read-only.
//!
//! # Examples
//!
//! ```rust
//! use article_export_markdown::parser::{parse_fragment, MarkupNode};
//! use article_export_markdown::security::SecurityValidator;
//!
//! let nodes = parse_fragment("<p>Hello</p>", &SecurityValidator::new()).unwrap();
//! assert!(matches!(&nodes[0], MarkupNode::Element(e) if e.tag == "p"));
//! ```
//!
//! # Tree Shape
//!
//! - The `html`, `head` and `body` wrappers html5ever adds are removed; their
//!   children become the top-level nodes, in document order
//! - Comments, doctypes and processing instructions are dropped
//! - `name` and `id` attributes are dropped, every other attribute is kept

use html5ever::parse_document;
use html5ever::tendril::TendrilSink;
use markup5ever_rcdom::{Handle, NodeData, RcDom};

use crate::error::RecordError;
use crate::security::SecurityValidator;

/// Attributes that never reach the converter
const DROPPED_ATTRIBUTES: &[&str] = &["name", "id"];

/// A node of a parsed body fragment
#[derive(Debug, Clone, PartialEq)]
pub enum MarkupNode {
    /// Text with character references already decoded
    Text(String),
    Element(MarkupElement),
}

/// An element node
#[derive(Debug, Clone, PartialEq)]
pub struct MarkupElement {
    /// Lowercase local name
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
}

impl MarkupElement {
    /// Build an element (used by tests and callers assembling trees by hand)
    pub fn new(tag: &str, attrs: &[(&str, &str)], children: Vec<MarkupNode>) -> Self {
        Self {
            tag: tag.to_string(),
            attrs: attrs
                .iter()
                .filter(|(k, _)| !DROPPED_ATTRIBUTES.contains(k))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            children,
        }
    }

    /// Look up an attribute value
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// First descendant element with the given tag (pre-order, excluding self)
    pub fn find_descendant(&self, tag: &str) -> Option<&MarkupElement> {
        for child in &self.children {
            if let MarkupNode::Element(e) = child {
                if e.tag == tag {
                    return Some(e);
                }
                if let Some(found) = e.find_descendant(tag) {
                    return Some(found);
                }
            }
        }
        None
    }
}

impl MarkupNode {
    /// Text leaf
    pub fn text(text: &str) -> Self {
        MarkupNode::Text(text.to_string())
    }

    /// Element node
    pub fn element(tag: &str, attrs: &[(&str, &str)], children: Vec<MarkupNode>) -> Self {
        MarkupNode::Element(MarkupElement::new(tag, attrs, children))
    }
}

/// Parse an HTML body fragment into owned markup nodes
///
/// # Errors
///
/// `RecordError::Markup` when elements nest deeper than the validator allows.
/// html5ever itself never rejects input.
pub fn parse_fragment(
    html: &str,
    validator: &SecurityValidator,
) -> Result<Vec<MarkupNode>, RecordError> {
    if html.trim().is_empty() {
        return Ok(Vec::new());
    }

    let dom = parse_document(RcDom::default(), Default::default()).one(html);

    let mut nodes = Vec::new();
    for top in dom.document.children.borrow().iter() {
        if !is_element(top, "html") {
            continue;
        }
        // head and body: fragments that start with e.g. <meta> land in head
        for section in top.children.borrow().iter() {
            for child in section.children.borrow().iter() {
                if let Some(node) = copy_node(child, 1, validator)? {
                    nodes.push(node);
                }
            }
        }
    }

    Ok(nodes)
}

fn is_element(node: &Handle, tag: &str) -> bool {
    matches!(node.data, NodeData::Element { ref name, .. } if name.local.as_ref() == tag)
}

fn copy_node(
    node: &Handle,
    depth: usize,
    validator: &SecurityValidator,
) -> Result<Option<MarkupNode>, RecordError> {
    match node.data {
        NodeData::Text { ref contents } => Ok(Some(MarkupNode::Text(contents.borrow().to_string()))),
        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            validator.validate_depth(depth)?;

            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| (attr.name.local.as_ref().to_string(), attr.value.to_string()))
                .filter(|(k, _)| !DROPPED_ATTRIBUTES.contains(&k.as_str()))
                .collect();

            let mut children = Vec::new();
            for child in node.children.borrow().iter() {
                if let Some(copied) = copy_node(child, depth + 1, validator)? {
                    children.push(copied);
                }
            }

            Ok(Some(MarkupNode::Element(MarkupElement {
                tag: name.local.as_ref().to_string(),
                attrs,
                children,
            })))
        }
        NodeData::Document
        | NodeData::Doctype { .. }
        | NodeData::Comment { .. }
        | NodeData::ProcessingInstruction { .. } => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(html: &str) -> Vec<MarkupNode> {
        parse_fragment(html, &SecurityValidator::new()).expect("Parse failed")
    }

    fn first_element(nodes: &[MarkupNode]) -> &MarkupElement {
        nodes
            .iter()
            .find_map(|n| match n {
                MarkupNode::Element(e) => Some(e),
                _ => None,
            })
            .expect("no element")
    }

    #[test]
    fn test_parse_simple_fragment() {
        let nodes = parse("<p>Hello</p>");
        assert_eq!(
            nodes,
            vec![MarkupNode::element("p", &[], vec![MarkupNode::text("Hello")])]
        );
    }

    #[test]
    fn test_parse_empty_fragment() {
        assert!(parse("").is_empty());
        assert!(parse("  \n ").is_empty());
    }

    #[test]
    fn test_parse_text_only_fragment() {
        assert_eq!(parse("just text"), vec![MarkupNode::text("just text")]);
    }

    #[test]
    fn test_parse_drops_comments() {
        let nodes = parse("<!-- wp:paragraph --><p>Text</p><!-- /wp:paragraph -->");
        assert_eq!(nodes.len(), 1);
        assert_eq!(first_element(&nodes).tag, "p");
    }

    #[test]
    fn test_parse_drops_name_and_id() {
        let nodes = parse(r#"<span name="x" id="y" class="c">hi</span>"#);
        let span = first_element(&nodes);
        assert_eq!(span.attrs, vec![("class".to_string(), "c".to_string())]);
    }

    #[test]
    fn test_parse_decodes_entities() {
        let nodes = parse("<p>caf&eacute; &amp; &#x41;</p>");
        let p = first_element(&nodes);
        assert_eq!(p.children, vec![MarkupNode::text("café & A")]);
    }

    #[test]
    fn test_parse_malformed_fragment() {
        let nodes = parse("<p>Unclosed <b>bold");
        assert_eq!(first_element(&nodes).tag, "p");
    }

    #[test]
    fn test_parse_keeps_document_order() {
        let nodes = parse("<h1>A</h1><p>B</p><ul><li>C</li></ul>");
        let tags: Vec<&str> = nodes
            .iter()
            .filter_map(|n| match n {
                MarkupNode::Element(e) => Some(e.tag.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tags, vec!["h1", "p", "ul"]);
    }

    #[test]
    fn test_parse_depth_limit() {
        let html = format!("{}x{}", "<div>".repeat(20), "</div>".repeat(20));
        let result = parse_fragment(&html, &SecurityValidator::with_max_depth(10));
        assert!(matches!(result, Err(RecordError::Markup(_))));

        let result = parse_fragment(&html, &SecurityValidator::with_max_depth(25));
        assert!(result.is_ok());
    }

    #[test]
    fn test_find_descendant() {
        let nodes = parse(r#"<figure><a href="/x"><img src="a.png"></a><figcaption>Cap</figcaption></figure>"#);
        let figure = first_element(&nodes);
        let img = figure.find_descendant("img").expect("img missing");
        assert_eq!(img.attr("src"), Some("a.png"));
        assert!(figure.find_descendant("table").is_none());
    }
}
