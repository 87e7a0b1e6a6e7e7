//! Owned, namespace-resolved XML element tree
//!
//! The export is parsed once with `quick-xml`'s namespace-aware reader into a
//! small tree of [`XmlElement`]s. Anything that is not well-formed XML
//! (mismatched or unclosed tags, unbound prefixes, undefined entities, several
//! root elements) is reported as [`ConversionError::StructuralParse`] with the
//! line and column where the reader stopped. So is nesting deeper than the
//! [`SecurityValidator`] allows.

use quick_xml::NsReader;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use std::collections::BTreeSet;

use crate::error::{ConversionError, TextPosition};
use crate::security::SecurityValidator;

/// A node inside an [`XmlElement`]
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Character data, with entities and CDATA sections already resolved
    Text(String),
}

/// An element with its resolved namespace URI and local name
#[derive(Debug, Clone, PartialEq)]
pub struct XmlElement {
    pub namespace: Option<String>,
    pub name: String,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    fn new(namespace: Option<String>, name: String) -> Self {
        Self {
            namespace,
            name,
            children: Vec::new(),
        }
    }

    /// Direct child elements in document order
    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|node| match node {
            XmlNode::Element(element) => Some(element),
            XmlNode::Text(_) => None,
        })
    }

    /// Concatenated direct text content (not descending into child elements)
    pub fn text(&self) -> String {
        let mut text = String::new();
        for node in &self.children {
            if let XmlNode::Text(t) = node {
                text.push_str(t);
            }
        }
        text
    }

    /// True when the element has no child elements
    pub fn is_leaf(&self) -> bool {
        self.child_elements().next().is_none()
    }

    /// True when the element's namespace URI contains `fragment`
    pub fn namespace_contains(&self, fragment: &str) -> bool {
        self.namespace
            .as_deref()
            .is_some_and(|ns| ns.contains(fragment))
    }

    /// Pre-order walk over this element and all of its descendants
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

/// Iterator returned by [`XmlElement::descendants`]
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        // Reverse so the first child is visited next
        let children: Vec<&XmlElement> = element.child_elements().collect();
        self.stack.extend(children.into_iter().rev());
        Some(element)
    }
}

/// A parsed XML document
#[derive(Debug, Clone, PartialEq)]
pub struct XmlDocument {
    pub root: XmlElement,
}

impl XmlDocument {
    /// Parse a complete XML document with the default limits
    pub fn parse(xml: &str) -> Result<Self, ConversionError> {
        Self::parse_with_validator(xml, &SecurityValidator::new())
    }

    /// Parse a complete XML document, rejecting elements nested deeper than
    /// `validator` allows
    pub fn parse_with_validator(
        xml: &str,
        validator: &SecurityValidator,
    ) -> Result<Self, ConversionError> {
        let mut reader = NsReader::from_str(xml);
        let mut stack: Vec<XmlElement> = Vec::new();
        let mut root: Option<XmlElement> = None;

        loop {
            let position = reader.buffer_position() as usize;
            let (resolved, event) = match reader.read_resolved_event() {
                Ok(pair) => pair,
                Err(e) => {
                    return Err(structural_error(xml, reader.error_position() as usize, e));
                }
            };

            match event {
                Event::Start(ref start) => {
                    check_depth(xml, position, stack.len() + 1, validator)?;
                    let element = open_element(xml, position, resolved, start)?;
                    if stack.is_empty() && root.is_some() {
                        return Err(multiple_roots(xml, position));
                    }
                    stack.push(element);
                }
                Event::Empty(ref start) => {
                    check_depth(xml, position, stack.len() + 1, validator)?;
                    let element = open_element(xml, position, resolved, start)?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None if root.is_some() => return Err(multiple_roots(xml, position)),
                        None => root = Some(element),
                    }
                }
                Event::End(_) => {
                    // quick-xml already verified the end name against the open tag
                    let Some(element) = stack.pop() else {
                        return Err(ConversionError::StructuralParse {
                            message: "unexpected closing tag".to_string(),
                            position: Some(TextPosition::from_offset(xml, position)),
                        });
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(XmlNode::Element(element)),
                        None => root = Some(element),
                    }
                }
                Event::Text(ref text) => {
                    if let Some(parent) = stack.last_mut() {
                        let unescaped = text
                            .unescape()
                            .map_err(|e| structural_error(xml, position, e))?;
                        push_text(parent, &unescaped);
                    }
                }
                Event::CData(ref cdata) => {
                    if let Some(parent) = stack.last_mut() {
                        let raw = std::str::from_utf8(cdata).map_err(|e| {
                            ConversionError::StructuralParse {
                                message: format!("CDATA section is not valid UTF-8: {e}"),
                                position: Some(TextPosition::from_offset(xml, position)),
                            }
                        })?;
                        push_text(parent, raw);
                    }
                }
                Event::Eof => break,
                // Declarations, comments, processing instructions and doctypes carry no content
                _ => {}
            }
        }

        if let Some(open) = stack.last() {
            return Err(ConversionError::StructuralParse {
                message: format!("unexpected end of document: <{}> is never closed", open.name),
                position: Some(TextPosition::from_offset(xml, xml.len())),
            });
        }

        root.map(|root| XmlDocument { root })
            .ok_or_else(|| ConversionError::StructuralParse {
                message: "document has no root element".to_string(),
                position: None,
            })
    }

    /// Every element with the given local name, in document order
    pub fn find_all<'a>(&'a self, local_name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.root
            .descendants()
            .filter(move |element| element.name == local_name)
    }

    /// Distinct local names of all elements, sorted
    pub fn tag_names(&self) -> BTreeSet<String> {
        self.root
            .descendants()
            .map(|element| element.name.clone())
            .collect()
    }
}

fn open_element(
    xml: &str,
    position: usize,
    resolved: ResolveResult<'_>,
    start: &BytesStart<'_>,
) -> Result<XmlElement, ConversionError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let namespace = match resolved {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(ConversionError::StructuralParse {
                message: format!(
                    "unbound namespace prefix '{}' on <{}>",
                    String::from_utf8_lossy(&prefix),
                    String::from_utf8_lossy(start.name().as_ref())
                ),
                position: Some(TextPosition::from_offset(xml, position)),
            });
        }
    };
    Ok(XmlElement::new(namespace, name))
}

fn check_depth(
    xml: &str,
    position: usize,
    depth: usize,
    validator: &SecurityValidator,
) -> Result<(), ConversionError> {
    validator.validate_xml_depth(depth).map_err(|err| match err {
        ConversionError::StructuralParse { message, .. } => ConversionError::StructuralParse {
            message,
            position: Some(TextPosition::from_offset(xml, position)),
        },
        other => other,
    })
}

fn push_text(parent: &mut XmlElement, text: &str) {
    if text.is_empty() {
        return;
    }
    // Merge adjacent runs (text followed by CDATA) into one node
    if let Some(XmlNode::Text(last)) = parent.children.last_mut() {
        last.push_str(text);
    } else {
        parent.children.push(XmlNode::Text(text.to_string()));
    }
}

fn multiple_roots(xml: &str, position: usize) -> ConversionError {
    ConversionError::StructuralParse {
        message: "document has more than one root element".to_string(),
        position: Some(TextPosition::from_offset(xml, position)),
    }
}

fn structural_error(xml: &str, position: usize, error: quick_xml::Error) -> ConversionError {
    ConversionError::StructuralParse {
        message: error.to_string(),
        position: Some(TextPosition::from_offset(xml, position)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss xmlns:wp="http://wordpress.org/export/1.2/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
  <channel>
    <title>Blog</title>
    <item>
      <title>First &amp; best</title>
      <content:encoded><![CDATA[<p>Hello</p>]]></content:encoded>
      <wp:post_id>7</wp:post_id>
    </item>
    <item><title>Second</title></item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_resolves_namespaces() {
        let doc = XmlDocument::parse(FEED).expect("Parse failed");
        let item = doc.find_all("item").next().expect("item missing");
        let post_id = item
            .child_elements()
            .find(|e| e.name == "post_id")
            .expect("post_id missing");
        assert_eq!(
            post_id.namespace.as_deref(),
            Some("http://wordpress.org/export/1.2/")
        );
        assert!(post_id.namespace_contains("wordpress.org/export/"));
        assert_eq!(post_id.text(), "7");
    }

    #[test]
    fn test_parse_unescapes_text_and_cdata() {
        let doc = XmlDocument::parse(FEED).expect("Parse failed");
        let item = doc.find_all("item").next().expect("item missing");
        let title = item.child_elements().find(|e| e.name == "title").unwrap();
        assert_eq!(title.text(), "First & best");
        let body = item.child_elements().find(|e| e.name == "encoded").unwrap();
        assert_eq!(body.text(), "<p>Hello</p>");
    }

    #[test]
    fn test_find_all_document_order() {
        let doc = XmlDocument::parse(FEED).expect("Parse failed");
        let titles: Vec<String> = doc
            .find_all("item")
            .map(|item| item.child_elements().next().unwrap().text())
            .collect();
        assert_eq!(titles, vec!["First & best", "Second"]);
    }

    #[test]
    fn test_tag_names_are_local_and_distinct() {
        let doc = XmlDocument::parse(FEED).expect("Parse failed");
        let names: Vec<String> = doc.tag_names().into_iter().collect();
        assert_eq!(
            names,
            vec!["channel", "encoded", "item", "post_id", "rss", "title"]
        );
    }

    #[test]
    fn test_empty_elements_are_kept() {
        let doc = XmlDocument::parse("<root><a/><b>x</b></root>").expect("Parse failed");
        let names: Vec<&str> = doc.root.child_elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(doc.root.child_elements().next().unwrap().is_leaf());
    }

    #[test]
    fn test_mismatched_tag_is_structural_error() {
        let xml = "<rss>\n<item></channel>\n</rss>";
        match XmlDocument::parse(xml) {
            Err(ConversionError::StructuralParse { position, .. }) => {
                let position = position.expect("position missing");
                assert_eq!(position.line, 2);
            }
            other => panic!("Expected StructuralParse, got {other:?}"),
        }
    }

    #[test]
    fn test_unclosed_element_is_structural_error() {
        assert!(matches!(
            XmlDocument::parse("<rss><channel><item>"),
            Err(ConversionError::StructuralParse { .. })
        ));
    }

    #[test]
    fn test_empty_document_is_structural_error() {
        assert!(matches!(
            XmlDocument::parse("   "),
            Err(ConversionError::StructuralParse { .. })
        ));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        assert!(matches!(
            XmlDocument::parse("<a></a><b></b>"),
            Err(ConversionError::StructuralParse { .. })
        ));
    }

    #[test]
    fn test_depth_limit_reports_position() {
        let xml = "<a>\n<b>\n<c><d/></c></b></a>";
        let validator = SecurityValidator::new().max_xml_depth(2);
        match XmlDocument::parse_with_validator(xml, &validator) {
            Err(ConversionError::StructuralParse { message, position }) => {
                assert!(message.contains("depth 3"), "{message}");
                assert_eq!(position.expect("position missing").line, 3);
            }
            other => panic!("Expected StructuralParse, got {other:?}"),
        }

        let validator = SecurityValidator::new().max_xml_depth(4);
        assert!(XmlDocument::parse_with_validator(xml, &validator).is_ok());
    }

    #[test]
    fn test_empty_element_counts_toward_depth() {
        let validator = SecurityValidator::new().max_xml_depth(1);
        assert!(matches!(
            XmlDocument::parse_with_validator("<a><b/></a>", &validator),
            Err(ConversionError::StructuralParse { .. })
        ));
    }

    #[test]
    fn test_unbound_prefix_rejected() {
        match XmlDocument::parse("<rss><wp:post_id>1</wp:post_id></rss>") {
            Err(ConversionError::StructuralParse { message, .. }) => {
                assert!(message.contains("wp"), "{message}");
            }
            other => panic!("Expected StructuralParse, got {other:?}"),
        }
    }
}
