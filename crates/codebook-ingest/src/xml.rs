//! Owned XML element tree.
//!
//! The dataset builder navigates documents DOM-style (child lookups,
//! whole-tree queries by id) and the registry caches parsed documents for
//! the lifetime of the process, so events from `quick_xml` are materialized
//! into an owned tree once per document. Namespace prefixes are stripped;
//! the DECOR export dialect is queried by local name only.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{IngestError, Result};

/// One element: local name, attributes, concatenated text, children in
/// document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<XmlElement>,
}

impl XmlElement {
    fn new(name: String) -> Self {
        Self {
            name,
            attributes: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
        }
    }

    /// Attribute value by local name.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// Attribute value, empty string when absent.
    pub fn attr_or_empty(&self, name: &str) -> &str {
        self.attr(name).unwrap_or("")
    }

    /// First direct child with the given local name.
    pub fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Direct children with the given local name, in document order.
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Preorder traversal of the whole subtree, self included.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// First descendant (preorder) matching the predicate.
    pub fn find_descendant<'a>(
        &'a self,
        pred: impl Fn(&XmlElement) -> bool + Copy,
    ) -> Option<&'a XmlElement> {
        self.descendants().find(|e| pred(e))
    }

    /// Element text with surrounding whitespace removed.
    pub fn trimmed_text(&self) -> &str {
        self.text.trim()
    }
}

/// Iterator for [`XmlElement::descendants`].
pub struct Descendants<'a> {
    stack: Vec<&'a XmlElement>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a XmlElement;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        for child in element.children.iter().rev() {
            self.stack.push(child);
        }
        Some(element)
    }
}

fn local_name(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match text.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => text.into_owned(),
    }
}

fn element_from_start(start: &quick_xml::events::BytesStart<'_>) -> Result<XmlElement> {
    let mut element = XmlElement::new(local_name(start.local_name().as_ref()));
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| IngestError::xml(e.to_string()))?;
        let key = local_name(attribute.key.local_name().as_ref());
        let value = attribute
            .unescape_value()
            .map_err(|e| IngestError::xml(e.to_string()))?
            .into_owned();
        element.attributes.insert(key, value);
    }
    Ok(element)
}

/// Parse an XML document into an owned element tree rooted at the single
/// top-level element.
pub fn parse_document(text: &str) -> Result<XmlElement> {
    let mut reader = Reader::from_str(text);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| IngestError::xml(e.to_string()))?;
        match event {
            Event::Start(start) => {
                stack.push(element_from_start(&start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| IngestError::xml("unbalanced end tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(t) => {
                if let Some(current) = stack.last_mut() {
                    let decoded = t.decode().map_err(|e| IngestError::xml(e.to_string()))?;
                    current.text.push_str(&decoded);
                }
            }
            Event::GeneralRef(r) => {
                if let Some(current) = stack.last_mut() {
                    let name = r.decode().map_err(|e| IngestError::xml(e.to_string()))?;
                    let reference = format!("&{name};");
                    let resolved = quick_xml::escape::unescape(&reference)
                        .map_err(|e| IngestError::xml(e.to_string()))?;
                    current.text.push_str(&resolved);
                }
            }
            Event::CData(c) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(IngestError::xml("unexpected end of document"));
    }
    root.ok_or_else(|| IngestError::xml("document has no root element"))
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_some() {
                return Err(IngestError::xml("multiple root elements"));
            }
            *root = Some(element);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
        <dataset id="1.2.3" statusCode="final">
            <name language="en-US">Demo &amp; more</name>
            <concept id="1.2.3.4" type="group">
                <concept id="1.2.3.5" type="item"/>
            </concept>
        </dataset>"#;

    #[test]
    fn parses_nested_elements() {
        let root = parse_document(SAMPLE).expect("parse sample");
        assert_eq!(root.name, "dataset");
        assert_eq!(root.attr("id"), Some("1.2.3"));
        let group = root.child("concept").expect("group concept");
        assert_eq!(group.attr("type"), Some("group"));
        assert_eq!(group.children_named("concept").count(), 1);
    }

    #[test]
    fn text_is_unescaped() {
        let root = parse_document(SAMPLE).expect("parse sample");
        let name = root.child("name").expect("name");
        assert_eq!(name.trimmed_text(), "Demo & more");
    }

    #[test]
    fn descendants_preorder() {
        let root = parse_document(SAMPLE).expect("parse sample");
        let ids: Vec<&str> = root
            .descendants()
            .filter(|e| e.name == "concept")
            .map(|e| e.attr_or_empty("id"))
            .collect();
        assert_eq!(ids, vec!["1.2.3.4", "1.2.3.5"]);
    }

    #[test]
    fn namespace_prefixes_are_stripped() {
        let root = parse_document(r#"<d:dataset xmlns:d="urn:x" d:id="9"/>"#).expect("parse");
        assert_eq!(root.name, "dataset");
        assert_eq!(root.attr("id"), Some("9"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_document("<a><b></a>").is_err());
        assert!(parse_document("").is_err());
    }
}
