//! Owned document tree built from parsed HTML.
//!
//! `scraper` does the HTML5 parsing; the result is copied into plain owned
//! [`Node`] values so sections can take ownership of their subtrees once the
//! document has been split.

use ego_tree::NodeId;
use log::{debug, warn};
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};

/// A node of the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An element with a lower-cased tag name, attributes, and ordered children
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<Node>,
}

/// A parsed document: its top-level nodes in order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Document {
    pub nodes: Vec<Node>,
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(text.into())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        }
    }

    /// Concatenated text of this node and all its descendants
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        match self {
            Node::Text(text) => out.push_str(text),
            Node::Element(element) => {
                for child in &element.children {
                    child.collect_text(out);
                }
            }
        }
    }

    pub fn is_blank_text(&self) -> bool {
        matches!(self, Node::Text(text) if text.trim().is_empty())
    }
}

impl From<Element> for Node {
    fn from(element: Element) -> Self {
        Node::Element(element)
    }
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn with_child(mut self, child: impl Into<Node>) -> Self {
        self.children.push(child.into());
        self
    }

    pub fn with_text(self, text: &str) -> Self {
        self.with_child(Node::text(text))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn is(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    /// Whitespace-separated entries of the `class` attribute
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or_default().split_whitespace()
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(Node::as_element)
    }

    /// First descendant element (depth-first, document order) with the given tag
    pub fn find_descendant(&self, tag: &str) -> Option<&Element> {
        for child in self.child_elements() {
            if child.is(tag) {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(tag) {
                return Some(found);
            }
        }
        None
    }

    pub fn has_descendant(&self, tags: &[&str]) -> bool {
        self.child_elements()
            .any(|child| tags.iter().any(|t| child.is(t)) || child.has_descendant(tags))
    }

    pub fn text_content(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.collect_text(&mut out);
        }
        out
    }

    /// Number of nodes in this subtree, the element itself included
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|child| match child {
                Node::Element(element) => element.node_count(),
                Node::Text(_) => 1,
            })
            .sum::<usize>()
    }
}

impl Document {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }

    /// The first `body` element, searched depth-first
    pub fn body(&self) -> Option<&Element> {
        self.nodes.iter().filter_map(Node::as_element).find_map(|element| {
            if element.is("body") {
                Some(element)
            } else {
                element.find_descendant("body")
            }
        })
    }

    /// Take the body container out of the document. Without one, a body is
    /// synthesized around all top-level nodes.
    pub fn into_body(mut self) -> Element {
        let holder = self.nodes.iter().position(|node| {
            node.as_element()
                .is_some_and(|element| element.is("body") || element.find_descendant("body").is_some())
        });
        if let Some(index) = holder {
            if let Node::Element(element) = self.nodes.swap_remove(index) {
                if let Some(body) = take_body(element) {
                    return body;
                }
            }
        }
        debug!("Document has no body container, synthesizing one");
        let mut body = Element::new("body");
        body.children = self.nodes;
        body
    }
}

fn take_body(element: Element) -> Option<Element> {
    if element.is("body") {
        return Some(element);
    }
    element
        .children
        .into_iter()
        .filter_map(|child| match child {
            Node::Element(element) => Some(element),
            Node::Text(_) => None,
        })
        .find_map(take_body)
}

/// Parse HTML text into a [`Document`]
pub fn parse_document(html: &str) -> Document {
    parse_document_with(html, &[])
}

/// Parse HTML text, dropping every node matched by one of `remove_selectors`.
/// Selectors that fail to parse are logged and skipped.
pub fn parse_document_with(html: &str, remove_selectors: &[String]) -> Document {
    let parsed = Html::parse_document(html);

    let mut removed: HashSet<NodeId> = HashSet::new();
    for raw in remove_selectors {
        match Selector::parse(raw) {
            Ok(selector) => {
                let before = removed.len();
                removed.extend(parsed.select(&selector).map(|element| element.id()));
                debug!("Selector '{}' removed {} node(s)", raw, removed.len() - before);
            }
            Err(e) => warn!("Skipping invalid selector '{}': {:?}", raw, e),
        }
    }

    let root = parsed.root_element();
    let nodes = if removed.contains(&root.id()) {
        Vec::new()
    } else {
        vec![Node::Element(copy_element(root, &removed))]
    };
    Document::new(nodes)
}

fn copy_element(element: ElementRef, removed: &HashSet<NodeId>) -> Element {
    let value = element.value();
    let mut copy = Element::new(value.name());
    for (name, attr_value) in value.attrs() {
        copy.attrs.insert(name.to_ascii_lowercase(), attr_value.to_string());
    }

    for child in element.children() {
        match child.value() {
            scraper::Node::Element(_) => {
                if let Some(child_element) = ElementRef::wrap(child) {
                    if removed.contains(&child_element.id()) {
                        continue;
                    }
                    copy.children.push(Node::Element(copy_element(child_element, removed)));
                }
            }
            scraper::Node::Text(text) => {
                let content: &str = &text.text;
                copy.children.push(Node::text(content));
            }
            _ => {}
        }
    }
    copy
}
