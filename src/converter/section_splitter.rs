//! Partition a document's top-level body nodes at every level-1 heading.

use crate::converter::dom::{Document, Element, Node};
use log::debug;

/// Title used when content has no heading of its own
pub const INDEX_TITLE: &str = "index";

/// A titled group of top-level nodes. The heading that opened the section
/// stays as its first child.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub body: Element,
}

impl Section {
    fn new(title: String) -> Self {
        Self {
            title,
            body: Element::new("div"),
        }
    }

    fn has_content(&self) -> bool {
        self.body
            .children
            .iter()
            .any(|node| !node.is_blank_text())
    }
}

/// Split a document into ordered sections, one per top-level `h1`.
///
/// Nodes before the first heading form an `index` section when they carry any
/// content. A document without top-level headings yields exactly one `index`
/// section holding the whole body, so the result is never empty.
pub fn split(document: Document) -> Vec<Section> {
    let body = document.into_body();
    let mut sections: Vec<Section> = Vec::new();
    let mut current = Section::new(INDEX_TITLE.to_string());
    let mut saw_heading = false;

    for node in body.children.iter() {
        if node.is_blank_text() {
            continue;
        }
        if let Node::Element(element) = node {
            if element.is("h1") {
                if current.has_content() {
                    sections.push(current);
                }
                current = Section::new(element.text_content().trim().to_string());
                saw_heading = true;
            }
        }
        current.body.children.push(node.clone());
    }

    if !saw_heading {
        debug!("No top-level headings, emitting a single '{}' section", INDEX_TITLE);
        let mut whole = Section::new(INDEX_TITLE.to_string());
        whole.body.children = body.children;
        return vec![whole];
    }
    if current.has_content() {
        sections.push(current);
    }

    debug!("Split document into {} section(s)", sections.len());
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::dom::parse_document;

    fn titles(sections: &[Section]) -> Vec<&str> {
        sections.iter().map(|s| s.title.as_str()).collect()
    }

    #[test]
    fn test_split_at_each_h1() {
        let sections = split(parse_document(
            "<h1>First</h1><p>A</p>\n<h1> Second  Part </h1><p>B</p><h2>Sub</h2><p>C</p>",
        ));
        assert_eq!(titles(&sections), vec!["First", "Second  Part"]);

        let second: Vec<&str> = sections[1]
            .body
            .child_elements()
            .map(|e| e.tag.as_str())
            .collect();
        assert_eq!(second, vec!["h1", "p", "h2", "p"]);
    }

    #[test]
    fn test_content_before_first_heading_becomes_index() {
        let sections = split(parse_document("<p>Intro</p><h1>Guide</h1><p>Body</p>"));
        assert_eq!(titles(&sections), vec!["index", "Guide"]);
        assert_eq!(sections[0].body.text_content(), "Intro");
    }

    #[test]
    fn test_whitespace_before_first_heading_is_ignored() {
        let sections = split(parse_document("\n   \n<h1>Only</h1><p>x</p>"));
        assert_eq!(titles(&sections), vec!["Only"]);
    }

    #[test]
    fn test_no_headings_yields_single_index_section() {
        let sections = split(parse_document("<p>One</p><h2>Not top level</h2><p>Two</p>"));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, INDEX_TITLE);
        assert_eq!(sections[0].body.child_elements().count(), 3);
    }

    #[test]
    fn test_empty_document_still_yields_one_section() {
        let sections = split(Document::default());
        assert_eq!(titles(&sections), vec![INDEX_TITLE]);
    }

    #[test]
    fn test_duplicate_titles_are_kept() {
        let sections = split(parse_document("<h1>Notes</h1><p>1</p><h1>Notes</h1><p>2</p>"));
        assert_eq!(titles(&sections), vec!["Notes", "Notes"]);
    }

    #[test]
    fn test_nested_headings_do_not_split() {
        let sections = split(parse_document("<div><h1>A</h1><h1>B</h1></div>"));
        assert_eq!(titles(&sections), vec![INDEX_TITLE]);
    }
}
