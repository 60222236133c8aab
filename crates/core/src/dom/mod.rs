//! XPath-queryable HTML documents.
//!
//! HTML is parsed with html5ever (through scraper) and copied into an
//! `sxd_document` tree so that site rules written as XPath can run against
//! real-world markup. Elements are created without a namespace, which keeps
//! expressions like `//div[@class='story']` working on XHTML input too.
//!
//! The tree types borrow from [`Dom`] and are neither `Send` nor `Sync`; code
//! that crosses an `.await` carries serialized HTML instead.

mod node;
mod serialize;
mod xpath;

pub use node::{
    ancestors, child_elements, descendant_elements, elements_by_tag, has_ancestor, import_element, insert_before,
    is_element_named, remove_children_matching, remove_element, rename, tag_name, unwrap_element,
};
pub use serialize::{inner_html, outer_html, text_content};
pub use xpath::XPathEvaluator;
pub(crate) use xpath::normalize_space;

use crate::error::{FolioError, Result};
use ego_tree::NodeRef;
use scraper::Html;
use sxd_document::Package;
use sxd_document::dom::{Document, Element};

/// An owned document tree.
pub struct Dom {
    package: Package,
}

impl std::fmt::Debug for Dom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.root_element() {
            Some(root) => write!(f, "Dom({})", outer_html(root)),
            None => write!(f, "Dom(<empty>)"),
        }
    }
}

impl Dom {
    /// An empty document.
    pub fn new() -> Self {
        Self { package: Package::new() }
    }

    /// A document whose root is a single empty element named `tag`.
    pub fn with_root(tag: &str) -> Self {
        let dom = Self::new();
        {
            let doc = dom.document();
            let root = doc.create_element(tag);
            doc.root().append_child(root);
        }
        dom
    }

    /// Parse a complete HTML document. Never fails; html5ever recovers from anything.
    pub fn parse_html(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        Self::from_tree(parsed.tree.root(), None)
    }

    /// Parse an HTML fragment into a document rooted at a synthetic `<div>`.
    pub fn parse_fragment(html: &str) -> Self {
        let parsed = Html::parse_fragment(html);
        Self::from_tree(parsed.tree.root(), Some("div"))
    }

    /// Parse well-formed XML/XHTML. Namespaces are dropped from element names.
    pub fn parse_xml(xml: &str) -> Result<Self> {
        let package =
            sxd_document::parser::parse(xml).map_err(|e| FolioError::HtmlParseError(format!("XML parse failed: {:?}", e)))?;
        let source = package.as_document();
        let root = source
            .root()
            .children()
            .into_iter()
            .find_map(|c| c.element())
            .ok_or_else(|| FolioError::HtmlParseError("XML document has no root element".to_string()))?;

        let dom = Self::new();
        {
            let doc = dom.document();
            let copy = import_element(doc, root);
            doc.root().append_child(copy);
        }
        Ok(dom)
    }

    /// A new document whose root is a deep copy of `source`.
    pub fn from_element(source: Element<'_>) -> Self {
        let dom = Self::new();
        {
            let doc = dom.document();
            let copy = import_element(doc, source);
            doc.root().append_child(copy);
        }
        dom
    }

    /// Parse serialized HTML of a single element back into a document rooted at that element.
    ///
    /// Markup with several top-level nodes stays wrapped in the synthetic `<div>`.
    pub fn parse_element(html: &str) -> Self {
        let wrapped = Self::parse_fragment(html);
        let single = wrapped.root_element().and_then(|root| {
            let mut elements = child_elements(root).into_iter();
            let only = elements.next()?;
            let stray_text = root.children().iter().any(|c| c.text().is_some_and(|t| !t.text().trim().is_empty()));
            (elements.next().is_none() && !stray_text).then_some(only)
        });
        let rerooted = single.map(Self::from_element);
        rerooted.unwrap_or(wrapped)
    }

    pub fn document(&self) -> Document<'_> {
        self.package.as_document()
    }

    pub fn root_element(&self) -> Option<Element<'_>> {
        self.document().root().children().into_iter().find_map(|c| c.element())
    }

    /// The `<body>` element, falling back to the root element.
    pub fn body(&self) -> Option<Element<'_>> {
        let root = self.root_element()?;
        elements_by_tag(root, &["body"]).into_iter().next().or(Some(root))
    }

    /// Serialize the whole document.
    pub fn to_html(&self) -> String {
        self.root_element().map(outer_html).unwrap_or_default()
    }

    fn from_tree(root: NodeRef<'_, scraper::Node>, wrapper: Option<&str>) -> Self {
        let dom = Self::new();
        {
            let doc = dom.document();
            let wrapper = wrapper.map(|tag| {
                let el = doc.create_element(tag);
                doc.root().append_child(el);
                el
            });

            let mut stack: Vec<(NodeRef<'_, scraper::Node>, Option<Element<'_>>)> =
                root.children().rev().map(|child| (child, wrapper)).collect();

            while let Some((node, parent)) = stack.pop() {
                match node.value() {
                    scraper::Node::Element(el) => {
                        // fragment parses wrap their content in a synthetic <html>
                        if wrapper.is_some() && parent == wrapper && el.name() == "html" && node.parent() == Some(root) {
                            stack.extend(node.children().rev().map(|child| (child, parent)));
                            continue;
                        }
                        let created = doc.create_element(el.name());
                        for (name, value) in el.attrs() {
                            created.set_attribute_value(name, value);
                        }
                        match parent {
                            Some(parent) => parent.append_child(created),
                            None => doc.root().append_child(created),
                        }
                        stack.extend(node.children().rev().map(|child| (child, Some(created))));
                    }
                    scraper::Node::Text(text) => {
                        if let Some(parent) = parent {
                            parent.append_child(doc.create_text(text));
                        }
                    }
                    scraper::Node::Comment(comment) => {
                        if let Some(parent) = parent {
                            parent.append_child(doc.create_comment(comment));
                        }
                    }
                    _ => {}
                }
            }
        }
        dom
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_html_builds_full_tree() {
        let dom = Dom::parse_html("<p>Hello <b>world</b></p>");
        let root = dom.root_element().unwrap();
        assert_eq!(tag_name(root), "html");
        assert_eq!(tag_name(dom.body().unwrap()), "body");
        assert_eq!(inner_html(dom.body().unwrap()), "<p>Hello <b>world</b></p>");
    }

    #[test]
    fn test_parse_fragment_wraps_in_div() {
        let dom = Dom::parse_fragment(r#"<div class="story">my content</div> tail"#);
        let root = dom.root_element().unwrap();
        assert_eq!(tag_name(root), "div");
        assert_eq!(inner_html(root), r#"<div class="story">my content</div> tail"#);
    }

    #[test]
    fn test_parse_element_reroots_single_element() {
        let dom = Dom::parse_element(r#" <div class="story">my content</div> "#);
        assert_eq!(dom.to_html(), r#"<div class="story">my content</div>"#);

        let dom = Dom::parse_element("<p>a</p><p>b</p>");
        assert_eq!(dom.to_html(), "<div><p>a</p><p>b</p></div>");
    }

    #[test]
    fn test_parse_xml_drops_namespaces() {
        let xml = r#"<html xmlns="http://www.w3.org/1999/xhtml"><body><div id="a">x</div></body></html>"#;
        let dom = Dom::parse_xml(xml).unwrap();
        let evaluator = XPathEvaluator::new();
        let found = evaluator.elements("//div[@id='a']", dom.document().root()).unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_parse_xml_rejects_malformed() {
        assert!(Dom::parse_xml("<html><body></html>").is_err());
    }

    #[test]
    fn test_attributes_survive() {
        let dom = Dom::parse_html(r#"<a href="/x" data-id="7">link</a>"#);
        let a = elements_by_tag(dom.root_element().unwrap(), &["a"])[0];
        assert_eq!(a.attribute_value("href"), Some("/x"));
        assert_eq!(a.attribute_value("data-id"), Some("7"));
    }
}
