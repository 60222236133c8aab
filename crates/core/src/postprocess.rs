//! Final assembly of an extracted article body.
//!
//! Runs once per request, after every page has been stitched together:
//! normalizes the tree, collapses wrapper chains, rewrites relative URLs and
//! applies the configured link treatment before serializing.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sxd_document::dom::{ChildOfElement, Element};
use url::Url;

use crate::dom::{
    Dom, child_elements, descendant_elements, elements_by_tag, inner_html, is_element_named, outer_html, remove_element,
    unwrap_element,
};
use crate::error::FolioError;
use crate::readability::{Readability, has_content};

/// Wrappers that collapse into their only child.
const COLLAPSIBLE: &[&str] = &["div", "article", "section", "header", "footer"];

/// Roots serialized without their own tag.
const INNER_ROOTS: &[&str] = &["div", "article", "section", "header", "footer", "li", "td"];

/// Containers whose whitespace-only text children carry no meaning.
const BLOCK_CONTAINERS: &[&str] =
    &["div", "article", "section", "header", "footer", "body", "ul", "ol", "table", "thead", "tbody", "tr"];

/// What happens to links in the final HTML.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentLinks {
    #[default]
    Preserve,
    /// Replace each link with its text and a numbered reference list
    Footnotes,
    /// Keep link text only
    Remove,
}

impl FromStr for ContentLinks {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "preserve" => Ok(Self::Preserve),
            "footnotes" => Ok(Self::Footnotes),
            "remove" => Ok(Self::Remove),
            other => Err(FolioError::ConfigError(format!("Unknown content_links mode: {}", other))),
        }
    }
}

/// Assemble serialized body HTML into the final article markup.
///
/// `base` is the effective URL relative `href`/`src` values are resolved against;
/// `None` leaves them untouched.
pub fn assemble(body_html: &str, base: Option<&Url>, content_links: ContentLinks) -> String {
    let dom = Dom::parse_element(body_html);
    let Some(mut root) = dom.root_element() else {
        return String::new();
    };

    normalize(root);
    drop_empty_text(root);

    while is_element_named(root, COLLAPSIBLE)
        && let Some(only) = only_child(root)
        && is_element_named(only, COLLAPSIBLE)
    {
        root = only;
    }
    for el in descendant_elements(root).into_iter().rev() {
        if is_element_named(el, COLLAPSIBLE) && only_child(el).is_some_and(|c| is_element_named(c, COLLAPSIBLE)) {
            unwrap_element(el);
        }
    }

    if let Some(base) = base {
        absolutize(root, base);
    }

    match content_links {
        ContentLinks::Preserve => {}
        ContentLinks::Footnotes => Readability::add_footnotes(root),
        ContentLinks::Remove => {
            for link in elements_by_tag(root, &["a"]).into_iter().rev() {
                unwrap_element(link);
            }
            normalize(root);
        }
    }

    for p in elements_by_tag(root, &["p"]).into_iter().rev() {
        if !has_content(p) {
            remove_element(p);
        }
    }

    if is_element_named(root, INNER_ROOTS) { inner_html(root) } else { outer_html(root) }
}

/// Resolve relative `href` and `src` values against `base`.
pub fn absolutize(root: Element<'_>, base: &Url) {
    for el in std::iter::once(root).chain(descendant_elements(root)) {
        for attr in ["href", "src"] {
            let Some(value) = el.attribute_value(attr).map(str::trim) else {
                continue;
            };
            if value.is_empty() || value.starts_with('#') {
                continue;
            }
            let resolved = match Url::parse(value) {
                Ok(_) => value.to_string(),
                Err(_) => match base.join(value) {
                    Ok(url) => url.to_string(),
                    Err(e) => {
                        tracing::debug!(%value, error = %e, "leaving unresolvable URL");
                        continue;
                    }
                },
            };
            el.set_attribute_value(attr, &resolved);
        }
    }
}

/// Merge adjacent text nodes.
fn normalize(root: Element<'_>) {
    let doc = root.document();
    for el in std::iter::once(root).chain(descendant_elements(root)) {
        let children = el.children();
        if !children.windows(2).any(|w| w[0].text().is_some() && w[1].text().is_some()) {
            continue;
        }

        let mut merged: Vec<ChildOfElement<'_>> = Vec::with_capacity(children.len());
        let mut pending = String::new();
        for child in children {
            match child.text() {
                Some(t) => pending.push_str(t.text()),
                None => {
                    if !pending.is_empty() {
                        merged.push(doc.create_text(&std::mem::take(&mut pending)).into());
                    }
                    merged.push(child);
                }
            }
        }
        if !pending.is_empty() {
            merged.push(doc.create_text(&pending).into());
        }
        el.replace_children(merged);
    }
}

/// Remove empty text nodes, and whitespace-only ones inside block containers.
fn drop_empty_text(root: Element<'_>) {
    for el in std::iter::once(root).chain(descendant_elements(root)) {
        let block = is_element_named(el, BLOCK_CONTAINERS);
        for child in el.children() {
            if let Some(text) = child.text()
                && (text.text().is_empty() || (block && text.text().trim().is_empty()))
            {
                el.remove_child(child);
            }
        }
    }
}

/// The single element child of `el` when it has no other content.
fn only_child(el: Element<'_>) -> Option<Element<'_>> {
    let stray_text = el.children().iter().any(|c| c.text().is_some_and(|t| !t.text().trim().is_empty()));
    match child_elements(el).as_slice() {
        [only] if !stray_text => Some(*only),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn base() -> Url {
        Url::parse("https://example.com/news/story.html").unwrap()
    }

    #[test]
    fn test_stitched_pages_with_footnotes() {
        let html = r#"<div class="story">my content<div class="story">my content</div></div>"#;
        assert_eq!(assemble(html, Some(&base()), ContentLinks::Footnotes), r#"my content<div class="story">my content</div>"#);
    }

    #[test]
    fn test_wrapper_chains_collapse() {
        let html = "<div>\n  <section>\n    <article><p>Text</p></article>\n  </section>\n</div>";
        assert_eq!(assemble(html, None, ContentLinks::Preserve), "<p>Text</p>");

        let html = "<div><p>Lead</p><div><div><p>Nested</p></div></div></div>";
        assert_eq!(assemble(html, None, ContentLinks::Preserve), "<p>Lead</p><div><p>Nested</p></div>");
    }

    #[test]
    fn test_relative_urls_resolved() {
        let html = r##"<div><a href=" ../about ">About</a><img src="/img/a.png"><a href="https://other.org/x">x</a><a href="#top">top</a></div>"##;
        let out = assemble(html, Some(&base()), ContentLinks::Preserve);
        assert!(out.contains(r#"<a href="https://example.com/about">About</a>"#));
        assert!(out.contains(r#"<img src="https://example.com/img/a.png">"#));
        assert!(out.contains(r#"<a href="https://other.org/x">x</a>"#));
        assert!(out.contains(r##"<a href="#top">top</a>"##));

        let out = assemble(html, None, ContentLinks::Preserve);
        assert!(out.contains(r#"src="/img/a.png""#));
    }

    #[rstest]
    #[case(ContentLinks::Preserve, r#"<p>Read <a href="https://example.com/more">more</a> here</p>"#)]
    #[case(ContentLinks::Remove, "<p>Read more here</p>")]
    fn test_content_links(#[case] mode: ContentLinks, #[case] expected: &str) {
        let html = r#"<div><p>Read <a href="/more">more</a> here</p></div>"#;
        assert_eq!(assemble(html, Some(&base()), mode), expected);
    }

    #[test]
    fn test_footnotes_appended() {
        let html = r#"<div><p>Read <a href="/more">more</a></p></div>"#;
        let out = assemble(html, Some(&base()), ContentLinks::Footnotes);
        assert!(out.starts_with(r##"<p>Read more<sup><a href="#folio-footnote-1">[1]</a></sup></p><footer>"##));
        assert!(out.contains(r#"<a href="https://example.com/more">more</a> <small>(example.com)</small>"#));
    }

    #[test]
    fn test_empty_paragraphs_removed() {
        let html = "<article><p> </p><p>Kept</p><p><img src=\"https://example.com/a.png\"></p></article>";
        assert_eq!(assemble(html, None, ContentLinks::Preserve), "<p>Kept</p><p><img src=\"https://example.com/a.png\"></p>");
    }

    #[test]
    fn test_outer_html_for_other_roots() {
        assert_eq!(assemble("<blockquote>Quote</blockquote>", None, ContentLinks::Preserve), "<blockquote>Quote</blockquote>");
    }

    #[rstest]
    #[case("footnotes", ContentLinks::Footnotes)]
    #[case("REMOVE", ContentLinks::Remove)]
    #[case("preserve", ContentLinks::Preserve)]
    fn test_content_links_from_str(#[case] input: &str, #[case] expected: ContentLinks) {
        assert_eq!(input.parse::<ContentLinks>().unwrap(), expected);
    }

    #[test]
    fn test_content_links_from_str_invalid() {
        assert!("inline".parse::<ContentLinks>().is_err());
    }
}
