//! Heuristic article detection.
//!
//! [`Readability`] owns the parsed (and optionally tidied) document the
//! extractor works on. [`Readability::get_content`] scores paragraphs, picks
//! the best container with its related siblings and returns a cleaned copy;
//! the source tree is never modified by it.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use sxd_document::dom::{ChildOfElement, Element, ParentOfChild};
use url::Url;

use crate::dom::{
    Dom, ancestors, child_elements, descendant_elements, elements_by_tag, import_element, is_element_named,
    normalize_space, remove_element, tag_name, text_content,
};
use crate::error::FolioError;
use crate::scoring::{ScoreConfig, base_tag_score, class_id_weight, content_density_score, is_unlikely_candidate, link_density};
use crate::tidy::tidy_html;

static TITLE_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s[|\-\u{2013}\u{2014}\\/>\u{bb}:]\s").unwrap());

static HIDDEN_STYLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").unwrap());

/// Elements that make a `<div>` a container rather than a paragraph.
const BLOCK_ELEMENTS: &[&str] =
    &["a", "blockquote", "dl", "div", "img", "ol", "p", "pre", "table", "ul", "section", "article", "figure"];

/// Elements scored as paragraphs.
const SCORABLE: &[&str] = &["p", "pre", "td", "section", "h2", "h3", "h4", "h5", "h6"];

/// Removed outright from an article during [`Readability::prep_article`].
const JUNK_ELEMENTS: &[&str] =
    &["form", "fieldset", "button", "input", "select", "textarea", "aside", "nav", "footer", "link", "meta", "object"];

/// Elements kept even when empty.
const EMBEDS: &[&str] = &["img", "iframe", "video", "audio", "embed", "picture", "svg"];

/// Parsers a site rule file may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParserKind {
    /// Lenient HTML5 parsing
    #[default]
    Html5ever,
    /// Strict XML parsing, falling back to html5ever on malformed input
    Xml,
}

impl FromStr for ParserKind {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html5ever" | "html5php" | "html5lib" | "libxml" | "html" => Ok(Self::Html5ever),
            "xml" => Ok(Self::Xml),
            other => Err(FolioError::ConfigError(format!("Unknown parser: {}", other))),
        }
    }
}

/// Tuning for the heuristic article detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadabilityConfig {
    /// Articles shorter than this are retried without dropping unlikely candidates (default: 500).
    pub char_threshold: usize,

    /// Paragraphs shorter than this are not scored (default: 25).
    pub min_paragraph_length: usize,

    /// Whether to remove unlikely candidates before scoring (default: true).
    pub remove_unlikely: bool,

    /// Siblings scoring at least this share of the top candidate are kept (default: 0.2).
    pub sibling_threshold: f64,
}

impl Default for ReadabilityConfig {
    fn default() -> Self {
        Self { char_threshold: 500, min_paragraph_length: 25, remove_unlikely: true, sibling_threshold: 0.2 }
    }
}

/// A parsed document plus the heuristics that run on it.
pub struct Readability {
    dom: Dom,
    original_html: String,
    url: Option<Url>,
    tidied: bool,
    json_ld: Vec<String>,
    config: ReadabilityConfig,
    score_config: ScoreConfig,
}

impl std::fmt::Debug for Readability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Readability").field("url", &self.url).field("tidied", &self.tidied).finish_non_exhaustive()
    }
}

impl Readability {
    /// Parse `html`, running the tidy pre-pass first when `use_tidy` is set.
    ///
    /// Scripts and stylesheets are dropped from the working document; JSON-LD
    /// blocks are kept aside for metadata lookups.
    pub fn new(html: &str, url: Option<&Url>, parser: ParserKind, use_tidy: bool, config: ReadabilityConfig) -> Self {
        let tidy_output = if use_tidy { tidy_html(html) } else { None };
        let tidied = tidy_output.is_some();
        let source = tidy_output.as_deref().unwrap_or(html);

        let dom = match parser {
            ParserKind::Html5ever => Dom::parse_html(source),
            ParserKind::Xml => Dom::parse_xml(source).unwrap_or_else(|e| {
                tracing::debug!(error = %e, "XML parse failed, falling back to html5ever");
                Dom::parse_html(source)
            }),
        };

        let mut json_ld = Vec::new();
        if let Some(root) = dom.root_element() {
            for el in elements_by_tag(root, &["script", "style"]).into_iter().rev() {
                if tag_name(el) == "script"
                    && el.attribute_value("type").is_some_and(|t| t.eq_ignore_ascii_case("application/ld+json"))
                {
                    json_ld.push(text_content(el));
                }
                remove_element(el);
            }
            json_ld.reverse();
        }

        Self {
            dom,
            original_html: html.to_string(),
            url: url.cloned(),
            tidied,
            json_ld,
            config,
            score_config: ScoreConfig::default(),
        }
    }

    /// Whether the tidy pre-pass produced the working document.
    pub fn tidied(&self) -> bool {
        self.tidied
    }

    pub fn document(&self) -> &Dom {
        &self.dom
    }

    /// The HTML as given, before tidying.
    pub fn original_html(&self) -> &str {
        &self.original_html
    }

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    /// Raw JSON-LD blocks found in the page.
    pub fn json_ld(&self) -> &[String] {
        &self.json_ld
    }

    /// The document title with a trailing or leading site name removed.
    pub fn get_title(&self) -> Option<String> {
        let root = self.dom.root_element()?;
        let raw = elements_by_tag(root, &["title"]).first().map(|t| normalize_space(&text_content(*t)));

        let title = match raw.filter(|t| !t.is_empty()) {
            Some(raw) => clean_title(&raw),
            None => {
                let h1s = elements_by_tag(root, &["h1"]);
                match h1s.as_slice() {
                    [only] => normalize_space(&text_content(*only)),
                    _ => String::new(),
                }
            }
        };
        (!title.is_empty()).then_some(title)
    }

    /// Detect the main article and return a cleaned copy rooted at a `<div>`.
    pub fn get_content(&self) -> Option<Dom> {
        let attempts = if self.config.remove_unlikely { vec![true, false] } else { vec![false] };
        let mut best: Option<Dom> = None;

        for remove_unlikely in attempts {
            let Some(article) = self.grab_article(remove_unlikely) else {
                continue;
            };
            let length = article.root_element().map(|r| normalize_space(&text_content(r)).chars().count()).unwrap_or(0);
            if length >= self.config.char_threshold {
                return Some(article);
            }
            tracing::debug!(length, remove_unlikely, "article below character threshold");
            let best_length =
                best.as_ref().and_then(Dom::root_element).map(|r| normalize_space(&text_content(r)).chars().count());
            if best_length.is_none_or(|b| length > b) {
                best = Some(article);
            }
        }

        best.filter(|dom| dom.root_element().is_some_and(has_content))
    }

    fn grab_article(&self, remove_unlikely: bool) -> Option<Dom> {
        let work = Dom::from_element(self.dom.body()?);
        let root = work.root_element()?;

        for el in descendant_elements(root).into_iter().rev() {
            if is_hidden(el)
                || (remove_unlikely
                    && !is_element_named(el, &["body", "article", "main", "a"])
                    && is_unlikely_candidate(el))
            {
                remove_element(el);
            }
        }

        let mut scores: HashMap<Element<'_>, f64> = HashMap::new();
        let mut candidates: Vec<Element<'_>> = Vec::new();

        for el in descendant_elements(root) {
            let is_paragraph = is_element_named(el, SCORABLE)
                || (tag_name(el) == "div" && !child_elements(el).iter().any(|c| is_element_named(*c, BLOCK_ELEMENTS)));
            if !is_paragraph {
                continue;
            }

            let text = normalize_space(&text_content(el));
            if text.chars().count() < self.config.min_paragraph_length {
                continue;
            }

            let content_score = 1.0 + content_density_score(&text, &self.score_config);
            for (level, ancestor) in ancestors(el).into_iter().take(3).enumerate() {
                let share = match level {
                    0 => content_score,
                    1 => content_score / 2.0,
                    _ => content_score / 3.0,
                };
                let entry = scores.entry(ancestor).or_insert_with(|| {
                    candidates.push(ancestor);
                    base_tag_score(ancestor) + class_id_weight(ancestor, &self.score_config)
                });
                *entry += share;
            }
        }

        let mut top: Option<(Element<'_>, f64)> = None;
        for candidate in &candidates {
            let score = scores.get(candidate).copied().unwrap_or_default() * (1.0 - link_density(*candidate));
            scores.insert(*candidate, score);
            if top.is_none_or(|(_, best)| score > best) {
                top = Some((*candidate, score));
            }
        }

        let article = Dom::with_root("div");
        let article_root = article.root_element()?;
        let doc = article.document();

        match top {
            Some((top, top_score)) if top != root => {
                let threshold = (top_score * self.config.sibling_threshold).max(10.0);
                let siblings = match top.parent().and_then(|p| p.element()) {
                    Some(parent) => child_elements(parent),
                    None => vec![top],
                };
                for sibling in siblings {
                    let keep = sibling == top
                        || scores.get(&sibling).is_some_and(|s| *s >= threshold)
                        || (tag_name(sibling) == "p" && {
                            let text = normalize_space(&text_content(sibling));
                            text.chars().count() > 80 && link_density(sibling) < 0.25
                        });
                    if keep {
                        let copy = import_element(doc, sibling);
                        article_root.append_child(copy);
                    }
                }
            }
            _ => {
                for child in root.children() {
                    match child {
                        ChildOfElement::Element(e) => {
                            article_root.append_child(import_element(doc, e));
                        }
                        ChildOfElement::Text(t) => article_root.append_child(doc.create_text(t.text())),
                        _ => {}
                    }
                }
            }
        }

        self.prep_article(article_root);
        Some(article)
    }

    /// Remove forms, navigation and link-heavy or empty blocks from an article.
    pub fn prep_article(&self, node: Element<'_>) {
        for el in descendant_elements(node).into_iter().rev() {
            if is_element_named(el, JUNK_ELEMENTS) || is_hidden(el) {
                remove_element(el);
            }
        }

        for el in elements_by_tag(node, &["table", "ul", "div"]).into_iter().rev() {
            if el != node && self.is_clutter(el) {
                remove_element(el);
            }
        }

        for p in elements_by_tag(node, &["p"]).into_iter().rev() {
            if !has_content(p) {
                remove_element(p);
            }
        }
    }

    fn is_clutter(&self, el: Element<'_>) -> bool {
        let weight = class_id_weight(el, &self.score_config);
        let text = normalize_space(&text_content(el));
        if weight < 0.0 {
            return true;
        }
        if text.matches(',').count() >= 10 {
            return false;
        }

        let count = |names: &[&str]| elements_by_tag(el, names).len().saturating_sub(usize::from(is_element_named(el, names)));
        let paragraphs = count(&["p"]);
        let images = count(&["img"]);
        let list_items = count(&["li"]);
        let embeds = count(&["iframe", "video", "embed", "object"]);
        let density = link_density(el);
        let is_list = is_element_named(el, &["ul", "ol"]);

        (images > 1 && paragraphs * 2 < images)
            || (!is_list && list_items > paragraphs + 100)
            || (text.chars().count() < 25 && images == 0 && embeds == 0 && density > 0.0)
            || (weight < 25.0 && density > 0.5 && !is_list)
            || (weight >= 25.0 && density > 0.75)
    }

    /// Replace every link in `node` with its text plus a numbered reference,
    /// and append the numbered link list.
    pub fn add_footnotes(node: Element<'_>) {
        let doc = node.document();
        let list = doc.create_element("ol");
        let mut count = 0;

        for link in elements_by_tag(node, &["a"]) {
            let Some(href) = link.attribute_value("href").map(str::to_string) else {
                continue;
            };
            let text = normalize_space(&text_content(link));
            if href.starts_with('#') || href.starts_with("javascript:") || text.is_empty() {
                continue;
            }
            count += 1;

            let item = doc.create_element("li");
            item.set_attribute_value("id", &format!("folio-footnote-{}", count));
            let target = doc.create_element("a");
            target.set_attribute_value("href", &href);
            target.append_child(doc.create_text(&text));
            item.append_child(target);
            if let Some(host) = Url::parse(&href).ok().and_then(|u| u.host_str().map(str::to_string)) {
                let small = doc.create_element("small");
                small.append_child(doc.create_text(&format!("({})", host)));
                item.append_child(doc.create_text(" "));
                item.append_child(small);
            }
            list.append_child(item);

            let marker = doc.create_element("sup");
            let back = doc.create_element("a");
            back.set_attribute_value("href", &format!("#folio-footnote-{}", count));
            back.append_child(doc.create_text(&format!("[{}]", count)));
            marker.append_child(back);

            let Some(ParentOfChild::Element(parent)) = link.parent() else {
                continue;
            };
            let mut children = Vec::new();
            for child in parent.children() {
                if child == ChildOfElement::Element(link) {
                    children.push(doc.create_text(&text).into());
                    children.push(marker.into());
                } else {
                    children.push(child);
                }
            }
            parent.replace_children(children);
        }

        if count > 0 {
            let footer = doc.create_element("footer");
            let heading = doc.create_element("h3");
            heading.append_child(doc.create_text("References"));
            footer.append_child(heading);
            footer.append_child(list);
            node.append_child(footer);
        }
    }
}

/// Whether an inline style hides the element.
pub(crate) fn is_hidden(el: Element<'_>) -> bool {
    el.attribute_value("style").is_some_and(|s| HIDDEN_STYLE.is_match(s)) || el.attribute_value("hidden").is_some()
}

/// Whether an element has text or embedded media.
pub(crate) fn has_content(el: Element<'_>) -> bool {
    !text_content(el).trim().is_empty() || !elements_by_tag(el, EMBEDS).is_empty()
}

fn clean_title(raw: &str) -> String {
    let separators: Vec<_> = TITLE_SEPARATOR.find_iter(raw).collect();
    let (Some(first), Some(last)) = (separators.first(), separators.last()) else {
        return raw.to_string();
    };

    let word_count = |s: &str| s.split_whitespace().count();
    let before_last = raw[..last.start()].trim();
    if word_count(before_last) >= 3 {
        return before_last.to_string();
    }
    let after_first = raw[first.end()..].trim();
    if word_count(after_first) >= 3 {
        return after_first.to_string();
    }
    raw.to_string()
}
