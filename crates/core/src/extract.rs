//! Rule-driven content extraction with heuristic fallbacks.
//!
//! [`ContentExtractor::process`] applies a [`SiteConfig`] to one HTML page.
//! Site rules run first; when they leave the title or body unset the
//! extractor falls back through microformat strategies (hNews, Instapaper,
//! Schema.org) and finally the [`Readability`] engine.

use serde::{Deserialize, Serialize};
use sxd_document::dom::{ChildOfElement, Element};
use sxd_xpath::Value;
use url::Url;

use crate::dom::{
    Dom, XPathEvaluator, child_elements, descendant_elements, elements_by_tag, has_ancestor, import_element, insert_before,
    normalize_space, outer_html, remove_element, tag_name, text_content,
};
use crate::metadata::Metadata;
use crate::readability::{ParserKind, Readability, ReadabilityConfig, has_content, is_hidden};
use crate::siteconfig::SiteConfig;

/// Attributes holding the real image URL of lazy-loaded images, in priority order.
const LAZY_LOAD_ATTRS: &[&str] = &["data-src", "data-lazy-src", "data-original", "data-sources", "data-hi-res-src"];

/// Elements removed from every page regardless of site rules.
const ALWAYS_STRIP: &str = "//*[contains(concat(' ', normalize-space(@class), ' '), ' entry-unrelated ') or contains(concat(' ', normalize-space(@class), ' '), ' instapaper_ignore ')]";

/// A microformat-based way of locating title and body.
struct Strategy {
    name: &'static str,
    /// Containers the expressions are evaluated against; the whole document when `None`
    scope: Option<&'static str>,
    title: Option<&'static str>,
    body: &'static str,
}

const STRATEGIES: &[Strategy] = &[
    Strategy {
        name: "hNews",
        scope: Some("//*[contains(concat(' ', normalize-space(@class), ' '), ' hentry ')]"),
        title: Some(".//*[contains(concat(' ', normalize-space(@class), ' '), ' entry-title ')]"),
        body: ".//*[contains(concat(' ', normalize-space(@class), ' '), ' entry-content ')]",
    },
    Strategy {
        name: "instapaper",
        scope: None,
        title: Some("//*[contains(concat(' ', normalize-space(@class), ' '), ' instapaper_title ')]"),
        body: "//*[contains(concat(' ', normalize-space(@class), ' '), ' instapaper_body ')]",
    },
    Strategy { name: "schema.org", scope: None, title: None, body: "//*[@itemprop='articleBody']" },
];

/// Extractor behaviour that is not per-site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Parsers a site rule file may select
    pub allowed_parsers: Vec<ParserKind>,
    pub default_parser: ParserKind,
    /// Whether the tidy pre-pass may run at all
    pub allow_tidy: bool,
    pub readability: ReadabilityConfig,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            allowed_parsers: vec![ParserKind::Html5ever, ParserKind::Xml],
            default_parser: ParserKind::Html5ever,
            allow_tidy: true,
            readability: ReadabilityConfig::default(),
        }
    }
}

/// The result of one [`ContentExtractor::process`] call.
///
/// The body is carried as serialized HTML so it can cross `.await` points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    pub title: Option<String>,
    pub body: Option<String>,
    pub language: Option<String>,
    pub authors: Vec<String>,
    pub date: Option<String>,
    pub image: Option<String>,
    pub is_native_ad: bool,
    pub next_page_url: Option<String>,
    pub success: bool,
}

#[derive(Debug, Default)]
pub struct ContentExtractor {
    config: ExtractorConfig,
    xpath: XPathEvaluator,
    content: ExtractedContent,
}

impl ContentExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config, xpath: XPathEvaluator::new(), content: ExtractedContent::default() }
    }

    pub fn content(&self) -> &ExtractedContent {
        &self.content
    }

    pub fn into_content(self) -> ExtractedContent {
        self.content
    }

    pub fn title(&self) -> Option<&str> {
        self.content.title.as_deref()
    }

    pub fn body(&self) -> Option<&str> {
        self.content.body.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.content.language.as_deref()
    }

    pub fn next_page_url(&self) -> Option<&str> {
        self.content.next_page_url.as_deref()
    }

    /// Extract title and body from `html`. Returns whether a body was found.
    ///
    /// When the tidy pre-pass ran and nothing was found, the page is parsed
    /// again without it, once.
    pub fn process(&mut self, html: &str, url: &Url, site: &SiteConfig, smart_tidy: bool) -> bool {
        let html = apply_replacements(html, site);
        let parser = site.parser().filter(|p| self.config.allowed_parsers.contains(p)).unwrap_or(self.config.default_parser);
        let mut smart_tidy = smart_tidy;

        loop {
            self.content = ExtractedContent::default();
            let use_tidy = site.tidy() && self.config.allow_tidy && smart_tidy;
            let readability = Readability::new(&html, Some(url), parser, use_tidy, self.config.readability.clone());

            let success = self.extract(&readability, url, site);
            self.content.success = success;
            if success || !(readability.tidied() && smart_tidy) {
                tracing::debug!(%url, success, title = ?self.content.title, "extraction finished");
                return success;
            }

            tracing::debug!(%url, "nothing found in tidied document, retrying on original HTML");
            smart_tidy = false;
        }
    }

    fn extract(&mut self, readability: &Readability, url: &Url, site: &SiteConfig) -> bool {
        let dom = readability.document();
        let Some(root) = dom.root_element() else {
            return false;
        };

        self.content.next_page_url = first_link(&self.xpath, &site.next_page_link, root, url);

        for rule in &site.title {
            if let Some(title) = self.take_title(rule, root) {
                self.content.title = Some(title);
                break;
            }
        }

        let metadata = Metadata::extract(root, readability.json_ld(), site, Some(url), &self.xpath);
        self.content.language = metadata.language;
        self.content.date = metadata.date;
        self.content.authors = metadata.authors;
        self.content.image = metadata.image;
        self.content.is_native_ad = metadata.is_native_ad;

        self.strip(root, site);

        let mut body: Option<Dom> = None;
        for rule in &site.body {
            let matches = self.xpath.nodes_lenient(rule, root).into_iter().filter_map(|n| n.element()).collect::<Vec<_>>();
            if let Some(found) = self.body_from_matches(&matches, site.prune(), readability) {
                tracing::debug!(%rule, count = matches.len(), "body matched site rule");
                body = Some(found);
                break;
            }
        }

        let may_detect = !site.has_extraction_config() || site.autodetect_on_failure();
        if may_detect && (self.content.title.is_none() || body.is_none()) {
            for strategy in STRATEGIES {
                let scopes = match strategy.scope {
                    Some(scope) => self.xpath.elements(scope, root).unwrap_or_default(),
                    None => vec![root],
                };
                for scope in scopes {
                    if self.content.title.is_none()
                        && let Some(title) = strategy.title.and_then(|rule| self.take_title(rule, scope))
                    {
                        tracing::debug!(strategy = strategy.name, "title detected");
                        self.content.title = Some(title);
                    }
                    if body.is_none() {
                        let matches = self.xpath.elements(strategy.body, scope).unwrap_or_default();
                        body = self.body_from_matches(&matches, true, readability);
                        if body.is_some() {
                            tracing::debug!(strategy = strategy.name, "body detected");
                        }
                    }
                }
            }

            if self.content.title.is_none() {
                self.content.title = readability.get_title();
            }
            if body.is_none() {
                body = readability.get_content();
                if body.is_some() {
                    tracing::debug!("body detected by readability scoring");
                }
            }
        }

        let Some(body) = body else {
            return false;
        };
        let Some(body_root) = body.root_element() else {
            return false;
        };

        self.finish_body(body_root, site);
        self.content.body = Some(outer_html(body_root));
        true
    }

    /// Evaluate a title expression; a matched element is removed from the document.
    fn take_title(&self, rule: &str, context: Element<'_>) -> Option<String> {
        let value = match self.xpath.evaluate(rule, context) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(%rule, error = %e, "skipping title rule");
                return None;
            }
        };
        match value {
            Value::String(s) => Some(normalize_space(&s)).filter(|s| !s.is_empty()),
            Value::Nodeset(nodes) => {
                let node = nodes.document_order_first()?;
                let title = normalize_space(&node.string_value());
                if title.is_empty() {
                    return None;
                }
                if let Some(el) = node.element() {
                    remove_element(el);
                }
                Some(title)
            }
            _ => None,
        }
    }

    fn strip(&self, root: Element<'_>, site: &SiteConfig) {
        for rule in &site.strip {
            remove_all(self.xpath.nodes_lenient(rule, root).into_iter().filter_map(|n| n.element()).collect());
        }

        for pattern in &site.strip_id_or_class {
            let needle = xpath_literal(pattern);
            let rule = format!("//*[contains(@class, {0}) or contains(@id, {0})]", needle);
            remove_all(self.xpath.elements(&rule, root).unwrap_or_default());
        }

        for pattern in &site.strip_image_src {
            let rule = format!("//img[contains(@src, {})]", xpath_literal(pattern));
            remove_all(self.xpath.elements(&rule, root).unwrap_or_default());
        }

        for rule in &site.strip_attr {
            for node in self.xpath.nodes_lenient(rule, root).into_iter().rev() {
                if let Some(attr) = node.attribute()
                    && let Some(owner) = attr.parent()
                {
                    owner.remove_attribute(attr.name());
                }
            }
        }

        remove_all(self.xpath.elements(ALWAYS_STRIP, root).unwrap_or_default());
        remove_all(descendant_elements(root).into_iter().filter(|el| is_hidden(*el)).collect());
    }

    /// Build a body from rule matches: one element as-is, several wrapped in a `<div>`.
    fn body_from_matches(&self, matches: &[Element<'_>], prune: bool, readability: &Readability) -> Option<Dom> {
        let body = match matches {
            [] => return None,
            [single] => {
                let dom = Dom::from_element(*single);
                if prune && let Some(root) = dom.root_element() {
                    readability.prep_article(root);
                }
                dom
            }
            many => {
                let dom = Dom::with_root("div");
                let wrapper = dom.root_element()?;
                let mut added: Vec<Element<'_>> = Vec::new();
                for el in many {
                    if added.iter().any(|a| has_ancestor(*el, *a)) {
                        continue;
                    }
                    added.push(*el);
                    let copy = import_element(dom.document(), *el);
                    wrapper.append_child(copy);
                    if prune {
                        readability.prep_article(copy);
                    }
                }
                dom
            }
        };

        body.root_element().is_some_and(has_content).then_some(body)
    }

    /// Final touches on the chosen body.
    fn finish_body(&self, body: Element<'_>, site: &SiteConfig) {
        if let Some(title) = &self.content.title
            && let Some(first) = child_elements(body).into_iter().next()
            && matches!(tag_name(first), "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
            && normalize_space(&text_content(first)).eq_ignore_ascii_case(title)
        {
            remove_element(first);
        }

        let doc = body.document();
        for iframe in elements_by_tag(body, &["iframe"]) {
            if iframe.children().is_empty() {
                iframe.append_child(doc.create_text("[embedded content]"));
            }
        }

        let lazy_attrs: Vec<&str> =
            site.src_lazy_load_attr.as_deref().into_iter().chain(LAZY_LOAD_ATTRS.iter().copied()).collect();
        for img in elements_by_tag(body, &["img"]) {
            if let Some((attr, src)) = lazy_attrs
                .iter()
                .find_map(|a| img.attribute_value(*a).map(str::trim).filter(|v| !v.is_empty()).map(|v| (*a, v.to_string())))
            {
                img.set_attribute_value("src", &src);
                img.remove_attribute(attr);
            }
        }

        swap_noscript_images(body);
    }
}

/// Replace `img` placeholders that are followed by a `<noscript>` copy of the real image.
fn swap_noscript_images(body: Element<'_>) {
    let doc = body.document();
    for noscript in elements_by_tag(body, &["noscript"]) {
        let Some(parent) = noscript.parent().and_then(|p| p.element()) else {
            continue;
        };
        let siblings = parent.children();
        let Some(position) = siblings.iter().position(|c| *c == ChildOfElement::Element(noscript)) else {
            continue;
        };
        let placeholder = siblings[..position]
            .iter()
            .rev()
            .find(|c| c.text().is_none_or(|t| !t.text().trim().is_empty()))
            .and_then(|c| c.element())
            .filter(|el| tag_name(*el) == "img");
        let Some(placeholder) = placeholder else {
            continue;
        };

        let fragment = match elements_by_tag(noscript, &["img"]).into_iter().next() {
            Some(img) => Dom::from_element(img),
            None => Dom::parse_fragment(&text_content(noscript)),
        };
        let Some(real) = fragment.root_element().and_then(|r| elements_by_tag(r, &["img"]).into_iter().next()) else {
            continue;
        };

        let copy = import_element(doc, real);
        insert_before(placeholder, copy);
        remove_element(placeholder);
        remove_element(noscript);
    }
}

/// Look for a link to the whole article on one page.
pub fn single_page_link(html: &str, url: &Url, site: &SiteConfig) -> Option<String> {
    if site.single_page_link.is_empty() {
        return None;
    }
    let dom = Dom::parse_html(html);
    let root = dom.root_element()?;
    first_link(&XPathEvaluator::new(), &site.single_page_link, root, url)
}

/// First link produced by `rules`, resolved against `base`.
///
/// A string result is used directly, an element yields its `href`, and an attribute its value.
fn first_link(xpath: &XPathEvaluator, rules: &[String], context: Element<'_>, base: &Url) -> Option<String> {
    for rule in rules {
        let candidate = match xpath.evaluate(rule, context) {
            Ok(Value::String(s)) => Some(s),
            Ok(Value::Nodeset(nodes)) => nodes.document_order_first().and_then(|node| match node.element() {
                Some(el) => el.attribute_value("href").map(str::to_string),
                None => Some(node.string_value()),
            }),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(%rule, error = %e, "skipping link rule");
                None
            }
        };
        let Some(candidate) = candidate.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()) else {
            continue;
        };
        match base.join(&candidate) {
            Ok(resolved) => return Some(resolved.to_string()),
            Err(e) => tracing::debug!(%candidate, error = %e, "unresolvable link"),
        }
    }
    None
}

fn apply_replacements(html: &str, site: &SiteConfig) -> String {
    match site.replacements() {
        Some(pairs) => pairs.into_iter().fold(html.to_string(), |acc, (find, replace)| acc.replace(find, replace)),
        None => {
            tracing::warn!(
                find = site.find_string.len(),
                replace = site.replace_string.len(),
                "find_string/replace_string counts differ, skipping substitution"
            );
            html.to_string()
        }
    }
}

/// Remove a snapshot of elements, last in document order first.
fn remove_all(elements: Vec<Element<'_>>) {
    for el in elements.into_iter().rev() {
        remove_element(el);
    }
}

/// Quote a value for use as an XPath string literal.
fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}
