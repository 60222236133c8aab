use serde_json::Value;
use sxd_document::dom::Element;
use url::Url;

use crate::dom::XPathEvaluator;
use crate::siteconfig::SiteConfig;

/// Native-ad signals checked on every page in addition to site rules.
pub const DEFAULT_NATIVE_AD_CLUES: &[&str] = &[
    "//meta[@property='article:content_tier' and @content='sponsored']",
    "//*[@data-native-ad]",
];

/// Article signals found outside the body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub date: Option<String>,
    pub authors: Vec<String>,
    pub image: Option<String>,
    pub language: Option<String>,
    pub is_native_ad: bool,
}

impl Metadata {
    /// Read every signal from `root`'s document.
    ///
    /// `json_ld` holds the raw JSON-LD blocks of the page; unparsable blocks are ignored.
    pub fn extract(
        root: Element<'_>, json_ld: &[String], site: &SiteConfig, base: Option<&Url>, xpath: &XPathEvaluator,
    ) -> Self {
        let objects = parse_json_ld(json_ld);
        Self {
            date: extract_date(root, &objects, site, xpath),
            authors: extract_authors(root, &objects, site, xpath),
            image: extract_image(root, &objects, base, xpath),
            language: extract_language(root, xpath),
            is_native_ad: is_native_ad(root, site, xpath),
        }
    }
}

/// Extract date with priority fallback:
/// 1. site `date` rules
/// 2. JSON-LD `datePublished`
/// 3. Meta `article:published_time`
/// 4. `<time datetime="">` element
/// 5. Meta `date` / `DC.date`
pub fn extract_date(root: Element<'_>, json_ld: &[Value], site: &SiteConfig, xpath: &XPathEvaluator) -> Option<String> {
    if let Some(date) = xpath.first_string(&site.date, root) {
        return Some(date);
    }

    if let Some(date) = json_ld.iter().find_map(|obj| obj.get("datePublished").and_then(Value::as_str)) {
        return Some(date.trim().to_string());
    }

    meta_content(root, xpath, "article:published_time")
        .or_else(|| xpath.first_string(&["//time[@datetime]/@datetime".to_string()], root))
        .or_else(|| meta_content(root, xpath, "date"))
        .or_else(|| meta_content(root, xpath, "DC.date"))
}

/// Authors from site rules (every match, in order, de-duplicated), else
/// JSON-LD `author`, else meta `author` / `DC.creator`.
pub fn extract_authors(root: Element<'_>, json_ld: &[Value], site: &SiteConfig, xpath: &XPathEvaluator) -> Vec<String> {
    let mut names: Vec<String> = site.author.iter().flat_map(|rule| xpath.strings(rule, root)).collect();
    if names.is_empty() {
        names = json_ld.iter().filter_map(|obj| obj.get("author")).flat_map(json_ld_names).collect();
    }
    if names.is_empty() {
        names.extend(meta_content(root, xpath, "author").or_else(|| meta_content(root, xpath, "DC.creator")));
    }

    let mut authors: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if !name.is_empty() && !authors.contains(&name) {
            authors.push(name);
        }
    }
    authors
}

/// Lead image: `og:image`, then `twitter:image`, then JSON-LD `image`, made absolute.
pub fn extract_image(root: Element<'_>, json_ld: &[Value], base: Option<&Url>, xpath: &XPathEvaluator) -> Option<String> {
    let image = meta_content(root, xpath, "og:image")
        .or_else(|| meta_content(root, xpath, "twitter:image"))
        .or_else(|| json_ld.iter().filter_map(|obj| obj.get("image")).find_map(json_ld_url))?;

    match base.and_then(|b| b.join(&image).ok()) {
        Some(absolute) => Some(absolute.to_string()),
        None => Some(image),
    }
}

/// `<html lang>`, then a `DC.language` meta tag.
fn extract_language(root: Element<'_>, xpath: &XPathEvaluator) -> Option<String> {
    xpath.first_string(&["//html/@lang".to_string()], root).or_else(|| meta_content(root, xpath, "DC.language"))
}

/// Whether any native-ad clue matches.
pub fn is_native_ad(root: Element<'_>, site: &SiteConfig, xpath: &XPathEvaluator) -> bool {
    site.native_ad_clue
        .iter()
        .map(String::as_str)
        .chain(DEFAULT_NATIVE_AD_CLUES.iter().copied())
        .any(|clue| !xpath.nodes_lenient(clue, root).is_empty())
}

/// Get meta tag content by name or property attribute
fn meta_content(root: Element<'_>, xpath: &XPathEvaluator, attr: &str) -> Option<String> {
    let expression = format!("//meta[@name='{0}' or @property='{0}']/@content", attr);
    xpath.first_string(&[expression], root)
}

/// Parse JSON-LD blocks into a flat list of objects, unpacking arrays and `@graph`.
fn parse_json_ld(blocks: &[String]) -> Vec<Value> {
    let mut objects = Vec::new();
    let mut pending: Vec<Value> =
        blocks.iter().filter_map(|block| serde_json::from_str::<Value>(block.trim()).ok()).rev().collect();

    while let Some(value) = pending.pop() {
        match value {
            Value::Array(items) => pending.extend(items.into_iter().rev()),
            Value::Object(mut map) => {
                if let Some(graph) = map.remove("@graph") {
                    pending.push(graph);
                }
                objects.push(Value::Object(map));
            }
            _ => {}
        }
    }
    objects
}

/// Extract author names from a JSON-LD `author` field.
/// Handles string, object and array forms.
fn json_ld_names(author: &Value) -> Vec<String> {
    match author {
        Value::String(name) => vec![name.trim().to_string()],
        Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(|n| vec![n.trim().to_string()]).unwrap_or_default(),
        Value::Array(items) => items.iter().flat_map(json_ld_names).collect(),
        _ => Vec::new(),
    }
}

fn json_ld_url(image: &Value) -> Option<String> {
    let url = match image {
        Value::String(url) => Some(url.trim().to_string()),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str).map(|u| u.trim().to_string()),
        Value::Array(items) => items.iter().find_map(json_ld_url),
        _ => None,
    };
    url.filter(|u| !u.is_empty())
}
