//! The final result of a fetch-and-extract run.
//!
//! [`Content`] is immutable once built; the `with_*` methods return modified
//! copies. Conversion to the supported output formats lives here too.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dom::{Dom, normalize_space, text_content};
use crate::error::Result;
use crate::formatters::{JsonConfig, MarkdownConfig, TextConfig, convert_to_json, convert_to_markdown, convert_to_text};

/// Default summary length in characters.
pub const SUMMARY_LENGTH: usize = 250;

/// Output format options for [`Content`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// The sanitized article HTML
    #[default]
    Html,
    /// Markdown with TOML frontmatter
    Markdown,
    PlainText,
    /// The whole result as JSON
    Json,
}

/// A readable article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// HTTP status of the page the body came from, or a synthetic one (310, 500)
    pub status: u16,
    /// Sanitized article HTML
    pub html: String,
    pub title: String,
    pub language: Option<String>,
    pub date: Option<String>,
    pub authors: Vec<String>,
    /// Effective URL after redirects and single-page substitution
    pub url: String,
    pub image: Option<String>,
    /// Response headers of the first page, lowercased names
    pub headers: BTreeMap<String, String>,
    #[serde(rename = "native_ad")]
    pub is_native_ad: bool,
    pub summary: Option<String>,
}

impl Content {
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self { status, url: url.into(), ..Default::default() }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_date(mut self, date: Option<String>) -> Self {
        self.date = date;
        self
    }

    pub fn with_authors(mut self, authors: Vec<String>) -> Self {
        self.authors = authors;
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_native_ad(mut self, is_native_ad: bool) -> Self {
        self.is_native_ad = is_native_ad;
        self
    }

    pub fn with_summary(mut self, summary: Option<String>) -> Self {
        self.summary = summary;
        self
    }

    /// A header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Plain text of the article body, whitespace collapsed.
    pub fn text(&self) -> String {
        html_text(&self.html)
    }

    /// Converts content to the specified format.
    pub fn to_format(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Html => Ok(self.html.clone()),
            OutputFormat::Markdown => convert_to_markdown(self, &MarkdownConfig::default()),
            OutputFormat::PlainText => convert_to_text(self, &TextConfig::default()),
            OutputFormat::Json => convert_to_json(self, &JsonConfig::default()),
        }
    }
}

/// Whitespace-normalized text of an HTML fragment.
pub fn html_text(html: &str) -> String {
    let dom = Dom::parse_fragment(html);
    dom.root_element().map(|root| normalize_space(&text_content(root))).unwrap_or_default()
}

/// Truncate the text of `html` to at most `length` characters at a word boundary.
///
/// Returns `None` when the HTML has no text.
pub fn summarize(html: &str, length: usize) -> Option<String> {
    let text = html_text(html);
    if text.is_empty() {
        return None;
    }
    if text.chars().count() <= length {
        return Some(text);
    }

    let cut = text.char_indices().nth(length).map(|(i, _)| i).unwrap_or(text.len());
    let head = &text[..cut];
    let head = match head.rfind(' ') {
        Some(space) if space > 0 => &head[..space],
        _ => head,
    };
    Some(format!("{}…", head.trim_end_matches([',', ';', ':', '.', ' '])))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Content {
        Content::new(200, "https://example.com/a")
            .with_title("A Title")
            .with_html("<p>Body <b>text</b></p>")
            .with_authors(vec!["Ann".to_string()])
            .with_native_ad(true)
            .with_headers(BTreeMap::from([("content-type".to_string(), "text/html".to_string())]))
    }

    #[test]
    fn test_with_methods_copy() {
        let original = sample();
        let changed = original.clone().with_status(500).with_title("Other");
        assert_eq!(original.status, 200);
        assert_eq!(original.title, "A Title");
        assert_eq!(changed.status, 500);
        assert_eq!(changed.title, "Other");
        assert_eq!(changed.html, original.html);
    }

    #[test]
    fn test_serializes_native_ad_field() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["native_ad"], true);
        assert!(json.get("is_native_ad").is_none());
        assert_eq!(json["headers"]["content-type"], "text/html");
        assert_eq!(json["authors"][0], "Ann");
    }

    #[test]
    fn test_header_lookup() {
        assert_eq!(sample().header("Content-Type"), Some("text/html"));
        assert_eq!(sample().header("x-missing"), None);
    }

    #[test]
    fn test_text() {
        assert_eq!(sample().text(), "Body text");
    }

    #[test]
    fn test_summarize_short_text_untouched() {
        assert_eq!(summarize("<p>Short  piece\nof text.</p>", 250), Some("Short piece of text.".to_string()));
        assert_eq!(summarize("<div> </div>", 250), None);
    }

    #[test]
    fn test_summarize_cuts_at_word_boundary() {
        let summary = summarize("<p>The quick brown fox jumps over the lazy dog</p>", 18).unwrap();
        assert_eq!(summary, "The quick brown…");
    }

    #[test]
    fn test_summarize_multibyte() {
        let summary = summarize("<p>héllo wörld ünïcode text</p>", 13).unwrap();
        assert_eq!(summary, "héllo wörld…");
    }

    #[test]
    fn test_to_format_html_and_json() {
        let content = sample();
        assert_eq!(content.to_format(OutputFormat::Html).unwrap(), "<p>Body <b>text</b></p>");
        let json: serde_json::Value = serde_json::from_str(&content.to_format(OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(json["title"], "A Title");
    }
}
