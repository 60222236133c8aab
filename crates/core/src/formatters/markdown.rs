use crate::content::Content;
use crate::error::{FolioError, Result};

/// Configuration for Markdown conversion
#[derive(Debug, Clone)]
pub struct MarkdownConfig {
    /// Include TOML frontmatter with metadata
    pub include_frontmatter: bool,
    /// Include title as H1 heading at the start of content
    pub include_title_heading: bool,
    /// Strip images from output
    pub strip_images: bool,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self { include_frontmatter: true, include_title_heading: true, strip_images: false }
    }
}

/// Convert an article to Markdown with optional frontmatter
pub fn convert_to_markdown(content: &Content, config: &MarkdownConfig) -> Result<String> {
    let mut output = String::new();

    if config.include_frontmatter {
        output.push_str(&generate_frontmatter(content));
        output.push('\n');
    }

    if config.include_title_heading && !content.title.is_empty() {
        output.push_str(&format!("# {}\n\n", content.title));
    }

    let html = if config.strip_images { strip_images(&content.html)? } else { content.html.clone() };
    output.push_str(html_to_markdown(&html).trim());
    output.push('\n');

    Ok(output)
}

/// Generate TOML frontmatter from the article fields
fn generate_frontmatter(content: &Content) -> String {
    let mut frontmatter = String::from("+++");

    if !content.title.is_empty() {
        frontmatter.push_str(&format!("\ntitle = {}", toml_escape_string(&content.title)));
    }

    if !content.authors.is_empty() {
        let authors: Vec<String> = content.authors.iter().map(|a| toml_escape_string(a)).collect();
        frontmatter.push_str(&format!("\nauthors = [{}]", authors.join(", ")));
    }

    if let Some(date) = &content.date {
        frontmatter.push_str(&format!("\ndate = {}", toml_escape_string(date)));
    }

    if let Some(language) = &content.language {
        frontmatter.push_str(&format!("\nlanguage = {}", toml_escape_string(language)));
    }

    frontmatter.push_str(&format!("\nurl = {}", toml_escape_string(&content.url)));

    if let Some(image) = &content.image {
        frontmatter.push_str(&format!("\nimage = {}", toml_escape_string(image)));
    }

    if content.is_native_ad {
        frontmatter.push_str("\nnative_ad = true");
    }

    frontmatter.push_str("\n+++\n");
    frontmatter
}

/// Escape a string for TOML format
fn toml_escape_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n"))
}

/// Convert HTML to Markdown using htmd crate
#[cfg(feature = "markdown")]
fn html_to_markdown(html: &str) -> String {
    let converter = htmd::HtmlToMarkdown::builder().skip_tags(vec!["script", "style", "noscript"]).build();
    converter.convert(html).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "markdown conversion failed, using plain text");
        crate::content::html_text(html)
    })
}

/// Fallback HTML to text conversion when markdown feature is disabled
#[cfg(not(feature = "markdown"))]
fn html_to_markdown(html: &str) -> String {
    crate::content::html_text(html)
}

/// Strip all img tags from HTML
fn strip_images(html: &str) -> Result<String> {
    let mut output = Vec::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("img, picture", |el| {
                el.remove();
                Ok(())
            })],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    if rewriter.write(html.as_bytes()).is_err() || rewriter.end().is_err() {
        return Ok(html.to_string());
    }
    String::from_utf8(output).map_err(|e| FolioError::HtmlParseError(e.to_string()))
}
