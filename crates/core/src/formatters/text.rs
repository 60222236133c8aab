use crate::content::Content;
use crate::error::Result;
use scraper::{ElementRef, Html};

const BLOCK_ELEMENTS: [&str; 14] =
    ["p", "div", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "td", "th", "figcaption"];

/// Configuration for plain text output
#[derive(Debug, Clone)]
pub struct TextConfig {
    /// Include a title and byline header
    pub include_header: bool,

    /// Wrap lines at specified width (0 = no wrapping)
    pub line_width: usize,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self { include_header: true, line_width: 0 }
    }
}

/// Convert an article to plain text, one paragraph per block element
pub fn convert_to_text(content: &Content, config: &TextConfig) -> Result<String> {
    let mut output = String::new();

    if config.include_header {
        output.push_str(&generate_header(content));
        output.push_str("\n\n");
    }

    let text = extract_text_with_paragraphs(&content.html);
    let final_text = if config.line_width > 0 { wrap_text(&text, config.line_width) } else { text };
    output.push_str(&final_text);

    Ok(output.trim().to_string())
}

/// Generate a header from the article fields
fn generate_header(content: &Content) -> String {
    let mut header = String::new();

    if !content.title.is_empty() {
        header.push_str(&content.title);
        header.push('\n');
        header.push_str(&"=".repeat(content.title.chars().count()));
        header.push('\n');
    }

    let mut meta_parts = Vec::new();

    if !content.authors.is_empty() {
        meta_parts.push(format!("By: {}", content.authors.join(", ")));
    }

    if let Some(date) = &content.date {
        meta_parts.push(format!("Date: {}", date));
    }

    meta_parts.push(format!("Source: {}", content.url));

    header.push_str(&meta_parts.join(" | "));
    header.push('\n');
    header
}

/// Text of the innermost block elements, separated by blank lines
fn extract_text_with_paragraphs(html: &str) -> String {
    let document = Html::parse_fragment(html);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut loose = String::new();

    for node in document.root_element().descendants() {
        if let Some(text) = node.value().as_text()
            && !node.ancestors().filter_map(ElementRef::wrap).any(|a| is_leaf_block(&a))
        {
            loose.push_str(text);
            continue;
        }

        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        if !is_leaf_block(&element) {
            continue;
        }

        flush(&mut loose, &mut paragraphs);
        let text = element.text().collect::<Vec<_>>().join("");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    flush(&mut loose, &mut paragraphs);

    paragraphs.join("\n\n")
}

fn is_block(element: &ElementRef<'_>) -> bool {
    BLOCK_ELEMENTS.contains(&element.value().name())
}

/// A block element with no block descendants.
fn is_leaf_block(element: &ElementRef<'_>) -> bool {
    is_block(element) && !element.descendants().filter_map(ElementRef::wrap).skip(1).any(|d| is_block(&d))
}

fn flush(loose: &mut String, paragraphs: &mut Vec<String>) {
    let text = loose.split_whitespace().collect::<Vec<_>>().join(" ");
    if !text.is_empty() {
        paragraphs.push(text);
    }
    loose.clear();
}

/// Wrap each paragraph to the specified line width
fn wrap_text(text: &str, width: usize) -> String {
    text.split("\n\n")
        .map(|p| {
            let words: Vec<&str> = p.split_whitespace().collect();
            wrap_words(&words, width)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Wrap a slice of words to specified width
fn wrap_words(words: &[&str], width: usize) -> String {
    let mut lines = Vec::new();
    let mut current_line = Vec::new();
    let mut current_length = 0;

    for &word in words {
        let word_len = word.chars().count();

        if current_length == 0 {
            current_line.push(word);
            current_length = word_len;
        } else if current_length + 1 + word_len <= width {
            current_length += 1 + word_len;
            current_line.push(word);
        } else {
            lines.push(current_line.join(" "));
            current_line = vec![word];
            current_length = word_len;
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line.join(" "));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_preserved() {
        let html = "<div><h2>Heading</h2><p>First   paragraph.</p><div><p>Nested <b>bold</b> one.</p></div>tail text</div>";
        assert_eq!(extract_text_with_paragraphs(html), "Heading\n\nFirst paragraph.\n\nNested bold one.\n\ntail text");
    }

    #[test]
    fn test_convert_with_header() {
        let content = Content::new(200, "https://example.com/a")
            .with_title("Title")
            .with_authors(vec!["Ann".to_string()])
            .with_html("<p>Body.</p>");
        let text = convert_to_text(&content, &TextConfig::default()).unwrap();
        assert_eq!(text, "Title\n=====\nBy: Ann | Source: https://example.com/a\n\n\nBody.");
    }

    #[test]
    fn test_convert_without_header() {
        let content = Content::new(200, "https://example.com/a").with_html("plain <em>words</em>");
        let config = TextConfig { include_header: false, line_width: 0 };
        assert_eq!(convert_to_text(&content, &config).unwrap(), "plain words");
    }

    #[test]
    fn test_wrap_text() {
        let wrapped = wrap_text("one two three four\n\nfive six", 9);
        assert_eq!(wrapped, "one two\nthree\nfour\n\nfive six");
    }
}
