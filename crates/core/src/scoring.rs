use crate::dom::{elements_by_tag, tag_name, text_content};
use regex::Regex;
use std::sync::LazyLock;
use sxd_document::dom::Element;

/// Positive patterns that suggest an element contains main content
static POSITIVE_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(article|body|content|entry|hentry|h-entry|main|page|post|text|blog|story|tweet)").unwrap()
});

/// Negative patterns that suggest an element does NOT contain main content
static NEGATIVE_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(banner|breadcrumbs?|combx|comment|community|disqus|extra|foot|header|menu|related|remark|rss|shoutbox|sidebar|sponsor|ad-break|agegate|pagination|pager|popup|share|social|promo)").unwrap()
});

/// Class/id patterns of page furniture that is dropped before scoring
static UNLIKELY_PATTERNS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(banner|breadcrumbs?|combx|comment|community|disqus|extra|foot|header|menu|related|remark|rss|shoutbox|sidebar|sponsor|ad-break|agegate|pagination|pager|popup|cookie|newsletter)").unwrap()
});

/// Configuration for content scoring algorithm
#[derive(Debug, Clone)]
pub struct ScoreConfig {
    /// Weight for positive class/ID patterns
    pub positive_weight: f64,
    /// Weight for negative class/ID patterns
    pub negative_weight: f64,
    /// Maximum content density score from character count
    pub max_char_density_score: f64,
    /// Maximum content density score from comma count
    pub max_comma_density_score: f64,
    /// Characters per point for content density scoring
    pub chars_per_point: usize,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            positive_weight: 25.0,
            negative_weight: -25.0,
            max_char_density_score: 3.0,
            max_comma_density_score: 3.0,
            chars_per_point: 100,
        }
    }
}

/// Result of scoring an element
#[derive(Debug, Clone)]
pub struct ScoreResult {
    pub tag_name: String,
    pub class: Option<String>,
    pub id: Option<String>,
    /// Base score from tag type
    pub base_score: f64,
    /// Weight adjustment from class/ID patterns
    pub class_weight: f64,
    pub content_density: f64,
    /// Link density (0.0 to 1.0)
    pub link_density: f64,
    pub final_score: f64,
}

/// Calculate the base score for an element based on its tag name
///
/// - ARTICLE: +10, SECTION: +8, DIV: +5
/// - TD, BLOCKQUOTE: +3
/// - FORM, ADDRESS and list elements: -3
/// - H1-H6, TH, HEADER, FOOTER, NAV: -5
pub fn base_tag_score(element: Element<'_>) -> f64 {
    match tag_name(element).to_ascii_lowercase().as_str() {
        "article" => 10.0,
        "section" => 8.0,
        "div" => 5.0,
        "td" | "blockquote" => 3.0,
        "pre" => 0.0,
        "form" => -3.0,
        "address" | "ol" | "ul" | "dl" | "dd" | "dt" | "li" => -3.0,
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "th" | "header" | "footer" | "nav" => -5.0,
        _ => 0.0,
    }
}

/// Calculate the class/ID weight adjustment for an element
///
/// Returns +positive_weight if the element's class or ID matches positive patterns,
/// or negative_weight if it matches negative patterns (but not positive).
pub fn class_id_weight(element: Element<'_>, config: &ScoreConfig) -> f64 {
    if let Some(id) = element.attribute_value("id") {
        if POSITIVE_PATTERNS.is_match(id) {
            return config.positive_weight;
        }
        if NEGATIVE_PATTERNS.is_match(id) {
            return config.negative_weight;
        }
    }

    if let Some(class) = element.attribute_value("class") {
        for class_name in class.split_whitespace() {
            if POSITIVE_PATTERNS.is_match(class_name) {
                return config.positive_weight;
            }
            if NEGATIVE_PATTERNS.is_match(class_name) {
                return config.negative_weight;
            }
        }
    }

    0.0
}

/// Whether the element's class or id marks it as page furniture rather than content.
pub fn is_unlikely_candidate(element: Element<'_>) -> bool {
    let signature = format!(
        "{} {}",
        element.attribute_value("class").unwrap_or_default(),
        element.attribute_value("id").unwrap_or_default()
    );
    UNLIKELY_PATTERNS.is_match(&signature) && !POSITIVE_PATTERNS.is_match(&signature)
}

/// Content density score of a text: one point per `chars_per_point` characters and one per comma, each capped.
pub fn content_density_score(text: &str, config: &ScoreConfig) -> f64 {
    let char_score = ((text.chars().count() / config.chars_per_point) as f64).min(config.max_char_density_score);
    let comma_score = (text.matches(',').count() as f64).min(config.max_comma_density_score);

    char_score + comma_score
}

/// Calculate the link density of an element
///
/// Link density is the ratio of link text characters to total text characters.
/// Returns a value from 0.0 (no links) to 1.0 (all text is in links).
pub fn link_density(element: Element<'_>) -> f64 {
    let text_length = text_content(element).trim().chars().count();
    if text_length == 0 {
        return 0.0;
    }

    let link_text_length = elements_by_tag(element, &["a"])
        .into_iter()
        .map(|link| text_content(link).trim().chars().count())
        .sum::<usize>();

    (link_text_length as f64 / text_length as f64).min(1.0)
}

/// Calculate the final score for an element
///
/// Combines base tag score, class/ID weight and content density, then applies
/// the link density penalty. The penalty is halved for elements with a
/// positive class/ID or more than 500 characters of text, and `<pre>` blocks
/// that look like code lose 10 points.
pub fn calculate_score(element: Element<'_>, config: &ScoreConfig) -> ScoreResult {
    let tag = tag_name(element).to_ascii_lowercase();
    let class = element.attribute_value("class").map(str::to_string);
    let id = element.attribute_value("id").map(str::to_string);
    let text = text_content(element);

    let base_score = base_tag_score(element);
    let class_weight = class_id_weight(element, config);
    let content_density = content_density_score(&text, config);
    let ld = link_density(element);
    let raw_score = base_score + class_weight + content_density;

    let is_code = tag == "pre" && text.len() > 50 && looks_like_code(&text);
    let is_content_rich = text.chars().count() > 500;
    let link_penalty = if class_weight > 0.0 || is_content_rich { 1.0 - (ld * 0.5) } else { 1.0 - ld };
    let code_penalty = if is_code { -10.0 } else { 0.0 };

    let final_score = (raw_score + code_penalty) * link_penalty;

    ScoreResult { tag_name: tag, class, id, base_score, class_weight, content_density, link_density: ld, final_score }
}

fn looks_like_code(text: &str) -> bool {
    let len = text.len() as f64;
    let comma_ratio = text.matches(',').count() as f64 / len;
    let space_ratio = text.matches(' ').count() as f64 / len;
    let special_ratio = text.chars().filter(|c| !c.is_alphanumeric() && !c.is_whitespace()).count() as f64 / len;

    special_ratio > 0.15 && comma_ratio < 0.01 && space_ratio < 0.15
}
