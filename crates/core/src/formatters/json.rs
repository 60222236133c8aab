use crate::content::Content;
use crate::error::{FolioError, Result};
use serde::Serialize;

/// Configuration for JSON output
#[derive(Debug, Clone)]
pub struct JsonConfig {
    /// Add a plain `text` field next to the HTML
    pub include_text: bool,
    /// Pretty print JSON output
    pub pretty: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self { include_text: false, pretty: true }
    }
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    #[serde(flatten)]
    content: &'a Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
}

/// Serialize an article with the result field names (`native_ad` for the ad flag)
pub fn convert_to_json(content: &Content, config: &JsonConfig) -> Result<String> {
    let output = JsonOutput { content, text: config.include_text.then(|| content.text()) };
    let json = if config.pretty { serde_json::to_string_pretty(&output) } else { serde_json::to_string(&output) };
    json.map_err(|e| FolioError::HtmlParseError(format!("JSON serialization failed: {}", e)))
}
