//! Input URL normalization and allow/block list checks.

use url::Url;

use crate::error::{FolioError, Result};

/// Turn user input into a fetchable URL.
///
/// `feed://` and `feed:` prefixes become plain HTTP, a missing scheme defaults
/// to `http`, and parsing percent-encodes non-ASCII characters and IDNA-encodes
/// unicode hostnames.
pub fn normalize_url(input: &str) -> Result<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(FolioError::InvalidUrl("empty URL".to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let candidate = if let Some(rest) = lower.strip_prefix("feed://").map(|_| &trimmed["feed://".len()..]) {
        format!("http://{}", rest)
    } else if lower.starts_with("feed:http://") || lower.starts_with("feed:https://") {
        trimmed["feed:".len()..].to_string()
    } else if !trimmed.contains("://") {
        format!("http://{}", trimmed.trim_start_matches('/'))
    } else {
        trimmed.to_string()
    };

    let url = Url::parse(&candidate).map_err(|e| FolioError::InvalidUrl(format!("{}: {}", input, e)))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(FolioError::InvalidUrl(format!("{}: missing host", input)));
    }
    Ok(url)
}

/// Whether `url` passes the substring lists.
///
/// A non-empty allow list admits only matching URLs and the block list is
/// then ignored; otherwise any block list match rejects.
pub fn is_url_allowed(url: &str, allowed: &[String], blocked: &[String]) -> bool {
    if !allowed.is_empty() {
        return allowed.iter().any(|a| !a.is_empty() && url.contains(a.as_str()));
    }
    !blocked.iter().any(|b| !b.is_empty() && url.contains(b.as_str()))
}

/// Like [`is_url_allowed`], but as an error naming the rejected URL.
pub fn check_url_allowed(url: &str, allowed: &[String], blocked: &[String]) -> Result<()> {
    if is_url_allowed(url, allowed, blocked) {
        Ok(())
    } else {
        tracing::info!(%url, "URL rejected by allow/block lists");
        Err(FolioError::UrlBlocked(url.to_string()))
    }
}
