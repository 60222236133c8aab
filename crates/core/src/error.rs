//! Error types for Folio operations.
//!
//! This module defines the main error type [`FolioError`] which represents
//! every hard failure of the fetch-and-extract pipeline. Soft failures
//! (transport errors, redirect loops, extraction misses) are not errors:
//! they surface as a [`crate::Content`] carrying a status and a placeholder.
//!
//! # Example
//!
//! ```rust
//! use folio_core::{FolioError, Result};
//!
//! fn require_body(html: &str) -> Result<&str> {
//!     if html.trim().is_empty() {
//!         return Err(FolioError::NoContent);
//!     }
//!     Ok(html)
//! }
//!
//! assert!(require_body("   ").is_err());
//! ```

use crate::ssrf::SsrfViolation;
use sxd_xpath::ExecutionError;
use thiserror::Error;

/// Main error type for fetch and extraction operations.
#[derive(Error, Debug)]
pub enum FolioError {
    /// HTTP client errors from reqwest.
    ///
    /// Only raised while building the client; failures of individual
    /// requests are folded into a synthetic status by the fetcher.
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Invalid URL provided.
    ///
    /// Returned when a URL cannot be normalized or parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// URL rejected by the configured allow/deny substring lists.
    #[error("URL blocked by policy: {0}")]
    UrlBlocked(String),

    /// URL rejected by the SSRF guard.
    ///
    /// Covers the scheme, port, host, credential and resolved-IP checks.
    #[error("URL rejected: {0}")]
    Ssrf(#[from] SsrfViolation),

    /// Content type configured as excluded.
    #[error("Content type {mime} is excluded ({url})")]
    ContentExcluded { url: String, mime: String },

    /// The caller cancelled the request.
    #[error("Request cancelled")]
    Cancelled,

    /// HTML parsing errors.
    #[error("Failed to parse HTML: {0}")]
    HtmlParseError(String),

    /// No content could be extracted from the document.
    #[error("No content could be extracted from the document")]
    NoContent,

    /// I/O errors while reading config files or writing output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid engine configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Site configuration errors.
    ///
    /// Returned when a site rule file cannot be read or contains a malformed line.
    #[error("Site configuration error: {0}")]
    SiteConfigError(String),

    /// XPath compilation or evaluation errors.
    #[error("XPath error: {0}")]
    XPathError(String),
}

impl From<ExecutionError> for FolioError {
    fn from(err: ExecutionError) -> Self {
        FolioError::XPathError(err.to_string())
    }
}

/// Result type alias for FolioError.
pub type Result<T> = std::result::Result<T, FolioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FolioError::InvalidUrl("not a url".to_string());
        assert!(err.to_string().contains("Invalid URL"));
    }

    #[test]
    fn test_content_excluded_error() {
        let err = FolioError::ContentExcluded {
            url: "http://example.com/a.zip".to_string(),
            mime: "application/zip".to_string(),
        };
        assert!(err.to_string().contains("application/zip"));
        assert!(err.to_string().contains("a.zip"));
    }

    #[test]
    fn test_ssrf_error_from() {
        let err: FolioError = SsrfViolation::Scheme("ftp".to_string()).into();
        assert!(matches!(err, FolioError::Ssrf(_)));
        assert!(err.to_string().contains("ftp"));
    }
}
