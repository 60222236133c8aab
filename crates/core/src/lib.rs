pub mod charset;
pub mod content;
pub mod dom;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod folio;
pub mod formatters;
pub mod metadata;
pub mod postprocess;
pub mod readability;
pub mod sanitize;
pub mod scoring;
pub mod siteconfig;
pub mod ssrf;
pub mod tidy;
pub mod urls;

pub use content::{Content, OutputFormat, summarize};
pub use error::{FolioError, Result};
pub use extract::{ContentExtractor, ExtractedContent, ExtractorConfig};
pub use fetch::{FetchResult, FetchSession, Fetcher, FetcherConfig};
pub use folio::{ContentTypeAction, ContentTypeRule, Folio, FolioConfig, FolioConfigBuilder};
pub use formatters::{JsonConfig, MarkdownConfig, TextConfig};
pub use formatters::{convert_to_json, convert_to_markdown, convert_to_text};
pub use metadata::Metadata;
pub use postprocess::ContentLinks;
pub use readability::{ParserKind, Readability, ReadabilityConfig};
pub use sanitize::sanitize;
#[doc(hidden)]
pub use scoring::{ScoreConfig, ScoreResult, calculate_score, link_density};
pub use siteconfig::{ConfigParser, Directive, SiteConfig, SiteConfigRepository, SiteConfigRepositoryBuilder};
pub use ssrf::{SsrfGuard, SsrfList, SsrfOptions, SsrfViolation, ValidationError};
pub use urls::normalize_url;
