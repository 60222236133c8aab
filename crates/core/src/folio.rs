//! The fetch-and-extract entry point.
//!
//! [`Folio::fetch_content`] normalizes a URL, fetches it through the
//! SSRF-checked [`Fetcher`], dispatches on the response MIME type, runs the
//! [`ContentExtractor`] with the host's site rules, follows single-page and
//! next-page links, and assembles the final [`Content`].
//!
//! # Example
//!
//! ```rust,no_run
//! use folio_core::{Folio, FolioConfig};
//!
//! # async fn run() -> folio_core::Result<()> {
//! let folio = Folio::new(FolioConfig::builder().max_pages(5).build())?;
//! let content = folio.fetch_content("https://example.com/article").await?;
//! println!("{}: {}", content.title, content.summary.unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use url::Url;

use crate::charset::decode_body;
use crate::content::{Content, SUMMARY_LENGTH, summarize};
use crate::dom::{Dom, import_element, outer_html};
use crate::error::{FolioError, Result};
use crate::extract::{ContentExtractor, ExtractedContent, ExtractorConfig, single_page_link};
use crate::fetch::{FetchResult, FetchSession, Fetcher, FetcherConfig, STATUS_REDIRECT_LOOP, STATUS_TRANSPORT_FAILURE};
use crate::postprocess::{ContentLinks, assemble};
use crate::sanitize::sanitize;
use crate::siteconfig::{SiteConfig, SiteConfigRepository};
use crate::ssrf::{SsrfGuard, SsrfOptions};
use crate::urls::{check_url_allowed, is_url_allowed, normalize_url};

pub const DEFAULT_ERROR_MESSAGE: &str = "[unable to retrieve full-text content]";

pub const DEFAULT_ERROR_MESSAGE_TITLE: &str = "No title found";

/// Appended when a multi-page article could not be followed to its end.
pub const MULTIPAGE_ABORT_NOTICE: &str =
    "<p><em>This article appears to continue on subsequent pages which we could not extract</em></p>";

/// What to do with a response of a listed content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentTypeAction {
    /// Return a link (or embedded image) instead of extracted text
    Link,
    /// Fail with [`FolioError::ContentExcluded`]
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentTypeRule {
    pub action: ContentTypeAction,
    /// Human-readable name used in the generated link
    pub name: String,
}

impl ContentTypeRule {
    pub fn new(action: ContentTypeAction, name: impl Into<String>) -> Self {
        Self { action, name: name.into() }
    }
}

/// Engine configuration.
///
/// Every field has a default, so a partial JSON document is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// Look for a "view as single page" link and prefer that page
    pub singlepage: bool,
    /// Follow next-page links and stitch the pages together
    pub multipage: bool,
    /// Upper bound on pages stitched into one article
    pub max_pages: usize,
    pub rewrite_relative_urls: bool,
    pub content_links: ContentLinks,
    /// URL substrings; when non-empty only matching URLs are processed
    pub allowed_urls: Vec<String>,
    /// URL substrings rejected when `allowed_urls` is empty
    pub blocked_urls: Vec<String>,
    /// Rules keyed by MIME type or top-level type (`image`)
    pub content_type_exc: BTreeMap<String, ContentTypeRule>,
    /// Body and summary of a result when nothing could be extracted
    pub error_message: String,
    pub error_message_title: String,
    /// Maximum summary length in characters
    pub summary_length: usize,
    pub fetcher: FetcherConfig,
    pub extractor: ExtractorConfig,
    pub ssrf: SsrfOptions,
    /// Site rule directories, searched in order before the bundled rules
    pub site_config_dirs: Vec<PathBuf>,
}

impl Default for FolioConfig {
    fn default() -> Self {
        let rule = |action, name: &str| ContentTypeRule::new(action, name);
        Self {
            singlepage: true,
            multipage: true,
            max_pages: 10,
            rewrite_relative_urls: true,
            content_links: ContentLinks::Preserve,
            allowed_urls: Vec::new(),
            blocked_urls: Vec::new(),
            content_type_exc: BTreeMap::from([
                ("application/zip".to_string(), rule(ContentTypeAction::Exclude, "ZIP")),
                ("application/pdf".to_string(), rule(ContentTypeAction::Link, "PDF")),
                ("image".to_string(), rule(ContentTypeAction::Link, "Image")),
                ("audio".to_string(), rule(ContentTypeAction::Link, "Audio")),
                ("video".to_string(), rule(ContentTypeAction::Link, "Video")),
            ]),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            error_message_title: DEFAULT_ERROR_MESSAGE_TITLE.to_string(),
            summary_length: SUMMARY_LENGTH,
            fetcher: FetcherConfig::default(),
            extractor: ExtractorConfig::default(),
            ssrf: SsrfOptions::default(),
            site_config_dirs: SiteConfigRepository::default_user_dir().filter(|dir| dir.is_dir()).into_iter().collect(),
        }
    }
}

impl FolioConfig {
    pub fn builder() -> FolioConfigBuilder {
        FolioConfigBuilder::new()
    }

    /// Parse a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| FolioError::ConfigError(format!("Invalid config JSON: {}", e)))
    }

    /// Reject combinations that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.error_message.trim().is_empty() {
            return Err(FolioError::ConfigError("error_message must not be empty".to_string()));
        }
        if self.max_pages == 0 {
            return Err(FolioError::ConfigError("max_pages must be at least 1".to_string()));
        }
        if let Some(both) = self.allowed_urls.iter().find(|url| self.blocked_urls.contains(url)) {
            return Err(FolioError::ConfigError(format!("'{}' is both allowed and blocked", both)));
        }
        if self.content_type_exc.keys().any(|mime| mime.trim().is_empty()) {
            return Err(FolioError::ConfigError("content_type_exc keys must not be empty".to_string()));
        }
        SsrfGuard::new(self.ssrf.clone())?;
        Ok(())
    }

    /// The rule for `mime`, falling back to its top-level type.
    pub fn content_type_rule(&self, mime: &str) -> Option<&ContentTypeRule> {
        let top = mime.split('/').next().unwrap_or_default();
        self.content_type_exc.get(mime).or_else(|| self.content_type_exc.get(top))
    }
}

/// Builder for FolioConfig.
///
/// Provides a fluent API for configuring the engine.
#[derive(Debug, Default)]
pub struct FolioConfigBuilder {
    config: FolioConfig,
}

impl FolioConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singlepage(mut self, value: bool) -> Self {
        self.config.singlepage = value;
        self
    }

    pub fn multipage(mut self, value: bool) -> Self {
        self.config.multipage = value;
        self
    }

    pub fn max_pages(mut self, value: usize) -> Self {
        self.config.max_pages = value;
        self
    }

    pub fn rewrite_relative_urls(mut self, value: bool) -> Self {
        self.config.rewrite_relative_urls = value;
        self
    }

    pub fn content_links(mut self, value: ContentLinks) -> Self {
        self.config.content_links = value;
        self
    }

    pub fn allowed_url(mut self, value: impl Into<String>) -> Self {
        self.config.allowed_urls.push(value.into());
        self
    }

    pub fn blocked_url(mut self, value: impl Into<String>) -> Self {
        self.config.blocked_urls.push(value.into());
        self
    }

    /// Add or replace the rule for a MIME type or top-level type.
    pub fn content_type_exc(mut self, mime: impl Into<String>, action: ContentTypeAction, name: impl Into<String>) -> Self {
        self.config.content_type_exc.insert(mime.into(), ContentTypeRule::new(action, name));
        self
    }

    /// Drop the rule for a MIME type so it goes through extraction.
    pub fn without_content_type_exc(mut self, mime: &str) -> Self {
        self.config.content_type_exc.remove(mime);
        self
    }

    pub fn error_message(mut self, value: impl Into<String>) -> Self {
        self.config.error_message = value.into();
        self
    }

    pub fn error_message_title(mut self, value: impl Into<String>) -> Self {
        self.config.error_message_title = value.into();
        self
    }

    pub fn summary_length(mut self, value: usize) -> Self {
        self.config.summary_length = value;
        self
    }

    /// Per-request timeout in seconds.
    pub fn timeout(mut self, secs: u64) -> Self {
        self.config.fetcher.timeout = secs;
        self
    }

    pub fn user_agent(mut self, value: impl Into<String>) -> Self {
        self.config.fetcher.user_agent = value.into();
        self
    }

    pub fn fetcher(mut self, value: FetcherConfig) -> Self {
        self.config.fetcher = value;
        self
    }

    pub fn extractor(mut self, value: ExtractorConfig) -> Self {
        self.config.extractor = value;
        self
    }

    pub fn ssrf(mut self, value: SsrfOptions) -> Self {
        self.config.ssrf = value;
        self
    }

    /// Search `dir` for site rules before the directories added so far.
    pub fn site_config_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.config.site_config_dirs.insert(0, dir.as_ref().to_path_buf());
        self
    }

    pub fn build(self) -> FolioConfig {
        self.config
    }
}

/// The working document of a request.
struct Page {
    response: FetchResult,
    url: Url,
    html: String,
}

enum Dispatch {
    Html(String),
    Linked(Content),
}

enum SinglePage {
    Keep,
    Linked(Content),
    Found(FetchResult, String),
}

/// Fetches URLs and turns them into readable [`Content`].
///
/// Cheap to clone; clones share the HTTP client and the site rule cache.
#[derive(Debug, Clone)]
pub struct Folio {
    config: Arc<FolioConfig>,
    fetcher: Fetcher,
    repository: Arc<SiteConfigRepository>,
}

impl Folio {
    /// Validate `config` and build the engine.
    pub fn new(config: FolioConfig) -> Result<Self> {
        let repository = SiteConfigRepository::new(config.site_config_dirs.clone());
        Self::with_repository(config, Arc::new(repository))
    }

    /// Build the engine around an existing rule repository.
    pub fn with_repository(config: FolioConfig, repository: Arc<SiteConfigRepository>) -> Result<Self> {
        config.validate()?;
        let guard = SsrfGuard::new(config.ssrf.clone())?;
        let fetcher = Fetcher::new(config.fetcher.clone(), guard)?;
        Ok(Self { config: Arc::new(config), fetcher, repository })
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    pub fn repository(&self) -> &SiteConfigRepository {
        &self.repository
    }

    /// Fetch `url` and extract its article.
    pub async fn fetch_content(&self, url: &str) -> Result<Content> {
        self.fetch_content_with(url, None, None).await
    }

    /// Like [`Self::fetch_content`], bounded by a deadline and a cancellation token.
    pub async fn fetch_content_with(
        &self, url: &str, deadline: Option<Instant>, cancel: Option<CancellationToken>,
    ) -> Result<Content> {
        let mut session = FetchSession::new();
        if let Some(deadline) = deadline {
            session = session.with_deadline(deadline);
        }
        if let Some(cancel) = cancel {
            session = session.with_cancel(cancel);
        }

        let span = tracing::info_span!("fetch_content", url);
        self.run(url, session).instrument(span).await
    }

    async fn run(&self, raw: &str, mut session: FetchSession) -> Result<Content> {
        let url = normalize_url(raw)?;
        check_url_allowed(url.as_str(), &self.config.allowed_urls, &self.config.blocked_urls)?;

        let headers = self.repository.build_for_url(&url, "", false).http_header.clone();
        let response = self.fetcher.fetch(&mut session, url.as_str(), false, &headers).await?;
        check_url_allowed(&response.effective_url, &self.config.allowed_urls, &self.config.blocked_urls)?;
        tracing::info!(status = response.status, effective_url = %response.effective_url, "fetched");

        session.visit(url.as_str());
        session.visit(&response.effective_url);

        if response.body.is_empty() && matches!(response.status, STATUS_REDIRECT_LOOP | STATUS_TRANSPORT_FAILURE) {
            let effective = response.effective_url.clone();
            return Ok(self.failure(response, effective, ExtractedContent::default()));
        }

        let mut page = match self.dispatch(&response)? {
            Dispatch::Linked(content) => return Ok(content),
            Dispatch::Html(html) => Page { url: parse_effective(&response.effective_url, &url), response, html },
        };

        let mut single_page = false;
        if self.config.singlepage {
            let site = self.repository.build_for_url(&page.url, &page.html, true);
            if let Some(link) = single_page_link(&page.html, &page.url, &site) {
                match self.fetch_single_page(&mut session, &link, &page, &site).await? {
                    SinglePage::Keep => {}
                    SinglePage::Linked(content) => return Ok(content),
                    SinglePage::Found(response, html) => {
                        single_page = true;
                        let url = parse_effective(&response.effective_url, &page.url);
                        page = Page { response, url, html };
                    }
                }
            }
        }

        let site = self.repository.build_for_url(&page.url, &page.html, true);
        let extracted = self.extract(&page.html, &page.url, &site);
        if !extracted.success {
            tracing::info!(url = %page.url, "no content extracted");
            let effective = page.url.to_string();
            return Ok(self.failure(page.response, effective, extracted));
        }

        let mut bodies = vec![extracted.body.clone().unwrap_or_default()];
        if self.config.multipage && !single_page && extracted.next_page_url.is_some() {
            let (more, aborted) = self.follow_pages(&mut session, extracted.next_page_url.clone(), &headers).await?;
            bodies.extend(more);
            if aborted {
                bodies.push(MULTIPAGE_ABORT_NOTICE.to_string());
            }
        }

        let body = stitch(&bodies);
        let base = self.config.rewrite_relative_urls.then_some(&page.url);
        let html = sanitize(&assemble(&body, base, self.config.content_links));
        if html.trim().is_empty() {
            let effective = page.url.to_string();
            return Ok(self.failure(page.response, effective, extracted));
        }

        let summary = summarize(&html, self.config.summary_length);
        let language = extracted.language.clone().or_else(|| content_language(&page.response));
        Ok(Content::new(page.response.status, page.url.as_str())
            .with_html(html)
            .with_title(extracted.title.clone().unwrap_or_else(|| self.config.error_message_title.clone()))
            .with_language(language)
            .with_date(extracted.date)
            .with_authors(extracted.authors)
            .with_image(extracted.image)
            .with_native_ad(extracted.is_native_ad)
            .with_summary(summary)
            .with_headers(page.response.headers))
    }

    /// Fetch a single-page version of the article.
    async fn fetch_single_page(
        &self, session: &mut FetchSession, link: &str, page: &Page, site: &SiteConfig,
    ) -> Result<SinglePage> {
        if link == page.url.as_str() || link == page.response.effective_url {
            return Ok(SinglePage::Keep);
        }
        if !is_url_allowed(link, &self.config.allowed_urls, &self.config.blocked_urls) {
            tracing::debug!(%link, "single-page link blocked by URL lists");
            return Ok(SinglePage::Keep);
        }

        tracing::info!(%link, "fetching single-page version");
        let response = match self.fetcher.fetch(session, link, false, &site.http_header).await {
            Ok(response) => response,
            Err(FolioError::Cancelled) => return Err(FolioError::Cancelled),
            Err(e) => {
                tracing::warn!(%link, error = %e, "single-page fetch rejected");
                return Ok(SinglePage::Keep);
            }
        };
        if response.status >= 300 {
            tracing::debug!(%link, status = response.status, "single-page fetch unsuccessful");
            return Ok(SinglePage::Keep);
        }
        session.visit(&response.effective_url);

        Ok(match self.dispatch(&response)? {
            Dispatch::Html(html) => SinglePage::Found(response, html),
            Dispatch::Linked(content) => SinglePage::Linked(content),
        })
    }

    /// Fetch and extract next pages. Returns the bodies found and whether the chain was cut short.
    async fn follow_pages(
        &self, session: &mut FetchSession, mut next: Option<String>, headers: &[(String, String)],
    ) -> Result<(Vec<String>, bool)> {
        let mut bodies = Vec::new();

        while let Some(link) = next.take() {
            if bodies.len() + 1 >= self.config.max_pages {
                tracing::warn!(max_pages = self.config.max_pages, "multi-page limit reached");
                return Ok((bodies, true));
            }
            let Ok(next_url) = Url::parse(&link) else {
                tracing::warn!(%link, "unresolvable next-page link");
                return Ok((bodies, true));
            };
            if !session.visit(next_url.as_str()) {
                tracing::debug!(%next_url, "next page already visited");
                break;
            }
            if !is_url_allowed(next_url.as_str(), &self.config.allowed_urls, &self.config.blocked_urls) {
                tracing::warn!(%next_url, "next page blocked by URL lists");
                return Ok((bodies, true));
            }

            tracing::info!(%next_url, page = bodies.len() + 2, "fetching next page");
            let response = match self.fetcher.fetch(session, next_url.as_str(), false, headers).await {
                Ok(response) => response,
                Err(FolioError::Cancelled) => return Err(FolioError::Cancelled),
                Err(e) => {
                    tracing::warn!(%next_url, error = %e, "next page rejected");
                    return Ok((bodies, true));
                }
            };
            if response.status >= 400 || response.status == STATUS_REDIRECT_LOOP {
                tracing::warn!(%next_url, status = response.status, "next page unavailable");
                return Ok((bodies, true));
            }

            let html = match self.dispatch(&response) {
                Ok(Dispatch::Html(html)) => html,
                Ok(Dispatch::Linked(_)) | Err(_) => {
                    tracing::warn!(%next_url, mime = ?response.mime_type(), "next page is not HTML");
                    return Ok((bodies, true));
                }
            };

            let page_url = parse_effective(&response.effective_url, &next_url);
            let site = self.repository.build_for_url(&page_url, &html, true);
            let extracted = self.extract(&html, &page_url, &site);
            let Some(body) = extracted.body.filter(|_| extracted.success) else {
                tracing::warn!(%next_url, "no content on next page");
                return Ok((bodies, true));
            };

            bodies.push(body);
            next = extracted.next_page_url;
        }

        Ok((bodies, false))
    }

    /// Run the extractor. Kept synchronous so no DOM lives across an `.await`.
    fn extract(&self, html: &str, url: &Url, site: &SiteConfig) -> ExtractedContent {
        let mut extractor = ContentExtractor::new(self.config.extractor.clone());
        extractor.process(html, url, site, true);
        extractor.into_content()
    }

    /// Route a response by MIME type: extraction, a link result, or an error.
    fn dispatch(&self, response: &FetchResult) -> Result<Dispatch> {
        let mime = response.mime_type().unwrap_or_default();
        let Some(rule) = self.config.content_type_rule(&mime) else {
            return Ok(Dispatch::Html(decode_body(&response.body, response.content_type())));
        };

        match rule.action {
            ContentTypeAction::Exclude => {
                tracing::info!(url = %response.effective_url, %mime, "content type excluded");
                Err(FolioError::ContentExcluded { url: response.effective_url.clone(), mime })
            }
            ContentTypeAction::Link => {
                tracing::debug!(url = %response.effective_url, %mime, "content type linked");
                Ok(Dispatch::Linked(self.linked(response, &mime, &rule.name)))
            }
        }
    }

    /// A result pointing at a non-HTML resource.
    fn linked(&self, response: &FetchResult, mime: &str, name: &str) -> Content {
        let url = escape_html(&response.effective_url);
        let html = if mime.starts_with("image/") {
            format!(r#"<a href="{0}"><img src="{0}" alt="{1}"></a>"#, url, escape_html(name))
        } else {
            format!(r#"<a href="{}">Download {}</a>"#, url, escape_html(name))
        };

        let title = Url::parse(&response.effective_url)
            .ok()
            .and_then(|u| u.path_segments().and_then(|mut segments| segments.next_back().map(str::to_string)))
            .map(|segment| percent_decode_str(&segment).decode_utf8_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| name.to_string());

        Content::new(response.status, response.effective_url.clone())
            .with_html(sanitize(&html))
            .with_title(title)
            .with_headers(response.headers.clone())
    }

    /// The placeholder result for a page nothing could be extracted from.
    fn failure(&self, response: FetchResult, url: String, extracted: ExtractedContent) -> Content {
        let language = extracted.language.or_else(|| content_language(&response));
        Content::new(response.status, url)
            .with_html(self.config.error_message.clone())
            .with_title(extracted.title.unwrap_or_else(|| self.config.error_message_title.clone()))
            .with_language(language)
            .with_date(extracted.date)
            .with_authors(extracted.authors)
            .with_image(extracted.image)
            .with_native_ad(extracted.is_native_ad)
            .with_summary(Some(self.config.error_message.clone()))
            .with_headers(response.headers)
    }
}

fn parse_effective(effective: &str, fallback: &Url) -> Url {
    Url::parse(effective).unwrap_or_else(|_| fallback.clone())
}

/// First language of a `Content-Language` header.
fn content_language(response: &FetchResult) -> Option<String> {
    response
        .header("content-language")
        .and_then(|value| value.split(',').next())
        .map(|lang| lang.trim().to_string())
        .filter(|lang| !lang.is_empty())
}

/// Join page bodies: later pages are appended inside the first page's root element.
fn stitch(bodies: &[String]) -> String {
    let Some((first, rest)) = bodies.split_first() else {
        return String::new();
    };
    if rest.is_empty() {
        return first.clone();
    }

    let dom = Dom::parse_element(first);
    let Some(root) = dom.root_element() else {
        return first.clone();
    };
    for body in rest {
        let page = Dom::parse_element(body);
        if let Some(page_root) = page.root_element() {
            root.append_child(import_element(dom.document(), page_root));
        }
    }
    outer_html(root)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config_is_valid() {
        assert!(FolioConfig::default().validate().is_ok());
    }

    #[rstest]
    #[case(FolioConfig::builder().error_message("  ").build())]
    #[case(FolioConfig::builder().max_pages(0).build())]
    #[case(FolioConfig::builder().allowed_url("example.com").blocked_url("example.com").build())]
    fn test_invalid_configs(#[case] config: FolioConfig) {
        assert!(matches!(config.validate(), Err(FolioError::ConfigError(_))));
        assert!(Folio::new(config).is_err());
    }

    #[test]
    fn test_invalid_domain_regex() {
        let mut ssrf = SsrfOptions::default();
        ssrf.blacklist.domain.push("(unclosed".to_string());
        let config = FolioConfig::builder().ssrf(ssrf).build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let config = FolioConfig::from_json(r#"{"max_pages": 3, "content_links": "footnotes", "fetcher": {"timeout": 5}}"#).unwrap();
        assert_eq!(config.max_pages, 3);
        assert_eq!(config.content_links, ContentLinks::Footnotes);
        assert_eq!(config.fetcher.timeout, 5);
        assert_eq!(config.fetcher.max_redirect, 10);
        assert!(config.singlepage);
        assert!(FolioConfig::from_json("{not json").is_err());
    }

    #[test]
    fn test_content_type_rule_lookup() {
        let config = FolioConfig::default();
        assert_eq!(config.content_type_rule("image/png").map(|r| r.name.as_str()), Some("Image"));
        assert_eq!(config.content_type_rule("application/pdf").map(|r| r.action), Some(ContentTypeAction::Link));
        assert_eq!(config.content_type_rule("application/zip").map(|r| r.action), Some(ContentTypeAction::Exclude));
        assert!(config.content_type_rule("text/html").is_none());

        let config = FolioConfig::builder().without_content_type_exc("application/pdf").build();
        assert!(config.content_type_rule("application/pdf").is_none());
    }

    #[test]
    fn test_stitch_appends_into_first_root() {
        let bodies = vec![
            r#"<div class="story">my content</div>"#.to_string(),
            r#"<div class="story">my content</div>"#.to_string(),
        ];
        assert_eq!(stitch(&bodies), r#"<div class="story">my content<div class="story">my content</div></div>"#);
        assert_eq!(stitch(&bodies[..1]), bodies[0]);
        assert_eq!(stitch(&[]), "");
    }

    #[test]
    fn test_folio_is_send_sync_clone() {
        fn assert_bounds<T: Clone + Send + Sync>() {}
        assert_bounds::<Folio>();
    }

    #[test]
    fn test_content_language_header() {
        let response = FetchResult {
            effective_url: "https://example.com/".to_string(),
            body: bytes::Bytes::new(),
            headers: BTreeMap::from([("content-language".to_string(), "de-DE, en".to_string())]),
            status: 200,
        };
        assert_eq!(content_language(&response), Some("de-DE".to_string()));
    }
}
