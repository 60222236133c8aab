//! SSRF-safe page fetching.
//!
//! [`Fetcher::fetch`] resolves a URL to a final document: it follows HTTP
//! redirects itself (so every hop is validated by the [`SsrfGuard`]), follows
//! `<meta http-equiv="refresh">` and AJAX-crawl escapes, and tries `HEAD`
//! first for URLs that look like binary files. Network failures never become
//! errors; they become a [`FetchResult`] with a synthetic status.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use regex::bytes::Regex;
use reqwest::{Client, Method, Response, header};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{FolioError, Result};
use crate::ssrf::{SsrfGuard, ValidatedUrl, ValidationError, normalize_host};

/// Status reported when the redirect budget of a fetch is exhausted.
pub const STATUS_REDIRECT_LOOP: u16 = 310;

/// Status reported when no response could be obtained.
pub const STATUS_TRANSPORT_FAILURE: u16 = 500;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

pub const DEFAULT_REFERER: &str = "https://www.google.com/";

static CONDITIONAL_COMMENTS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<!--\[if[^\]]*\]>.*?<head>").unwrap());

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<html[^>]*>").unwrap());

static META_REFRESH: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r#"(?i)<meta\s+http-equiv\s*=\s*["']?refresh["']?\s+content\s*=\s*["']?\s*\d*\s*;\s*url\s*=\s*["']?([^"'>]+)"#)
            .unwrap(),
        Regex::new(r#"(?i)<meta\s+content\s*=\s*["']?\s*\d*\s*;\s*url\s*=\s*["']?([^"'>]+)["']?\s+http-equiv\s*=\s*["']?refresh"#)
            .unwrap(),
    ]
});

/// HTTP behaviour of the fetcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Per-request timeout in seconds
    pub timeout: u64,
    /// Redirect-style hops allowed per fetch (HTTP redirects, meta refresh, AJAX escape, HEAD retry)
    pub max_redirect: usize,
    pub user_agent: String,
    pub referer: String,
    /// User-Agent overrides keyed by host; a key also matches its subdomains
    pub user_agents: HashMap<String, String>,
    /// Literal find/replace pairs applied to URLs containing the key
    pub rewrite_url: BTreeMap<String, Vec<(String, String)>>,
    /// Content types (or top-level types) for which a HEAD response is enough
    pub header_only_types: Vec<String>,
    /// File extensions that suggest a binary resource
    pub header_only_clues: Vec<String>,
    /// Content types scanned for meta refresh and AJAX markers
    pub content_type_html: Vec<String>,
    /// Markers that request the `_escaped_fragment_` version of a page
    pub ajax_triggers: Vec<String>,
    /// Bodies are truncated past this many bytes
    pub max_body_size: usize,
}

fn pairs<C: FromIterator<(String, String)>>(items: &[(&str, &str)]) -> C {
    items.iter().map(|(a, b)| (a.to_string(), b.to_string())).collect()
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout: 10,
            max_redirect: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
            user_agents: pairs(&[("lifehacker.com", "PHP/5.2"), ("gawker.com", "PHP/5.2")]),
            rewrite_url: BTreeMap::from([
                ("docs.google.com".to_string(), pairs(&[("/Doc?", "/View?")])),
                ("tnr.com".to_string(), pairs(&[("tnr.com/article/", "tnr.com/print/article/")])),
            ]),
            header_only_types: ["image", "audio", "video"].map(String::from).to_vec(),
            header_only_clues: [
                "pdf", "mp3", "zip", "exe", "gif", "gzip", "gz", "jpeg", "jpg", "mpg", "mpeg", "png", "ppt", "mov",
            ]
            .map(String::from)
            .to_vec(),
            content_type_html: ["text/html", "application/xhtml+xml"].map(String::from).to_vec(),
            ajax_triggers: [
                r#"<meta name='fragment' content='!'"#,
                r#"<meta name="fragment" content="!""#,
                r#"<meta content='!' name='fragment'"#,
                r#"<meta content="!" name="fragment""#,
            ]
            .map(String::from)
            .to_vec(),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// The outcome of one top-level fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub effective_url: String,
    pub body: Bytes,
    /// Response headers with lowercase names
    pub headers: BTreeMap<String, String>,
    pub status: u16,
}

impl FetchResult {
    fn synthetic(url: &str, status: u16) -> Self {
        Self { effective_url: finalize_url(url), body: Bytes::new(), headers: BTreeMap::new(), status }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Lowercase MIME type without parameters
    pub fn mime_type(&self) -> Option<String> {
        self.content_type().map(mime_of).filter(|m| !m.is_empty())
    }
}

/// Per-request state threaded through every fetch of one extraction.
#[derive(Debug, Clone, Default)]
pub struct FetchSession {
    redirect_count: usize,
    initial_url: Option<String>,
    visited: HashSet<String>,
    deadline: Option<Instant>,
    cancel: CancellationToken,
}

impl FetchSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the wall-clock time of every fetch in this session.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Record `url` as visited. Returns false if it was already seen.
    ///
    /// Encoded and percent-decoded spellings of a URL count as the same page.
    pub fn visit(&mut self, url: &str) -> bool {
        self.visited.insert(visit_key(url))
    }

    pub fn has_visited(&self, url: &str) -> bool {
        self.visited.contains(&visit_key(url))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    fn begin(&mut self, url: &str) {
        self.redirect_count = 0;
        self.initial_url = Some(url.to_string());
    }

    fn finish(&mut self) {
        self.redirect_count = 0;
        self.initial_url = None;
    }
}

/// Serialized form of the parsed URL, which re-encodes decoded paths.
fn visit_key(url: &str) -> String {
    Url::parse(url).map(String::from).unwrap_or_else(|_| url.to_string())
}

enum Failure {
    Cancelled,
    Transport(String),
}

/// Clients bound to one resolved address, keyed by host, IP and port.
type PinnedClients = DashMap<(String, Ipv4Addr, u16), Client>;

#[derive(Debug, Clone)]
pub struct Fetcher {
    config: FetcherConfig,
    guard: SsrfGuard,
    client: Client,
    pinned: Arc<PinnedClients>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig, guard: SsrfGuard) -> Result<Self> {
        let client = Self::client_builder(&config).build()?;
        Ok(Self { config, guard, client, pinned: Arc::new(DashMap::new()) })
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    fn client_builder(config: &FetcherConfig) -> reqwest::ClientBuilder {
        Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.timeout))
            .connect_timeout(Duration::from_secs(config.timeout))
    }

    /// Fetch `url`, following every redirect-style indirection.
    ///
    /// `headers` are the site's `http_header` directives (lowercase names).
    /// Only SSRF violations and cancellation are errors.
    pub async fn fetch(
        &self, session: &mut FetchSession, url: &str, skip_type_check: bool, headers: &[(String, String)],
    ) -> Result<FetchResult> {
        session.begin(url);
        let result = self.fetch_loop(session, url, skip_type_check, headers).await;
        session.finish();
        result
    }

    async fn fetch_loop(
        &self, session: &mut FetchSession, url: &str, skip_type_check: bool, headers: &[(String, String)],
    ) -> Result<FetchResult> {
        let mut url = self.clean_url(url);
        let mut method = if !skip_type_check && self.looks_binary(&url) { Method::HEAD } else { Method::GET };

        loop {
            if session.is_cancelled() {
                return Err(FolioError::Cancelled);
            }

            session.redirect_count += 1;
            if session.redirect_count > self.config.max_redirect + 1 {
                let initial = session.initial_url.clone().unwrap_or_else(|| url.clone());
                tracing::warn!(url = %initial, max_redirect = self.config.max_redirect, "redirect limit reached");
                return Ok(FetchResult::synthetic(&initial, STATUS_REDIRECT_LOOP));
            }

            let validated = match self.guard.validate(&url).await {
                Ok(validated) => validated,
                Err(ValidationError::Rejected(violation)) => return Err(violation.into()),
                Err(ValidationError::Lookup { host, source }) => {
                    tracing::info!(url = %url, %host, error = %source, "DNS lookup failed");
                    return Ok(FetchResult::synthetic(&url, STATUS_TRANSPORT_FAILURE));
                }
            };
            tracing::debug!(url = %validated.url, %method, attempt = session.redirect_count, "fetching");

            let response = match self.send(session, &validated, method.clone(), headers).await {
                Ok(response) => response,
                Err(Failure::Cancelled) => return Err(FolioError::Cancelled),
                Err(Failure::Transport(e)) => {
                    tracing::info!(url = %validated.url, error = %e, "request failed");
                    return Ok(FetchResult::synthetic(&url, STATUS_TRANSPORT_FAILURE));
                }
            };

            let status = response.status().as_u16();
            let response_headers = collect_headers(&response);

            if (300..400).contains(&status)
                && let Some(location) = response_headers.get("location")
            {
                match validated.url.join(location.trim()) {
                    Ok(next) => {
                        url = strip_fragment(next.as_str());
                        continue;
                    }
                    Err(e) => tracing::debug!(%location, error = %e, "ignoring unusable Location header"),
                }
            }

            let content_type = response_headers.get("content-type").map(|ct| mime_of(ct)).unwrap_or_default();

            if method == Method::HEAD {
                if self.is_header_only(&content_type) {
                    return Ok(FetchResult {
                        effective_url: finalize_url(&url),
                        body: Bytes::new(),
                        headers: response_headers,
                        status,
                    });
                }
                method = Method::GET;
                continue;
            }

            let body = match self.read_body(session, response).await {
                Ok(body) => body,
                Err(Failure::Cancelled) => return Err(FolioError::Cancelled),
                Err(Failure::Transport(e)) => {
                    tracing::info!(url = %url, error = %e, "response body incomplete");
                    Bytes::new()
                }
            };

            if content_type.is_empty() || self.config.content_type_html.contains(&content_type) {
                let body = strip_conditional_comments(body);

                if let Some(target) = meta_refresh_target(&body, &validated.url)
                    && target != url
                {
                    tracing::debug!(from = %url, to = %target, "following meta refresh");
                    url = target;
                    method = Method::GET;
                    continue;
                }

                if !url.contains("_escaped_fragment_") && self.has_ajax_trigger(&body) {
                    url = add_escaped_fragment(&url, "");
                    tracing::debug!(to = %url, "following AJAX crawl marker");
                    method = Method::GET;
                    continue;
                }

                return Ok(FetchResult { effective_url: finalize_url(&url), body, headers: response_headers, status });
            }

            tracing::debug!(url = %url, mime = %content_type, "non-HTML response");
            return Ok(FetchResult { effective_url: finalize_url(&url), body, headers: response_headers, status });
        }
    }

    async fn send(
        &self, session: &FetchSession, validated: &ValidatedUrl, method: Method, site_headers: &[(String, String)],
    ) -> std::result::Result<Response, Failure> {
        let client = match validated.pinned_addr() {
            Some(ip) => self.pinned_client(&validated.host, ip, validated.url.port_or_known_default().unwrap_or(80))?,
            None => self.client.clone(),
        };

        let mut request = client
            .request(method, validated.url.clone())
            .header(header::USER_AGENT, self.user_agent_for(&validated.host, site_headers))
            .header(header::REFERER, site_header(site_headers, "referer").unwrap_or(&self.config.referer))
            .header(header::ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        for (name, value) in site_headers {
            if name != "user-agent" && name != "referer" {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        self.bounded(session, request.send()).await
    }

    /// A client that connects to `ip` for `host`, built once per address.
    fn pinned_client(&self, host: &str, ip: Ipv4Addr, port: u16) -> std::result::Result<Client, Failure> {
        let key = (host.to_string(), ip, port);
        if let Some(client) = self.pinned.get(&key) {
            return Ok(client.clone());
        }
        let client = Self::client_builder(&self.config)
            .resolve(host, SocketAddr::new(ip.into(), port))
            .build()
            .map_err(|e| Failure::Transport(e.to_string()))?;
        self.pinned.insert(key, client.clone());
        Ok(client)
    }

    async fn read_body(&self, session: &FetchSession, mut response: Response) -> std::result::Result<Bytes, Failure> {
        let mut body = BytesMut::new();
        while let Some(chunk) = self.bounded(session, response.chunk()).await? {
            body.extend_from_slice(&chunk);
            if body.len() >= self.config.max_body_size {
                body.truncate(self.config.max_body_size);
                tracing::debug!(limit = self.config.max_body_size, "response body truncated");
                break;
            }
        }
        Ok(body.freeze())
    }

    /// Await `future` under the session's deadline and cancellation token.
    async fn bounded<T>(
        &self, session: &FetchSession, future: impl Future<Output = reqwest::Result<T>>,
    ) -> std::result::Result<T, Failure> {
        let deadline = session.deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(self.config.timeout));
        tokio::select! {
            _ = session.cancel.cancelled() => Err(Failure::Cancelled),
            result = tokio::time::timeout_at(deadline, future) => match result {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => Err(Failure::Transport(e.to_string())),
                Err(_) => Err(Failure::Transport("deadline elapsed".to_string())),
            },
        }
    }

    fn user_agent_for<'a>(&'a self, host: &str, site_headers: &'a [(String, String)]) -> &'a str {
        if let Some(ua) = site_header(site_headers, "user-agent") {
            return ua;
        }
        let host = normalize_host(host);
        let mut candidate = host.as_str();
        loop {
            if let Some(ua) = self.config.user_agents.get(candidate) {
                return ua;
            }
            match candidate.split_once('.') {
                Some((_, parent)) if parent.contains('.') => candidate = parent,
                _ => return &self.config.user_agent,
            }
        }
    }

    /// Apply rewrite rules, turn `#!` into `_escaped_fragment_`, drop any other fragment.
    pub fn clean_url(&self, url: &str) -> String {
        let mut url = url.trim().to_string();
        for (key, rules) in &self.config.rewrite_url {
            if url.contains(key.as_str()) {
                for (find, replace) in rules {
                    url = url.replace(find.as_str(), replace);
                }
            }
        }

        if let Some((base, fragment)) = url.split_once("#!") {
            return add_escaped_fragment(base, fragment);
        }
        strip_fragment(&url)
    }

    fn looks_binary(&self, url: &str) -> bool {
        let Ok(parsed) = Url::parse(url) else {
            return false;
        };
        let last = parsed.path_segments().and_then(|mut s| s.next_back()).unwrap_or_default();
        match last.rsplit_once('.') {
            Some((_, ext)) => self.config.header_only_clues.iter().any(|c| c.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }

    fn is_header_only(&self, mime: &str) -> bool {
        let top = mime.split('/').next().unwrap_or_default();
        self.config.header_only_types.iter().any(|t| t == mime || t == top)
    }

    fn has_ajax_trigger(&self, body: &[u8]) -> bool {
        let text = String::from_utf8_lossy(body).to_lowercase();
        self.config.ajax_triggers.iter().any(|t| text.contains(&t.to_lowercase()))
    }
}

fn collect_headers(response: &Response) -> BTreeMap<String, String> {
    let mut headers: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in response.headers() {
        let value = String::from_utf8_lossy(value.as_bytes()).to_string();
        headers
            .entry(name.as_str().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    headers
}

fn site_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}

/// Lowercase MIME type without parameters.
pub fn mime_of(content_type: &str) -> String {
    content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}

fn strip_fragment(url: &str) -> String {
    match url.split_once('#') {
        Some((base, _)) => base.to_string(),
        None => url.to_string(),
    }
}

fn add_escaped_fragment(url: &str, fragment: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}_escaped_fragment_={}", url, separator, utf8_percent_encode(fragment, NON_ALPHANUMERIC))
}

/// Replace IE conditional-comment blocks ahead of `<head>` with the `<html>` tag they hide.
fn strip_conditional_comments(body: Bytes) -> Bytes {
    let Some(found) = CONDITIONAL_COMMENTS.find(&body) else {
        return body;
    };
    let block = found.as_bytes();
    let html_tag = HTML_TAG.find_iter(block).last().map(|m| m.as_bytes()).unwrap_or_default();

    let mut out = BytesMut::with_capacity(body.len());
    out.extend_from_slice(&body[..found.start()]);
    out.extend_from_slice(html_tag);
    out.extend_from_slice(b"<head>");
    out.extend_from_slice(&body[found.end()..]);
    out.freeze()
}

fn meta_refresh_target(body: &[u8], base: &Url) -> Option<String> {
    let target = META_REFRESH.iter().find_map(|re| re.captures(body))?;
    let target = String::from_utf8_lossy(&target[1]).replace("&amp;", "&");
    let target = target.trim();
    if target.is_empty() {
        return None;
    }
    base.join(target).ok().map(|u| strip_fragment(u.as_str()))
}

/// Drop `utm_*` tracking parameters and percent-decode.
pub fn finalize_url(url: &str) -> String {
    let cleaned = match Url::parse(url) {
        Ok(mut parsed) if parsed.query_pairs().any(|(k, _)| k.starts_with("utm_")) => {
            let kept: Vec<(String, String)> = parsed
                .query_pairs()
                .filter(|(k, _)| !k.starts_with("utm_"))
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            if kept.is_empty() {
                parsed.set_query(None);
            } else {
                parsed.query_pairs_mut().clear().extend_pairs(kept);
            }
            parsed.to_string()
        }
        _ => url.to_string(),
    };
    percent_decode_str(&cleaned).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssrf::SsrfOptions;
    use httpmock::Method::HEAD;
    use httpmock::prelude::*;

    fn fetcher(config: FetcherConfig) -> Fetcher {
        Fetcher::new(config, SsrfGuard::new(SsrfOptions::allow_all()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_simple_page() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/page");
                then.status(200).header("content-type", "text/html; charset=utf-8").body("<p>hello</p>");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let mut session = FetchSession::new();
        let result = fetcher.fetch(&mut session, &server.url("/page"), false, &[]).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.status, 200);
        assert_eq!(result.effective_url, server.url("/page"));
        assert_eq!(&result.body[..], b"<p>hello</p>");
        assert_eq!(result.mime_type(), Some("text/html".to_string()));
    }

    #[tokio::test]
    async fn test_follows_http_redirect() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/old");
                then.status(301).header("location", "/new#section");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/new");
                then.status(200).header("content-type", "text/html").body("new");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let result = fetcher.fetch(&mut FetchSession::new(), &server.url("/old"), false, &[]).await.unwrap();
        assert_eq!(result.status, 200);
        assert_eq!(result.effective_url, server.url("/new"));
    }

    #[tokio::test]
    async fn test_redirect_loop_reports_310() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/loop");
                then.status(302).header("location", "/loop");
            })
            .await;

        let fetcher = fetcher(FetcherConfig { max_redirect: 3, ..FetcherConfig::default() });
        let mut session = FetchSession::new();
        let result = fetcher.fetch(&mut session, &server.url("/loop"), false, &[]).await.unwrap();

        mock.assert_hits_async(4).await;
        assert_eq!(result.status, STATUS_REDIRECT_LOOP);
        assert_eq!(result.effective_url, server.url("/loop"));

        // the budget is per fetch, not per session
        let again = fetcher.fetch(&mut session, &server.url("/loop"), false, &[]).await.unwrap();
        assert_eq!(again.status, STATUS_REDIRECT_LOOP);
        mock.assert_hits_async(8).await;
    }

    #[tokio::test]
    async fn test_head_only_for_images() {
        let server = MockServer::start_async().await;
        let head = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/photo.jpg");
                then.status(200).header("content-type", "image/jpeg");
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/photo.jpg");
                then.status(200).header("content-type", "image/jpeg").body("binary");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let result = fetcher.fetch(&mut FetchSession::new(), &server.url("/photo.jpg"), false, &[]).await.unwrap();

        head.assert_hits_async(1).await;
        get.assert_hits_async(0).await;
        assert!(result.body.is_empty());
        assert_eq!(result.mime_type(), Some("image/jpeg".to_string()));
    }

    #[tokio::test]
    async fn test_head_then_get_for_non_media() {
        let server = MockServer::start_async().await;
        let head = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/paper.pdf");
                then.status(200).header("content-type", "application/pdf");
            })
            .await;
        let get = server
            .mock_async(|when, then| {
                when.method(GET).path("/paper.pdf");
                then.status(200).header("content-type", "application/pdf").body("%PDF-1.4");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let result = fetcher.fetch(&mut FetchSession::new(), &server.url("/paper.pdf"), false, &[]).await.unwrap();

        head.assert_hits_async(1).await;
        get.assert_hits_async(1).await;
        assert_eq!(&result.body[..], b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_follows_meta_refresh() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/start");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(r#"<html><head><meta http-equiv="refresh" content="0; url=/final"></head></html>"#);
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/final");
                then.status(200).header("content-type", "text/html").body("<p>final</p>");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let result = fetcher.fetch(&mut FetchSession::new(), &server.url("/start"), false, &[]).await.unwrap();
        assert_eq!(result.effective_url, server.url("/final"));
        assert_eq!(&result.body[..], b"<p>final</p>");
    }

    #[tokio::test]
    async fn test_follows_ajax_escape() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/app").query_param_missing("_escaped_fragment_");
                then.status(200)
                    .header("content-type", "text/html")
                    .body(r#"<html><head><meta name="fragment" content="!"></head><body></body></html>"#);
            })
            .await;
        let escaped = server
            .mock_async(|when, then| {
                when.method(GET).path("/app").query_param_exists("_escaped_fragment_");
                then.status(200).header("content-type", "text/html").body("<p>static</p>");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let result = fetcher.fetch(&mut FetchSession::new(), &server.url("/app"), false, &[]).await.unwrap();
        escaped.assert_async().await;
        assert_eq!(&result.body[..], b"<p>static</p>");
    }

    #[tokio::test]
    async fn test_strips_utm_parameters() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/p");
                then.status(200).header("content-type", "text/html").body("x");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let url = format!("{}?id=1&utm_source=feed&utm_medium=rss", server.url("/p"));
        let result = fetcher.fetch(&mut FetchSession::new(), &url, false, &[]).await.unwrap();
        assert_eq!(result.effective_url, format!("{}?id=1", server.url("/p")));
    }

    #[tokio::test]
    async fn test_site_headers_are_sent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/h").header("user-agent", "Custom/1.0").header("cookie", "consent=yes");
                then.status(200).body("ok");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let headers = vec![
            ("user-agent".to_string(), "Custom/1.0".to_string()),
            ("cookie".to_string(), "consent=yes".to_string()),
        ];
        fetcher.fetch(&mut FetchSession::new(), &server.url("/h"), false, &headers).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_transport_failure_is_status_500() {
        let fetcher = fetcher(FetcherConfig { timeout: 2, ..FetcherConfig::default() });
        let result = fetcher.fetch(&mut FetchSession::new(), "http://127.0.0.1:1/nothing", false, &[]).await.unwrap();
        assert_eq!(result.status, STATUS_TRANSPORT_FAILURE);
        assert!(result.body.is_empty());
    }

    #[tokio::test]
    async fn test_dns_failure_is_status_500() {
        let fetcher = fetcher(FetcherConfig::default());
        let url = "http://no-such-host.invalid/article";
        let result = fetcher.fetch(&mut FetchSession::new(), url, false, &[]).await.unwrap();
        assert_eq!(result.status, STATUS_TRANSPORT_FAILURE);
        assert_eq!(result.effective_url, url);
        assert!(result.body.is_empty());
    }

    #[tokio::test]
    async fn test_pinned_client_is_reused() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/named");
                then.status(200).header("content-type", "text/html").body("named");
            })
            .await;

        let fetcher = fetcher(FetcherConfig::default());
        let url = format!("http://localhost:{}/named", server.port());
        for _ in 0..2 {
            let result = fetcher.fetch(&mut FetchSession::new(), &url, false, &[]).await.unwrap();
            assert_eq!(result.status, 200);
        }

        mock.assert_hits_async(2).await;
        assert_eq!(fetcher.pinned.len(), 1);
        assert!(fetcher.clone().pinned.contains_key(&("localhost".to_string(), Ipv4Addr::LOCALHOST, server.port())));
    }

    #[test]
    fn test_visit_matches_decoded_and_encoded_urls() {
        let mut session = FetchSession::new();
        assert!(session.visit(&finalize_url("http://example.com/caf%C3%A9/a%20b")));
        assert!(session.has_visited("http://example.com/caf%C3%A9/a%20b"));
        assert!(!session.visit(Url::parse("http://example.com/café/a b").unwrap().as_str()));
        assert!(session.visit("http://example.com/other"));
    }

    #[test]
    fn test_default_config_tables() {
        let config = FetcherConfig::default();
        assert_eq!(config.user_agents.get("gawker.com").map(String::as_str), Some("PHP/5.2"));
        assert_eq!(
            config.rewrite_url["tnr.com"],
            vec![("tnr.com/article/".to_string(), "tnr.com/print/article/".to_string())]
        );
    }

    #[tokio::test]
    async fn test_ssrf_violation_is_an_error() {
        let fetcher = Fetcher::new(FetcherConfig::default(), SsrfGuard::new(SsrfOptions::default()).unwrap()).unwrap();
        let result = fetcher.fetch(&mut FetchSession::new(), "http://127.0.0.1/admin", false, &[]).await;
        assert!(matches!(result, Err(FolioError::Ssrf(_))));
    }

    #[tokio::test]
    async fn test_cancelled_session() {
        let fetcher = fetcher(FetcherConfig::default());
        let token = CancellationToken::new();
        token.cancel();
        let mut session = FetchSession::new().with_cancel(token);
        let result = fetcher.fetch(&mut session, "http://127.0.0.1:1/", false, &[]).await;
        assert!(matches!(result, Err(FolioError::Cancelled)));
    }

    #[test]
    fn test_clean_url() {
        let fetcher = fetcher(FetcherConfig::default());
        assert_eq!(fetcher.clean_url("http://example.com/a#top"), "http://example.com/a");
        assert_eq!(fetcher.clean_url("http://example.com/#!/post/1"), "http://example.com/?_escaped_fragment_=%2Fpost%2F1");
        assert_eq!(fetcher.clean_url("http://www.tnr.com/article/x"), "http://www.tnr.com/print/article/x");
    }

    #[test]
    fn test_looks_binary() {
        let fetcher = fetcher(FetcherConfig::default());
        assert!(fetcher.looks_binary("http://example.com/a/b.PDF"));
        assert!(!fetcher.looks_binary("http://example.com/article.html"));
        assert!(!fetcher.looks_binary("http://example.com/pdf"));
    }

    #[test]
    fn test_user_agent_overrides() {
        let fetcher = fetcher(FetcherConfig::default());
        assert_eq!(fetcher.user_agent_for("www.lifehacker.com", &[]), "PHP/5.2");
        assert_eq!(fetcher.user_agent_for("news.gawker.com", &[]), "PHP/5.2");
        assert_eq!(fetcher.user_agent_for("example.com", &[]), DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_strip_conditional_comments() {
        let body = Bytes::from_static(
            b"<!DOCTYPE html><!--[if IE 8]><html class=\"ie8\"><![endif]--><!--[if gt IE 8]><!--><html class=\"modern\"><!--<![endif]--><head><title>t</title>",
        );
        let stripped = strip_conditional_comments(body);
        assert_eq!(&stripped[..], b"<!DOCTYPE html><html class=\"modern\"><head><title>t</title>".as_slice());
    }

    #[test]
    fn test_finalize_url() {
        assert_eq!(finalize_url("http://example.com/caf%C3%A9?utm_source=x"), "http://example.com/caf\u{e9}");
        assert_eq!(finalize_url("http://example.com/a?b=1"), "http://example.com/a?b=1");
    }
}
