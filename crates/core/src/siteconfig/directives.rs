use crate::error::{FolioError, Result};
use crate::readability::ParserKind;
use regex::Regex;
use std::sync::LazyLock;

static DIRECTIVE_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^([a-z_]+)(?:\((.*)\))?:(.*)$").unwrap());

/// A single site rule directive
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// XPath expressions for content extraction
    Title(String),
    Body(String),
    Date(String),
    Author(String),

    /// Strip directives for removing unwanted elements
    Strip(String),
    StripIdOrClass(String),
    StripImageSrc(String),
    StripAttr(String),

    /// XPath whose match marks the page as sponsored content
    NativeAdClue(String),

    /// Behavior options
    Tidy(bool),
    Prune(bool),
    AutodetectOnFailure(bool),
    Parser(String),
    SrcLazyLoadAttr(String),
    CacheKey(String),

    /// Pagination
    SinglePageLink(String),
    NextPageLink(String),

    /// Text replacement
    FindString(String),
    ReplaceString(String),
    /// `replace_string(find): replace` shorthand
    Replace(String, String),

    /// HTTP configuration
    HttpHeader(String, String),

    /// Testing
    TestUrl(String),

    /// Fingerprint matching (HTML regex -> config host)
    Fingerprint(String, String),
}

/// Rules for one site
///
/// List directives accumulate in file order. Scalar directives are tri-state:
/// `None` means "not set here" so a merge can fill it from another config.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteConfig {
    /// Extraction directives (multiple allowed, evaluated in order)
    pub title: Vec<String>,
    pub body: Vec<String>,
    pub date: Vec<String>,
    pub author: Vec<String>,

    /// Strip directives
    pub strip: Vec<String>,
    pub strip_id_or_class: Vec<String>,
    pub strip_image_src: Vec<String>,
    pub strip_attr: Vec<String>,

    pub native_ad_clue: Vec<String>,

    /// Behavior options
    pub tidy: Option<bool>,
    pub prune: Option<bool>,
    pub autodetect_on_failure: Option<bool>,
    pub parser: Option<String>,
    pub src_lazy_load_attr: Option<String>,
    /// Cache the built config under this key in addition to the host
    pub cache_key: Option<String>,

    /// Pagination
    pub single_page_link: Vec<String>,
    pub next_page_link: Vec<String>,

    /// Text replacement, paired by position
    pub find_string: Vec<String>,
    pub replace_string: Vec<String>,

    /// HTTP headers (lowercase name, value)
    pub http_header: Vec<(String, String)>,

    /// Test URLs
    pub test_url: Vec<String>,

    /// Fingerprints for CMS/platform detection (HTML regex, config host)
    pub fingerprint: Vec<(String, String)>,
}

impl SiteConfig {
    /// Create a new empty site config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directive to this config
    pub fn add_directive(&mut self, directive: Directive) {
        match directive {
            Directive::Title(xpath) => self.title.push(xpath),
            Directive::Body(xpath) => self.body.push(xpath),
            Directive::Date(xpath) => self.date.push(xpath),
            Directive::Author(xpath) => self.author.push(xpath),

            Directive::Strip(xpath) => self.strip.push(xpath),
            Directive::StripIdOrClass(pattern) => self.strip_id_or_class.push(pattern),
            Directive::StripImageSrc(pattern) => self.strip_image_src.push(pattern),
            Directive::StripAttr(xpath) => self.strip_attr.push(xpath),
            Directive::NativeAdClue(xpath) => self.native_ad_clue.push(xpath),

            Directive::Tidy(value) => self.tidy = Some(value),
            Directive::Prune(value) => self.prune = Some(value),
            Directive::AutodetectOnFailure(value) => self.autodetect_on_failure = Some(value),
            Directive::Parser(value) => self.parser = Some(value),
            Directive::SrcLazyLoadAttr(value) => self.src_lazy_load_attr = Some(value),
            Directive::CacheKey(value) => self.cache_key = Some(value),

            Directive::SinglePageLink(xpath) => self.single_page_link.push(xpath),
            Directive::NextPageLink(xpath) => self.next_page_link.push(xpath),

            Directive::FindString(find) => self.find_string.push(find),
            Directive::ReplaceString(replace) => self.replace_string.push(replace),
            Directive::Replace(find, replace) => {
                self.find_string.push(find);
                self.replace_string.push(replace);
            }

            Directive::HttpHeader(name, value) => self.http_header.push((name, value)),
            Directive::TestUrl(url) => self.test_url.push(url),
            Directive::Fingerprint(pattern, host) => self.fingerprint.push((pattern, host)),
        }
    }

    /// Merge `other` into this config.
    ///
    /// Lists are unioned with this config's entries first. Scalars already set
    /// here are kept; unset ones are taken from `other`.
    pub fn merge(&mut self, other: &SiteConfig) {
        union(&mut self.title, &other.title);
        union(&mut self.body, &other.body);
        union(&mut self.date, &other.date);
        union(&mut self.author, &other.author);

        union(&mut self.strip, &other.strip);
        union(&mut self.strip_id_or_class, &other.strip_id_or_class);
        union(&mut self.strip_image_src, &other.strip_image_src);
        union(&mut self.strip_attr, &other.strip_attr);
        union(&mut self.native_ad_clue, &other.native_ad_clue);

        self.tidy = self.tidy.or(other.tidy);
        self.prune = self.prune.or(other.prune);
        self.autodetect_on_failure = self.autodetect_on_failure.or(other.autodetect_on_failure);
        if self.parser.is_none() {
            self.parser.clone_from(&other.parser);
        }
        if self.src_lazy_load_attr.is_none() {
            self.src_lazy_load_attr.clone_from(&other.src_lazy_load_attr);
        }
        if self.cache_key.is_none() {
            self.cache_key.clone_from(&other.cache_key);
        }

        union(&mut self.single_page_link, &other.single_page_link);
        union(&mut self.next_page_link, &other.next_page_link);

        let balanced = |c: &SiteConfig| c.find_string.len() == c.replace_string.len();
        if balanced(self) && balanced(other) {
            for (find, replace) in other.find_string.iter().zip(&other.replace_string) {
                let present = self.find_string.iter().zip(&self.replace_string).any(|(f, r)| f == find && r == replace);
                if !present {
                    self.find_string.push(find.clone());
                    self.replace_string.push(replace.clone());
                }
            }
        } else {
            self.find_string.extend(other.find_string.iter().cloned());
            self.replace_string.extend(other.replace_string.iter().cloned());
        }

        for (name, value) in &other.http_header {
            if self.header(name).is_none() {
                self.http_header.push((name.clone(), value.clone()));
            }
        }

        union(&mut self.test_url, &other.test_url);
        union(&mut self.fingerprint, &other.fingerprint);
    }

    /// Effective tidy setting (default: true)
    pub fn tidy(&self) -> bool {
        self.tidy.unwrap_or(true)
    }

    /// Effective prune setting (default: true)
    pub fn prune(&self) -> bool {
        self.prune.unwrap_or(true)
    }

    /// Whether heuristics may run when the rules come up empty (default: true)
    pub fn autodetect_on_failure(&self) -> bool {
        self.autodetect_on_failure.unwrap_or(true)
    }

    /// The declared parser, if it names one this engine knows.
    pub fn parser(&self) -> Option<ParserKind> {
        let name = self.parser.as_deref()?;
        name.parse()
            .inspect_err(|e| tracing::debug!(parser = name, error = %e, "ignoring parser directive"))
            .ok()
    }

    /// Value of an `http_header(name)` directive, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.http_header.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
    }

    /// Find/replace pairs, or `None` when the two lists differ in length.
    pub fn replacements(&self) -> Option<Vec<(&str, &str)>> {
        if self.find_string.len() != self.replace_string.len() {
            return None;
        }
        Some(self.find_string.iter().zip(&self.replace_string).map(|(f, r)| (f.as_str(), r.as_str())).collect())
    }

    /// Check if this config has any meaningful extraction directives
    pub fn has_extraction_config(&self) -> bool {
        !self.body.is_empty() || !self.title.is_empty()
    }

    /// Check if this config is effectively empty
    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
            && self.title.is_empty()
            && self.author.is_empty()
            && self.date.is_empty()
            && self.strip.is_empty()
            && self.strip_id_or_class.is_empty()
            && self.next_page_link.is_empty()
            && self.single_page_link.is_empty()
    }
}

fn union<T: PartialEq + Clone>(into: &mut Vec<T>, from: &[T]) {
    for item in from {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}

/// Parse one rule line.
///
/// Returns `Ok(None)` for commands this engine does not know; those are skipped.
pub fn parse_directive(line: &str) -> Result<Option<Directive>> {
    let line = line.trim();
    let caps = DIRECTIVE_LINE
        .captures(line)
        .ok_or_else(|| FolioError::SiteConfigError(format!("Invalid directive format: {}", line)))?;

    let command = &caps[1];
    let arg = caps.get(2).map(|m| m.as_str().trim());
    let value = caps[3].trim().to_string();

    let directive = match (command, arg) {
        ("title", None) => Directive::Title(value),
        ("body", None) => Directive::Body(value),
        ("date", None) => Directive::Date(value),
        ("author", None) => Directive::Author(value),

        ("strip", None) => Directive::Strip(value),
        ("strip_id_or_class", None) => Directive::StripIdOrClass(value),
        ("strip_image_src", None) => Directive::StripImageSrc(value),
        ("strip_attr", None) => Directive::StripAttr(value),
        ("native_ad_clue", None) => Directive::NativeAdClue(value),

        ("tidy", None) => Directive::Tidy(parse_boolean(&value)),
        ("prune", None) => Directive::Prune(parse_boolean(&value)),
        ("autodetect_on_failure", None) => Directive::AutodetectOnFailure(parse_boolean(&value)),
        ("parser", None) => Directive::Parser(value),
        ("src_lazy_load_attr", None) => Directive::SrcLazyLoadAttr(value),
        ("cache_key", None) => Directive::CacheKey(value),

        ("single_page_link", None) => Directive::SinglePageLink(value),
        ("next_page_link", None) => Directive::NextPageLink(value),

        ("find_string", None) => Directive::FindString(value),
        ("replace_string", None) => Directive::ReplaceString(value),
        ("replace_string", Some(find)) => Directive::Replace(find.to_string(), value),

        ("http_header", Some(name)) => Directive::HttpHeader(name.to_ascii_lowercase(), value),

        ("test_url", None) => Directive::TestUrl(value),

        ("fingerprint", None) => {
            let (pattern, host) = value
                .rsplit_once('|')
                .ok_or_else(|| FolioError::SiteConfigError(format!("Invalid fingerprint format: {}", value)))?;
            Directive::Fingerprint(pattern.trim().to_string(), host.trim().to_string())
        }

        _ => {
            tracing::debug!(%command, "ignoring unknown site config directive");
            return Ok(None);
        }
    };

    Ok(Some(directive))
}

/// `yes` and `true` are true, anything else is false
fn parse_boolean(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "yes" | "true")
}
