use crate::siteconfig::directives::SiteConfig;
use crate::siteconfig::parser::ConfigParser;
use crate::ssrf::normalize_host;
use dashmap::DashMap;
use regex::{Regex, RegexBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use url::Url;

/// Rule files compiled into the binary, searched after every caller directory.
const BUNDLED: &[(&str, &str)] = &[
    ("global", include_str!("../../site_config/global.txt")),
    ("fingerprint.wordpress.com", include_str!("../../site_config/fingerprint.wordpress.com.txt")),
    ("fingerprint.blogger.com", include_str!("../../site_config/fingerprint.blogger.com.txt")),
];

/// HTML patterns identifying a publishing platform, with the rule file to load.
pub const DEFAULT_FINGERPRINTS: &[(&str, &str)] = &[
    (r#"<meta\s+name=["']generator["']\s+content=["']WordPress"#, "fingerprint.wordpress.com"),
    (r#"<meta\s+content=["']blogger["']\s+name=["']generator["']"#, "fingerprint.blogger.com"),
    (r#"<meta\s+name=["']generator["']\s+content=["']blogger["']"#, "fingerprint.blogger.com"),
];

/// Loads, merges and caches per-host rule sets.
///
/// Lookups are cached by normalized host (lowercase, leading `www.` removed)
/// and by a config's declared `cache_key`. Hosts without rules are cached
/// too. The cache is safe to share between concurrent requests.
#[derive(Debug)]
pub struct SiteConfigRepository {
    dirs: Vec<PathBuf>,
    cache: DashMap<String, Option<Arc<SiteConfig>>>,
    global: Arc<SiteConfig>,
    fingerprints: Vec<(Regex, String)>,
}

impl SiteConfigRepository {
    /// Create a repository searching `dirs` in order, then the bundled rules.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        let mut repository =
            Self { dirs, cache: DashMap::new(), global: Arc::new(SiteConfig::new()), fingerprints: Vec::new() };

        let global = repository.load("global").unwrap_or_default();
        repository.fingerprints = DEFAULT_FINGERPRINTS
            .iter()
            .map(|(pattern, host)| (pattern.to_string(), host.to_string()))
            .chain(global.fingerprint.iter().cloned())
            .filter_map(|(pattern, host)| compile_fingerprint(&pattern).map(|re| (re, host)))
            .collect();
        repository.global = Arc::new(global);

        repository
    }

    /// Repository backed by the bundled rules only.
    pub fn bundled() -> Self {
        Self::new(Vec::new())
    }

    /// Per-user rule directory (`~/.config/folio/site_config` on Linux).
    pub fn default_user_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("folio").join("site_config"))
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// The global rule set.
    pub fn global(&self) -> Arc<SiteConfig> {
        Arc::clone(&self.global)
    }

    /// Rules for `host`, trying the exact host and then its parent domain.
    pub fn build(&self, host: &str) -> Option<Arc<SiteConfig>> {
        self.build_with(host, false)
    }

    /// Rules for `host`. With `exact_host_match` the parent domain is not tried.
    pub fn build_with(&self, host: &str, exact_host_match: bool) -> Option<Arc<SiteConfig>> {
        let host = normalize_host(host.trim());
        if host.is_empty() {
            return None;
        }

        if let Some(cached) = self.cache.get(&host) {
            tracing::trace!(%host, found = cached.is_some(), "site config cache hit");
            return cached.value().clone();
        }

        let mut names = vec![host.clone()];
        if !exact_host_match && let Some((_, parent)) = host.split_once('.') {
            names.push(format!(".{}", parent));
        }

        let Some(config) = names.iter().find_map(|name| self.load(name)) else {
            // an exact miss says nothing about the parent domain
            if !exact_host_match {
                self.cache.insert(host, None);
            }
            return None;
        };
        let config = Arc::new(config);
        tracing::debug!(%host, "loaded site config");

        if let Some(key) = &config.cache_key {
            self.cache.insert(key.clone(), Some(Arc::clone(&config)));
        }
        self.cache.insert(host, Some(Arc::clone(&config)));
        Some(config)
    }

    /// Rules for a fetched page: host rules, then fingerprint rules when
    /// autodetection is on, then the global rules.
    pub fn build_for_url(&self, url: &Url, html: &str, add_to_cache: bool) -> Arc<SiteConfig> {
        let host = url.host_str().map(normalize_host).unwrap_or_default();
        let base = self.build(&host);

        let autodetect = base.as_ref().is_none_or(|c| c.autodetect_on_failure());
        let fingerprint = if autodetect { self.fingerprint(html) } else { None };
        let key = format!("{}+{}", host, fingerprint.unwrap_or("global"));

        if add_to_cache && let Some(cached) = self.cache.get(&key).and_then(|entry| entry.value().clone()) {
            return cached;
        }

        let mut merged = base.as_deref().cloned().unwrap_or_default();
        if let Some(fingerprint) = fingerprint
            && let Some(extra) = self.build_with(fingerprint, true)
        {
            tracing::debug!(%host, %fingerprint, "merging fingerprint rules");
            merged.merge(&extra);
        }
        merged.merge(&self.global);

        let merged = Arc::new(merged);
        if add_to_cache {
            self.cache.insert(key, Some(Arc::clone(&merged)));
        }
        merged
    }

    /// Merge two configs without touching the cache.
    pub fn merge_config(base: &SiteConfig, extra: &SiteConfig) -> SiteConfig {
        let mut merged = base.clone();
        merged.merge(extra);
        merged
    }

    /// Host of the rule file whose fingerprint matches `html`, if any.
    pub fn fingerprint(&self, html: &str) -> Option<&str> {
        self.fingerprints.iter().find(|(re, _)| re.is_match(html)).map(|(_, host)| host.as_str())
    }

    /// Read `{name}.txt` from the first directory that has it, else from the bundled set.
    fn load(&self, name: &str) -> Option<SiteConfig> {
        let file_name = format!("{}.txt", name);
        for dir in &self.dirs {
            let path = dir.join(&file_name);
            if !path.is_file() {
                continue;
            }
            match ConfigParser::parse_file(&path) {
                Ok(config) => return Some(config),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping site config file"),
            }
        }

        let (_, content) = BUNDLED.iter().find(|(bundled, _)| *bundled == name)?;
        match ConfigParser::parse_string(content) {
            Ok(config) => Some(config),
            Err(e) => {
                tracing::warn!(%name, error = %e, "skipping bundled site config");
                None
            }
        }
    }
}

impl Default for SiteConfigRepository {
    fn default() -> Self {
        let dirs = Self::default_user_dir().filter(|dir| dir.is_dir()).into_iter().collect();
        Self::new(dirs)
    }
}

/// Builder for SiteConfigRepository
#[derive(Debug, Default)]
pub struct SiteConfigRepositoryBuilder {
    dirs: Vec<PathBuf>,
}

impl SiteConfigRepositoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule directory. Earlier directories win.
    pub fn dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.dirs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add the per-user rule directory if it exists
    pub fn user_dir(mut self) -> Self {
        if let Some(dir) = SiteConfigRepository::default_user_dir().filter(|dir| dir.is_dir()) {
            self.dirs.push(dir);
        }
        self
    }

    pub fn build(self) -> SiteConfigRepository {
        SiteConfigRepository::new(self.dirs)
    }
}

fn compile_fingerprint(pattern: &str) -> Option<Regex> {
    let build = |p: &str| RegexBuilder::new(p).case_insensitive(true).build();
    match build(pattern).or_else(|_| build(&regex::escape(pattern))) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(%pattern, error = %e, "skipping fingerprint");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn repository_with(files: &[(&str, &str)]) -> (TempDir, SiteConfigRepository) {
        let temp_dir = TempDir::new().unwrap();
        for (name, content) in files {
            fs::write(temp_dir.path().join(name), content).unwrap();
        }
        let repository = SiteConfigRepositoryBuilder::new().dir(temp_dir.path()).build();
        (temp_dir, repository)
    }

    #[test]
    fn test_build_is_cached_across_www_prefix() {
        let (_dir, repository) = repository_with(&[("example.com.txt", "body: //article\n")]);

        let first = repository.build("example.com").unwrap();
        let second = repository.build("www.Example.com").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.body, vec!["//article"]);
    }

    #[test]
    fn test_build_parent_domain() {
        let (_dir, repository) = repository_with(&[(".example.org.txt", "title: //h1\n")]);

        assert!(repository.build("fr.example.org").is_some());
        assert!(repository.build_with("de.example.org", true).is_none());
    }

    #[test]
    fn test_build_unknown_host() {
        let (_dir, repository) = repository_with(&[]);
        assert!(repository.build("unknown.test").is_none());
        assert!(repository.build("").is_none());
    }

    #[test]
    fn test_unknown_host_is_cached() {
        let (dir, repository) = repository_with(&[]);
        assert!(repository.build("www.missing.test").is_none());
        assert!(matches!(repository.cache.get("missing.test").as_deref(), Some(None)));

        fs::write(dir.path().join("missing.test.txt"), "body: //main\n").unwrap();
        assert!(repository.build("missing.test").is_none());
    }

    #[test]
    fn test_exact_miss_is_not_cached() {
        let (_dir, repository) = repository_with(&[(".example.org.txt", "title: //h1\n")]);
        assert!(repository.build_with("fr.example.org", true).is_none());
        assert!(repository.build("fr.example.org").is_some());
    }

    #[test]
    fn test_cache_key_alias() {
        let (_dir, repository) = repository_with(&[("a.example.net.txt", "cache_key: shared\nbody: //main\n")]);
        repository.build("a.example.net").unwrap();
        assert!(repository.cache.contains_key("shared"));
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let (_dir, repository) = repository_with(&[("bad.example.txt", "this line has no colon\n")]);
        assert!(repository.build("bad.example").is_none());
    }

    #[test]
    fn test_caller_dir_overrides_bundled() {
        let (_dir, repository) = repository_with(&[("fingerprint.wordpress.com.txt", "body: //main\n")]);
        let config = repository.build_with("fingerprint.wordpress.com", true).unwrap();
        assert_eq!(config.body, vec!["//main"]);
    }

    #[test]
    fn test_bundled_rules() {
        let repository = SiteConfigRepository::bundled();
        let wordpress = repository.build_with("fingerprint.wordpress.com", true).unwrap();
        assert!(!wordpress.body.is_empty());
        assert!(!repository.global().strip_id_or_class.is_empty());
    }

    #[test]
    fn test_fingerprint_match() {
        let repository = SiteConfigRepository::bundled();
        let html = r#"<html><head><meta name="generator" content="WordPress 6.4"></head></html>"#;
        assert_eq!(repository.fingerprint(html), Some("fingerprint.wordpress.com"));
        assert_eq!(repository.fingerprint("<html><head></head></html>"), None);
    }

    #[test]
    fn test_build_for_url_merges_fingerprint_and_global() {
        let (_dir, repository) = repository_with(&[("blog.example.com.txt", "title: //h2\n")]);
        let url = Url::parse("https://blog.example.com/post").unwrap();
        let html = r#"<meta name="generator" content="WordPress 6.4">"#;

        let config = repository.build_for_url(&url, html, true);
        assert_eq!(config.title[0], "//h2");
        assert!(config.title.len() > 1);
        assert!(!config.body.is_empty());
        assert_eq!(config.prune, Some(false));
        assert!(config.strip_id_or_class.iter().any(|s| s == "sharedaddy"));

        let again = repository.build_for_url(&url, html, true);
        assert!(Arc::ptr_eq(&config, &again));
    }

    #[test]
    fn test_build_for_url_respects_autodetect_off() {
        let (_dir, repository) =
            repository_with(&[("strict.example.com.txt", "title: //h2\nautodetect_on_failure: no\n")]);
        let url = Url::parse("https://strict.example.com/post").unwrap();
        let html = r#"<meta name="generator" content="WordPress 6.4">"#;

        let config = repository.build_for_url(&url, html, false);
        assert_eq!(config.title, vec!["//h2"]);
        assert!(config.body.is_empty());
    }

    #[test]
    fn test_merge_config() {
        let base = ConfigParser::parse_string("title: //h1\ntidy: no").unwrap();
        let extra = ConfigParser::parse_string("title: //h2\ntidy: yes\nprune: no").unwrap();
        let merged = SiteConfigRepository::merge_config(&base, &extra);
        assert_eq!(merged.title, vec!["//h1", "//h2"]);
        assert_eq!(merged.tidy, Some(false));
        assert_eq!(merged.prune, Some(false));
    }
}
