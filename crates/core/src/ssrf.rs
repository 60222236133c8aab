//! SSRF guard.
//!
//! Every URL the fetcher touches (the initial one and each redirect hop) goes
//! through [`SsrfGuard::validate`] before a request is sent. The guard checks
//! scheme, port, credentials and host against allow/deny lists, resolves the
//! host to IPv4 addresses and checks each address against CIDR lists.

use crate::error::{FolioError, Result};
use ipnet::IpNet;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use thiserror::Error;
use tokio::net::lookup_host;
use url::{Host, Url};

/// Private, loopback, link-local, multicast and reserved IPv4 ranges.
pub const DEFAULT_BLOCKED_CIDRS: &[&str] = &[
    "0.0.0.0/8",
    "10.0.0.0/8",
    "100.64.0.0/10",
    "127.0.0.0/8",
    "169.254.0.0/16",
    "172.16.0.0/12",
    "192.0.0.0/24",
    "192.0.2.0/24",
    "192.168.0.0/16",
    "198.18.0.0/15",
    "198.51.100.0/24",
    "203.0.113.0/24",
    "224.0.0.0/4",
    "240.0.0.0/4",
    "255.255.255.255",
];

pub const DEFAULT_ALLOWED_PORTS: &[u16] = &[80, 443, 8080];

pub const DEFAULT_ALLOWED_SCHEMES: &[&str] = &["http", "https"];

/// Why a URL was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SsrfViolation {
    #[error("empty URL")]
    Empty,

    #[error("unparsable URL '{0}'")]
    Unparsable(String),

    #[error("credentials are not allowed in '{0}'")]
    Credentials(String),

    #[error("scheme '{0}' is not allowed")]
    Scheme(String),

    #[error("port {0} is not allowed")]
    Port(u16),

    #[error("domain '{0}' is not allowed")]
    Domain(String),

    #[error("address {0} is not allowed")]
    Ip(IpAddr),

    #[error("host '{0}' does not resolve to an IPv4 address")]
    Unresolvable(String),
}

/// Why [`SsrfGuard::validate`] produced no URL.
///
/// A failed lookup is a transport problem, not a policy decision, so callers
/// treat it like a refused connection.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error(transparent)]
    Rejected(#[from] SsrfViolation),

    #[error("DNS lookup for '{host}' failed: {source}")]
    Lookup {
        host: String,
        #[source]
        source: std::io::Error,
    },
}

/// One side of the SSRF policy. Empty lists impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrfList {
    /// IPs or CIDR ranges
    pub ip: Vec<String>,
    pub port: Vec<u16>,
    /// Regular expressions matched against the whole host (case-insensitive, `www.` stripped)
    pub domain: Vec<String>,
    pub scheme: Vec<String>,
}

/// SSRF policy. A value passes a list pair when it is in the whitelist (if
/// the whitelist is non-empty) and absent from the blacklist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SsrfOptions {
    pub whitelist: SsrfList,
    pub blacklist: SsrfList,
    pub allow_credentials: bool,
    /// Connect to the validated IP instead of resolving the host again
    pub pin_dns: bool,
}

impl Default for SsrfOptions {
    fn default() -> Self {
        Self {
            whitelist: SsrfList {
                port: DEFAULT_ALLOWED_PORTS.to_vec(),
                scheme: DEFAULT_ALLOWED_SCHEMES.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            blacklist: SsrfList { ip: DEFAULT_BLOCKED_CIDRS.iter().map(|s| s.to_string()).collect(), ..Default::default() },
            allow_credentials: false,
            pin_dns: true,
        }
    }
}

impl SsrfOptions {
    /// Policy with every list empty. Intended for trusted networks and local test servers.
    pub fn allow_all() -> Self {
        Self { whitelist: SsrfList::default(), blacklist: SsrfList::default(), allow_credentials: false, pin_dns: true }
    }
}

/// A URL that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUrl {
    /// The normalized URL with its original host
    pub url: Url,
    /// Same URL with the host replaced by the first resolved IP when pinning
    pub safe_url: Url,
    /// Host as it appeared in the URL
    pub host: String,
    pub resolved_ips: Vec<Ipv4Addr>,
}

impl ValidatedUrl {
    /// The address the fetcher should connect to for a named host, if pinning applies.
    pub fn pinned_addr(&self) -> Option<Ipv4Addr> {
        match self.url.host() {
            Some(Host::Domain(_)) if self.safe_url.host() != self.url.host() => self.resolved_ips.first().copied(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SsrfGuard {
    options: SsrfOptions,
    domain_whitelist: Vec<Regex>,
    domain_blacklist: Vec<Regex>,
}

impl SsrfGuard {
    /// Compile the domain patterns of `options`.
    pub fn new(options: SsrfOptions) -> Result<Self> {
        let domain_whitelist = compile_domains(&options.whitelist.domain)?;
        let domain_blacklist = compile_domains(&options.blacklist.domain)?;
        Ok(Self { options, domain_whitelist, domain_blacklist })
    }

    pub fn options(&self) -> &SsrfOptions {
        &self.options
    }

    /// Validate `raw` and resolve its host.
    pub async fn validate(&self, raw: &str) -> std::result::Result<ValidatedUrl, ValidationError> {
        let url = self.check_static(raw)?;
        let host = url.host_str().unwrap_or_default().to_string();

        let resolved_ips = match url.host() {
            Some(Host::Ipv4(ip)) => vec![ip],
            Some(Host::Ipv6(_)) | None => return Err(SsrfViolation::Unresolvable(host).into()),
            Some(Host::Domain(name)) => {
                let port = url.port_or_known_default().unwrap_or(80);
                lookup_host((name, port))
                    .await
                    .map_err(|source| ValidationError::Lookup { host: host.clone(), source })?
                    .filter_map(|addr| match addr.ip() {
                        IpAddr::V4(ip) => Some(ip),
                        IpAddr::V6(_) => None,
                    })
                    .collect()
            }
        };

        let Some(first) = resolved_ips.first().copied() else {
            tracing::warn!(url = %raw, "rejected unresolvable host");
            return Err(SsrfViolation::Unresolvable(host).into());
        };

        for ip in &resolved_ips {
            self.check_ip(IpAddr::V4(*ip)).inspect_err(|_| tracing::warn!(url = %raw, %ip, "rejected address"))?;
        }

        let mut safe_url = url.clone();
        if self.options.pin_dns && safe_url.set_ip_host(IpAddr::V4(first)).is_err() {
            return Err(SsrfViolation::Unparsable(raw.to_string()).into());
        }

        Ok(ValidatedUrl { url, safe_url, host, resolved_ips })
    }

    /// The checks that need no DNS: parse, credentials, scheme, port and domain.
    pub fn check_static(&self, raw: &str) -> std::result::Result<Url, SsrfViolation> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(SsrfViolation::Empty);
        }

        let with_scheme = if raw.contains("://") { raw.to_string() } else { format!("http://{}", raw.trim_start_matches("//")) };
        let url = Url::parse(&with_scheme).map_err(|_| SsrfViolation::Unparsable(raw.to_string()))?;
        if url.host_str().is_none_or(str::is_empty) {
            return Err(SsrfViolation::Unparsable(raw.to_string()));
        }

        let result = self.check_parsed(&url);
        if let Err(violation) = &result {
            tracing::warn!(url = %raw, %violation, "URL rejected");
        }
        result.map(|_| url)
    }

    fn check_parsed(&self, url: &Url) -> std::result::Result<(), SsrfViolation> {
        let (white, black) = (&self.options.whitelist, &self.options.blacklist);

        if !self.options.allow_credentials && (!url.username().is_empty() || url.password().is_some()) {
            return Err(SsrfViolation::Credentials(url.host_str().unwrap_or_default().to_string()));
        }

        let scheme = url.scheme().to_ascii_lowercase();
        let scheme_ok = (white.scheme.is_empty() || white.scheme.iter().any(|s| s.eq_ignore_ascii_case(&scheme)))
            && !black.scheme.iter().any(|s| s.eq_ignore_ascii_case(&scheme));
        if !scheme_ok {
            return Err(SsrfViolation::Scheme(scheme));
        }

        if let Some(port) = url.port()
            && !((white.port.is_empty() || white.port.contains(&port)) && !black.port.contains(&port))
        {
            return Err(SsrfViolation::Port(port));
        }

        let host = normalize_host(url.host_str().unwrap_or_default());
        let domain_ok = (self.domain_whitelist.is_empty() || self.domain_whitelist.iter().any(|re| re.is_match(&host)))
            && !self.domain_blacklist.iter().any(|re| re.is_match(&host));
        if !domain_ok {
            return Err(SsrfViolation::Domain(host));
        }

        Ok(())
    }

    fn check_ip(&self, ip: IpAddr) -> std::result::Result<(), SsrfViolation> {
        let (white, black) = (&self.options.whitelist.ip, &self.options.blacklist.ip);
        let allowed =
            (white.is_empty() || white.iter().any(|c| ip_matches(ip, c))) && !black.iter().any(|c| ip_matches(ip, c));
        if allowed { Ok(()) } else { Err(SsrfViolation::Ip(ip)) }
    }
}

/// Lowercase a host and drop a leading `www.`.
pub fn normalize_host(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Whether `ip` falls inside `cidr`. A bare address only matches itself.
pub fn cidr_match(ip: &str, cidr: &str) -> bool {
    ip.trim().parse::<IpAddr>().is_ok_and(|ip| ip_matches(ip, cidr))
}

fn ip_matches(ip: IpAddr, cidr: &str) -> bool {
    let cidr = cidr.trim();
    if cidr.contains('/') {
        cidr.parse::<IpNet>().is_ok_and(|net| net.contains(&ip))
    } else {
        cidr.parse::<IpAddr>().is_ok_and(|single| single == ip)
    }
}

fn compile_domains(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(&format!("^(?:{})$", p))
                .case_insensitive(true)
                .build()
                .map_err(|e| FolioError::ConfigError(format!("Invalid domain pattern '{}': {}", p, e)))
        })
        .collect()
}
