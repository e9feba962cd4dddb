//! Origin authorization for the lookup API.
//!
//! A caller is accepted when its `Origin` host is on the allow-list, or its
//! `Referer` host is on the allow-list or equals the host the request was
//! addressed to, or when the service itself is being reached on a loopback
//! host. `Origin` is deliberately never accepted on same-host equality alone.
//!
//! Matching is anchored and case-insensitive. An allow-list entry may start
//! with a single `*.` segment, which matches any hostname ending in the rest
//! of the pattern.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Hostnames under which the service is reachable without any header check.
pub const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "::1"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid domain pattern {pattern:?}: {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: &'static str,
}

/// One allow-list entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainPattern {
    /// Whole-hostname match.
    Exact(String),
    /// `*.example.com`, stored as the suffix `.example.com`.
    Wildcard(String),
}

impl DomainPattern {
    /// Returns true if `hostname` is matched by this pattern.
    pub fn matches(&self, hostname: &str) -> bool {
        let hostname = hostname.to_ascii_lowercase();
        match self {
            Self::Exact(expected) => hostname == *expected,
            Self::Wildcard(suffix) => hostname.ends_with(suffix.as_str()),
        }
    }
}

impl FromStr for DomainPattern {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| PatternError {
            pattern: s.to_string(),
            reason,
        };

        let pattern = s.trim().to_ascii_lowercase();
        if pattern.is_empty() {
            return Err(err("empty pattern"));
        }

        match pattern.strip_prefix('*') {
            Some(rest) => {
                if !rest.starts_with('.') || rest.len() < 2 {
                    return Err(err("wildcard must be a leading `*.` segment"));
                }
                if rest.contains('*') {
                    return Err(err("only one leading wildcard is allowed"));
                }
                Ok(Self::Wildcard(rest.to_string()))
            }
            None if pattern.contains('*') => Err(err("wildcard must be a leading `*.` segment")),
            None => Ok(Self::Exact(pattern)),
        }
    }
}

impl fmt::Display for DomainPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(host) => f.write_str(host),
            Self::Wildcard(suffix) => write!(f, "*{suffix}"),
        }
    }
}

/// The parsed set of hostnames allowed to call the API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainAllowList {
    patterns: Vec<DomainPattern>,
}

impl DomainAllowList {
    pub fn parse<S: AsRef<str>>(entries: &[S]) -> Result<Self, PatternError> {
        let patterns = entries
            .iter()
            .map(|entry| entry.as_ref().parse())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn patterns(&self) -> &[DomainPattern] {
        &self.patterns
    }
}

/// Returns true if `hostname` matches any entry of `allow_list`.
pub fn domain_allowed(hostname: &str, allow_list: &DomainAllowList) -> bool {
    !hostname.is_empty() && allow_list.patterns.iter().any(|p| p.matches(hostname))
}

/// Extract the hostname from an `Origin` or `Referer` header value.
///
/// IPv6 literals are returned without brackets. Unparseable values yield
/// `None` and are treated as if the header were absent.
pub fn header_host(value: &str) -> Option<String> {
    let url = Url::parse(value.trim()).ok()?;
    let host = url.host_str()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    Some(host.to_ascii_lowercase())
}

/// Decide whether a request may use the lookup API.
pub fn authorize(
    origin: Option<&str>,
    referer: Option<&str>,
    request_host: &str,
    allow_list: &DomainAllowList,
) -> bool {
    if let Some(host) = origin.and_then(header_host) {
        if domain_allowed(&host, allow_list) {
            return true;
        }
    }

    if let Some(host) = referer.and_then(header_host) {
        if host == request_host.to_ascii_lowercase() || domain_allowed(&host, allow_list) {
            return true;
        }
    }

    LOOPBACK_HOSTS.contains(&request_host)
}
