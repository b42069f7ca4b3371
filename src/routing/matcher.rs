//! Host-name and context-path matching.
//!
//! # Responsibilities
//! - Match virtual-host names (exact, case-insensitive)
//! - Match wildcard host names (`*.example.com`)
//! - Match context paths on segment boundaries (case-sensitive)
//!
//! # Design Decisions
//! - Host matching is case-insensitive (RFC 9110)
//! - Path matching is case-sensitive
//! - No regex, so matching stays linear in the name length

/// Matches a virtual-host name or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostMatcher {
    expected_host: String,
    wildcard: bool,
}

impl HostMatcher {
    /// The host is normalized to lowercase for case-insensitive matching.
    /// A leading `*.` makes it a wildcard for any subdomain.
    pub fn new(host: impl Into<String>) -> Self {
        let host = host.into().to_lowercase();
        match host.strip_prefix("*.") {
            Some(suffix) => Self {
                expected_host: format!(".{suffix}"),
                wildcard: true,
            },
            None => Self {
                expected_host: host,
                wildcard: false,
            },
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    /// Exact (case-insensitive) comparison; wildcards never match here.
    pub fn matches_exact(&self, host: &str) -> bool {
        !self.wildcard && host.eq_ignore_ascii_case(&self.expected_host)
    }

    /// Wildcard comparison: at least one label before the suffix.
    pub fn matches_wildcard(&self, host: &str) -> bool {
        if !self.wildcard || host.len() <= self.expected_host.len() {
            return false;
        }
        let split = host.len() - self.expected_host.len();
        host.is_char_boundary(split) && host[split..].eq_ignore_ascii_case(&self.expected_host)
    }

    pub fn matches(&self, host: &str) -> bool {
        self.matches_exact(host) || self.matches_wildcard(host)
    }
}

/// Matches the leading path segments of a request against a context path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// `""` and `"/"` both denote the root, which matches every path.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        let prefix = if prefix == "/" { String::new() } else { prefix };
        Self { prefix }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Number of characters matched, used to pick the longest prefix.
    pub fn len(&self) -> usize {
        self.prefix.len()
    }

    pub fn is_root(&self) -> bool {
        self.prefix.is_empty()
    }

    pub fn matches(&self, path: &str) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(&self.prefix) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    /// The part of `path` after the prefix, `/` when nothing remains.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if !self.matches(path) {
            return None;
        }
        let rest = &path[self.prefix.len()..];
        Some(if rest.is_empty() { "/" } else { rest })
    }
}
