//! URL pattern test shared by handler mappings and filter mappings.
//!
//! Exactly four pattern shapes are recognised:
//! - literal: `/exact/path`, equal strings only
//! - match-all: `/*`
//! - prefix: `/prefix/*`, the path equals the prefix or continues with `/`
//! - extension: `*.ext`, compared against the final path segment

use crate::error::{Error, Result};

/// Parsed form of a URL pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UrlPattern {
    Exact(String),
    MatchAll,
    /// Prefix without the trailing `/*`.
    Prefix(String),
    /// Extension without the leading `*.`.
    Extension(String),
}

impl UrlPattern {
    /// Classify a pattern string. Anything that is not `/*`, `…/*` or `*.…`
    /// is a literal.
    pub fn parse(pattern: &str) -> Self {
        if pattern == "/*" {
            UrlPattern::MatchAll
        } else if let Some(prefix) = pattern.strip_suffix("/*") {
            UrlPattern::Prefix(prefix.to_string())
        } else if let Some(ext) = pattern.strip_prefix("*.") {
            UrlPattern::Extension(ext.to_string())
        } else {
            UrlPattern::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        match self {
            UrlPattern::Exact(p) => p == path,
            UrlPattern::MatchAll => true,
            UrlPattern::Prefix(prefix) => matches_prefix(prefix, path),
            UrlPattern::Extension(ext) => matches_extension(ext, path),
        }
    }
}

/// Test `path` against `pattern`.
pub fn matches_url_pattern(pattern: &str, path: &str) -> bool {
    if pattern == path {
        return true;
    }
    UrlPattern::parse(pattern).matches(path)
}

fn matches_prefix(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

fn matches_extension(ext: &str, path: &str) -> bool {
    let Some(slash) = path.rfind('/') else {
        return false;
    };
    let Some(period) = path.rfind('.') else {
        return false;
    };
    period > slash && period != path.len() - 1 && &path[period + 1..] == ext
}

/// Reject patterns that can never match a decoded request path.
pub fn validate_url_pattern(pattern: &str) -> Result<()> {
    let valid = pattern.starts_with('/')
        || (pattern.starts_with("*.") && pattern.len() > 2 && !pattern[2..].contains('/'));
    if valid && !pattern.contains('\n') && !pattern.contains('\r') {
        Ok(())
    } else {
        Err(Error::InvalidPattern(pattern.to_string()))
    }
}

/// Final segment's extension, if the path has one that `*.ext` could match.
pub fn extension_of(path: &str) -> Option<&str> {
    let slash = path.rfind('/')?;
    let last = &path[slash..];
    let period = last.rfind('.')?;
    (period != last.len() - 1).then(|| &last[period + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal() {
        assert!(matches_url_pattern("/exact", "/exact"));
        assert!(!matches_url_pattern("/exact", "/exact/more"));
        assert!(!matches_url_pattern("/exact", "/exac"));
    }

    #[test]
    fn test_match_all() {
        assert!(matches_url_pattern("/*", "/"));
        assert!(matches_url_pattern("/*", "/anything/at/all.txt"));
        assert!(matches_url_pattern("/*", ""));
    }

    #[test]
    fn test_prefix() {
        assert!(matches_url_pattern("/api/*", "/api"));
        assert!(matches_url_pattern("/api/*", "/api/"));
        assert!(matches_url_pattern("/api/*", "/api/v1/users"));
        assert!(!matches_url_pattern("/api/*", "/apix"));
        assert!(!matches_url_pattern("/api/*", "/ap"));
    }

    #[test]
    fn test_extension() {
        assert!(matches_url_pattern("*.txt", "/report.txt"));
        assert!(matches_url_pattern("*.txt", "/a/b/report.final.txt"));
        assert!(!matches_url_pattern("*.txt", "/report.txt/more"));
        assert!(!matches_url_pattern("*.txt", "/dir.txt/report"));
        assert!(!matches_url_pattern("*.txt", "/report."));
        assert!(!matches_url_pattern("*.txt", "/report.txtx"));
        // No slash at all: never an extension match.
        assert!(!matches_url_pattern("*.txt", "report.txt"));
    }

    #[test]
    fn test_parse() {
        assert_eq!(UrlPattern::parse("/*"), UrlPattern::MatchAll);
        assert_eq!(UrlPattern::parse("/a/*"), UrlPattern::Prefix("/a".into()));
        assert_eq!(UrlPattern::parse("*.jsp"), UrlPattern::Extension("jsp".into()));
        assert_eq!(UrlPattern::parse("/a"), UrlPattern::Exact("/a".into()));
    }

    #[test]
    fn test_validate() {
        assert!(validate_url_pattern("/").is_ok());
        assert!(validate_url_pattern("/api/*").is_ok());
        assert!(validate_url_pattern("*.txt").is_ok());
        assert!(validate_url_pattern("api").is_err());
        assert!(validate_url_pattern("*.").is_err());
        assert!(validate_url_pattern("*.a/b").is_err());
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("/report.txt"), Some("txt"));
        assert_eq!(extension_of("/dir.d/report"), None);
        assert_eq!(extension_of("/report."), None);
    }
}
