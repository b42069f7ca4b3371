//! Per-level routing.
//!
//! # Responsibilities
//! - Engine: pick the virtual host for the request's host name
//! - Host: pick the context whose path is the longest prefix of the path
//! - Context: pick the handler wrapper by URL pattern
//!
//! # Design Decisions
//! - Mappers are stateless; all routing data lives on the container
//! - Host precedence: exact name, alias, wildcard (`*.domain`), default host
//! - Handler precedence: exact, longest `prefix/*`, `*.ext`, default `/`
//! - With `update` set, the resolved binding is written onto the request

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::container::Container;
use crate::http::Request;
use crate::routing::pattern::{extension_of, UrlPattern};

/// Routing function bound to one container level.
pub trait Mapper: Send + Sync {
    /// Select the child that should handle `request`, or None on a miss.
    fn map(&self, container: &Container, request: &mut Request, update: bool) -> Option<Arc<Container>>;
}

/// Maps host names to Host children of an Engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineMapper;

impl EngineMapper {
    fn by_name(container: &Container, host: &str) -> Option<Arc<Container>> {
        if let Some(found) = container.find_child(host) {
            return Some(found);
        }
        let children = container.find_children();
        if let Some(found) = children
            .iter()
            .find(|c| c.as_host().is_some_and(|h| h.has_alias(host)))
        {
            return Some(found.clone());
        }
        // Most specific wildcard wins: *.a.example.com over *.example.com.
        children
            .into_iter()
            .filter(|c| c.as_host().is_some_and(|h| h.matches_wildcard(host)))
            .max_by_key(|c| c.name().len())
    }
}

impl Mapper for EngineMapper {
    fn map(&self, container: &Container, request: &mut Request, update: bool) -> Option<Arc<Container>> {
        let engine = container.as_engine()?;
        let host = request.host().map(str::to_lowercase);

        let found = host
            .as_deref()
            .and_then(|name| Self::by_name(container, name))
            .or_else(|| {
                engine
                    .default_host()
                    .and_then(|name| container.find_child(&name))
            });

        if update {
            request.set_bound_host(found.clone());
        }
        found
    }
}

/// Maps request paths to Context children of a Host.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostMapper;

impl Mapper for HostMapper {
    fn map(&self, container: &Container, request: &mut Request, update: bool) -> Option<Arc<Container>> {
        let path = request.decoded_path();
        let found = container
            .find_children()
            .into_iter()
            .filter_map(|child| {
                let len = child
                    .as_context()
                    .filter(|ctx| ctx.matches(path))
                    .map(|ctx| ctx.path().len())?;
                Some((len, child))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, child)| child);

        if update {
            request.set_context(found.clone());
        }
        found
    }
}

/// Handler mappings of one context, indexed by pattern shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerMappings {
    patterns: BTreeMap<String, String>,
    exact: HashMap<String, String>,
    /// Keyed by the prefix without `/*`; `/*` itself is stored under "".
    prefix: HashMap<String, String>,
    extension: HashMap<String, String>,
    default: Option<String>,
}

impl HandlerMappings {
    fn compile(patterns: BTreeMap<String, String>) -> Self {
        let mut mappings = HandlerMappings::default();
        for (pattern, wrapper) in &patterns {
            if pattern == "/" {
                mappings.default = Some(wrapper.clone());
                continue;
            }
            match UrlPattern::parse(pattern) {
                UrlPattern::Exact(path) => {
                    mappings.exact.insert(path, wrapper.clone());
                }
                UrlPattern::MatchAll => {
                    mappings.prefix.insert(String::new(), wrapper.clone());
                }
                UrlPattern::Prefix(prefix) => {
                    mappings.prefix.insert(prefix, wrapper.clone());
                }
                UrlPattern::Extension(ext) => {
                    mappings.extension.insert(ext, wrapper.clone());
                }
            }
        }
        mappings.patterns = patterns;
        mappings
    }

    pub(crate) fn with(&self, pattern: &str, wrapper: &str) -> Self {
        let mut patterns = self.patterns.clone();
        patterns.insert(pattern.to_string(), wrapper.to_string());
        Self::compile(patterns)
    }

    pub(crate) fn without(&self, pattern: &str) -> Self {
        let mut patterns = self.patterns.clone();
        patterns.remove(pattern);
        Self::compile(patterns)
    }

    /// Wrapper name registered for exactly this pattern.
    pub fn get(&self, pattern: &str) -> Option<&str> {
        self.patterns.get(pattern).map(String::as_str)
    }

    /// `(pattern, wrapper name)` pairs, ordered by pattern.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.patterns.iter().map(|(p, w)| (p.as_str(), w.as_str()))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Apply the four rules in order. A rule whose wrapper is not (or no
    /// longer) a child is skipped.
    fn resolve(&self, context: &Container, path: &str) -> Option<(Arc<Container>, String, Option<String>)> {
        let child = |name: &String| context.find_child(name);

        if let Some(wrapper) = self.exact.get(path).and_then(child) {
            return Some((wrapper, path.to_string(), None));
        }

        let mut candidate = path;
        loop {
            if let Some(wrapper) = self.prefix.get(candidate).and_then(child) {
                let rest = &path[candidate.len()..];
                let path_info = (!rest.is_empty()).then(|| rest.to_string());
                return Some((wrapper, candidate.to_string(), path_info));
            }
            match candidate.rfind('/') {
                Some(slash) => candidate = &candidate[..slash],
                None => break,
            }
        }

        if let Some(wrapper) = extension_of(path)
            .and_then(|ext| self.extension.get(ext))
            .and_then(child)
        {
            return Some((wrapper, path.to_string(), None));
        }

        self.default
            .as_ref()
            .and_then(child)
            .map(|wrapper| (wrapper, path.to_string(), None))
    }
}

/// Maps context-relative paths to Wrapper children of a Context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextMapper;

impl Mapper for ContextMapper {
    /// A request already bound to a wrapper keeps that binding when
    /// `update` is set. A path outside the context is matched as-is.
    fn map(&self, container: &Container, request: &mut Request, update: bool) -> Option<Arc<Container>> {
        if update && request.is_mapped() {
            return request.wrapper().cloned();
        }

        let context = container.as_context()?;
        let relative = context
            .relative_path(request.decoded_path())
            .unwrap_or(request.decoded_path())
            .to_string();

        let (wrapper, servlet_path, path_info) = context.handler_mappings().resolve(container, &relative)?;
        if update {
            request.set_wrapper(Some(wrapper.clone()));
            request.set_servlet_path(Some(servlet_path));
            request.set_path_info(path_info);
        }
        Some(wrapper)
    }
}
