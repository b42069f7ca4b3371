//! Filter definitions and URL/handler mappings.
//!
//! # Responsibilities
//! - Describe a filter: name, factory and init parameters
//! - Describe which requests a filter applies to: URL patterns, handler
//!   names and dispatcher types
//!
//! # Design Decisions
//! - Mappings are immutable once built; a context publishes its mapping
//!   list as a snapshot
//! - `*` as a URL pattern or handler name matches everything
//! - A mapping with no dispatcher types applies to plain requests only

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::handler::{HandlerError, InitParams};
use crate::http::{DispatcherType, Request, Response};
use crate::routing::pattern::{matches_url_pattern, validate_url_pattern};

use super::chain::FilterChain;

/// Wildcard accepted for both URL patterns and handler names.
pub const MATCH_ALL: &str = "*";

/// Middleware wrapped around a handler for the requests its mappings select.
pub trait Filter: Send + Sync {
    /// Called once when the owning Context starts.
    fn init(&self, _config: &FilterConfig) -> std::result::Result<(), HandlerError> {
        Ok(())
    }

    /// Process the request; call `chain.do_filter` to continue.
    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        chain: &mut FilterChain,
    ) -> std::result::Result<(), HandlerError>;

    /// Called once when the owning Context stops.
    fn destroy(&self) {}
}

/// Creates filter instances for a [`FilterDef`].
pub type FilterFactory =
    Arc<dyn Fn() -> std::result::Result<Arc<dyn Filter>, HandlerError> + Send + Sync>;

/// Wrap a closure as a filter factory.
pub fn filter_factory<F>(f: F) -> FilterFactory
where
    F: Fn() -> std::result::Result<Arc<dyn Filter>, HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Configuration-time description of a filter.
#[derive(Clone)]
pub struct FilterDef {
    name: String,
    factory: FilterFactory,
    params: InitParams,
}

impl FilterDef {
    pub fn new(name: impl Into<String>, factory: FilterFactory) -> Self {
        Self {
            name: name.into(),
            factory,
            params: InitParams::new(),
        }
    }

    /// Add an init parameter. A name that is already defined keeps its first value.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.add(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &InitParams {
        &self.params
    }

    pub(crate) fn instantiate(&self) -> std::result::Result<Arc<dyn Filter>, HandlerError> {
        (self.factory)()
    }
}

impl fmt::Debug for FilterDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterDef")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish()
    }
}

/// Configuration handed to [`Filter::init`].
#[derive(Debug, Clone)]
pub struct FilterConfig {
    pub filter_name: String,
    /// Path of the owning Context ("" for the root context).
    pub context_path: String,
    pub params: InitParams,
}

impl FilterConfig {
    pub fn init_parameter(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

/// Selects the requests a filter applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterMapping {
    filter_name: String,
    url_patterns: Vec<String>,
    handler_names: Vec<String>,
    dispatchers: Vec<DispatcherType>,
}

impl FilterMapping {
    pub fn new(filter_name: impl Into<String>) -> Self {
        Self {
            filter_name: filter_name.into(),
            url_patterns: Vec::new(),
            handler_names: Vec::new(),
            dispatchers: Vec::new(),
        }
    }

    pub fn url_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.url_patterns.push(pattern.into());
        self
    }

    pub fn handler_name(mut self, name: impl Into<String>) -> Self {
        self.handler_names.push(name.into());
        self
    }

    pub fn dispatcher(mut self, dispatcher: DispatcherType) -> Self {
        if !self.dispatchers.contains(&dispatcher) {
            self.dispatchers.push(dispatcher);
        }
        self
    }

    pub fn filter_name(&self) -> &str {
        &self.filter_name
    }

    pub fn url_patterns(&self) -> &[String] {
        &self.url_patterns
    }

    pub fn handler_names(&self) -> &[String] {
        &self.handler_names
    }

    pub fn dispatchers(&self) -> &[DispatcherType] {
        &self.dispatchers
    }

    /// Reject URL patterns that can never match.
    pub fn validate(&self) -> Result<()> {
        self.url_patterns
            .iter()
            .filter(|p| p.as_str() != MATCH_ALL)
            .try_for_each(|p| validate_url_pattern(p))
    }

    pub fn applies_to(&self, dispatcher: DispatcherType) -> bool {
        if self.dispatchers.is_empty() {
            dispatcher == DispatcherType::Request
        } else {
            self.dispatchers.contains(&dispatcher)
        }
    }

    /// True if any URL pattern matches the context-relative path.
    pub fn matches_path(&self, path: Option<&str>) -> bool {
        self.url_patterns.iter().any(|pattern| {
            pattern == MATCH_ALL || path.is_some_and(|path| matches_url_pattern(pattern, path))
        })
    }

    pub fn matches_handler(&self, handler_name: Option<&str>) -> bool {
        self.handler_names.iter().any(|name| {
            name == MATCH_ALL || handler_name.is_some_and(|handler| name == handler)
        })
    }
}
