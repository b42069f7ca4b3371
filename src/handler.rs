//! Leaf handler units.
//!
//! A handler is the business-logic endpoint wrapped by a Wrapper container.
//! The dispatch core only drives its lifecycle (`init` / `service` /
//! `destroy`) and interprets the [`HandlerError`] it returns.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::http::{Request, Response};

/// How long a handler refuses traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unavailability {
    /// Unavailable for the given duration. A zero duration means
    /// "use the configured default".
    Temporary(Duration),
    /// Never available again until reloaded.
    Permanent,
}

impl Unavailability {
    pub fn is_permanent(&self) -> bool {
        matches!(self, Unavailability::Permanent)
    }
}

impl fmt::Display for Unavailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unavailability::Temporary(d) => write!(f, "temporarily, for {}ms", d.as_millis()),
            Unavailability::Permanent => write!(f, "permanently"),
        }
    }
}

/// Errors returned by handlers and filters.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The handler cannot serve requests right now (or ever).
    #[error("handler unavailable {0}")]
    Unavailable(Unavailability),

    /// Generic processing failure.
    #[error("handler failed: {0}")]
    Failed(String),

    /// Failure carrying an underlying error.
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    pub fn failed(reason: impl Into<String>) -> Self {
        HandlerError::Failed(reason.into())
    }

    pub fn unavailable_for(duration: Duration) -> Self {
        HandlerError::Unavailable(Unavailability::Temporary(duration))
    }

    pub fn permanently_unavailable() -> Self {
        HandlerError::Unavailable(Unavailability::Permanent)
    }
}

/// Ordered name/value initialization parameters.
///
/// Adding a name that already exists is ignored: the first definition wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitParams {
    entries: Vec<(String, String)>,
}

impl InitParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter unless one with the same name was already defined.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if self.entries.iter().any(|(n, _)| *n == name) {
            tracing::debug!(param = %name, "Ignoring duplicate init parameter");
            return;
        }
        self.entries.push((name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for InitParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = InitParams::new();
        for (k, v) in iter {
            params.add(k, v);
        }
        params
    }
}

/// Configuration handed to [`Handler::init`].
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Name of the owning Wrapper.
    pub handler_name: String,
    /// Path of the owning Context ("" for the root context).
    pub context_path: String,
    pub params: InitParams,
}

impl HandlerConfig {
    pub fn init_parameter(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }
}

/// A leaf request-processing unit.
pub trait Handler: Send + Sync {
    /// Called once when the owning Wrapper loads the handler.
    fn init(&self, _config: &HandlerConfig) -> Result<(), HandlerError> {
        Ok(())
    }

    /// Process one request.
    fn service(&self, request: &mut Request, response: &mut Response) -> Result<(), HandlerError>;

    /// Called once when the owning Wrapper unloads the handler.
    fn destroy(&self) {}
}

/// Creates handler instances for a Wrapper.
pub type HandlerFactory =
    Arc<dyn Fn() -> Result<Arc<dyn Handler>, HandlerError> + Send + Sync>;

/// Wrap a closure as a handler factory.
pub fn handler_factory<F>(f: F) -> HandlerFactory
where
    F: Fn() -> Result<Arc<dyn Handler>, HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handler built from a plain function, for simple endpoints and tests.
pub struct FnHandler<F> {
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Request, &mut Response) -> Result<(), HandlerError> + Send + Sync,
{
    fn service(&self, request: &mut Request, response: &mut Response) -> Result<(), HandlerError> {
        (self.f)(request, response)
    }
}
