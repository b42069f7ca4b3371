//! Named factories for valves, filters and handlers.
//!
//! # Responsibilities
//! - Map identifiers from configuration to component factories
//! - Build valves from string parameters
//! - Build filter definitions and wrappers from registered factories
//!
//! # Design Decisions
//! - Registration is concurrent and replaces any earlier factory with the
//!   same identifier
//! - Lookups clone the factory out of the table, so no shard lock is held
//!   while user code runs

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;

use crate::config::DispatchConfig;
use crate::container::Container;
use crate::error::{Error, Result};
use crate::filter::{FilterDef, FilterFactory};
use crate::handler::HandlerFactory;
use crate::observability::DispatchMetrics;
use crate::pipeline::Valve;
use crate::valves::{AccessLogValve, RemoteAddrValve};

/// String parameters handed to a valve factory.
pub type Params = BTreeMap<String, String>;

/// Builds a valve from its parameters.
pub type ValveFactory = Arc<dyn Fn(&Params) -> Result<Arc<dyn Valve>> + Send + Sync>;

#[derive(Default)]
pub struct Registry {
    valves: DashMap<String, ValveFactory>,
    filters: DashMap<String, FilterFactory>,
    handlers: DashMap<String, HandlerFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in valves already registered. Valves it
    /// builds record metrics according to `config.observability`.
    pub fn with_builtin_valves(config: &DispatchConfig) -> Self {
        let registry = Self::new();
        let metrics = DispatchMetrics::from_config(&config.observability);
        registry.register_valve(AccessLogValve::ID, move |params| {
            Ok(Arc::new(AccessLogValve::from_params(params)?.with_metrics(metrics)) as Arc<dyn Valve>)
        });
        registry.register_valve(RemoteAddrValve::ID, |params| {
            Ok(Arc::new(RemoteAddrValve::from_params(params)?) as Arc<dyn Valve>)
        });
        registry
    }

    // =========================================================================
    // Valves
    // =========================================================================

    pub fn register_valve<F>(&self, id: impl Into<String>, factory: F)
    where
        F: Fn(&Params) -> Result<Arc<dyn Valve>> + Send + Sync + 'static,
    {
        let id = id.into();
        tracing::debug!(kind = "valve", id = %id, "Factory registered");
        self.valves.insert(id, Arc::new(factory));
    }

    pub fn create_valve(&self, id: &str, params: &Params) -> Result<Arc<dyn Valve>> {
        let factory = self
            .valves
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| unknown("valve", id))?;
        factory(params)
    }

    /// Registered valve identifiers, sorted.
    pub fn valve_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.valves.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    // =========================================================================
    // Filters
    // =========================================================================

    pub fn register_filter(&self, id: impl Into<String>, factory: FilterFactory) {
        let id = id.into();
        tracing::debug!(kind = "filter", id = %id, "Factory registered");
        self.filters.insert(id, factory);
    }

    pub fn filter_factory(&self, id: &str) -> Result<FilterFactory> {
        self.filters
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| unknown("filter", id))
    }

    /// A filter definition named `name`, backed by the factory registered as `id`.
    pub fn filter_def(&self, id: &str, name: impl Into<String>) -> Result<FilterDef> {
        Ok(FilterDef::new(name, self.filter_factory(id)?))
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    pub fn register_handler(&self, id: impl Into<String>, factory: HandlerFactory) {
        let id = id.into();
        tracing::debug!(kind = "handler", id = %id, "Factory registered");
        self.handlers.insert(id, factory);
    }

    pub fn handler_factory(&self, id: &str) -> Result<HandlerFactory> {
        self.handlers
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| unknown("handler", id))
    }

    /// A detached wrapper named `name` whose handler comes from the factory `id`.
    pub fn create_wrapper(
        &self,
        id: &str,
        name: impl Into<String>,
        config: &DispatchConfig,
    ) -> Result<Arc<Container>> {
        Ok(Container::wrapper(name, self.handler_factory(id)?, config))
    }
}

fn unknown(kind: &'static str, id: &str) -> Error {
    Error::UnknownFactory {
        kind,
        id: id.to_string(),
    }
}
