//! Wrapper scope: one handler, its instance and its availability.
//!
//! # Responsibilities
//! - Load the handler on first allocation (or at context start)
//! - Count allocations so `unload()` can wait for in-flight requests
//! - Track availability: available, unavailable until a deadline, or
//!   permanently unavailable
//!
//! # States
//! ```text
//! Available ──mark_unavailable(Temporary d)──► UnavailableUntil(now + d)
//! UnavailableUntil(t) ──query at/after t──► Available
//! any ──mark_unavailable(Permanent)──► Permanent
//! any ──mark_available()──► Available
//! ```

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::config::WrapperConfig;
use crate::container::Container;
use crate::handler::{Handler, HandlerConfig, HandlerError, HandlerFactory, InitParams, Unavailability};

#[derive(Debug, Clone, Copy)]
enum Deadline {
    None,
    Until(Instant),
    Never,
}

/// Result of an availability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    /// Unavailable for the remaining duration.
    UnavailableFor(Duration),
    Permanent,
}

pub(crate) struct WrapperScope {
    factory: HandlerFactory,
    params: RwLock<InitParams>,
    instance: Mutex<Option<Arc<dyn Handler>>>,
    allocations: Mutex<usize>,
    drained: Condvar,
    deadline: Mutex<Deadline>,
    /// Negative when the handler is loaded lazily.
    load_on_startup: AtomicI64,
    unload_delay: Duration,
    default_unavailable: Duration,
}

impl WrapperScope {
    pub(crate) fn new(factory: HandlerFactory, config: &WrapperConfig) -> Self {
        Self {
            factory,
            params: RwLock::new(InitParams::new()),
            instance: Mutex::new(None),
            allocations: Mutex::new(0),
            drained: Condvar::new(),
            deadline: Mutex::new(Deadline::None),
            load_on_startup: AtomicI64::new(-1),
            unload_delay: config.unload_delay(),
            default_unavailable: config.default_unavailable(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Wrapper view of a [`Container`].
#[derive(Clone, Copy)]
pub struct Wrapper<'a> {
    container: &'a Container,
    scope: &'a WrapperScope,
}

impl<'a> Wrapper<'a> {
    pub(crate) fn new(container: &'a Container, scope: &'a WrapperScope) -> Self {
        Self { container, scope }
    }

    pub fn container(&self) -> &'a Container {
        self.container
    }

    pub fn name(&self) -> &'a str {
        self.container.name()
    }

    // --- Configuration ---

    /// Add an init parameter. A name that is already defined keeps its first value.
    pub fn add_init_parameter(&self, name: &str, value: &str) {
        self.scope
            .params
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add(name, value);
    }

    pub fn init_parameter(&self, name: &str) -> Option<String> {
        self.scope
            .params
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .map(str::to_string)
    }

    /// Load when the owning context starts; lower values load first.
    pub fn set_load_on_startup(&self, order: Option<u32>) {
        self.scope
            .load_on_startup
            .store(order.map_or(-1, i64::from), Ordering::Relaxed);
    }

    pub fn load_on_startup(&self) -> Option<u32> {
        u32::try_from(self.scope.load_on_startup.load(Ordering::Relaxed)).ok()
    }

    fn handler_config(&self) -> HandlerConfig {
        HandlerConfig {
            handler_name: self.name().to_string(),
            context_path: self
                .container
                .parent()
                .and_then(|p| p.context_path().map(str::to_string))
                .unwrap_or_default(),
            params: self
                .scope
                .params
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    // --- Availability ---

    /// Current availability. An expired temporary deadline is cleared here.
    pub fn availability(&self) -> Availability {
        let mut deadline = lock(&self.scope.deadline);
        match *deadline {
            Deadline::None => Availability::Available,
            Deadline::Never => Availability::Permanent,
            Deadline::Until(until) => {
                let now = Instant::now();
                if now >= until {
                    *deadline = Deadline::None;
                    tracing::info!(wrapper = %self.container.label(), "Handler available again");
                    Availability::Available
                } else {
                    Availability::UnavailableFor(until - now)
                }
            }
        }
    }

    pub fn is_available(&self) -> bool {
        self.availability() == Availability::Available
    }

    pub fn is_permanently_unavailable(&self) -> bool {
        matches!(*lock(&self.scope.deadline), Deadline::Never)
    }

    /// Refuse traffic temporarily or for good. A zero temporary duration
    /// uses the configured default. Permanent unavailability is never
    /// shortened by a later temporary one.
    pub fn mark_unavailable(&self, unavailability: Unavailability) {
        let mut deadline = lock(&self.scope.deadline);
        match unavailability {
            Unavailability::Permanent => {
                *deadline = Deadline::Never;
                tracing::warn!(wrapper = %self.container.label(), "Handler marked permanently unavailable");
            }
            Unavailability::Temporary(duration) => {
                if matches!(*deadline, Deadline::Never) {
                    return;
                }
                let duration = if duration.is_zero() {
                    self.scope.default_unavailable
                } else {
                    duration
                };
                *deadline = Deadline::Until(Instant::now() + duration);
                tracing::warn!(wrapper = %self.container.label(), unavailable_ms = duration.as_millis() as u64, "Handler marked temporarily unavailable");
            }
        }
    }

    pub fn mark_available(&self) {
        *lock(&self.scope.deadline) = Deadline::None;
    }

    // --- Instance management ---

    pub fn is_loaded(&self) -> bool {
        lock(&self.scope.instance).is_some()
    }

    /// Create and initialize the handler if it is not loaded yet.
    pub fn load(&self) -> Result<Arc<dyn Handler>, HandlerError> {
        let mut instance = lock(&self.scope.instance);
        if let Some(handler) = instance.as_ref() {
            return Ok(handler.clone());
        }

        let handler = (self.scope.factory)()?;
        if let Err(e) = handler.init(&self.handler_config()) {
            tracing::error!(wrapper = %self.container.label(), error = %e, "Handler init failed");
            return Err(e);
        }
        *instance = Some(handler.clone());
        tracing::info!(wrapper = %self.container.label(), "Handler loaded");
        Ok(handler)
    }

    /// Hand out the handler for one request, loading it if needed.
    /// Every successful call must be paired with [`Wrapper::deallocate`].
    pub fn allocate(&self) -> Result<Arc<dyn Handler>, HandlerError> {
        let handler = self.load()?;
        *lock(&self.scope.allocations) += 1;
        Ok(handler)
    }

    pub fn deallocate(&self, _handler: &Arc<dyn Handler>) {
        let mut count = lock(&self.scope.allocations);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.scope.drained.notify_all();
        }
    }

    pub fn count_allocated(&self) -> usize {
        *lock(&self.scope.allocations)
    }

    /// Destroy the loaded handler, first waiting up to the configured unload
    /// delay for outstanding allocations to be returned.
    pub fn unload(&self) {
        if !self.is_loaded() {
            return;
        }

        let count = lock(&self.scope.allocations);
        let (count, _) = self
            .scope
            .drained
            .wait_timeout_while(count, self.scope.unload_delay, |count| *count > 0)
            .unwrap_or_else(PoisonError::into_inner);
        if *count > 0 {
            tracing::warn!(wrapper = %self.container.label(), outstanding = *count, "Unloading handler with outstanding allocations");
        }
        drop(count);

        let handler = lock(&self.scope.instance).take();
        if let Some(handler) = handler {
            handler.destroy();
            tracing::info!(wrapper = %self.container.label(), "Handler unloaded");
        }
    }

    /// Periodic upkeep: clear an expired unavailability deadline.
    pub(crate) fn background_process(&self) {
        let _ = self.availability();
    }
}
