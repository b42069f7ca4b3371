//! The container tree node.
//!
//! # Responsibilities
//! - Own children (name → container) and a non-owning parent reference
//! - Own the valve pipeline whose basic valve dispatches one level down
//! - Drive start/stop across the subtree, optionally fanned out
//! - Schedule periodic background maintenance for subtree roots
//!
//! # Design Decisions
//! - Children live in a copy-on-write map: readers take a consistent
//!   snapshot without locking, writers serialize on a per-node mutex
//! - Parents hold strong references, children hold `Weak` ones, so the tree
//!   never forms a reference cycle
//! - `stop()` is a completion barrier: it returns only after the background
//!   task and every descendant have stopped
//! - `start()`, `stop()`, `add_child()` and `remove_child()` hold the node's
//!   transition lock for their whole run, so a child is never attached or
//!   started halfway through its parent's transition. Locks are always taken
//!   parent before child; lifecycle listeners must not mutate the tree they
//!   are notified from

use std::collections::BTreeMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio::runtime::Handle;

use crate::config::DispatchConfig;
use crate::container::context::{Context, ContextScope};
use crate::container::engine::{Engine, EngineScope};
use crate::container::events::{ContainerEvent, ContainerEventKind, SharedContainerListener};
use crate::container::fanout;
use crate::container::host::{Host, HostScope};
use crate::container::kind::ContainerKind;
use crate::container::wrapper::{Wrapper, WrapperScope};
use crate::dispatch::{ContextValve, EngineValve, HostValve, WrapperValve};
use crate::error::{Error, Result};
use crate::handler::HandlerFactory;
use crate::http::{Request, Response};
use crate::lifecycle::{BackgroundTask, Lifecycle, LifecycleEventKind, LifecycleState, SharedLifecycleListener};
use crate::observability::DispatchMetrics;
use crate::pipeline::{Pipeline, Valve};
use crate::routing::mapper::{ContextMapper, EngineMapper, HostMapper, Mapper};

/// Variant-specific state.
pub(crate) enum Scope {
    Engine(EngineScope),
    Host(HostScope),
    Context(ContextScope),
    Wrapper(WrapperScope),
}

impl Scope {
    fn kind(&self) -> ContainerKind {
        match self {
            Scope::Engine(_) => ContainerKind::Engine,
            Scope::Host(_) => ContainerKind::Host,
            Scope::Context(_) => ContainerKind::Context,
            Scope::Wrapper(_) => ContainerKind::Wrapper,
        }
    }
}

/// A node of the scope tree: Engine, Host, Context or Wrapper.
pub struct Container {
    name: String,
    /// `Kind[name]`, used in logs and errors.
    label: String,
    scope: Scope,
    parent: RwLock<Weak<Container>>,
    children: ArcSwap<BTreeMap<String, Arc<Container>>>,
    /// Serializes structural changes to `children`.
    structure: Mutex<()>,
    /// Serializes start, stop and child attachment.
    transition: Mutex<()>,
    pipeline: Pipeline,
    lifecycle: Lifecycle,
    listeners: ArcSwap<Vec<SharedContainerListener>>,
    background_delay_ms: AtomicU64,
    start_stop_threads: AtomicUsize,
    background: Mutex<Option<BackgroundTask>>,
    executor: RwLock<Option<Handle>>,
    metrics: DispatchMetrics,
    self_ref: Weak<Container>,
}

fn as_millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// `"/"` and `""` become the root path `""`; other paths gain a leading `/`
/// and lose any trailing one.
fn normalize_context_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

impl Container {
    fn build<B>(name: String, scope: Scope, config: &DispatchConfig, background_delay: Duration, basic: B) -> Arc<Self>
    where
        B: FnOnce(Weak<Container>) -> Arc<dyn Valve>,
    {
        let label = format!("{}[{}]", scope.kind(), name);
        Arc::new_cyclic(|weak| Container {
            pipeline: Pipeline::with_basic(label.clone(), basic(weak.clone())),
            lifecycle: Lifecycle::new(label.clone()),
            name,
            label,
            scope,
            parent: RwLock::new(Weak::new()),
            children: ArcSwap::from_pointee(BTreeMap::new()),
            structure: Mutex::new(()),
            transition: Mutex::new(()),
            listeners: ArcSwap::from_pointee(Vec::new()),
            background_delay_ms: AtomicU64::new(as_millis(background_delay)),
            start_stop_threads: AtomicUsize::new(config.containers.start_stop_workers()),
            background: Mutex::new(None),
            executor: RwLock::new(None),
            metrics: DispatchMetrics::from_config(&config.observability),
            self_ref: weak.clone(),
        })
    }

    /// Root of a tree. Its background task runs every
    /// `containers.background_processor_delay_secs`.
    pub fn engine(name: impl Into<String>, config: &DispatchConfig) -> Arc<Self> {
        Self::build(
            name.into(),
            Scope::Engine(EngineScope::new()),
            config,
            config.containers.background_delay(),
            |c| -> Arc<dyn Valve> { Arc::new(EngineValve::new(c)) },
        )
    }

    /// Virtual host. The name is stored lowercase; `*.domain` makes a wildcard host.
    pub fn host(name: impl Into<String>, config: &DispatchConfig) -> Arc<Self> {
        let name = name.into().to_lowercase();
        let scope = Scope::Host(HostScope::new(&name));
        Self::build(name, scope, config, Duration::ZERO, |c| -> Arc<dyn Valve> {
            Arc::new(HostValve::new(c))
        })
    }

    /// Application mounted at `path`. `"/"` or `""` is the root context,
    /// registered under the name `"/"`.
    pub fn context(path: impl AsRef<str>, config: &DispatchConfig) -> Arc<Self> {
        let path = normalize_context_path(path.as_ref());
        let name = if path.is_empty() { "/".to_string() } else { path.clone() };
        let scope = Scope::Context(ContextScope::new(path, &config.context));
        Self::build(name, scope, config, Duration::ZERO, |c| -> Arc<dyn Valve> {
            Arc::new(ContextValve::new(c))
        })
    }

    /// Leaf wrapping one handler, created on first use by `factory`.
    pub fn wrapper(name: impl Into<String>, factory: HandlerFactory, config: &DispatchConfig) -> Arc<Self> {
        let scope = Scope::Wrapper(WrapperScope::new(factory, &config.wrapper));
        Self::build(name.into(), scope, config, Duration::ZERO, |c| -> Arc<dyn Valve> {
            Arc::new(WrapperValve::new(c))
        })
    }

    // --- Identity ---

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn kind(&self) -> ContainerKind {
        self.scope.kind()
    }

    /// Mount path for a Context ("" for the root context), None otherwise.
    pub fn context_path(&self) -> Option<&str> {
        match &self.scope {
            Scope::Context(scope) => Some(scope.path()),
            _ => None,
        }
    }

    pub fn as_engine(&self) -> Option<Engine<'_>> {
        match &self.scope {
            Scope::Engine(scope) => Some(Engine::new(self, scope)),
            _ => None,
        }
    }

    pub fn as_host(&self) -> Option<Host<'_>> {
        match &self.scope {
            Scope::Host(scope) => Some(Host::new(self, scope)),
            _ => None,
        }
    }

    pub fn as_context(&self) -> Option<Context<'_>> {
        match &self.scope {
            Scope::Context(scope) => Some(Context::new(self, scope)),
            _ => None,
        }
    }

    pub fn as_wrapper(&self) -> Option<Wrapper<'_>> {
        match &self.scope {
            Scope::Wrapper(scope) => Some(Wrapper::new(self, scope)),
            _ => None,
        }
    }

    // --- Tree structure ---

    fn structure_lock(&self) -> MutexGuard<'_, ()> {
        self.structure.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition_lock(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn parent(&self) -> Option<Arc<Container>> {
        self.parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .upgrade()
    }

    /// Attach `child`. If this container is running the child is started
    /// before the call returns; a child that fails to start is detached again.
    ///
    /// A concurrent `start()` or `stop()` of this container waits for the
    /// call to finish, or finishes before the child is attached.
    pub fn add_child(&self, child: Arc<Container>) -> Result<()> {
        if !self.kind().can_contain(child.kind()) {
            return Err(Error::InvalidChild {
                parent: self.name.clone(),
                parent_kind: self.kind().as_str(),
                child: child.name.clone(),
                child_kind: child.kind().as_str(),
            });
        }

        let _transition = self.transition_lock();
        {
            let _guard = self.structure_lock();
            let mut parent = child.parent.write().unwrap_or_else(PoisonError::into_inner);
            if let Some(existing) = parent.upgrade() {
                return Err(Error::AlreadyAttached {
                    child: child.label.clone(),
                    parent: existing.label.clone(),
                });
            }
            if self.children.load().contains_key(&child.name) {
                return Err(Error::DuplicateChild {
                    parent: self.label.clone(),
                    name: child.name.clone(),
                });
            }

            *parent = self.self_ref.clone();
            let mut next = (**self.children.load()).clone();
            next.insert(child.name.clone(), child.clone());
            self.children.store(Arc::new(next));
        }
        tracing::debug!(container = %self.label, child = %child.label, "Added child");

        if self.is_running() {
            if let Err(e) = child.start() {
                tracing::error!(container = %self.label, child = %child.label, error = %e, "Child failed to start, detaching");
                self.detach(&child);
                return Err(Error::ChildLifecycle {
                    child: child.label.clone(),
                    phase: "start",
                    source: Box::new(e),
                });
            }
        }

        self.fire_container_event(ContainerEventKind::AddChild, &child.name);
        Ok(())
    }

    /// Detach `child`, stopping it first if it is running.
    /// Returns false if it is not a child of this container.
    pub fn remove_child(&self, child: &Arc<Container>) -> bool {
        let present = self
            .children
            .load()
            .get(&child.name)
            .is_some_and(|c| Arc::ptr_eq(c, child));
        if !present {
            return false;
        }

        let _transition = self.transition_lock();
        if child.is_running() {
            if let Err(e) = child.stop() {
                tracing::warn!(container = %self.label, child = %child.label, error = %e, "Child failed to stop cleanly during removal");
            }
        }

        if !self.detach(child) {
            return false;
        }
        tracing::debug!(container = %self.label, child = %child.label, "Removed child");
        self.fire_container_event(ContainerEventKind::RemoveChild, &child.name);
        true
    }

    fn detach(&self, child: &Arc<Container>) -> bool {
        let _guard = self.structure_lock();
        let current = self.children.load();
        if !current.get(&child.name).is_some_and(|c| Arc::ptr_eq(c, child)) {
            return false;
        }
        let mut next = (**current).clone();
        next.remove(&child.name);
        self.children.store(Arc::new(next));
        *child.parent.write().unwrap_or_else(PoisonError::into_inner) = Weak::new();
        true
    }

    pub fn find_child(&self, name: &str) -> Option<Arc<Container>> {
        self.children.load().get(name).cloned()
    }

    /// Consistent snapshot of the children, ordered by name.
    pub fn find_children(&self) -> Vec<Arc<Container>> {
        self.children.load().values().cloned().collect()
    }

    // --- Listeners ---

    pub fn add_container_listener(&self, listener: SharedContainerListener) {
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(listener.clone());
            next
        });
    }

    pub fn remove_container_listener(&self, listener: &SharedContainerListener) -> bool {
        let mut removed = false;
        self.listeners.rcu(|current| {
            let next: Vec<_> = current
                .iter()
                .filter(|l| !std::ptr::addr_eq(Arc::as_ptr(*l), Arc::as_ptr(listener)))
                .cloned()
                .collect();
            removed = next.len() != current.len();
            next
        });
        removed
    }

    fn fire_container_event(&self, kind: ContainerEventKind, subject: &str) {
        let snapshot = self.listeners.load_full();
        let event = ContainerEvent {
            kind,
            container: &self.label,
            subject,
        };
        for listener in snapshot.iter() {
            listener.container_event(&event);
        }
    }

    pub fn add_lifecycle_listener(&self, listener: SharedLifecycleListener) {
        self.lifecycle.add_listener(listener);
    }

    pub fn remove_lifecycle_listener(&self, listener: &SharedLifecycleListener) -> bool {
        self.lifecycle.remove_listener(listener)
    }

    // --- Pipeline ---

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Append a valve before this container's basic valve.
    pub fn add_valve(&self, valve: Arc<dyn Valve>) -> Result<()> {
        let name = valve.name().to_string();
        self.pipeline.add_valve(valve)?;
        self.fire_container_event(ContainerEventKind::AddValve, &name);
        Ok(())
    }

    pub fn remove_valve(&self, valve: &Arc<dyn Valve>) -> bool {
        if !self.pipeline.remove_valve(valve) {
            return false;
        }
        self.fire_container_event(ContainerEventKind::RemoveValve, valve.name());
        true
    }

    // --- Dispatch ---

    /// Run the request through this container's pipeline.
    pub fn invoke(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        self.pipeline.invoke(request, response)
    }

    /// Select the child that should handle `request`, writing the binding
    /// onto the request when `update` is set. Wrappers never map.
    pub fn map(&self, request: &mut Request, update: bool) -> Option<Arc<Container>> {
        let mapper: &dyn Mapper = match self.kind() {
            ContainerKind::Engine => &EngineMapper,
            ContainerKind::Host => &HostMapper,
            ContainerKind::Context => &ContextMapper,
            ContainerKind::Wrapper => return None,
        };
        mapper.map(self, request, update)
    }

    // --- Tunables ---

    /// Zero disables this container's own background task; its maintenance
    /// then runs as part of the nearest ancestor that has one.
    pub fn set_background_delay(&self, delay: Duration) {
        self.background_delay_ms.store(as_millis(delay), Ordering::Relaxed);
    }

    pub fn background_delay(&self) -> Duration {
        Duration::from_millis(self.background_delay_ms.load(Ordering::Relaxed))
    }

    /// Workers used to start/stop children. 0 means one per CPU.
    pub fn set_start_stop_threads(&self, threads: usize) {
        let threads = match threads {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        };
        self.start_stop_threads.store(threads, Ordering::Relaxed);
    }

    pub fn start_stop_threads(&self) -> usize {
        self.start_stop_threads.load(Ordering::Relaxed)
    }

    /// Metrics handle built from this container's `observability` settings.
    pub fn metrics(&self) -> DispatchMetrics {
        self.metrics
    }

    /// Runtime used for background tasks of this subtree.
    pub fn set_executor(&self, handle: Handle) {
        *self.executor.write().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Own runtime, else the nearest ancestor's, else the ambient one.
    pub fn executor(&self) -> Option<Handle> {
        if let Some(handle) = self.executor.read().unwrap_or_else(PoisonError::into_inner).clone() {
            return Some(handle);
        }
        match self.parent() {
            Some(parent) => parent.executor(),
            None => Handle::try_current().ok(),
        }
    }

    // --- Lifecycle ---

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Start the pipeline, then every child, then the background task.
    ///
    /// On failure everything started so far is stopped again and the
    /// container is left Stopped.
    pub fn start(&self) -> Result<()> {
        let _transition = self.transition_lock();
        self.lifecycle.begin_start()?;
        tracing::debug!(container = %self.label, "Starting container");
        self.lifecycle.fire(LifecycleEventKind::BeforeStart);

        if let Err(e) = self.pipeline.start() {
            tracing::error!(container = %self.label, error = %e, "Pipeline failed to start");
            self.lifecycle.abort_start();
            return Err(e);
        }

        let children = self.find_children();
        let workers = self.start_stop_threads();
        let started = fanout::for_each_child(&children, workers, "start", |child| match child.start() {
            Err(Error::AlreadyRunning { .. }) => Ok(()),
            other => other,
        })
        .and_then(|()| self.start_scope());

        if let Err(e) = started {
            tracing::error!(container = %self.label, error = %e, "Container failed to start, rolling back");
            let _ = fanout::for_each_child(&children, workers, "stop", |child| match child.stop() {
                Err(Error::NotRunning { .. }) => Ok(()),
                other => other,
            });
            let _ = self.pipeline.stop();
            self.lifecycle.abort_start();
            return Err(e);
        }

        self.lifecycle.fire(LifecycleEventKind::Start);
        self.schedule_background();
        self.lifecycle.fire(LifecycleEventKind::AfterStart);
        tracing::info!(container = %self.label, children = children.len(), "Container started");
        Ok(())
    }

    /// Cancel the background task, stop every child, then the pipeline.
    ///
    /// Blocks until the whole subtree has stopped. Must not be called from
    /// inside this container's own background work.
    pub fn stop(&self) -> Result<()> {
        let _transition = self.transition_lock();
        self.lifecycle.begin_stop()?;
        tracing::debug!(container = %self.label, "Stopping container");
        self.lifecycle.fire(LifecycleEventKind::BeforeStop);

        self.cancel_background();

        let children = self.find_children();
        let mut result = fanout::for_each_child(&children, self.start_stop_threads(), "stop", |child| match child.stop() {
            Err(Error::NotRunning { .. }) => Ok(()),
            other => other,
        });

        self.stop_scope();

        if let Err(e) = self.pipeline.stop() {
            result = result.and(Err(e));
        }

        self.lifecycle.fire(LifecycleEventKind::Stop);
        self.lifecycle.fire(LifecycleEventKind::AfterStop);
        match &result {
            Ok(()) => tracing::info!(container = %self.label, "Container stopped"),
            Err(e) => tracing::warn!(container = %self.label, error = %e, "Container stopped with errors"),
        }
        result
    }

    fn start_scope(&self) -> Result<()> {
        match &self.scope {
            Scope::Context(scope) => Context::new(self, scope).start_internal(),
            _ => Ok(()),
        }
    }

    fn stop_scope(&self) {
        match &self.scope {
            Scope::Context(scope) => Context::new(self, scope).stop_internal(),
            Scope::Wrapper(scope) => Wrapper::new(self, scope).unload(),
            _ => {}
        }
    }

    // --- Background maintenance ---

    fn schedule_background(&self) {
        let delay = self.background_delay();
        if delay.is_zero() {
            return;
        }
        let Some(handle) = self.executor() else {
            tracing::warn!(container = %self.label, "No async runtime available, background processing disabled");
            return;
        };

        let weak = self.self_ref.clone();
        let task = BackgroundTask::spawn(&handle, self.label.clone(), delay, self.metrics, move || {
            if let Some(container) = weak.upgrade() {
                container.background_process();
            }
        });
        *self.background.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
    }

    fn cancel_background(&self) {
        let task = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            task.cancel();
        }
    }

    /// True while this container has its own scheduled background task.
    pub fn has_background_task(&self) -> bool {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// One maintenance run: valves, variant upkeep, the periodic event,
    /// then every child without a task of its own. A failing child does not
    /// prevent its siblings from running.
    pub fn background_process(&self) {
        if !self.is_running() {
            return;
        }

        self.pipeline.background_process();
        if let Scope::Wrapper(scope) = &self.scope {
            Wrapper::new(self, scope).background_process();
        }
        self.lifecycle.fire(LifecycleEventKind::Periodic);

        for child in self.find_children() {
            if !child.background_delay().is_zero() {
                continue;
            }
            if panic::catch_unwind(AssertUnwindSafe(|| child.background_process())).is_err() {
                tracing::error!(container = %child.label, "Background processing failed");
                self.metrics.record_background_failure();
            }
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("label", &self.label)
            .field("state", &self.state())
            .field("children", &self.children.load().keys().collect::<Vec<_>>())
            .field("pipeline", &self.pipeline)
            .finish()
    }
}
