//! Valve pipeline bound to one container.
//!
//! # Responsibilities
//! - Keep the ordered valve chain, terminated by the basic valve
//! - Serialize structural changes (add/remove/set basic) behind one lock
//! - Publish every change with a single atomic pointer store
//! - Propagate start/stop to every valve it holds
//!
//! # Design Decisions
//! - Readers never take the lock: `first()` is an atomic load and each link
//!   loads its successor once per call
//! - A removed link keeps pointing at its old successor, so a request already
//!   inside it still reaches the rest of the chain
//! - The basic valve cannot be removed, only replaced

use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwapOption;

use crate::error::{Error, Result};
use crate::http::{Request, Response};
use crate::lifecycle::{Lifecycle, LifecycleEventKind};
use crate::pipeline::valve::{same_valve, Valve, ValveLink};

#[derive(Default)]
struct ChainState {
    /// Non-basic links in invocation order.
    valves: Vec<Arc<ValveLink>>,
    basic: Option<Arc<ValveLink>>,
}

/// Ordered valve chain ending in a basic valve.
pub struct Pipeline {
    owner: String,
    head: ArcSwapOption<ValveLink>,
    state: Mutex<ChainState>,
    lifecycle: Lifecycle,
}

impl Pipeline {
    /// Create an empty pipeline; `invoke` fails until a basic valve is set.
    pub fn new(owner: impl Into<String>) -> Self {
        let owner = owner.into();
        Self {
            lifecycle: Lifecycle::new(format!("Pipeline[{owner}]")),
            owner,
            head: ArcSwapOption::empty(),
            state: Mutex::new(ChainState::default()),
        }
    }

    /// Create a pipeline with its basic valve already installed.
    pub fn with_basic(owner: impl Into<String>, basic: Arc<dyn Valve>) -> Self {
        let pipeline = Self::new(owner);
        let link = Arc::new(ValveLink::new(basic, None));
        pipeline.head.store(Some(link.clone()));
        pipeline.lock().basic = Some(link);
        pipeline
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    // --- Structure ---

    pub fn basic(&self) -> Option<Arc<dyn Valve>> {
        self.lock().basic.as_ref().map(|l| l.valve().clone())
    }

    /// Install or replace the terminal valve.
    ///
    /// The last non-basic link is relinked to the new basic valve in one
    /// atomic store. When running, the new valve is started before it becomes
    /// reachable and the old one is stopped afterwards.
    pub fn set_basic(&self, valve: Arc<dyn Valve>) -> Result<()> {
        let mut state = self.lock();
        if let Some(current) = &state.basic {
            if same_valve(current.valve(), &valve) {
                return Ok(());
            }
        }

        let running = self.is_running();
        if running {
            valve.start()?;
        }

        let link = Arc::new(ValveLink::new(valve, None));
        match state.valves.last() {
            Some(last) => last.relink(Some(link.clone())),
            None => self.head.store(Some(link.clone())),
        }
        let old = state.basic.replace(link);
        drop(state);

        if let Some(old) = old {
            tracing::debug!(pipeline = %self.owner, old = %old.valve().name(), "Replaced basic valve");
            if running {
                if let Err(e) = old.valve().stop() {
                    tracing::warn!(pipeline = %self.owner, valve = %old.valve().name(), error = %e, "Failed to stop replaced basic valve");
                }
            }
        }
        Ok(())
    }

    /// Append a valve just before the basic valve.
    pub fn add_valve(&self, valve: Arc<dyn Valve>) -> Result<()> {
        let mut state = self.lock();
        let basic = state
            .basic
            .clone()
            .ok_or_else(|| Error::NoBasicValve(self.owner.clone()))?;

        if self.is_running() {
            valve.start()?;
        }

        let link = Arc::new(ValveLink::new(valve, Some(basic)));
        match state.valves.last() {
            Some(last) => last.relink(Some(link.clone())),
            None => self.head.store(Some(link.clone())),
        }
        tracing::debug!(pipeline = %self.owner, valve = %link.valve().name(), position = state.valves.len(), "Added valve");
        state.valves.push(link);
        Ok(())
    }

    /// Unlink a non-basic valve. Returns false if it is not in the chain.
    pub fn remove_valve(&self, valve: &Arc<dyn Valve>) -> bool {
        let mut state = self.lock();
        let Some(index) = state
            .valves
            .iter()
            .position(|l| same_valve(l.valve(), valve))
        else {
            if state.basic.as_ref().is_some_and(|b| same_valve(b.valve(), valve)) {
                tracing::debug!(pipeline = %self.owner, "Basic valve cannot be removed, use set_basic");
            }
            return false;
        };

        let removed = state.valves.remove(index);
        let successor = removed.next();
        match index {
            0 => self.head.store(successor),
            _ => state.valves[index - 1].relink(successor),
        }
        drop(state);

        tracing::debug!(pipeline = %self.owner, valve = %removed.valve().name(), "Removed valve");
        if self.is_running() {
            if let Err(e) = removed.valve().stop() {
                tracing::warn!(pipeline = %self.owner, valve = %removed.valve().name(), error = %e, "Failed to stop removed valve");
            }
        }
        true
    }

    /// Non-basic valves in invocation order.
    pub fn valves(&self) -> Vec<Arc<dyn Valve>> {
        self.lock()
            .valves
            .iter()
            .map(|l| l.valve().clone())
            .collect()
    }

    /// Entry point of the chain: the first valve, or the basic valve alone.
    pub fn first(&self) -> Option<Arc<ValveLink>> {
        self.head.load_full()
    }

    // --- Dispatch ---

    /// Run the request through the whole chain.
    pub fn invoke(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        match self.first() {
            Some(head) => head.invoke(request, response),
            None => Err(Error::NoBasicValve(self.owner.clone())),
        }
    }

    // --- Lifecycle ---

    fn all_valves(&self) -> Vec<Arc<dyn Valve>> {
        let state = self.lock();
        state
            .valves
            .iter()
            .chain(state.basic.iter())
            .map(|l| l.valve().clone())
            .collect()
    }

    /// Start every valve, in chain order.
    pub fn start(&self) -> Result<()> {
        self.lifecycle.begin_start()?;
        self.lifecycle.fire(LifecycleEventKind::BeforeStart);

        let valves = self.all_valves();
        for (i, valve) in valves.iter().enumerate() {
            if let Err(e) = valve.start() {
                tracing::error!(pipeline = %self.owner, valve = %valve.name(), error = %e, "Valve failed to start");
                for started in valves[..i].iter().rev() {
                    let _ = started.stop();
                }
                self.lifecycle.abort_start();
                return Err(e);
            }
        }

        self.lifecycle.fire(LifecycleEventKind::Start);
        self.lifecycle.fire(LifecycleEventKind::AfterStart);
        Ok(())
    }

    /// Stop every valve. All valves are attempted; the first error is returned.
    pub fn stop(&self) -> Result<()> {
        self.lifecycle.begin_stop()?;
        self.lifecycle.fire(LifecycleEventKind::BeforeStop);

        let mut first_error = None;
        for valve in self.all_valves() {
            if let Err(e) = valve.stop() {
                tracing::warn!(pipeline = %self.owner, valve = %valve.name(), error = %e, "Valve failed to stop");
                first_error.get_or_insert(e);
            }
        }

        self.lifecycle.fire(LifecycleEventKind::Stop);
        self.lifecycle.fire(LifecycleEventKind::AfterStop);
        first_error.map_or(Ok(()), Err)
    }

    /// Give every valve its periodic maintenance slot.
    pub fn background_process(&self) {
        for valve in self.all_valves() {
            valve.background_process();
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Pipeline")
            .field("owner", &self.owner)
            .field(
                "valves",
                &state.valves.iter().map(|l| l.valve().name()).collect::<Vec<_>>(),
            )
            .field("basic", &state.basic.as_ref().map(|l| l.valve().name()))
            .finish()
    }
}
