//! Start/stop state machine shared by containers and pipelines.
//!
//! # States
//! - Stopped: initial state, and the state after `stop()`
//! - Running: between a successful `start()` and the next `stop()`
//!
//! # State Transitions
//! ```text
//! Stopped → Running: start()   (else "already running")
//! Running → Stopped: stop()    (else "not running")
//! ```
//!
//! # Design Decisions
//! - The transition is claimed atomically up front, so two racing
//!   `start()` calls cannot both proceed
//! - Listeners live in a copy-on-write list; firing iterates a snapshot
//!   taken at fire time, so registration during a fire is safe

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::error::{Error, Result};
use crate::lifecycle::events::{
    LifecycleEvent, LifecycleEventKind, LifecycleListener, SharedLifecycleListener,
};

/// Lifecycle state.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Stopped = 0,
    Running = 1,
}

impl From<u8> for LifecycleState {
    fn from(val: u8) -> Self {
        match val {
            1 => LifecycleState::Running,
            _ => LifecycleState::Stopped,
        }
    }
}

/// State guard plus ordered listener notification.
pub struct Lifecycle {
    component: String,
    state: AtomicU8,
    listeners: ArcSwap<Vec<SharedLifecycleListener>>,
}

impl Lifecycle {
    /// Create a stopped lifecycle for the named component.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            state: AtomicU8::new(LifecycleState::Stopped as u8),
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn state(&self) -> LifecycleState {
        self.state.load(Ordering::Acquire).into()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LifecycleState::Running
    }

    /// Claim the Stopped → Running transition.
    pub fn begin_start(&self) -> Result<()> {
        self.transition(LifecycleState::Stopped, LifecycleState::Running)
            .map_err(|_| Error::AlreadyRunning {
                component: self.component.clone(),
            })
    }

    /// Claim the Running → Stopped transition.
    pub fn begin_stop(&self) -> Result<()> {
        self.transition(LifecycleState::Running, LifecycleState::Stopped)
            .map_err(|_| Error::NotRunning {
                component: self.component.clone(),
            })
    }

    /// Roll a failed start back to Stopped without firing stop events.
    pub fn abort_start(&self) {
        self.state
            .store(LifecycleState::Stopped as u8, Ordering::Release);
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> std::result::Result<(), u8> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
    }

    // --- Listeners ---

    pub fn add_listener(&self, listener: SharedLifecycleListener) {
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(listener.clone());
            next
        });
    }

    /// Remove a listener by identity. Returns false if it was not registered.
    pub fn remove_listener(&self, listener: &SharedLifecycleListener) -> bool {
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

    pub fn listeners(&self) -> Arc<Vec<SharedLifecycleListener>> {
        self.listeners.load_full()
    }

    /// Notify every listener registered at the moment of the call, in order.
    pub fn fire(&self, kind: LifecycleEventKind) {
        let snapshot = self.listeners.load_full();
        let event = LifecycleEvent {
            kind,
            source: &self.component,
        };
        tracing::trace!(component = %self.component, event = %kind, listeners = snapshot.len(), "Firing lifecycle event");
        for listener in snapshot.iter() {
            listener.lifecycle_event(&event);
        }
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("component", &self.component)
            .field("state", &self.state())
            .field("listeners", &self.listeners.load().len())
            .finish()
    }
}

/// Collects events into a shared log; handy for asserting firing order.
#[derive(Debug, Default)]
pub struct EventRecorder {
    events: std::sync::Mutex<Vec<(String, LifecycleEventKind)>>,
}

impl EventRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<(String, LifecycleEventKind)> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    pub fn kinds(&self) -> Vec<LifecycleEventKind> {
        self.events().into_iter().map(|(_, k)| k).collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
    }
}

impl LifecycleListener for EventRecorder {
    fn lifecycle_event(&self, event: &LifecycleEvent<'_>) {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push((event.source.to_string(), event.kind));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_start_stop_guards() {
        let lc = Lifecycle::new("Test[x]");
        assert_eq!(lc.state(), LifecycleState::Stopped);

        let err = lc.begin_stop().unwrap_err();
        assert_eq!(err.to_string(), "Test[x] is not running");

        lc.begin_start().unwrap();
        assert!(lc.is_running());
        let err = lc.begin_start().unwrap_err();
        assert_eq!(err.to_string(), "Test[x] is already running");

        lc.begin_stop().unwrap();
        assert!(!lc.is_running());
    }

    #[test]
    fn test_listeners_fire_in_registration_order() {
        let lc = Lifecycle::new("Test[x]");
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        for id in 0..3 {
            let order = order.clone();
            lc.add_listener(Arc::new(move |_: &LifecycleEvent<'_>| {
                order.lock().unwrap().push(id);
            }));
        }
        lc.fire(LifecycleEventKind::Start);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_listener_added_during_fire_sees_next_event_only() {
        let lc = Arc::new(Lifecycle::new("Test[x]"));
        let late_calls = Arc::new(AtomicUsize::new(0));

        let lc_inner = lc.clone();
        let late = late_calls.clone();
        lc.add_listener(Arc::new(move |event: &LifecycleEvent<'_>| {
            if event.kind == LifecycleEventKind::BeforeStart {
                let late = late.clone();
                lc_inner.add_listener(Arc::new(move |_: &LifecycleEvent<'_>| {
                    late.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }));

        lc.fire(LifecycleEventKind::BeforeStart);
        assert_eq!(late_calls.load(Ordering::SeqCst), 0);
        lc.fire(LifecycleEventKind::Start);
        assert_eq!(late_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_listener() {
        let lc = Lifecycle::new("Test[x]");
        let recorder = EventRecorder::new();
        let shared: SharedLifecycleListener = recorder.clone();
        lc.add_listener(shared.clone());
        assert!(lc.remove_listener(&shared));
        assert!(!lc.remove_listener(&shared));
        lc.fire(LifecycleEventKind::Start);
        assert!(recorder.events().is_empty());
    }
}
