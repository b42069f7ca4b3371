//! Lifecycle events and listeners.

use std::fmt;
use std::sync::Arc;

/// Kinds of lifecycle notifications, in firing order for each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEventKind {
    BeforeStart,
    Start,
    AfterStart,
    BeforeStop,
    Stop,
    AfterStop,
    /// Fired on every background-maintenance run.
    Periodic,
}

impl fmt::Display for LifecycleEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleEventKind::BeforeStart => "before_start",
            LifecycleEventKind::Start => "start",
            LifecycleEventKind::AfterStart => "after_start",
            LifecycleEventKind::BeforeStop => "before_stop",
            LifecycleEventKind::Stop => "stop",
            LifecycleEventKind::AfterStop => "after_stop",
            LifecycleEventKind::Periodic => "periodic",
        };
        f.write_str(s)
    }
}

/// A notification delivered to [`LifecycleListener`]s.
#[derive(Debug, Clone, Copy)]
pub struct LifecycleEvent<'a> {
    pub kind: LifecycleEventKind,
    /// Label of the component that fired the event, e.g. `Host[a]`.
    pub source: &'a str,
}

/// Receives lifecycle events synchronously on the transitioning thread.
pub trait LifecycleListener: Send + Sync {
    fn lifecycle_event(&self, event: &LifecycleEvent<'_>);
}

impl<F> LifecycleListener for F
where
    F: Fn(&LifecycleEvent<'_>) + Send + Sync,
{
    fn lifecycle_event(&self, event: &LifecycleEvent<'_>) {
        self(event)
    }
}

/// Shared listener handle; identity is the allocation, used for removal.
pub type SharedLifecycleListener = Arc<dyn LifecycleListener>;
