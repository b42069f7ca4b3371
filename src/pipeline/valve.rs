//! Valve trait and chain links.
//!
//! A valve never owns its successor. The pipeline owns a list of
//! [`ValveLink`]s, each holding the valve plus an atomically replaceable
//! pointer to the next link. `invoke` loads that pointer once on entry, so a
//! relink or removal during the call never changes where an in-flight request
//! goes next.

use std::sync::Arc;

use arc_swap::ArcSwapOption;

use crate::error::{Error, Result};
use crate::http::{Request, Response};

/// One middleware unit in a pipeline.
pub trait Valve: Send + Sync {
    /// Identifier used in logs and traces.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Process the request. The default forwards unconditionally.
    ///
    /// Basic valves override this and never call `next`.
    fn invoke(&self, request: &mut Request, response: &mut Response, next: Next<'_>) -> Result<()> {
        next.invoke(request, response)
    }

    fn start(&self) -> Result<()> {
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        Ok(())
    }

    /// Periodic maintenance hook, run from the owning container's background task.
    fn background_process(&self) {}
}

/// Compare two valves by allocation.
pub fn same_valve(a: &Arc<dyn Valve>, b: &Arc<dyn Valve>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// A pipeline-owned chain node.
pub struct ValveLink {
    valve: Arc<dyn Valve>,
    next: ArcSwapOption<ValveLink>,
}

impl ValveLink {
    pub(crate) fn new(valve: Arc<dyn Valve>, next: Option<Arc<ValveLink>>) -> Self {
        Self {
            valve,
            next: ArcSwapOption::new(next),
        }
    }

    pub fn valve(&self) -> &Arc<dyn Valve> {
        &self.valve
    }

    /// The link this one currently forwards to.
    pub fn next(&self) -> Option<Arc<ValveLink>> {
        self.next.load_full()
    }

    pub(crate) fn relink(&self, next: Option<Arc<ValveLink>>) {
        self.next.store(next);
    }

    /// Run this valve, handing it the successor captured right now.
    pub fn invoke(&self, request: &mut Request, response: &mut Response) -> Result<()> {
        let next = Next {
            link: self.next.load_full(),
            from: self.valve.name(),
        };
        self.valve.invoke(request, response, next)
    }
}

impl std::fmt::Debug for ValveLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValveLink")
            .field("valve", &self.valve.name())
            .field("has_next", &self.next.load().is_some())
            .finish()
    }
}

/// The remainder of the chain as seen by the valve currently executing.
pub struct Next<'a> {
    link: Option<Arc<ValveLink>>,
    from: &'a str,
}

impl Next<'_> {
    /// Forward to the next valve. Fails when called past the basic valve.
    pub fn invoke(self, request: &mut Request, response: &mut Response) -> Result<()> {
        match self.link {
            Some(link) => link.invoke(request, response),
            None => {
                tracing::error!(valve = %self.from, "Basic valve attempted to forward");
                Err(Error::BasicValveForward(self.from.to_string()))
            }
        }
    }

    /// True when there is nothing left to forward to.
    pub fn is_end(&self) -> bool {
        self.link.is_none()
    }

    /// Name of the valve this call would forward to.
    pub fn peek_name(&self) -> Option<&str> {
        self.link.as_ref().map(|l| l.valve().name())
    }
}
