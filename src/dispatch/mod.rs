//! Basic valves: one per container variant.
//!
//! # Data Flow
//! ```text
//! EngineValve  → map host    → miss: 404 │ hit: Host.invoke
//! HostValve    → map context → miss: 404 │ hit: Context.invoke
//! ContextValve → forbidden?  → 404       │ map handler → miss: 404 │ hit: Wrapper.invoke
//! WrapperValve → availability → allocate → filter chain → handler → release
//! ```
//!
//! # Design Decisions
//! - Basic valves terminate their pipeline and never call `next`
//! - Each valve holds a `Weak` reference to its container, so a pipeline
//!   never keeps its owner alive
//! - An error already flagged on the response is never overwritten by a
//!   routing miss

pub mod context_valve;
pub mod engine_valve;
pub mod host_valve;
pub mod wrapper_valve;

pub use context_valve::ContextValve;
pub use engine_valve::EngineValve;
pub use host_valve::HostValve;
pub use wrapper_valve::WrapperValve;

use std::sync::{Arc, Weak};

use crate::container::Container;
use crate::error::{Error, Result};
use crate::http::{status, Request, Response};

/// Resolve the owning container or fail: a basic valve outliving its
/// container means the pipeline was detached.
fn owner(container: &Weak<Container>, valve: &str) -> Result<Arc<Container>> {
    container.upgrade().ok_or_else(|| Error::Valve {
        valve: valve.to_string(),
        reason: "owning container has been dropped".to_string(),
    })
}

/// Map one level down and forward into the selected child's pipeline.
fn forward_to_child(container: &Container, request: &mut Request, response: &mut Response) -> Result<()> {
    match container.map(request, true) {
        Some(child) => child.invoke(request, response),
        None => {
            let level = container.kind().routing_level();
            tracing::debug!(
                container = %container.label(),
                request_id = %request.id(),
                host = ?request.host(),
                path = %request.decoded_path(),
                routing_level = level,
                "No matching child"
            );
            container.metrics().record_routing_miss(level);
            if !response.is_error() {
                response.send_error(status::NOT_FOUND, format!("No {level} matches the request"));
            }
            Ok(())
        }
    }
}
