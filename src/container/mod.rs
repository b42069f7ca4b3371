//! Container tree subsystem.
//!
//! # Data Flow
//! ```text
//! Engine.invoke(request, response)
//!     → Engine pipeline → EngineValve → EngineMapper (host name)
//!     → Host pipeline   → HostValve   → HostMapper (longest context path)
//!     → Context pipeline → ContextValve → ContextMapper (handler pattern)
//!     → Wrapper pipeline → WrapperValve → filter chain → handler
//!
//! Lifecycle:
//!     start(): pipeline → children (fan-out) → variant hook → background task
//!     stop():  background task → children (fan-out) → variant hook → pipeline
//! ```
//!
//! # Design Decisions
//! - One `Container` type; the variant decides its mapper, basic valve and
//!   lifecycle hooks
//! - Variant-specific operations go through borrowed views (`as_context()`,
//!   `as_wrapper()`, ...)
//! - Child kinds are fixed: Engine → Host → Context → Wrapper

pub mod context;
pub mod engine;
pub mod events;
pub(crate) mod fanout;
pub mod host;
pub mod kind;
pub mod tree;
pub mod wrapper;

pub use context::Context;
pub use engine::Engine;
pub use events::{ContainerEvent, ContainerEventKind, ContainerListener, SharedContainerListener};
pub use host::Host;
pub use kind::ContainerKind;
pub use tree::Container;
pub use wrapper::{Availability, Wrapper};
