//! Layered request-dispatch engine.
//!
//! A request enters the root [`Container`] (the engine) and is routed down a
//! tree of containers: engine, host, context, wrapper. Every container owns a
//! [`Pipeline`] of valves ending in a basic valve that maps the request to the
//! next level. At the wrapper, a per-request filter chain wraps the handler.
//!
//! ```text
//! Engine ─► Host ─► Context ─► Wrapper ─► filters ─► Handler
//!   │        │        │          │
//! valves   valves   valves     valves
//! ```

pub mod config;
pub mod container;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod registry;
pub mod routing;
pub mod valves;

pub use config::DispatchConfig;
pub use container::{Availability, Container, ContainerKind};
pub use error::{Error, Result};
pub use filter::{Filter, FilterChain, FilterDef, FilterMapping};
pub use handler::{Handler, HandlerError, Unavailability};
pub use http::{DispatcherType, Request, Response};
pub use lifecycle::{LifecycleEventKind, LifecycleState};
pub use pipeline::{Next, Pipeline, Valve};
pub use registry::Registry;
