//! Middleware chain subsystem.
//!
//! # Data Flow
//! ```text
//! Container.invoke(request, response)
//!     → chain.rs (Pipeline::first)
//!     → valve.rs (ValveLink::invoke → Valve::invoke)
//!     → next.invoke(...) ... → basic valve (terminal, never forwards)
//! ```
//!
//! # Design Decisions
//! - Singly linked list of pipeline-owned links, ending at the basic valve
//! - Writers serialized per pipeline; readers lock-free
//! - Links replaced atomically, never mutated under an in-flight call

pub mod chain;
pub mod valve;

pub use chain::Pipeline;
pub use valve::{same_valve, Next, Valve, ValveLink};
