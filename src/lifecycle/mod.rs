//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Start (state.rs):
//!     begin_start → before_start → [component work] → start → after_start
//!
//! Stop (state.rs):
//!     begin_stop → before_stop → [component work] → stop → after_stop
//!
//! Background (background.rs):
//!     interval tick → blocking maintenance run → periodic event
//!     stop signal → loop exits → cancel() returns
//! ```
//!
//! # Design Decisions
//! - Two states only: Stopped and Running
//! - Events are synchronous and delivered in registration order
//! - Background loops are owned by the container that scheduled them

pub mod background;
pub mod events;
pub mod state;

pub use background::BackgroundTask;
pub use events::{LifecycleEvent, LifecycleEventKind, LifecycleListener, SharedLifecycleListener};
pub use state::{EventRecorder, Lifecycle, LifecycleState};
