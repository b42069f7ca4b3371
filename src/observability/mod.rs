//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters and histograms via the `metrics` facade)
//!
//! Consumers:
//!     → whatever subscriber / recorder the embedding process installs
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every dispatch log line
//! - No exporter is installed here; the embedding process owns that choice
//! - Metric updates are fire-and-forget and never fail a request
//! - The metrics switch travels with each container's configuration; no
//!   process-wide flag

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use self::metrics::DispatchMetrics;
