//! Dispatch metrics.
//!
//! # Metrics
//! - `dispatch_requests_total` (counter): completed dispatches by status
//! - `dispatch_request_duration_seconds` (histogram): time spent below the access-log valve
//! - `dispatch_routing_miss_total` (counter): mapper misses by level (host, context, handler)
//! - `dispatch_handler_unavailable_total` (counter): refusals by kind (temporary, permanent, context)
//! - `dispatch_background_runs_total` / `dispatch_background_failures_total` (counters)
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a cheap no-op
//! - Label values are low-cardinality (status codes, fixed level names)
//! - The on/off switch is a `DispatchMetrics` value built from
//!   `observability.metrics_enabled` and carried by each container, so two
//!   trees in one process can disagree

use std::time::Instant;

use crate::config::ObservabilityConfig;

/// Recording handle. Copies are cheap; every record call is a no-op when disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchMetrics {
    enabled: bool,
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl DispatchMetrics {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn from_config(config: &ObservabilityConfig) -> Self {
        Self::new(config.metrics_enabled)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record_request(&self, status: u16) {
        if !self.enabled {
            return;
        }
        metrics::counter!("dispatch_requests_total", "status" => status.to_string()).increment(1);
    }

    pub fn record_request_duration(&self, start: Instant) {
        if !self.enabled {
            return;
        }
        metrics::histogram!("dispatch_request_duration_seconds").record(start.elapsed().as_secs_f64());
    }

    pub fn record_routing_miss(&self, level: &'static str) {
        if !self.enabled {
            return;
        }
        metrics::counter!("dispatch_routing_miss_total", "level" => level).increment(1);
    }

    pub fn record_handler_unavailable(&self, kind: &'static str) {
        if !self.enabled {
            return;
        }
        metrics::counter!("dispatch_handler_unavailable_total", "kind" => kind).increment(1);
    }

    pub fn record_background_run(&self) {
        if !self.enabled {
            return;
        }
        metrics::counter!("dispatch_background_runs_total").increment(1);
    }

    pub fn record_background_failure(&self) {
        if !self.enabled {
            return;
        }
        metrics::counter!("dispatch_background_failures_total").increment(1);
    }
}
