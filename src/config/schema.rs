//! Configuration schema definitions.
//!
//! This module defines the tunables threaded through container construction.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the dispatch engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DispatchConfig {
    /// Tree-wide container settings.
    pub containers: ContainerConfig,

    /// Handler wrapper settings.
    pub wrapper: WrapperConfig,

    /// Application context settings.
    pub context: ContextConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Container lifecycle and maintenance settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ContainerConfig {
    /// Workers used to start/stop children. 1 = sequential, 0 = one per CPU.
    pub start_stop_threads: usize,

    /// Delay between background runs of the engine, in seconds.
    /// Zero or negative disables the engine's own background task.
    pub background_processor_delay_secs: i64,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            start_stop_threads: 1,
            background_processor_delay_secs: 10,
        }
    }
}

impl ContainerConfig {
    /// Effective worker count for child start/stop fan-out.
    pub fn start_stop_workers(&self) -> usize {
        match self.start_stop_threads {
            0 => std::thread::available_parallelism().map_or(1, |n| n.get()),
            n => n,
        }
    }

    pub fn background_delay(&self) -> Duration {
        u64::try_from(self.background_processor_delay_secs).map_or(Duration::ZERO, Duration::from_secs)
    }
}

/// Handler wrapper settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct WrapperConfig {
    /// How long `unload()` waits for in-flight allocations to drain.
    pub unload_delay_ms: u64,

    /// Unavailable period applied when a handler reports a temporary
    /// outage without a duration.
    pub default_unavailable_secs: u64,
}

impl Default for WrapperConfig {
    fn default() -> Self {
        Self {
            unload_delay_ms: 2000,
            default_unavailable_secs: 60,
        }
    }
}

impl WrapperConfig {
    pub fn unload_delay(&self) -> Duration {
        Duration::from_millis(self.unload_delay_ms)
    }

    pub fn default_unavailable(&self) -> Duration {
        Duration::from_secs(self.default_unavailable_secs)
    }
}

/// Application context settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ContextConfig {
    /// Relative path prefixes never served to clients (compared case-insensitively).
    pub forbidden_prefixes: Vec<String>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            forbidden_prefixes: vec!["/WEB-INF".to_string(), "/META-INF".to_string()],
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Record dispatch metrics through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
        }
    }
}
