//! Error types for the dispatch core.
//!
//! Configuration and lifecycle errors are raised immediately and leave the
//! existing tree untouched. Handler failures travel as [`HandlerError`] and are
//! translated into responses by the wrapper valve.

use crate::handler::HandlerError;

/// Result type alias for dispatch-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by containers, pipelines and valves.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// `start()` on a component that is already running.
    #[error("{component} is already running")]
    AlreadyRunning { component: String },

    /// `stop()` on a component that was never started.
    #[error("{component} is not running")]
    NotRunning { component: String },

    /// A child failed while the parent was starting or stopping it.
    #[error("child container '{child}' failed during {phase}: {source}")]
    ChildLifecycle {
        child: String,
        phase: &'static str,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // Tree Structure Errors
    // =========================================================================
    /// A sibling with the same name is already attached.
    #[error("child name '{name}' is not unique under '{parent}'")]
    DuplicateChild { parent: String, name: String },

    /// The child variant cannot live under the parent variant.
    #[error("{child_kind} '{child}' cannot be a child of {parent_kind} '{parent}'")]
    InvalidChild {
        parent: String,
        parent_kind: &'static str,
        child: String,
        child_kind: &'static str,
    },

    /// The container already belongs to another parent.
    #[error("container '{child}' is already attached to '{parent}'")]
    AlreadyAttached { child: String, parent: String },

    /// A URL pattern that can never match a request path.
    #[error("invalid URL pattern '{0}'")]
    InvalidPattern(String),

    /// A filter mapping names a filter the context does not define.
    #[error("filter '{filter}' is not defined in '{context}'")]
    UnknownFilter { context: String, filter: String },

    /// A filter could not be created or rejected its configuration.
    #[error("filter '{filter}' failed to initialize: {source}")]
    FilterInit {
        filter: String,
        #[source]
        source: HandlerError,
    },

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    /// `add_valve` or `invoke` before a basic valve was installed.
    #[error("pipeline of '{0}' has no basic valve")]
    NoBasicValve(String),

    /// A basic valve tried to forward past the end of the chain.
    #[error("basic valve '{0}' attempted to forward past the end of the pipeline")]
    BasicValveForward(String),

    /// A valve failed outside of the handler-error path.
    #[error("valve '{valve}' failed: {reason}")]
    Valve { valve: String, reason: String },

    // =========================================================================
    // Registry Errors
    // =========================================================================
    /// No factory registered under the requested identifier.
    #[error("no {kind} factory registered as '{id}'")]
    UnknownFactory { kind: &'static str, id: String },

    /// A factory rejected its parameters.
    #[error("invalid parameter '{param}' for '{id}': {reason}")]
    InvalidParameter {
        id: String,
        param: String,
        reason: String,
    },

    // =========================================================================
    // Handler Errors
    // =========================================================================
    /// A handler or filter failure that escaped to a valve.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl Error {
    /// Returns true for errors caused by misconfiguration rather than traffic.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::AlreadyRunning { .. }
                | Error::NotRunning { .. }
                | Error::DuplicateChild { .. }
                | Error::InvalidChild { .. }
                | Error::AlreadyAttached { .. }
                | Error::InvalidPattern(_)
                | Error::UnknownFilter { .. }
                | Error::NoBasicValve(_)
                | Error::BasicValveForward(_)
                | Error::UnknownFactory { .. }
                | Error::InvalidParameter { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::AlreadyRunning {
            component: "Engine[main]".into(),
        };
        assert_eq!(err.to_string(), "Engine[main] is already running");

        let err = Error::NotRunning {
            component: "Host[a]".into(),
        };
        assert_eq!(err.to_string(), "Host[a] is not running");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_handler_error_is_not_configuration() {
        let err: Error = HandlerError::failed("boom").into();
        assert!(!err.is_configuration());
        assert_eq!(err.to_string(), "handler failed: boom");
    }
}
