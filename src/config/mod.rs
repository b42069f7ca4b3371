//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DispatchConfig (validated, immutable)
//!     → passed by reference to every container constructor
//! ```
//!
//! # Design Decisions
//! - Dispatch tunables are read at construction time and never looked up globally
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{ContainerConfig, ContextConfig, DispatchConfig, LogFormat, ObservabilityConfig, WrapperConfig};
pub use validation::{validate_config, ValidationError};
