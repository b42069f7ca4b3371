//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (host, decoded path)
//!     → mapper.rs (EngineMapper: host name → Host)
//!     → mapper.rs (HostMapper: path → Context)
//!     → mapper.rs (ContextMapper: relative path → Wrapper)
//!         uses matcher.rs (host names, context prefixes)
//!         and pattern.rs (handler/filter URL patterns)
//! ```
//!
//! # Design Decisions
//! - No regex in hot path (prefix, suffix and hash lookups only)
//! - Deterministic: same input and same tables always map the same way
//! - Mapping tables are snapshots; a mapping change never tears a lookup

pub mod mapper;
pub mod matcher;
pub mod pattern;

pub use mapper::{ContextMapper, EngineMapper, HandlerMappings, HostMapper, Mapper};
pub use pattern::{matches_url_pattern, validate_url_pattern, UrlPattern};
