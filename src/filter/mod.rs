//! Secondary filter chains around leaf handlers.
//!
//! # Data Flow
//! ```text
//! Context start:
//!     FilterDef → factory → Filter::init(FilterConfig) → started instance
//!
//! Per request (wrapper valve):
//!     factory.rs (FilterMapping[] in order × request path/handler/dispatcher)
//!     → chain.rs (FilterChain: filter → filter → ... → handler)
//!     → released when the wrapper valve returns
//! ```
//!
//! # Design Decisions
//! - Chains are per request and never stored on a container
//! - Mappings match by URL pattern or by handler name, never both required

pub mod chain;
pub mod def;
pub mod factory;

pub use chain::FilterChain;
pub use def::{filter_factory, Filter, FilterConfig, FilterDef, FilterFactory, FilterMapping, MATCH_ALL};
pub use factory::create_filter_chain;
