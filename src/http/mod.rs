//! Request/response entities handled by the dispatch core.
//!
//! # Data Flow
//! ```text
//! transport layer (external)
//!     → request.rs (pre-parsed request + request ID)
//!     → Engine.invoke(request, response)
//!     → mappers write bindings onto the request
//!     → valves / handlers write status, headers, body onto response.rs
//!     → back to the transport layer
//! ```

pub mod request;
pub mod response;

pub use request::{DispatcherType, Request, RequestId, X_REQUEST_ID};
pub use response::{status, Response, RETRY_AFTER};
