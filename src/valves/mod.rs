//! Built-in valves that can be inserted into any pipeline.
//!
//! # Design Decisions
//! - Each valve can be built directly or from string parameters, so the
//!   registry can create it from configuration
//! - Unknown parameters are rejected instead of silently ignored

pub mod access_log;
pub mod remote_addr;

pub use access_log::AccessLogValve;
pub use remote_addr::RemoteAddrValve;

use crate::error::{Error, Result};
use crate::registry::Params;

/// Fail on any parameter not in `known`.
fn reject_unknown(id: &str, params: &Params, known: &[&str]) -> Result<()> {
    match params.keys().find(|k| !known.contains(&k.as_str())) {
        Some(param) => Err(Error::InvalidParameter {
            id: id.to_string(),
            param: param.clone(),
            reason: format!("unknown parameter, expected one of: {}", known.join(", ")),
        }),
        None => Ok(()),
    }
}
