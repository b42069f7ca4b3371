//! Outbound response entity.
//!
//! # Responsibilities
//! - Record status, error flag and message set by valves and handlers
//! - Carry headers (e.g. `Retry-After` for temporary unavailability)
//! - Accumulate a text body written by handlers
//!
//! # Design Decisions
//! - `send_error` marks the response as errored; later routing misses
//!   keep the first error instead of overwriting it

use std::time::Duration;

/// Status codes used by the dispatch core.
pub mod status {
    pub const OK: u16 = 200;
    pub const BAD_REQUEST: u16 = 400;
    pub const FORBIDDEN: u16 = 403;
    pub const NOT_FOUND: u16 = 404;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

pub const RETRY_AFTER: &str = "retry-after";

/// A response being assembled during dispatch.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    error: bool,
    message: Option<String>,
    headers: Vec<(String, String)>,
    body: String,
    retry_after: Option<Duration>,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            status: status::OK,
            error: false,
            message: None,
            headers: Vec::new(),
            body: String::new(),
            retry_after: None,
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// True once an error status has been sent.
    pub fn is_error(&self) -> bool {
        self.error
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Flag the response as an error with the given status and message.
    pub fn send_error(&mut self, status: u16, message: impl Into<String>) {
        self.status = status;
        self.error = true;
        self.message = Some(message.into());
    }

    /// Send 503 with the remaining unavailability as retry information.
    pub fn send_unavailable(&mut self, retry_after: Duration, message: impl Into<String>) {
        // Retry-After is expressed in whole seconds, rounded up.
        let secs = retry_after.as_millis().div_ceil(1000);
        self.set_header(RETRY_AFTER, secs.to_string());
        self.retry_after = Some(retry_after);
        self.send_error(status::SERVICE_UNAVAILABLE, message);
    }

    pub fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }

    /// Replace (or add) a header, names compared case-insensitively.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .headers
            .iter_mut()
            .find(|(n, _)| n.eq_ignore_ascii_case(&name))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn write(&mut self, text: &str) {
        self.body.push_str(text);
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Reset to a fresh 200 response, keeping nothing.
    pub fn reset(&mut self) {
        *self = Response::new();
    }
}
