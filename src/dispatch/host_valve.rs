//! Host basic valve: selects the context.

use std::sync::Weak;

use crate::container::Container;
use crate::error::Result;
use crate::http::{Request, Response};
use crate::pipeline::{Next, Valve};

pub struct HostValve {
    host: Weak<Container>,
}

impl HostValve {
    pub fn new(host: Weak<Container>) -> Self {
        Self { host }
    }
}

impl Valve for HostValve {
    fn name(&self) -> &str {
        "HostValve"
    }

    fn invoke(&self, request: &mut Request, response: &mut Response, _next: Next<'_>) -> Result<()> {
        let host = super::owner(&self.host, self.name())?;
        super::forward_to_child(&host, request, response)
    }
}
