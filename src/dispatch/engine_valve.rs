//! Engine basic valve: selects the virtual host.

use std::sync::{Arc, Weak};

use crate::container::Container;
use crate::error::Result;
use crate::http::{Request, Response};
use crate::pipeline::{Next, Valve};

pub struct EngineValve {
    engine: Weak<Container>,
}

impl EngineValve {
    pub fn new(engine: Weak<Container>) -> Self {
        Self { engine }
    }
}

impl Valve for EngineValve {
    fn name(&self) -> &str {
        "EngineValve"
    }

    fn invoke(&self, request: &mut Request, response: &mut Response, _next: Next<'_>) -> Result<()> {
        let engine: Arc<Container> = super::owner(&self.engine, self.name())?;
        let result = super::forward_to_child(&engine, request, response);
        engine.metrics().record_request(response.status());
        result
    }
}
