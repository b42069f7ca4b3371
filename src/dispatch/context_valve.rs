//! Context basic valve: refuses forbidden paths, then selects the wrapper.

use std::sync::Weak;

use crate::container::Container;
use crate::error::Result;
use crate::http::{status, Request, Response};
use crate::pipeline::{Next, Valve};

pub struct ContextValve {
    context: Weak<Container>,
}

impl ContextValve {
    pub fn new(context: Weak<Container>) -> Self {
        Self { context }
    }
}

impl Valve for ContextValve {
    fn name(&self) -> &str {
        "ContextValve"
    }

    fn invoke(&self, request: &mut Request, response: &mut Response, _next: Next<'_>) -> Result<()> {
        let container = super::owner(&self.context, self.name())?;

        if let Some(context) = container.as_context() {
            let forbidden = context
                .relative_path(request.decoded_path())
                .is_some_and(|relative| context.is_forbidden(relative));
            if forbidden {
                tracing::debug!(context = %container.label(), request_id = %request.id(), path = %request.decoded_path(), "Forbidden path requested");
                response.send_error(status::NOT_FOUND, "Not found");
                return Ok(());
            }
        }

        super::forward_to_child(&container, request, response)
    }
}
