//! Wrapper basic valve: runs the filter chain and the handler.
//!
//! # Responsibilities
//! - Refuse requests while the context is paused (503)
//! - Refuse requests while the handler is unavailable (503 with
//!   `Retry-After`, or 404 when permanent)
//! - Allocate the handler, build the filter chain, execute it
//! - Translate handler failures and panics into 500
//!
//! # Design Decisions
//! - Handler errors never escape this valve
//! - Cleanup is tied to scope: the chain is released first, then the
//!   allocation is returned, then a permanently unavailable handler is unloaded

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::container::{Availability, Container, Wrapper};
use crate::error::{Error, Result};
use crate::filter::{create_filter_chain, FilterChain};
use crate::handler::{Handler, HandlerError};
use crate::http::{status, Request, Response};
use crate::observability::DispatchMetrics;
use crate::pipeline::{Next, Valve};

pub struct WrapperValve {
    wrapper: Weak<Container>,
}

impl WrapperValve {
    pub fn new(wrapper: Weak<Container>) -> Self {
        Self { wrapper }
    }
}

/// Returns the handler to its wrapper when dropped.
struct Allocation<'a> {
    wrapper: Wrapper<'a>,
    handler: Arc<dyn Handler>,
}

impl Drop for Allocation<'_> {
    fn drop(&mut self) {
        self.wrapper.deallocate(&self.handler);
        if self.wrapper.is_permanently_unavailable() {
            self.wrapper.unload();
        }
    }
}

fn respond_unavailable(wrapper: &Wrapper<'_>, availability: Availability, metrics: DispatchMetrics, response: &mut Response) {
    match availability {
        Availability::Permanent => {
            metrics.record_handler_unavailable("permanent");
            response.send_error(
                status::NOT_FOUND,
                format!("Handler '{}' is not available", wrapper.name()),
            );
        }
        Availability::UnavailableFor(remaining) => {
            metrics.record_handler_unavailable("temporary");
            response.send_unavailable(
                remaining,
                format!("Handler '{}' is currently unavailable", wrapper.name()),
            );
        }
        // The deadline lapsed between marking and querying.
        Availability::Available => {
            metrics.record_handler_unavailable("temporary");
            response.send_error(
                status::SERVICE_UNAVAILABLE,
                format!("Handler '{}' is currently unavailable", wrapper.name()),
            );
        }
    }
}

impl Valve for WrapperValve {
    fn name(&self) -> &str {
        "WrapperValve"
    }

    fn invoke(&self, request: &mut Request, response: &mut Response, _next: Next<'_>) -> Result<()> {
        let container = super::owner(&self.wrapper, self.name())?;
        let wrapper = container.as_wrapper().ok_or_else(|| Error::Valve {
            valve: self.name().to_string(),
            reason: format!("{} is not a wrapper", container.label()),
        })?;
        let parent = container.parent();
        let context = parent.as_deref().and_then(Container::as_context);

        if context.as_ref().is_some_and(|ctx| !ctx.is_available()) {
            tracing::debug!(wrapper = %container.label(), request_id = %request.id(), "Context is paused");
            container.metrics().record_handler_unavailable("context");
            response.send_error(status::SERVICE_UNAVAILABLE, "Application is currently unavailable");
            return Ok(());
        }

        let availability = wrapper.availability();
        if availability != Availability::Available {
            respond_unavailable(&wrapper, availability, container.metrics(), response);
            return Ok(());
        }

        let handler = match wrapper.allocate() {
            Ok(handler) => handler,
            Err(HandlerError::Unavailable(unavailability)) => {
                wrapper.mark_unavailable(unavailability);
                respond_unavailable(&wrapper, wrapper.availability(), container.metrics(), response);
                return Ok(());
            }
            Err(e) => {
                tracing::error!(wrapper = %container.label(), request_id = %request.id(), error = %e, "Handler allocation failed");
                response.send_error(status::INTERNAL_SERVER_ERROR, "Handler could not be allocated");
                return Ok(());
            }
        };
        let _allocation = Allocation {
            wrapper,
            handler: handler.clone(),
        };

        let mut chain = match &context {
            Some(ctx) => create_filter_chain(ctx, request, Some(wrapper.name()), handler),
            None => FilterChain::new(handler),
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| chain.do_filter(request, response)));
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(HandlerError::Unavailable(unavailability))) => {
                wrapper.mark_unavailable(unavailability);
                respond_unavailable(&wrapper, wrapper.availability(), container.metrics(), response);
            }
            Ok(Err(e)) => {
                tracing::error!(wrapper = %container.label(), request_id = %request.id(), error = %e, "Handler failed");
                response.send_error(status::INTERNAL_SERVER_ERROR, "Internal server error");
            }
            Err(_) => {
                tracing::error!(wrapper = %container.label(), request_id = %request.id(), "Handler panicked");
                response.send_error(status::INTERNAL_SERVER_ERROR, "Internal server error");
            }
        }
        Ok(())
    }
}
