//! Assembles the filter chain for one request.
//!
//! Every mapping of the context is considered in configuration order. A
//! mapping selects its filter when the dispatcher type applies and either a
//! URL pattern matches the context-relative path or a handler name matches
//! the target handler. A filter selected by several mappings runs once.

use std::sync::Arc;

use crate::container::Context;
use crate::handler::Handler;
use crate::http::Request;

use super::chain::FilterChain;

/// Path used for URL-pattern matching: servlet path plus path info when the
/// request is mapped, otherwise the decoded path relative to the context.
fn request_path(context: &Context<'_>, request: &Request) -> Option<String> {
    if let Some(servlet_path) = request.servlet_path() {
        let mut path = servlet_path.to_string();
        if let Some(info) = request.path_info() {
            path.push_str(info);
        }
        return Some(path);
    }
    context.relative_path(request.decoded_path()).map(str::to_string)
}

/// Build the chain wrapping `handler` for this request.
///
/// The context's configuration is only read; nothing on the wrapper is mutated.
pub fn create_filter_chain(
    context: &Context<'_>,
    request: &Request,
    handler_name: Option<&str>,
    handler: Arc<dyn Handler>,
) -> FilterChain {
    let mut chain = FilterChain::new(handler);

    let mappings = context.filter_mappings();
    if mappings.is_empty() {
        return chain;
    }

    let path = request_path(context, request);
    let dispatcher = request.dispatcher();
    for mapping in mappings.iter() {
        if !mapping.applies_to(dispatcher) {
            continue;
        }
        if !mapping.matches_path(path.as_deref()) && !mapping.matches_handler(handler_name) {
            continue;
        }
        match context.filter(mapping.filter_name()) {
            Some(filter) => {
                chain.add_filter(mapping.filter_name(), filter);
            }
            None => {
                tracing::warn!(context = %context.container().label(), filter = %mapping.filter_name(), "Mapped filter has no started instance");
            }
        }
    }

    tracing::trace!(request_id = %request.id(), filters = ?chain.filter_names(), "Filter chain assembled");
    chain
}
