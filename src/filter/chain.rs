//! Per-request filter chain.
//!
//! Built fresh for every request by the wrapper valve and dropped when the
//! request leaves it. Each `do_filter` call advances one position; past the
//! last filter the handler is serviced.

use std::fmt;
use std::sync::Arc;

use crate::handler::{Handler, HandlerError};
use crate::http::{Request, Response};

use super::def::Filter;

pub struct FilterChain {
    filters: Vec<(String, Arc<dyn Filter>)>,
    pos: usize,
    handler: Option<Arc<dyn Handler>>,
}

impl FilterChain {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            filters: Vec::new(),
            pos: 0,
            handler: Some(handler),
        }
    }

    /// Append a filter unless one with the same name is already in the chain.
    pub(crate) fn add_filter(&mut self, name: &str, filter: Arc<dyn Filter>) -> bool {
        if self.filters.iter().any(|(n, _)| n == name) {
            return false;
        }
        self.filters.push((name.to_string(), filter));
        true
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Invoke the next filter, or the handler once every filter has run.
    pub fn do_filter(&mut self, request: &mut Request, response: &mut Response) -> Result<(), HandlerError> {
        if let Some((_, filter)) = self.filters.get(self.pos) {
            let filter = filter.clone();
            self.pos += 1;
            return filter.do_filter(request, response, self);
        }
        match &self.handler {
            Some(handler) => handler.service(request, response),
            None => Ok(()),
        }
    }

    /// Drop every filter and handler reference.
    pub fn release(&mut self) {
        self.filters.clear();
        self.pos = 0;
        self.handler = None;
    }
}

impl Drop for FilterChain {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterChain")
            .field("filters", &self.filter_names())
            .field("pos", &self.pos)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::FnHandler;
    use std::sync::Mutex;

    struct Tag(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl Filter for Tag {
        fn do_filter(&self, req: &mut Request, resp: &mut Response, chain: &mut FilterChain) -> Result<(), HandlerError> {
            self.1.lock().unwrap().push(self.0);
            chain.do_filter(req, resp)
        }
    }

    #[test]
    fn test_filters_run_in_order_then_handler() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let sink = trace.clone();
        let handler = Arc::new(FnHandler::new(move |_, resp: &mut Response| {
            sink.lock().unwrap().push("handler");
            resp.write("done");
            Ok(())
        }));

        let mut chain = FilterChain::new(handler);
        assert!(chain.add_filter("a", Arc::new(Tag("a", trace.clone()))));
        assert!(chain.add_filter("b", Arc::new(Tag("b", trace.clone()))));
        assert!(!chain.add_filter("a", Arc::new(Tag("a2", trace.clone()))));

        let mut resp = Response::new();
        chain.do_filter(&mut Request::new("/"), &mut resp).unwrap();
        assert_eq!(*trace.lock().unwrap(), vec!["a", "b", "handler"]);
        assert_eq!(resp.body(), "done");
    }

    #[test]
    fn test_short_circuit() {
        struct Deny;
        impl Filter for Deny {
            fn do_filter(&self, _: &mut Request, resp: &mut Response, _: &mut FilterChain) -> Result<(), HandlerError> {
                resp.send_error(crate::http::status::FORBIDDEN, "denied");
                Ok(())
            }
        }

        let called = Arc::new(Mutex::new(false));
        let flag = called.clone();
        let handler = Arc::new(FnHandler::new(move |_, _| {
            *flag.lock().unwrap() = true;
            Ok(())
        }));
        let mut chain = FilterChain::new(handler);
        chain.add_filter("deny", Arc::new(Deny));

        let mut resp = Response::new();
        chain.do_filter(&mut Request::new("/"), &mut resp).unwrap();
        assert_eq!(resp.status(), 403);
        assert!(!*called.lock().unwrap());
    }
}
