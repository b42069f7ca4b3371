//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use valve_dispatch::config::DispatchConfig;
use valve_dispatch::filter::{filter_factory, Filter, FilterChain, FilterConfig, FilterDef};
use valve_dispatch::handler::{handler_factory, FnHandler, Handler, HandlerError, HandlerFactory};
use valve_dispatch::pipeline::{Next, Valve};
use valve_dispatch::{Container, Request, Response, Result};

/// Shared, ordered log of what ran.
#[derive(Clone, Default)]
pub struct Trace(Arc<Mutex<Vec<String>>>);

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Non-basic valve that records its name and forwards.
pub struct TraceValve {
    name: String,
    trace: Trace,
}

impl TraceValve {
    pub fn new(name: &str, trace: &Trace) -> Arc<dyn Valve> {
        Arc::new(Self {
            name: name.to_string(),
            trace: trace.clone(),
        })
    }
}

impl Valve for TraceValve {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, request: &mut Request, response: &mut Response, next: Next<'_>) -> Result<()> {
        self.trace.push(self.name.clone());
        next.invoke(request, response)
    }
}

/// Filter that records its name and the `tag` init parameter.
pub struct TraceFilter {
    name: String,
    tag: Mutex<Option<String>>,
    trace: Trace,
}

impl Filter for TraceFilter {
    fn init(&self, config: &FilterConfig) -> std::result::Result<(), HandlerError> {
        *self.tag.lock().unwrap() = config.init_parameter("tag").map(str::to_string);
        Ok(())
    }

    fn do_filter(
        &self,
        request: &mut Request,
        response: &mut Response,
        chain: &mut FilterChain,
    ) -> std::result::Result<(), HandlerError> {
        match self.tag.lock().unwrap().as_deref() {
            Some(tag) => self.trace.push(format!("{}:{}", self.name, tag)),
            None => self.trace.push(self.name.clone()),
        }
        chain.do_filter(request, response)
    }
}

pub fn trace_filter(name: &str, trace: &Trace) -> FilterDef {
    let filter_name = name.to_string();
    let trace = trace.clone();
    FilterDef::new(
        name,
        filter_factory(move || {
            Ok(Arc::new(TraceFilter {
                name: filter_name.clone(),
                tag: Mutex::new(None),
                trace: trace.clone(),
            }) as Arc<dyn Filter>)
        }),
    )
}

/// Handler that writes `body` and records its own name.
pub fn echo(body: &'static str, trace: &Trace) -> HandlerFactory {
    let trace = trace.clone();
    handler_factory(move || {
        let trace = trace.clone();
        Ok(Arc::new(FnHandler::new(move |_: &mut Request, response: &mut Response| {
            trace.push(body);
            response.write(body);
            Ok(())
        })) as Arc<dyn Handler>)
    })
}

/// Handler built from a closure, shared by every load.
pub fn handler_fn<F>(f: F) -> HandlerFactory
where
    F: Fn(&mut Request, &mut Response) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
{
    let f = Arc::new(f);
    handler_factory(move || {
        let f = f.clone();
        Ok(Arc::new(FnHandler::new(move |req: &mut Request, resp: &mut Response| f(req, resp))) as Arc<dyn Handler>)
    })
}

/// Counts how many handler instances a factory created.
pub fn counting(counter: &Arc<AtomicUsize>, factory: HandlerFactory) -> HandlerFactory {
    let counter = counter.clone();
    handler_factory(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        factory()
    })
}

/// engine "main" → host "localhost" (default) → context "/app".
pub struct Tree {
    pub config: DispatchConfig,
    pub engine: Arc<Container>,
    pub host: Arc<Container>,
    pub app: Arc<Container>,
}

impl Tree {
    pub fn new() -> Self {
        Self::with_config(DispatchConfig::default())
    }

    pub fn with_config(config: DispatchConfig) -> Self {
        let engine = Container::engine("main", &config);
        let host = Container::host("localhost", &config);
        let app = Container::context("/app", &config);
        engine.add_child(host.clone()).unwrap();
        engine.as_engine().unwrap().set_default_host("localhost");
        host.add_child(app.clone()).unwrap();
        Self {
            config,
            engine,
            host,
            app,
        }
    }

    /// Add a wrapper to `context` and map `pattern` to it.
    pub fn handler(&self, context: &Arc<Container>, name: &str, pattern: &str, factory: HandlerFactory) -> Arc<Container> {
        let wrapper = Container::wrapper(name, factory, &self.config);
        context.add_child(wrapper.clone()).unwrap();
        context
            .as_context()
            .unwrap()
            .add_handler_mapping(pattern, name)
            .unwrap();
        wrapper
    }

    pub fn get(&self, host: &str, path: &str) -> (Request, Response) {
        let mut request = Request::new(path).with_host(host);
        let mut response = Response::new();
        self.engine.invoke(&mut request, &mut response).unwrap();
        (request, response)
    }
}
