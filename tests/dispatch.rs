//! End-to-end dispatch through the container tree.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use valve_dispatch::filter::FilterMapping;
use valve_dispatch::handler::HandlerError;
use valve_dispatch::http::status;
use valve_dispatch::registry::Params;
use valve_dispatch::{Container, DispatcherType, Registry, Request, Response};

mod common;

use common::{echo, handler_fn, trace_filter, Trace, TraceValve, Tree};

#[test]
fn test_request_reaches_handler_with_bindings() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "hello", "/hello", echo("hello", &trace));
    tree.engine.start().unwrap();

    let (request, response) = tree.get("localhost", "/app/hello");
    assert_eq!(response.status(), status::OK);
    assert_eq!(response.body(), "hello");
    assert_eq!(request.bound_host().map(|h| h.name()), Some("localhost"));
    assert_eq!(request.context_path(), Some("/app"));
    assert_eq!(request.wrapper().map(|w| w.name()), Some("hello"));
    assert_eq!(request.servlet_path(), Some("/hello"));
    assert_eq!(request.path_info(), None);

    tree.engine.stop().unwrap();
}

#[test]
fn test_pipeline_order_across_levels() {
    let trace = Trace::new();
    let tree = Tree::new();
    let wrapper = tree.handler(&tree.app, "hello", "/hello", echo("handler", &trace));

    tree.engine.add_valve(TraceValve::new("engine-a", &trace)).unwrap();
    tree.engine.add_valve(TraceValve::new("engine-b", &trace)).unwrap();
    tree.host.add_valve(TraceValve::new("host", &trace)).unwrap();
    tree.app.add_valve(TraceValve::new("context", &trace)).unwrap();
    wrapper.add_valve(TraceValve::new("wrapper", &trace)).unwrap();
    tree.engine.start().unwrap();

    tree.get("localhost", "/app/hello");
    assert_eq!(
        trace.entries(),
        vec!["engine-a", "engine-b", "host", "context", "wrapper", "handler"]
    );

    tree.engine.stop().unwrap();
}

#[test]
fn test_host_selection() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "local", "/", echo("local", &trace));

    let wildcard = Container::host("*.example.com", &tree.config);
    let exact = Container::host("www.example.com", &tree.config);
    tree.engine.add_child(wildcard.clone()).unwrap();
    tree.engine.add_child(exact.clone()).unwrap();
    exact.as_host().unwrap().add_alias("example.com");

    for (host, body) in [(&wildcard, "wildcard"), (&exact, "exact")] {
        let root = Container::context("/", &tree.config);
        host.add_child(root.clone()).unwrap();
        tree.handler(&root, body, "/", echo(body, &trace));
    }
    tree.engine.start().unwrap();

    assert_eq!(tree.get("WWW.Example.com", "/").1.body(), "exact");
    assert_eq!(tree.get("example.com", "/").1.body(), "exact");
    assert_eq!(tree.get("api.example.com", "/").1.body(), "wildcard");
    assert_eq!(tree.get("unknown.test", "/app/x").1.body(), "local");

    tree.engine.as_engine().unwrap().clear_default_host();
    let (_, response) = tree.get("unknown.test", "/app/x");
    assert_eq!(response.status(), status::NOT_FOUND);

    tree.engine.stop().unwrap();
}

#[test]
fn test_longest_context_wins() {
    let trace = Trace::new();
    let tree = Tree::new();
    let root = Container::context("", &tree.config);
    let nested = Container::context("/app/admin", &tree.config);
    tree.host.add_child(root.clone()).unwrap();
    tree.host.add_child(nested.clone()).unwrap();
    tree.handler(&root, "root", "/", echo("root", &trace));
    tree.handler(&tree.app, "app", "/", echo("app", &trace));
    tree.handler(&nested, "admin", "/", echo("admin", &trace));
    tree.engine.start().unwrap();

    assert_eq!(tree.get("localhost", "/app/admin/users").1.body(), "admin");
    assert_eq!(tree.get("localhost", "/app/administrator").1.body(), "app");
    assert_eq!(tree.get("localhost", "/app").1.body(), "app");
    assert_eq!(tree.get("localhost", "/other").1.body(), "root");

    tree.engine.stop().unwrap();
}

#[test]
fn test_handler_mapping_precedence() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "exact", "/a/b", echo("exact", &trace));
    tree.handler(&tree.app, "prefix", "/a/*", echo("prefix", &trace));
    tree.handler(&tree.app, "extension", "*.jsp", echo("extension", &trace));
    tree.handler(&tree.app, "default", "/", echo("default", &trace));
    tree.engine.start().unwrap();

    assert_eq!(tree.get("localhost", "/app/a/b").1.body(), "exact");
    assert_eq!(tree.get("localhost", "/app/a/b.jsp").1.body(), "prefix");
    assert_eq!(tree.get("localhost", "/app/x/page.jsp").1.body(), "extension");
    assert_eq!(tree.get("localhost", "/app/x/page").1.body(), "default");

    let (request, _) = tree.get("localhost", "/app/a/c/d");
    assert_eq!(request.servlet_path(), Some("/a"));
    assert_eq!(request.path_info(), Some("/c/d"));

    let (request, _) = tree.get("localhost", "/app/a");
    assert_eq!(request.servlet_path(), Some("/a"));
    assert_eq!(request.path_info(), None);

    tree.engine.stop().unwrap();
}

#[test]
fn test_routing_misses_are_not_found() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "hello", "/hello", echo("hello", &trace));
    tree.engine.start().unwrap();

    let (request, response) = tree.get("localhost", "/elsewhere");
    assert_eq!(response.status(), status::NOT_FOUND);
    assert!(request.context().is_none());

    let (request, response) = tree.get("localhost", "/app/missing");
    assert_eq!(response.status(), status::NOT_FOUND);
    assert_eq!(request.context_path(), Some("/app"));
    assert!(request.wrapper().is_none());
    assert!(trace.entries().is_empty());

    tree.engine.stop().unwrap();
}

#[test]
fn test_forbidden_paths_never_reach_handlers() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "default", "/", echo("default", &trace));
    tree.engine.start().unwrap();

    for path in ["/app/WEB-INF/web.xml", "/app/meta-inf/MANIFEST.MF", "/app/WEB-INF"] {
        let (_, response) = tree.get("localhost", path);
        assert_eq!(response.status(), status::NOT_FOUND, "{path}");
    }
    assert!(trace.entries().is_empty());

    assert_eq!(tree.get("localhost", "/app/WEB-INFO").1.body(), "default");

    tree.engine.stop().unwrap();
}

#[test]
fn test_paused_context_is_unavailable() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "hello", "/hello", echo("hello", &trace));
    tree.engine.start().unwrap();

    tree.app.as_context().unwrap().set_available(false);
    let (_, response) = tree.get("localhost", "/app/hello");
    assert_eq!(response.status(), status::SERVICE_UNAVAILABLE);
    assert!(trace.entries().is_empty());

    tree.app.as_context().unwrap().set_available(true);
    assert_eq!(tree.get("localhost", "/app/hello").1.body(), "hello");

    tree.engine.stop().unwrap();
}

#[test]
fn test_handler_failures_become_server_errors() {
    let tree = Tree::new();
    let failing = tree.handler(
        &tree.app,
        "failing",
        "/fail",
        handler_fn(|_: &mut Request, _: &mut Response| Err(HandlerError::failed("database down"))),
    );
    let panicking = tree.handler(
        &tree.app,
        "panicking",
        "/panic",
        handler_fn(|_: &mut Request, _: &mut Response| panic!("handler bug")),
    );
    tree.engine.start().unwrap();

    for path in ["/app/fail", "/app/panic", "/app/fail"] {
        let (_, response) = tree.get("localhost", path);
        assert_eq!(response.status(), status::INTERNAL_SERVER_ERROR, "{path}");
    }
    assert_eq!(failing.as_wrapper().unwrap().count_allocated(), 0);
    assert_eq!(panicking.as_wrapper().unwrap().count_allocated(), 0);
    assert!(panicking.as_wrapper().unwrap().is_available());

    tree.engine.stop().unwrap();
}

#[test]
fn test_filters_run_in_mapping_order() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "hello", "/hello", echo("handler", &trace));
    tree.handler(&tree.app, "other", "/other", echo("other", &trace));

    let context = tree.app.as_context().unwrap();
    context
        .add_filter_def(
            trace_filter("auth", &trace)
                .with_param("tag", "first")
                .with_param("tag", "second"),
        )
        .unwrap();
    context.add_filter_def(trace_filter("log", &trace)).unwrap();
    context.add_filter_def(trace_filter("text", &trace)).unwrap();
    context.add_filter_def(trace_filter("forwarded", &trace)).unwrap();

    context.add_filter_mapping(FilterMapping::new("log").url_pattern("/*")).unwrap();
    context.add_filter_mapping(FilterMapping::new("auth").handler_name("hello")).unwrap();
    context.add_filter_mapping(FilterMapping::new("text").url_pattern("*.txt")).unwrap();
    context
        .add_filter_mapping(
            FilterMapping::new("forwarded")
                .url_pattern("/*")
                .dispatcher(DispatcherType::Forward),
        )
        .unwrap();
    context.add_filter_mapping(FilterMapping::new("log").url_pattern("/hello")).unwrap();
    tree.engine.start().unwrap();

    tree.get("localhost", "/app/hello");
    assert_eq!(trace.entries(), vec!["log", "auth:first", "handler"]);

    trace.clear();
    tree.get("localhost", "/app/other");
    assert_eq!(trace.entries(), vec!["log", "other"]);

    tree.engine.stop().unwrap();
}

#[test]
fn test_builtin_valves_in_a_pipeline() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "hello", "/hello", echo("hello", &trace));

    let registry = Registry::with_builtin_valves(&tree.config);
    let mut params = Params::new();
    params.insert("allow".into(), "127.0.0.0/8".into());
    tree.engine
        .add_valve(registry.create_valve("access-log", &Params::new()).unwrap())
        .unwrap();
    tree.host
        .add_valve(registry.create_valve("remote-addr", &params).unwrap())
        .unwrap();
    tree.engine.start().unwrap();

    let local: IpAddr = "127.0.0.1".parse().unwrap();
    let remote: IpAddr = "192.0.2.10".parse().unwrap();
    for (addr, expected) in [(local, status::OK), (remote, status::FORBIDDEN)] {
        let mut request = Request::new("/app/hello").with_host("localhost").with_remote_addr(addr);
        let mut response = Response::new();
        tree.engine.invoke(&mut request, &mut response).unwrap();
        assert_eq!(response.status(), expected);
    }
    assert_eq!(trace.entries(), vec!["hello"]);

    tree.engine.stop().unwrap();
}

#[test]
fn test_concurrent_requests_share_one_instance() {
    let created = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(AtomicUsize::new(0));
    let tree = Tree::new();
    let counter = served.clone();
    let wrapper = tree.handler(
        &tree.app,
        "count",
        "/count",
        common::counting(
            &created,
            handler_fn(move |_: &mut Request, _: &mut Response| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        ),
    );
    tree.engine.start().unwrap();

    std::thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                for _ in 0..25 {
                    let (_, response) = tree.get("localhost", "/app/count");
                    assert_eq!(response.status(), status::OK);
                }
            });
        }
    });

    assert_eq!(served.load(Ordering::SeqCst), 200);
    assert_eq!(created.load(Ordering::SeqCst), 1);
    assert_eq!(wrapper.as_wrapper().unwrap().count_allocated(), 0);

    tree.engine.stop().unwrap();
}

#[test]
fn test_match_all_and_prefix_filters() {
    let trace = Trace::new();
    let tree = Tree::new();
    tree.handler(&tree.app, "api", "/api/*", echo("api", &trace));
    tree.handler(&tree.app, "home", "/", echo("home", &trace));

    let context = tree.app.as_context().unwrap();
    context.add_filter_def(trace_filter("every", &trace)).unwrap();
    context.add_filter_def(trace_filter("api-only", &trace)).unwrap();
    context.add_filter_mapping(FilterMapping::new("every").url_pattern("*")).unwrap();
    context.add_filter_mapping(FilterMapping::new("api-only").url_pattern("/api/*")).unwrap();
    tree.engine.start().unwrap();

    tree.get("localhost", "/app/api/x");
    assert_eq!(trace.entries(), vec!["every", "api-only", "api"]);

    trace.clear();
    tree.get("localhost", "/app/index.html");
    assert_eq!(trace.entries(), vec!["every", "home"]);

    tree.engine.stop().unwrap();
}
