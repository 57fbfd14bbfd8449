//! Dispatcher and worker pool behaviour with hand-written handlers.
//!
//! # Key Test Cases
//!
//! - a panicking handler answers 500 and its pool keeps serving
//! - middleware can answer before the handler runs
//! - a handler that drops its reply channel yields 503
//! - requests are spread across a pool's workers

mod common;

use common::test_server::setup_may_runtime;
use lookup_proxy::dispatcher::{
    Dispatcher, HandlerRequest, HandlerResponse, HeaderVec, ParamVec,
};
use lookup_proxy::ids::RequestId;
use lookup_proxy::middleware::{Middleware, TracingMiddleware};
use lookup_proxy::router::{RouteMeta, RouteMatch};
use lookup_proxy::worker_pool::WorkerPoolConfig;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn route(handler: &str) -> RouteMatch {
    RouteMatch {
        route: Arc::new(RouteMeta::get("/test", handler)),
        handler_name: handler.to_string(),
    }
}

fn params(pairs: &[(&str, &str)]) -> ParamVec {
    pairs
        .iter()
        .map(|(k, v)| (Arc::from(*k), v.to_string()))
        .collect()
}

fn echo_or_panic(req: HandlerRequest) {
    if req.get_query_param("panic").is_some() {
        panic!("handler asked to panic");
    }
    let name = req.get_query_param("name").unwrap_or("none").to_string();
    let _ = req.reply_tx.send(HandlerResponse::json(200, json!({ "name": name })));
}

fn dispatcher_with(name: &str, workers: usize, handler: fn(HandlerRequest)) -> Dispatcher {
    setup_may_runtime();
    let mut dispatcher = Dispatcher::new();
    dispatcher.add_middleware(Arc::new(TracingMiddleware));
    unsafe {
        dispatcher.register_handler(name, WorkerPoolConfig::new(workers, 0x10000), handler);
    }
    dispatcher
}

#[test]
fn test_panic_returns_500_and_pool_keeps_serving() {
    let dispatcher = dispatcher_with("echo", 1, echo_or_panic);

    let resp = dispatcher
        .dispatch(route("echo"), params(&[("panic", "1")]), HeaderVec::new(), RequestId::new())
        .unwrap();
    assert_eq!(resp.status, 500);
    assert_eq!(resp.body, json!({"error": "Internal Server Error"}));

    // Same single worker, next request.
    let resp = dispatcher
        .dispatch(route("echo"), params(&[("name", "pikachu")]), HeaderVec::new(), RequestId::new())
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!({"name": "pikachu"}));
}

#[test]
fn test_unknown_handler_is_none() {
    let dispatcher = dispatcher_with("echo", 1, echo_or_panic);
    assert!(dispatcher
        .dispatch(route("missing"), ParamVec::new(), HeaderVec::new(), RequestId::new())
        .is_none());
}

#[test]
fn test_dropped_reply_is_service_unavailable() {
    fn silent(_req: HandlerRequest) {}
    let dispatcher = dispatcher_with("silent", 1, silent);
    let resp = dispatcher
        .dispatch(route("silent"), ParamVec::new(), HeaderVec::new(), RequestId::new())
        .unwrap();
    assert_eq!(resp.status, 503);
}

struct Gate {
    after_calls: AtomicUsize,
}

impl Middleware for Gate {
    fn before(&self, req: &HandlerRequest) -> Option<HandlerResponse> {
        req.get_header("x-block")
            .map(|_| HandlerResponse::error(503, "Service Unavailable"))
    }

    fn after(&self, _req: &HandlerRequest, res: &mut HandlerResponse, _latency: Duration) {
        self.after_calls.fetch_add(1, Ordering::SeqCst);
        res.push_header("X-Gate: seen");
    }
}

#[test]
fn test_middleware_early_response_skips_handler() {
    let mut dispatcher = dispatcher_with("echo", 1, echo_or_panic);
    let gate = Arc::new(Gate {
        after_calls: AtomicUsize::new(0),
    });
    dispatcher.add_middleware(Arc::clone(&gate) as Arc<dyn Middleware>);

    let headers: HeaderVec = [(Arc::from("x-block"), "1".to_string())].into_iter().collect();
    // Would panic if it reached the handler.
    let resp = dispatcher
        .dispatch(route("echo"), params(&[("panic", "1")]), headers, RequestId::new())
        .unwrap();
    assert_eq!(resp.status, 503);
    assert_eq!(resp.get_header("x-gate"), Some("seen"));

    let resp = dispatcher
        .dispatch(route("echo"), params(&[("name", "eevee")]), HeaderVec::new(), RequestId::new())
        .unwrap();
    assert_eq!(resp.status, 200);
    assert_eq!(gate.after_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_pool_serves_concurrent_requests() {
    let dispatcher = Arc::new(dispatcher_with("echo", 4, echo_or_panic));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            std::thread::spawn(move || {
                let name = format!("p{i}");
                dispatcher
                    .dispatch(route("echo"), params(&[("name", &name)]), HeaderVec::new(), RequestId::new())
                    .map(|r| (r.status, r.body))
            })
        })
        .collect();
    for (i, handle) in handles.into_iter().enumerate() {
        let (status, body) = handle.join().unwrap().unwrap();
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "name": format!("p{i}") }));
    }
}
