//! Dispatcher core - the hand-off between the service edge and handler pools.

use crate::ids::RequestId;
use crate::router::RouteMatch;
use crate::worker_pool::{WorkerPool, WorkerPoolConfig};
use http::Method;
use may::sync::mpsc;
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::middleware::Middleware;

/// Maximum inline headers before heap allocation
pub const MAX_INLINE_HEADERS: usize = 16;

/// Maximum inline query parameters before heap allocation
pub const MAX_INLINE_PARAMS: usize = 8;

/// Request headers, names lower-cased.
///
/// Header names use `Arc<str>` so repeated names clone in O(1).
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Query parameters in arrival order.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Extra response header lines, each a complete `Name: value` line.
///
/// Lines are `'static` because `may_minihttp` only accepts static header
/// strings; they are built once at start-up.
pub type ResponseHeaders = SmallVec<[&'static str; 8]>;

/// Request data passed to a handler coroutine
#[derive(Debug, Clone)]
pub struct HandlerRequest {
    /// Correlates the handler's log lines with the service edge
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    /// Name of the handler that should process this request
    pub handler_name: String,
    pub query_params: ParamVec,
    pub headers: HeaderVec,
    /// Channel for sending the response back to the dispatcher
    pub reply_tx: mpsc::Sender<HandlerResponse>,
}

impl HandlerRequest {
    /// Get a query parameter by name
    ///
    /// Uses "last write wins" semantics: `?name=a&name=b` yields `b`.
    #[inline]
    #[must_use]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230)
    #[inline]
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Response data sent back from a handler coroutine
///
/// The body is always JSON; `Content-Type` is set by the response writer.
#[derive(Debug, Clone)]
pub struct HandlerResponse {
    pub status: u16,
    pub headers: ResponseHeaders,
    pub body: Value,
}

impl HandlerResponse {
    #[must_use]
    pub fn new(status: u16, headers: ResponseHeaders, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    #[must_use]
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status, ResponseHeaders::new(), body)
    }

    /// `{ "error": message }`
    #[must_use]
    pub fn error(status: u16, message: &str) -> Self {
        Self::json(status, serde_json::json!({ "error": message }))
    }

    /// A response with no body, e.g. a 204 preflight answer.
    #[must_use]
    pub fn empty(status: u16) -> Self {
        Self::json(status, Value::Null)
    }

    /// Append a complete header line such as `"Allow: GET"`.
    pub fn push_header(&mut self, line: &'static str) {
        self.headers.push(line);
    }

    #[must_use]
    pub fn with_header(mut self, line: &'static str) -> Self {
        self.push_header(line);
        self
    }

    /// Value of the first header line named `name` (case-insensitive).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&'static str> {
        self.headers.iter().copied().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
        })
    }
}

/// Routes matched requests to handler worker pools and runs the middleware
/// chain around them.
#[derive(Clone, Default)]
pub struct Dispatcher {
    pub worker_pools: HashMap<String, Arc<WorkerPool>>,
    /// Ordered list of middleware to apply to requests/responses
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Middleware runs in the order it is added.
    pub fn add_middleware(&mut self, mw: Arc<dyn Middleware>) {
        self.middlewares.push(mw);
    }

    /// Register `handler_fn` under `name`, served by a pool of worker coroutines.
    ///
    /// Replacing an existing handler drops the old pool's queue, which lets its
    /// workers exit.
    ///
    /// # Safety
    ///
    /// Spawns coroutines through [`WorkerPool::new`]; the `may` runtime must be
    /// configured before this is called.
    pub unsafe fn register_handler<F>(&mut self, name: &str, config: WorkerPoolConfig, handler_fn: F)
    where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        if self.worker_pools.remove(name).is_some() {
            warn!(handler_name = %name, "Replaced existing handler - old workers will exit");
        }

        // SAFETY: forwarded from this function's contract.
        let pool = unsafe { WorkerPool::new(name.to_string(), config, handler_fn) };
        self.worker_pools.insert(name.to_string(), Arc::new(pool));

        info!(
            handler_name = %name,
            total_handlers = self.worker_pools.len(),
            "Handler registered successfully"
        );
    }

    #[must_use]
    pub fn has_handler(&self, name: &str) -> bool {
        self.worker_pools.contains_key(name)
    }

    /// Dispatch a matched request and wait for its response.
    ///
    /// Returns `None` when no handler is registered under the route's handler
    /// name.
    #[must_use]
    pub fn dispatch(
        &self,
        route_match: RouteMatch,
        query_params: ParamVec,
        headers: HeaderVec,
        request_id: RequestId,
    ) -> Option<HandlerResponse> {
        let pool = match self.worker_pools.get(&route_match.handler_name) {
            Some(pool) => pool,
            None => {
                let available_handlers: Vec<&String> = self.worker_pools.keys().collect();
                error!(
                    request_id = %request_id,
                    handler_name = %route_match.handler_name,
                    available_handlers = ?available_handlers,
                    "Handler not found"
                );
                return None;
            }
        };

        let (reply_tx, reply_rx) = mpsc::channel();
        let mut request = HandlerRequest {
            request_id,
            method: route_match.route.method.clone(),
            path: route_match.route.path.clone(),
            handler_name: route_match.handler_name,
            query_params,
            headers,
            reply_tx,
        };

        let mut early_resp: Option<HandlerResponse> = None;
        for (idx, mw) in self.middlewares.iter().enumerate() {
            if early_resp.is_none() {
                early_resp = mw.before(&request);
                if early_resp.is_some() {
                    debug!(
                        request_id = %request_id,
                        middleware_idx = idx,
                        "Middleware returned early response"
                    );
                }
            } else {
                mw.before(&request);
            }
        }

        let (mut resp, latency) = if let Some(r) = early_resp {
            (r, Duration::from_millis(0))
        } else {
            let start = Instant::now();
            let queued = request.clone();
            // Only the queued copy may hold the reply sender, so a handler that
            // drops it unanswered disconnects `reply_rx`.
            request.reply_tx = mpsc::channel().0;
            if let Err(unavailable) = pool.dispatch(queued) {
                return Some(unavailable);
            }

            // may's mpsc has no recv_timeout; the upstream deadline bounds the wait.
            match reply_rx.recv() {
                Ok(response) => (response, start.elapsed()),
                Err(e) => {
                    error!(
                        request_id = %request_id,
                        handler_name = %request.handler_name,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        error = %e,
                        "Handler dropped reply channel"
                    );
                    return Some(HandlerResponse::error(503, "Service Unavailable"));
                }
            }
        };

        for mw in &self.middlewares {
            mw.after(&request, &mut resp, latency);
        }

        Some(resp)
    }
}
