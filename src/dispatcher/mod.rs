//! # Dispatcher Module
//!
//! Coroutine-based handler dispatch. The dispatcher owns one [`WorkerPool`]
//! per lookup route and hands matched requests to it over a `may` channel,
//! then waits on a per-request reply channel.
//!
//! ## Request Flow
//!
//! 1. Router matches `(method, path)` to a handler name
//! 2. Middleware `before` hooks run; any of them may answer early
//! 3. The request is queued on the handler's worker pool
//! 4. A worker runs the handler, which sends exactly one [`HandlerResponse`]
//! 5. Middleware `after` hooks see the response and its latency
//!
//! ## Error Handling
//!
//! - Unknown handler names yield `None`; the service answers 500
//! - Handler panics are caught in the worker and answered with 500
//! - A dropped reply channel is answered with 503
//!
//! [`WorkerPool`]: crate::worker_pool::WorkerPool

mod core;

pub use core::{
    Dispatcher, HandlerRequest, HandlerResponse, HeaderVec, ParamVec, ResponseHeaders,
    MAX_INLINE_HEADERS, MAX_INLINE_PARAMS,
};
