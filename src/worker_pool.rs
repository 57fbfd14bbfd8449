//! # Worker Pool Module
//!
//! Each lookup route is served by a pool of handler coroutines that share one
//! request queue. Workers pick requests off the queue as they become free, so
//! a slow upstream call on one worker does not hold up the others.
//!
//! ## Panic isolation
//!
//! Every handler invocation runs under `catch_unwind`. A panicking handler is
//! answered with `500 {"error":"Internal Server Error"}` on its reply channel
//! and the worker goes back to the queue.

use crate::dispatcher::{HandlerRequest, HandlerResponse};
use may::sync::mpsc;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Default coroutine stack for handler workers (64 KB).
pub const DEFAULT_WORKER_STACK_SIZE: usize = 0x10000;

/// Configuration for a worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPoolConfig {
    /// Number of worker coroutines
    pub num_workers: usize,
    /// Stack size for worker coroutines
    pub stack_size: usize,
}

impl WorkerPoolConfig {
    pub fn new(num_workers: usize, stack_size: usize) -> Self {
        Self {
            num_workers: num_workers.max(1),
            stack_size,
        }
    }
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            stack_size: DEFAULT_WORKER_STACK_SIZE,
        }
    }
}

/// N handler coroutines draining a shared queue.
pub struct WorkerPool {
    config: WorkerPoolConfig,
    sender: mpsc::Sender<HandlerRequest>,
    handler_name: String,
}

impl WorkerPool {
    /// Spawn the workers for `handler_name`.
    ///
    /// # Safety
    ///
    /// Spawns coroutines with `may::coroutine::Builder::spawn()`, which is unsafe
    /// in the `may` runtime. The caller must ensure the runtime is configured
    /// (stack size, workers) before the first pool is created.
    pub unsafe fn new<F>(handler_name: String, config: WorkerPoolConfig, handler_fn: F) -> Self
    where
        F: Fn(HandlerRequest) + Send + 'static + Clone,
    {
        let (tx, rx) = mpsc::channel::<HandlerRequest>();
        let rx = Arc::new(rx);

        info!(
            handler_name = %handler_name,
            num_workers = config.num_workers,
            stack_size = config.stack_size,
            "Creating worker pool"
        );

        for worker_id in 0..config.num_workers {
            let rx = Arc::clone(&rx);
            let handler_fn = handler_fn.clone();
            let pool_name = handler_name.clone();

            // SAFETY: see the function-level contract; the closure owns all it uses.
            let spawn_result = unsafe {
                may::coroutine::Builder::new()
                    .stack_size(config.stack_size)
                    .spawn(move || {
                        debug!(handler_name = %pool_name, worker_id = worker_id, "Worker coroutine started");

                        while let Ok(req) = rx.recv() {
                            let request_id = req.request_id;
                            let reply_tx = req.reply_tx.clone();

                            if let Err(panic) =
                                std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                                    handler_fn(req);
                                }))
                            {
                                let panic_message = panic_message(panic.as_ref());
                                error!(
                                    request_id = %request_id,
                                    handler_name = %pool_name,
                                    worker_id = worker_id,
                                    panic_message = %panic_message,
                                    "Handler panicked"
                                );
                                if reply_tx
                                    .send(HandlerResponse::error(500, "Internal Server Error"))
                                    .is_err()
                                {
                                    debug!(request_id = %request_id, "Requester gone before panic reply");
                                }
                            }
                        }

                        debug!(handler_name = %pool_name, worker_id = worker_id, "Worker coroutine exiting");
                    })
            };

            if let Err(e) = spawn_result {
                error!(
                    handler_name = %handler_name,
                    worker_id = worker_id,
                    error = %e,
                    "Failed to spawn worker coroutine"
                );
            }
        }

        Self {
            config,
            sender: tx,
            handler_name,
        }
    }

    /// Queue a request for the workers.
    ///
    /// Returns a 503 response when every worker has exited and the queue is
    /// disconnected.
    pub fn dispatch(&self, req: HandlerRequest) -> Result<(), HandlerResponse> {
        let request_id = req.request_id;
        if let Err(e) = self.sender.send(req) {
            error!(
                request_id = %request_id,
                handler_name = %self.handler_name,
                error = %e,
                "Worker pool channel disconnected"
            );
            return Err(HandlerResponse::error(503, "Service Unavailable"));
        }
        Ok(())
    }

    pub fn config(&self) -> &WorkerPoolConfig {
        &self.config
    }

    pub fn handler_name(&self) -> &str {
        &self.handler_name
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
