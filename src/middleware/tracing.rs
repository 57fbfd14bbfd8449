use std::time::Duration;

use tracing::{debug, info, warn};

use super::Middleware;
use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// Logs handler start and completion with status and latency.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &HandlerRequest) -> Option<HandlerResponse> {
        debug!(
            request_id = %req.request_id,
            method = %req.method,
            path = %req.path,
            handler = %req.handler_name,
            "Handler start"
        );
        None
    }

    fn after(&self, req: &HandlerRequest, res: &mut HandlerResponse, latency: Duration) {
        let latency_ms = latency.as_millis() as u64;
        if res.status >= 500 {
            warn!(
                request_id = %req.request_id,
                handler = %req.handler_name,
                status = res.status,
                latency_ms = latency_ms,
                "Handler finished with server error"
            );
        } else {
            info!(
                request_id = %req.request_id,
                handler = %req.handler_name,
                status = res.status,
                latency_ms = latency_ms,
                "Handler finished"
            );
        }
    }
}
