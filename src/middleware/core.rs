use std::time::Duration;

use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// Hooks around handler dispatch.
///
/// `before` may answer early; the handler is then skipped but every
/// middleware's `after` still runs.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &HandlerRequest) -> Option<HandlerResponse> {
        None
    }
    fn after(&self, _req: &HandlerRequest, _res: &mut HandlerResponse, _latency: Duration) {}
}
