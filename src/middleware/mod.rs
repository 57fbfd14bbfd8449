mod core;
mod cors;
mod tracing;

pub use core::Middleware;
pub use cors::{CorsPolicy, OriginPolicy};
pub use tracing::TracingMiddleware;
