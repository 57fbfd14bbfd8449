//! # Router Module
//!
//! Resolves an incoming `(method, path)` pair against the service's static
//! route table. The outcome is one of:
//!
//! - [`RouteOutcome::Matched`] with the route metadata and handler name
//! - [`RouteOutcome::MethodNotAllowed`] when the path exists under other
//!   methods; carries the prebuilt `Allow` header lines
//! - [`RouteOutcome::NotFound`] for unknown paths
//!
//! ## Example
//!
//! ```rust
//! use http::Method;
//! use lookup_proxy::router::{RouteMeta, RouteOutcome, Router};
//!
//! let router = Router::new(vec![RouteMeta::get("/health", "health")]);
//! assert!(matches!(router.route(&Method::GET, "/health/"), RouteOutcome::Matched(_)));
//! assert!(matches!(router.route(&Method::DELETE, "/health"), RouteOutcome::MethodNotAllowed(_)));
//! ```

mod core;

pub use core::{AllowedMethods, RouteMatch, RouteMeta, RouteOutcome, Router};
