//! Router core - `(method, path)` resolution.

use http::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A single routable endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMeta {
    pub method: Method,
    /// Canonical path as registered, e.g. `/pokemon-info`.
    pub path: String,
    pub handler_name: String,
}

impl RouteMeta {
    #[must_use]
    pub fn get(path: &str, handler_name: &str) -> Self {
        Self {
            method: Method::GET,
            path: path.to_string(),
            handler_name: handler_name.to_string(),
        }
    }
}

/// Result of successfully matching a request to a route
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub route: Arc<RouteMeta>,
    /// Name of the handler that should process this request
    pub handler_name: String,
}

/// Header lines describing the methods a known path accepts.
///
/// Built once when the router is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedMethods {
    /// e.g. `Allow: GET`
    pub allow_line: &'static str,
    /// e.g. `Access-Control-Allow-Methods: GET`
    pub cors_line: &'static str,
}

#[derive(Debug, Clone)]
pub enum RouteOutcome {
    Matched(RouteMatch),
    /// The path is known but not for this method.
    MethodNotAllowed(AllowedMethods),
    NotFound,
}

#[derive(Debug, Clone)]
struct PathEntry {
    routes: Vec<Arc<RouteMeta>>,
    allowed: AllowedMethods,
}

/// Exact-path router over a small static route table.
///
/// Matching ignores one trailing slash and ASCII case.
#[derive(Debug, Clone)]
pub struct Router {
    paths: HashMap<String, PathEntry>,
    routes: Vec<Arc<RouteMeta>>,
}

/// Canonical lookup key: lower-cased, one trailing slash removed.
fn normalize_path(path: &str) -> String {
    let trimmed = if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    };
    trimmed.to_ascii_lowercase()
}

fn leak(line: String) -> &'static str {
    Box::leak(line.into_boxed_str())
}

impl Router {
    /// Build the routing table.
    ///
    /// The per-path header lines are leaked once here; the route table is fixed
    /// for the life of the process.
    #[must_use]
    pub fn new(routes: Vec<RouteMeta>) -> Self {
        let routes: Vec<Arc<RouteMeta>> = routes.into_iter().map(Arc::new).collect();

        let mut grouped: HashMap<String, Vec<Arc<RouteMeta>>> = HashMap::new();
        for route in &routes {
            grouped
                .entry(normalize_path(&route.path))
                .or_default()
                .push(Arc::clone(route));
        }

        let paths = grouped
            .into_iter()
            .map(|(key, routes)| {
                let methods = routes
                    .iter()
                    .map(|r| r.method.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let allowed = AllowedMethods {
                    allow_line: leak(format!("Allow: {methods}")),
                    cors_line: leak(format!("Access-Control-Allow-Methods: {methods}")),
                };
                (key, PathEntry { routes, allowed })
            })
            .collect();

        info!(routes_count = routes.len(), "Routing table loaded");
        for route in &routes {
            debug!(method = %route.method, path = %route.path, handler = %route.handler_name, "Route registered");
        }

        Self { paths, routes }
    }

    /// Resolve a request.
    #[must_use]
    pub fn route(&self, method: &Method, path: &str) -> RouteOutcome {
        let Some(entry) = self.paths.get(&normalize_path(path)) else {
            return RouteOutcome::NotFound;
        };
        match entry.routes.iter().find(|r| r.method == *method) {
            Some(route) => RouteOutcome::Matched(RouteMatch {
                route: Arc::clone(route),
                handler_name: route.handler_name.clone(),
            }),
            None => RouteOutcome::MethodNotAllowed(entry.allowed),
        }
    }

    /// The methods accepted on `path`, if the path is known.
    #[must_use]
    pub fn allowed_methods(&self, path: &str) -> Option<AllowedMethods> {
        self.paths.get(&normalize_path(path)).map(|e| e.allowed)
    }

    /// Routes in registration order.
    #[must_use]
    pub fn routes(&self) -> &[Arc<RouteMeta>] {
        &self.routes
    }

    /// Print the routing table, one route per line.
    pub fn dump_routes(&self) {
        for route in &self.routes {
            println!("{:<7} {:<20} -> {}", route.method, route.path, route.handler_name);
        }
    }
}
