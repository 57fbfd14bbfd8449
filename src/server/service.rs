use super::request::{parse_request, ParsedRequest};
use super::response::write_handler_response;
use crate::dispatcher::{Dispatcher, HandlerResponse};
use crate::ids::RequestId;
use crate::middleware::CorsPolicy;
use crate::router::{RouteOutcome, Router};
use http::Method;
use may_minihttp::{HttpService, Request, Response};
use std::io;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Handler name the router uses for the built-in health route.
pub const HEALTH_HANDLER: &str = "health";

/// The may_minihttp service: route, dispatch, decorate, write.
///
/// Cloned once per connection; all state is behind `Arc` and read-only.
#[derive(Clone)]
pub struct AppService {
    pub router: Arc<Router>,
    pub dispatcher: Arc<Dispatcher>,
    pub cors: Option<Arc<CorsPolicy>>,
}

impl AppService {
    pub fn new(router: Arc<Router>, dispatcher: Arc<Dispatcher>, cors: Option<CorsPolicy>) -> Self {
        Self {
            router,
            dispatcher,
            cors: cors.map(Arc::new),
        }
    }

    /// Produce the response for a parsed request, CORS headers included.
    pub fn handle(&self, request: ParsedRequest, request_id: RequestId) -> HandlerResponse {
        let origin = request.header("origin").map(str::to_string);
        let mut response = self.route(request, request_id);
        if let Some(cors) = &self.cors {
            cors.apply(origin.as_deref(), &mut response);
        }
        response
    }

    fn route(&self, request: ParsedRequest, request_id: RequestId) -> HandlerResponse {
        let Ok(method) = request.method.parse::<Method>() else {
            return HandlerResponse::error(400, "Bad Request");
        };

        match self.router.route(&method, &request.path) {
            RouteOutcome::NotFound => HandlerResponse::error(404, "Not Found"),
            RouteOutcome::MethodNotAllowed(allowed) => {
                let preflight = CorsPolicy::is_preflight(
                    &method,
                    request.header("origin"),
                    request.header("access-control-request-method"),
                );
                match &self.cors {
                    Some(cors) if preflight => cors.preflight(allowed),
                    _ => HandlerResponse::error(405, "Method Not Allowed")
                        .with_header(allowed.allow_line),
                }
            }
            RouteOutcome::Matched(route_match) if route_match.handler_name == HEALTH_HANDLER => {
                health_response()
            }
            RouteOutcome::Matched(route_match) => self
                .dispatcher
                .dispatch(route_match, request.query_params, request.headers, request_id)
                .unwrap_or_else(|| HandlerResponse::error(500, "Internal Server Error")),
        }
    }
}

/// `{ "status": "ok" }`, independent of any upstream.
#[must_use]
pub fn health_response() -> HandlerResponse {
    HandlerResponse::json(200, serde_json::json!({ "status": "ok" }))
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let start = Instant::now();
        let request = parse_request(req);
        let request_id = RequestId::from_header_or_new(request.header("x-request-id"));
        let method = request.method.clone();
        let path = request.path.clone();

        let response = self.handle(request, request_id);
        write_handler_response(res, &response);

        let latency_ms = start.elapsed().as_millis() as u64;
        if response.status >= 500 {
            warn!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = response.status,
                latency_ms = latency_ms,
                "Request completed"
            );
        } else {
            info!(
                request_id = %request_id,
                method = %method,
                path = %path,
                status = response.status,
                latency_ms = latency_ms,
                "Request completed"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorsConfig;
    use crate::dispatcher::{HeaderVec, ParamVec};
    use crate::router::RouteMeta;
    use serde_json::json;

    fn service(cors: Option<CorsPolicy>) -> AppService {
        let router = Router::new(vec![
            RouteMeta::get("/health", HEALTH_HANDLER),
            RouteMeta::get("/pokemon-info", "pokemon_info"),
        ]);
        AppService::new(Arc::new(router), Arc::new(Dispatcher::new()), cors)
    }

    fn request(method: &str, path: &str, headers: &[(&str, &str)]) -> ParsedRequest {
        ParsedRequest {
            method: method.to_string(),
            path: path.to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (Arc::from(*k), v.to_string()))
                .collect::<HeaderVec>(),
            query_params: ParamVec::new(),
        }
    }

    #[test]
    fn test_health() {
        let resp = service(None).handle(request("GET", "/health", &[]), RequestId::new());
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, json!({"status": "ok"}));
    }

    #[test]
    fn test_method_guard() {
        let resp = service(None).handle(request("DELETE", "/health", &[]), RequestId::new());
        assert_eq!(resp.status, 405);
        assert_eq!(resp.get_header("Allow"), Some("GET"));
        assert_eq!(resp.body, json!({"error": "Method Not Allowed"}));
    }

    #[test]
    fn test_unknown_route() {
        let resp = service(None).handle(request("GET", "/nope", &[]), RequestId::new());
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body, json!({"error": "Not Found"}));
    }

    #[test]
    fn test_unregistered_handler_is_internal_error() {
        let resp = service(None).handle(request("GET", "/pokemon-info", &[]), RequestId::new());
        assert_eq!(resp.status, 500);
        assert_eq!(resp.body, json!({"error": "Internal Server Error"}));
    }

    #[test]
    fn test_preflight_and_plain_options() {
        let svc = service(CorsPolicy::from_config(&CorsConfig::default()));
        let preflight = svc.handle(
            request(
                "OPTIONS",
                "/pokemon-info",
                &[("origin", "https://app.example"), ("access-control-request-method", "GET")],
            ),
            RequestId::new(),
        );
        assert_eq!(preflight.status, 204);
        assert_eq!(preflight.get_header("Access-Control-Allow-Methods"), Some("GET"));
        assert_eq!(preflight.get_header("Access-Control-Allow-Origin"), Some("*"));

        let plain = svc.handle(request("OPTIONS", "/pokemon-info", &[]), RequestId::new());
        assert_eq!(plain.status, 405);
        assert_eq!(plain.get_header("Allow"), Some("GET"));
        assert_eq!(plain.get_header("Access-Control-Allow-Origin"), Some("*"));
    }
}
