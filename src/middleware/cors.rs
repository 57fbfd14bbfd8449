use std::collections::HashMap;

use http::Method;

use crate::config::CorsConfig;
use crate::dispatcher::HandlerResponse;
use crate::router::AllowedMethods;

const ANY_ORIGIN_LINE: &str = "Access-Control-Allow-Origin: *";
const VARY_ORIGIN_LINE: &str = "Vary: Origin";

/// Which origins get an `Access-Control-Allow-Origin` header.
#[derive(Debug, Clone)]
pub enum OriginPolicy {
    /// `Access-Control-Allow-Origin: *` on every response.
    Any,
    /// Echo the request's `Origin` when it is listed, keyed by origin.
    Exact(HashMap<String, &'static str>),
}

/// Cross-origin policy applied at the service edge.
///
/// Unlike dispatcher middleware this sees every response, including 404, 405
/// and health answers. All header lines are built once from [`CorsConfig`].
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: OriginPolicy,
    allow_headers_line: Option<&'static str>,
    max_age_line: Option<&'static str>,
}

fn leak(line: String) -> &'static str {
    Box::leak(line.into_boxed_str())
}

impl CorsPolicy {
    /// `None` when CORS is disabled.
    #[must_use]
    pub fn from_config(config: &CorsConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let origins = if config.allowed_origins.is_empty()
            || config.allowed_origins.iter().any(|o| o == "*")
        {
            OriginPolicy::Any
        } else {
            OriginPolicy::Exact(
                config
                    .allowed_origins
                    .iter()
                    .map(|origin| {
                        let origin = origin.trim_end_matches('/').to_string();
                        let line = leak(format!("Access-Control-Allow-Origin: {origin}"));
                        (origin, line)
                    })
                    .collect(),
            )
        };
        let allow_headers_line = (!config.allowed_headers.is_empty()).then(|| {
            leak(format!(
                "Access-Control-Allow-Headers: {}",
                config.allowed_headers.join(", ")
            ))
        });
        let max_age_line = config
            .max_age
            .map(|secs| leak(format!("Access-Control-Max-Age: {secs}")));
        Some(Self {
            origins,
            allow_headers_line,
            max_age_line,
        })
    }

    /// A preflight is an `OPTIONS` carrying both `Origin` and
    /// `Access-Control-Request-Method`.
    #[must_use]
    pub fn is_preflight(method: &Method, origin: Option<&str>, request_method: Option<&str>) -> bool {
        *method == Method::OPTIONS && origin.is_some() && request_method.is_some()
    }

    /// 204 answer to a preflight on a known path.
    #[must_use]
    pub fn preflight(&self, allowed: AllowedMethods) -> HandlerResponse {
        let mut resp = HandlerResponse::empty(204).with_header(allowed.cors_line);
        if let Some(line) = self.allow_headers_line {
            resp.push_header(line);
        }
        if let Some(line) = self.max_age_line {
            resp.push_header(line);
        }
        resp
    }

    /// Add the origin headers to any response.
    pub fn apply(&self, origin: Option<&str>, resp: &mut HandlerResponse) {
        match &self.origins {
            OriginPolicy::Any => resp.push_header(ANY_ORIGIN_LINE),
            OriginPolicy::Exact(allowed) => {
                resp.push_header(VARY_ORIGIN_LINE);
                if let Some(line) = origin.and_then(|o| allowed.get(o.trim_end_matches('/')).copied()) {
                    resp.push_header(line);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GET_ONLY: AllowedMethods = AllowedMethods {
        allow_line: "Allow: GET",
        cors_line: "Access-Control-Allow-Methods: GET",
    };

    #[test]
    fn test_default_allows_any_origin() {
        let policy = CorsPolicy::from_config(&CorsConfig::default()).unwrap();
        let mut resp = HandlerResponse::error(400, "Malformed or missing name");
        policy.apply(Some("https://app.example"), &mut resp);
        assert_eq!(resp.get_header("Access-Control-Allow-Origin"), Some("*"));
        assert_eq!(resp.get_header("Vary"), None);
    }

    #[test]
    fn test_exact_origins_are_echoed() {
        let policy = CorsPolicy::from_config(&CorsConfig {
            allowed_origins: vec!["https://app.example".to_string()],
            ..CorsConfig::default()
        })
        .unwrap();

        let mut allowed = HandlerResponse::json(200, serde_json::json!({}));
        policy.apply(Some("https://app.example"), &mut allowed);
        assert_eq!(
            allowed.get_header("Access-Control-Allow-Origin"),
            Some("https://app.example")
        );
        assert_eq!(allowed.get_header("Vary"), Some("Origin"));

        let mut denied = HandlerResponse::json(200, serde_json::json!({}));
        policy.apply(Some("https://evil.example"), &mut denied);
        assert_eq!(denied.get_header("Access-Control-Allow-Origin"), None);
    }

    #[test]
    fn test_disabled_policy() {
        let config = CorsConfig {
            enabled: false,
            ..CorsConfig::default()
        };
        assert!(CorsPolicy::from_config(&config).is_none());
    }

    #[test]
    fn test_preflight_headers() {
        let policy = CorsPolicy::from_config(&CorsConfig {
            max_age: Some(600),
            ..CorsConfig::default()
        })
        .unwrap();
        let resp = policy.preflight(GET_ONLY);
        assert_eq!(resp.status, 204);
        assert_eq!(resp.get_header("Access-Control-Allow-Methods"), Some("GET"));
        assert_eq!(
            resp.get_header("Access-Control-Allow-Headers"),
            Some("Content-Type, X-Request-ID")
        );
        assert_eq!(resp.get_header("Access-Control-Max-Age"), Some("600"));
    }

    #[test]
    fn test_preflight_detection() {
        assert!(CorsPolicy::is_preflight(&Method::OPTIONS, Some("https://a"), Some("GET")));
        assert!(!CorsPolicy::is_preflight(&Method::OPTIONS, None, Some("GET")));
        assert!(!CorsPolicy::is_preflight(&Method::OPTIONS, Some("https://a"), None));
        assert!(!CorsPolicy::is_preflight(&Method::GET, Some("https://a"), Some("GET")));
    }
}
