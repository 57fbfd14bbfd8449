//! Health endpoint, method guard and routing edge cases over real HTTP.

mod common;

use common::http::{get, request};
use common::test_server::{config_for, TestServer};
use common::upstream::{unreachable_upstream, MockUpstream};
use serde_json::json;

#[test]
fn test_health_endpoint() {
    // Health never touches an upstream, reachable or not.
    let server = TestServer::with_upstream(&format!("http://{}", unreachable_upstream()));
    let resp = get(&server.addr, "/health");
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, json!({"status": "ok"}));
}

#[test]
fn test_delete_health_is_method_not_allowed() {
    let server = TestServer::with_upstream("http://127.0.0.1:9");
    let resp = request(&server.addr, "DELETE", "/health", &[]);
    assert_eq!(resp.status, 405);
    assert_eq!(resp.header("allow"), Some("GET"));
    assert_eq!(resp.body, json!({"error": "Method Not Allowed"}));
}

#[test]
fn test_non_get_methods_on_lookup_routes() {
    let mock = MockUpstream::start(vec![]);
    let server = TestServer::with_upstream(&mock.base_url());

    for method in ["POST", "PUT", "PATCH", "DELETE", "HEAD"] {
        for path in ["/pokemon-info?name=pikachu", "/book-info?isbn=0451526538"] {
            let resp = request(&server.addr, method, path, &[("Content-Length", "0")]);
            assert_eq!(resp.status, 405, "{method} {path}");
            assert_eq!(resp.header("allow"), Some("GET"));
        }
    }
    assert!(mock.seen().is_empty());
}

#[test]
fn test_unknown_route_is_not_found() {
    let server = TestServer::with_upstream("http://127.0.0.1:9");
    let resp = get(&server.addr, "/pokemon");
    assert_eq!(resp.status, 404);
    assert_eq!(resp.body, json!({"error": "Not Found"}));
}

#[test]
fn test_trailing_slash_and_case_are_ignored() {
    let server = TestServer::with_upstream("http://127.0.0.1:9");
    assert_eq!(get(&server.addr, "/health/").status, 200);
    assert_eq!(get(&server.addr, "/HEALTH").status, 200);
}

#[test]
fn test_disabled_lookup_has_no_route() {
    let mut config = config_for("http://127.0.0.1:9");
    config.lookups.pokemon.enabled = false;
    let server = TestServer::start(&config);

    let resp = get(&server.addr, "/pokemon-info?name=pikachu");
    assert_eq!(resp.status, 404);
    assert_eq!(get(&server.addr, "/book-info").status, 400);
}
