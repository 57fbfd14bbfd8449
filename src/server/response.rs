use crate::dispatcher::HandlerResponse;
use may_minihttp::Response;
use serde_json::Value;

const FALLBACK_BODY: &[u8] = br#"{"error":"Internal Server Error"}"#;

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    }
}

/// Write a dispatcher response onto the wire.
///
/// Every response except 204 carries a JSON body.
pub fn write_handler_response(res: &mut Response, resp: &HandlerResponse) {
    res.status_code(resp.status as usize, status_reason(resp.status));
    for line in resp.headers.iter().copied() {
        res.header(line);
    }
    if resp.status == 204 {
        return;
    }
    res.header("Content-Type: application/json");
    res.body_vec(json_bytes(&resp.body));
}

fn json_bytes(body: &Value) -> Vec<u8> {
    serde_json::to_vec(body).unwrap_or_else(|_| FALLBACK_BODY.to_vec())
}
