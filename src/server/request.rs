use crate::dispatcher::{HeaderVec, ParamVec};
use may_minihttp::Request;
use std::sync::Arc;
use tracing::debug;

/// The parts of an inbound request the service routes on.
#[derive(Debug, PartialEq)]
pub struct ParsedRequest {
    pub method: String,
    /// Path without the query string
    pub path: String,
    /// Headers with lower-cased names
    pub headers: HeaderVec,
    /// Decoded query parameters in arrival order
    pub query_params: ParamVec,
}

impl ParsedRequest {
    /// First header named `name`; names are stored lower-cased.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Split off and decode the query string of a request target.
///
/// Duplicates are all kept; readers take the last one.
#[must_use]
pub fn parse_query_params(target: &str) -> ParamVec {
    match target.split_once('?') {
        Some((_, query)) => url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (Arc::<str>::from(&*k), v.into_owned()))
            .collect(),
        None => ParamVec::new(),
    }
}

/// Path component of a request target.
#[must_use]
pub fn request_path(target: &str) -> &str {
    match target.split_once('?') {
        Some((path, _)) if !path.is_empty() => path,
        Some(_) => "/",
        None => target,
    }
}

/// Extract method, path, headers and query from a `may_minihttp::Request`.
///
/// Lookups are GET-only, so request bodies are ignored.
pub fn parse_request(req: Request) -> ParsedRequest {
    let method = req.method().to_string();
    let target = req.path();
    let path = request_path(target).to_string();

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase()),
                String::from_utf8_lossy(h.value).into_owned(),
            )
        })
        .collect();

    let query_params = parse_query_params(target);

    debug!(
        method = %method,
        path = %path,
        header_count = headers.len(),
        query_params = ?query_params,
        "HTTP request parsed"
    );

    ParsedRequest {
        method,
        path,
        headers,
        query_params,
    }
}
