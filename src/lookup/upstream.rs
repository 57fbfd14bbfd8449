//! Outbound GET to the third-party API.

use std::thread;
use std::time::Duration;

use may::sync::mpsc;
use reqwest::blocking::Client;
use tracing::debug;

use crate::config::{ConfigError, UpstreamConfig};
use crate::error::UpstreamFailure;

/// Status and raw body of an upstream answer.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// The seam between a lookup pipeline and the network.
///
/// Implementations issue exactly one GET per call and never retry.
pub trait Upstream: Send + Sync {
    fn get(&self, url: &str) -> Result<UpstreamReply, UpstreamFailure>;
}

/// `reqwest` blocking client with a per-call deadline.
///
/// The blocking call runs on its own OS thread; the calling coroutine waits on
/// a `may` channel and yields its scheduler thread meanwhile. The deadline
/// covers connect, headers and body.
pub struct HttpUpstream {
    client: Client,
}

impl HttpUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client })
    }
}

fn fetch(client: &Client, url: &str) -> Result<UpstreamReply, UpstreamFailure> {
    debug!(url = %url, "Upstream request");
    let response = client
        .get(url)
        .header("Accept", "application/json")
        .send()
        .map_err(classify)?;
    let status = response.status().as_u16();
    let body = response.bytes().map_err(classify)?;
    debug!(url = %url, status = status, bytes = body.len(), "Upstream reply");
    Ok(UpstreamReply {
        status,
        body: body.to_vec(),
    })
}

impl Upstream for HttpUpstream {
    fn get(&self, url: &str) -> Result<UpstreamReply, UpstreamFailure> {
        let (tx, rx) = mpsc::channel();
        let client = self.client.clone();
        let target = url.to_string();
        thread::Builder::new()
            .name("upstream-call".to_string())
            .spawn(move || {
                if tx.send(fetch(&client, &target)).is_err() {
                    debug!(url = %target, "Caller gone before upstream reply");
                }
            })
            .map_err(|e| UpstreamFailure::Transport(format!("failed to start upstream call: {e}")))?;
        rx.recv()
            .map_err(|_| UpstreamFailure::Transport("upstream call ended without a reply".to_string()))?
    }
}

fn classify(err: reqwest::Error) -> UpstreamFailure {
    if err.is_timeout() {
        UpstreamFailure::Timeout
    } else if err.is_body() || err.is_decode() {
        UpstreamFailure::Body(err.to_string())
    } else {
        UpstreamFailure::Transport(err.to_string())
    }
}

/// Upstream URL with a single `{field}` placeholder.
///
/// Substitution is plain text; the validation rule's character class is what
/// keeps the value URL-safe.
#[derive(Debug, Clone)]
pub struct UrlTemplate {
    template: String,
    placeholder: String,
}

impl UrlTemplate {
    pub fn new(template: impl Into<String>, field: &str) -> Result<Self, ConfigError> {
        let template = template.into();
        let placeholder = format!("{{{field}}}");
        if !template.contains(&placeholder) {
            return Err(ConfigError::MissingPlaceholder {
                template,
                placeholder,
            });
        }
        Ok(Self {
            template,
            placeholder,
        })
    }

    #[must_use]
    pub fn render(&self, value: &str) -> String {
        self.template.replace(&self.placeholder, value)
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }
}
