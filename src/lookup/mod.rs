//! # Lookup Pipeline
//!
//! One generic pipeline serves every lookup route:
//!
//! ```text
//! raw query param ──► ValidationRule ──► UrlTemplate ──► Upstream::get
//!        │ reject                                         │ 404 / non-2xx / transport
//!        ▼                                                ▼
//!      400                                  404 or 502   typed payload ──► transform ──► 200
//!                                                                              │ no match
//!                                                                              ▼
//!                                                                             404
//! ```
//!
//! A lookup variant only supplies a [`LookupDescriptor`], its typed upstream
//! payload and a `transform` from that payload to the output entity. Nothing is
//! kept between requests.

pub mod book;
pub mod pokemon;
pub mod upstream;
pub mod validate;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::dispatcher::{HandlerRequest, HandlerResponse};
use crate::error::{LookupError, UpstreamFailure};
use crate::ids::RequestId;

pub use book::{BookInfo, BookLookup, BOOK_LOOKUP};
pub use pokemon::{PokemonInfo, PokemonLookup, POKEMON_LOOKUP};
pub use upstream::{HttpUpstream, Upstream, UpstreamReply, UrlTemplate};
pub use validate::{RuleSet, ValidationRule};

/// Static facts about one lookup route.
#[derive(Debug)]
pub struct LookupDescriptor {
    /// Dispatcher handler name.
    pub handler_name: &'static str,
    pub path: &'static str,
    /// Query parameter, and key into the validation rules table.
    pub field: &'static str,
    /// Label used in the not-found message.
    pub entity: &'static str,
    /// Label used in the upstream-failure message.
    pub upstream: &'static str,
    pub default_url_template: &'static str,
}

/// A lookup variant.
pub trait EntityLookup: Send + Sync + 'static {
    /// Typed shape of the upstream 2xx body.
    type Payload: DeserializeOwned;
    /// Fully populated output entity.
    type Entity: Serialize;

    fn descriptor(&self) -> &'static LookupDescriptor;

    /// Map the upstream body to the entity. `None` means the upstream answered
    /// but holds no matching entity.
    fn transform(&self, key: &str, payload: Self::Payload) -> Option<Self::Entity>;
}

pub struct LookupPipeline<L: EntityLookup> {
    lookup: L,
    rule: Arc<ValidationRule>,
    template: UrlTemplate,
    upstream: Arc<dyn Upstream>,
}

impl<L: EntityLookup> LookupPipeline<L> {
    pub fn new(
        lookup: L,
        rule: Arc<ValidationRule>,
        template: UrlTemplate,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            lookup,
            rule,
            template,
            upstream,
        }
    }

    pub fn descriptor(&self) -> &'static LookupDescriptor {
        self.lookup.descriptor()
    }

    /// Validate, fetch and transform.
    pub fn run(&self, raw: Option<&str>) -> Result<L::Entity, LookupError> {
        let descriptor = self.lookup.descriptor();
        let key = self.rule.accept(raw).ok_or(LookupError::Validation {
            field: descriptor.field,
        })?;

        let url = self.template.render(&key);
        let upstream_error = |source: UpstreamFailure| LookupError::Upstream {
            upstream: descriptor.upstream,
            source,
        };
        let reply = self.upstream.get(&url).map_err(upstream_error)?;
        match reply.status {
            404 => {
                return Err(LookupError::NotFound {
                    entity: descriptor.entity,
                })
            }
            200..=299 => {}
            status => return Err(upstream_error(UpstreamFailure::Status(status))),
        }

        let payload: L::Payload = serde_json::from_slice(&reply.body)
            .map_err(|e| upstream_error(UpstreamFailure::Body(e.to_string())))?;
        self.lookup
            .transform(&key, payload)
            .ok_or(LookupError::NotFound {
                entity: descriptor.entity,
            })
    }

    /// Run the pipeline and render the outcome as a response.
    pub fn respond(&self, raw: Option<&str>, request_id: RequestId) -> HandlerResponse {
        let descriptor = self.lookup.descriptor();
        match self.run(raw) {
            Ok(entity) => match serde_json::to_value(&entity) {
                Ok(body) => {
                    debug!(request_id = %request_id, lookup = descriptor.handler_name, "Lookup succeeded");
                    HandlerResponse::json(200, body)
                }
                Err(e) => {
                    warn!(request_id = %request_id, lookup = descriptor.handler_name, error = %e, "Entity serialization failed");
                    HandlerResponse::error(500, "Internal Server Error")
                }
            },
            Err(err) => {
                match &err {
                    LookupError::Upstream { .. } => {
                        warn!(request_id = %request_id, lookup = descriptor.handler_name, error = %err, "Upstream lookup failed");
                    }
                    _ => {
                        info!(request_id = %request_id, lookup = descriptor.handler_name, error = %err, "Lookup rejected");
                    }
                }
                HandlerResponse::error(err.status(), &err.client_message())
            }
        }
    }
}

/// Adapt a pipeline to a dispatcher handler function.
pub fn lookup_handler<L: EntityLookup>(
    pipeline: Arc<LookupPipeline<L>>,
) -> impl Fn(HandlerRequest) + Send + Clone + 'static {
    move |req: HandlerRequest| {
        let field = pipeline.descriptor().field;
        let response = pipeline.respond(req.get_query_param(field), req.request_id);
        if req.reply_tx.send(response).is_err() {
            warn!(request_id = %req.request_id, handler_name = %req.handler_name, "Reply channel closed before response");
        }
    }
}
