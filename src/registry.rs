//! # Service Assembly
//!
//! Turns a [`ServiceConfig`] into a ready [`AppService`]: the route table, one
//! worker pool per enabled lookup, the tracing middleware and the CORS policy.
//!
//! Every enabled lookup needs a validation rule for its query field and a URL
//! template containing the `{field}` placeholder; a missing piece fails start-up
//! instead of surfacing per request.

use std::sync::Arc;

use crate::config::{ConfigError, LookupConfig, ServiceConfig};
use crate::dispatcher::Dispatcher;
use crate::lookup::{
    lookup_handler, BookLookup, EntityLookup, HttpUpstream, LookupPipeline, PokemonLookup,
    RuleSet, Upstream, UrlTemplate, BOOK_LOOKUP, POKEMON_LOOKUP,
};
use crate::middleware::{CorsPolicy, TracingMiddleware};
use crate::router::{RouteMeta, Router};
use crate::runtime_config::RuntimeConfig;
use crate::server::{AppService, HEALTH_HANDLER};
use crate::worker_pool::WorkerPoolConfig;

/// Path of the built-in health route.
pub const HEALTH_PATH: &str = "/health";

/// Health plus every enabled lookup, all `GET`.
#[must_use]
pub fn route_table(config: &ServiceConfig) -> Vec<RouteMeta> {
    let mut routes = vec![RouteMeta::get(HEALTH_PATH, HEALTH_HANDLER)];
    if config.lookups.pokemon.enabled {
        routes.push(RouteMeta::get(POKEMON_LOOKUP.path, POKEMON_LOOKUP.handler_name));
    }
    if config.lookups.book.enabled {
        routes.push(RouteMeta::get(BOOK_LOOKUP.path, BOOK_LOOKUP.handler_name));
    }
    routes
}

/// Build the pipeline for one lookup and register it with the dispatcher.
///
/// # Safety
///
/// Spawns the handler's worker coroutines; see [`Dispatcher::register_handler`].
pub unsafe fn register_lookup<L: EntityLookup>(
    dispatcher: &mut Dispatcher,
    lookup: L,
    settings: &LookupConfig,
    rules: &RuleSet,
    upstream: Arc<dyn Upstream>,
    pool: WorkerPoolConfig,
) -> Result<(), ConfigError> {
    let descriptor = lookup.descriptor();
    let rule = rules.get(descriptor.field).ok_or_else(|| ConfigError::MissingRule {
        field: descriptor.field.to_string(),
    })?;
    let template = UrlTemplate::new(
        settings
            .url_template
            .as_deref()
            .unwrap_or(descriptor.default_url_template),
        descriptor.field,
    )?;
    tracing::info!(
        handler_name = descriptor.handler_name,
        path = descriptor.path,
        upstream_url = template.as_str(),
        "Registering lookup"
    );

    let pipeline = Arc::new(LookupPipeline::new(lookup, rule, template, upstream));
    // SAFETY: forwarded from this function's contract.
    unsafe { dispatcher.register_handler(descriptor.handler_name, pool, lookup_handler(pipeline)) };
    Ok(())
}

/// Assemble the service against an explicit upstream.
pub fn build_service_with_upstream(
    config: &ServiceConfig,
    upstream: Arc<dyn Upstream>,
) -> Result<AppService, ConfigError> {
    config.validate()?;
    let rules = RuleSet::from_config(&config.validation)?;
    let pool = WorkerPoolConfig::new(
        config.http.handler_workers,
        RuntimeConfig::from_env().stack_size,
    );

    let mut dispatcher = Dispatcher::new();
    dispatcher.add_middleware(Arc::new(TracingMiddleware));
    // SAFETY: may's runtime settings are applied before the service is built;
    // the handlers are Send + 'static and own everything they touch.
    unsafe {
        if config.lookups.pokemon.enabled {
            register_lookup(
                &mut dispatcher,
                PokemonLookup,
                &config.lookups.pokemon,
                &rules,
                Arc::clone(&upstream),
                pool,
            )?;
        }
        if config.lookups.book.enabled {
            register_lookup(
                &mut dispatcher,
                BookLookup,
                &config.lookups.book,
                &rules,
                Arc::clone(&upstream),
                pool,
            )?;
        }
    }

    let router = Router::new(route_table(config));
    Ok(AppService::new(
        Arc::new(router),
        Arc::new(dispatcher),
        CorsPolicy::from_config(&config.cors),
    ))
}

/// Assemble the service with the real HTTP upstream client.
pub fn build_service(config: &ServiceConfig) -> anyhow::Result<AppService> {
    let upstream = HttpUpstream::new(&config.upstream)
        .map_err(|e| anyhow::anyhow!("failed to build upstream HTTP client: {e}"))?;
    Ok(build_service_with_upstream(config, Arc::new(upstream))?)
}
