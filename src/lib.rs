//! # Lookup Proxy
//!
//! **lookup_proxy** is a small coroutine-powered HTTP service that answers
//! single-entity lookups by calling a public REST API and reshaping the answer:
//!
//! - `GET /pokemon-info?name=<name>` via [PokéAPI](https://pokeapi.co)
//! - `GET /book-info?isbn=<isbn>` via [Open Library](https://openlibrary.org)
//! - `GET /health`
//!
//! ## Architecture
//!
//! - **[`server`]** - HTTP server built on `may_minihttp`, request parsing and response writing
//! - **[`router`]** - `(method, path)` resolution with a per-path method guard
//! - **[`dispatcher`]** - Hands matched requests to per-route worker pools and runs middleware
//! - **[`worker_pool`]** - Handler coroutines sharing a queue, with panic recovery
//! - **[`lookup`]** - Validate → fetch → transform pipeline and the two lookup variants
//! - **[`middleware`]** - CORS policy and request tracing
//! - **[`config`]** - YAML configuration with environment overrides
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`registry`]** - Builds the service from a configuration
//! - **[`cli`]** - The `lookup-proxy` binary's commands
//!
//! ### Request Handling Flow
//!
//! ```text
//! TCP ─► AppService::call ─► Router::route
//!                               ├─ NotFound ───────────────► 404
//!                               ├─ MethodNotAllowed ───────► 405 + Allow (or CORS preflight 204)
//!                               ├─ health ─────────────────► 200 {"status":"ok"}
//!                               └─ lookup ─► Dispatcher ─► WorkerPool ─► LookupPipeline
//!                                                                          ├─ 400 invalid input
//!                                                                          ├─ 404 no such entity
//!                                                                          ├─ 502 upstream failure
//!                                                                          └─ 200 entity JSON
//! ```
//!
//! Each request is independent; nothing is cached or shared between requests
//! apart from the immutable configuration.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lookup_proxy::config::ServiceConfig;
//! use lookup_proxy::registry::build_service;
//! use lookup_proxy::server::HttpServer;
//!
//! fn main() -> anyhow::Result<()> {
//!     may::config().set_stack_size(0x10000);
//!     let config = ServiceConfig::load(None)?;
//!     let service = build_service(&config)?;
//!     let handle = HttpServer(service).start(config.http.bind.as_str())?;
//!     handle.wait_ready()?;
//!     handle.stop();
//!     Ok(())
//! }
//! ```
//!
//! ## Runtime Considerations
//!
//! Handlers make blocking upstream calls on `may` coroutines, so their stack
//! size matters. See [`runtime_config`] for `LOOKUP_STACK_SIZE`.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod lookup;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod runtime_config;
pub mod server;
pub mod worker_pool;

pub use config::{ConfigError, ServiceConfig};
pub use error::{LookupError, UpstreamFailure};
pub use ids::RequestId;
pub use lookup::{BookInfo, PokemonInfo};
pub use registry::{build_service, build_service_with_upstream};
