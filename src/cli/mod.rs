//! # CLI Module
//!
//! Command-line entry point for the `lookup-proxy` binary.
//!
//! ## Commands
//!
//! ### `serve`
//!
//! Start the service:
//!
//! ```bash
//! lookup-proxy serve --config config/config.yaml --addr 127.0.0.1:8080
//! ```
//!
//! `--addr` overrides `http.bind`. SIGINT and SIGTERM stop the server.
//!
//! ### `routes`
//!
//! Print the routing table for a configuration:
//!
//! ```bash
//! lookup-proxy routes
//! ```
//!
//! ### `check`
//!
//! Run one value through the configured validation rule:
//!
//! ```bash
//! lookup-proxy check --field isbn --value 080442957x
//! ```
//!
//! ## Usage from Code
//!
//! ```rust,ignore
//! use lookup_proxy::cli::{run_cli, Cli};
//! use clap::Parser;
//!
//! run_cli(Cli::parse())?;
//! ```

mod commands;


pub use commands::{check_value, run_cli, Cli, Commands};
