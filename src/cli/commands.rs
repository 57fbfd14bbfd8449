use crate::config::ServiceConfig;
use crate::logging::{init_logging, LogConfig};
use crate::lookup::RuleSet;
use crate::registry::{build_service, route_table};
use crate::router::Router;
use crate::runtime_config::RuntimeConfig;
use crate::server::{HttpServer, ServerHandle};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// Command-line interface for the lookup proxy
#[derive(Parser)]
#[command(name = "lookup-proxy")]
#[command(about = "Pokémon and book lookup proxy", version, long_about = None)]
pub struct Cli {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP service
    Serve {
        /// YAML configuration file (default: config/config.yaml when present)
        #[arg(short, long, env = "LOOKUP_CONFIG")]
        config: Option<PathBuf>,

        /// Listen address, overrides `http.bind`
        #[arg(short, long)]
        addr: Option<String>,
    },
    /// Print the routing table
    Routes {
        #[arg(short, long, env = "LOOKUP_CONFIG")]
        config: Option<PathBuf>,
    },
    /// Run a value through the validation rule for a field
    Check {
        /// Field name, e.g. `name` or `isbn`
        #[arg(short, long)]
        field: String,

        /// Raw value as it would appear in the query string
        #[arg(short, long)]
        value: String,

        #[arg(short, long, env = "LOOKUP_CONFIG")]
        config: Option<PathBuf>,
    },
}

/// Accepted form of `value` under the rule for `field`.
///
/// # Errors
///
/// Fails when the field has no rule or the value is rejected.
pub fn check_value(config: &ServiceConfig, field: &str, value: &str) -> anyhow::Result<String> {
    let rules = RuleSet::from_config(&config.validation)?;
    let rule = rules
        .get(field)
        .with_context(|| format!("no validation rule configured for field `{field}`"))?;
    rule.accept(Some(value))
        .with_context(|| format!("Malformed or missing {field}"))
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<ServiceConfig> {
    ServiceConfig::load(path.map(PathBuf::as_path)).context("failed to load configuration")
}

/// Execute a parsed command line.
///
/// # Errors
///
/// Start-up failures (configuration, logging, bind) and rejected `check`
/// values are returned to the caller.
pub fn run_cli(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Serve { config, addr } => serve(config.as_ref(), addr.as_deref()),
        Commands::Routes { config } => {
            let config = load_config(config.as_ref())?;
            Router::new(route_table(&config)).dump_routes();
            Ok(())
        }
        Commands::Check {
            field,
            value,
            config,
        } => {
            let config = load_config(config.as_ref())?;
            println!("{}", check_value(&config, field, value)?);
            Ok(())
        }
    }
}

fn serve(config_path: Option<&PathBuf>, addr: Option<&str>) -> anyhow::Result<()> {
    RuntimeConfig::from_env().apply();
    let _log_guard = init_logging(&LogConfig::from_env())?;

    let mut config = load_config(config_path)?;
    if let Some(addr) = addr {
        config.http.bind = addr.to_string();
    }
    let service = build_service(&config).context("failed to build service")?;
    service.router.dump_routes();

    let handle = HttpServer(service)
        .start(config.http.bind.as_str())
        .with_context(|| format!("failed to bind {}", config.http.bind))?;
    info!(addr = %handle.addr(), "Lookup proxy listening");
    wait_for_shutdown(handle)
}

#[cfg(unix)]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("failed to install signal handlers")?;
    if let Some(signal) = signals.forever().next() {
        info!(signal, "Shutdown signal received");
    }
    handle.stop();
    Ok(())
}

#[cfg(not(unix))]
fn wait_for_shutdown(handle: ServerHandle) -> anyhow::Result<()> {
    handle
        .join()
        .map_err(|e| anyhow::anyhow!("server coroutine panicked: {e:?}"))
}
