//! # Structured Logging
//!
//! `tracing` setup for the service: JSON or pretty output, an `EnvFilter`, a
//! sampling layer and optional non-blocking stdout.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `LOOKUP_LOG_LEVEL` | `info` | Level when `RUST_LOG` is unset |
//! | `LOOKUP_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `LOOKUP_LOG_SAMPLING_MODE` | `all` | `all`, `error-only` or `sampled` |
//! | `LOOKUP_LOG_SAMPLING_RATE` | `1.0` | Fraction of sub-WARN events kept in `sampled` mode |
//! | `LOOKUP_LOG_ASYNC` | `true` | Write through a background thread |
//! | `LOOKUP_LOG_BUFFER_SIZE` | `8192` | Lines buffered before dropping in async mode |
//! | `LOOKUP_LOG_TARGET_FILTER` | unset | Extra comma-separated filter directives |
//! | `LOOKUP_LOG_INCLUDE_LOCATION` | `false` | Add file and line to each event |

use anyhow::{Context, Result};
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::Level;
use tracing::subscriber::Interest;
use tracing::{Metadata, Subscriber};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::layer::{Context as LayerContext, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Which events reach the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMode {
    All,
    /// Only WARN and ERROR
    ErrorOnly,
    /// Every WARN and ERROR, a fraction of the rest
    Sampled,
}

impl SamplingMode {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "error-only" | "error_only" => SamplingMode::ErrorOnly,
            "sampled" => SamplingMode::Sampled,
            _ => SamplingMode::All,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub log_level: String,
    pub format: LogFormat,
    pub sampling_mode: SamplingMode,
    /// 0.0-1.0, used in `Sampled` mode
    pub sampling_rate: f64,
    pub async_logging: bool,
    pub buffer_size: usize,
    pub target_filter: Option<String>,
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            sampling_mode: SamplingMode::All,
            sampling_rate: 1.0,
            async_logging: true,
            buffer_size: 8192,
            target_filter: None,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Read `LOOKUP_LOG_*` from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read `LOOKUP_LOG_*` through `lookup`; unset or unparsable values keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            log_level: lookup("LOOKUP_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: lookup("LOOKUP_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            sampling_mode: lookup("LOOKUP_LOG_SAMPLING_MODE")
                .map(|s| SamplingMode::parse(&s))
                .unwrap_or(defaults.sampling_mode),
            sampling_rate: lookup("LOOKUP_LOG_SAMPLING_RATE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.sampling_rate),
            async_logging: lookup("LOOKUP_LOG_ASYNC")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.async_logging),
            buffer_size: lookup("LOOKUP_LOG_BUFFER_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.buffer_size),
            target_filter: lookup("LOOKUP_LOG_TARGET_FILTER"),
            include_location: lookup("LOOKUP_LOG_INCLUDE_LOCATION")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.include_location),
        }
    }

    /// Pretty, synchronous, debug-level output for local runs.
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            buffer_size: 1024,
            include_location: true,
            ..Self::default()
        }
    }
}

/// Sampling layer: decides whether to emit an event based on sampling rules
pub struct SamplingLayer {
    mode: SamplingMode,
    sampling_rate: f64,
    counter: AtomicU64,
}

impl SamplingLayer {
    pub fn new(mode: SamplingMode, sampling_rate: f64) -> Self {
        Self {
            mode,
            sampling_rate: sampling_rate.clamp(0.0, 1.0),
            counter: AtomicU64::new(0),
        }
    }

    fn should_sample(&self, metadata: &Metadata<'_>) -> bool {
        let severe = matches!(*metadata.level(), Level::WARN | Level::ERROR);
        match self.mode {
            SamplingMode::All => true,
            SamplingMode::ErrorOnly => severe,
            SamplingMode::Sampled => {
                if severe || metadata.is_span() {
                    return true;
                }
                let count = self.counter.fetch_add(1, Ordering::Relaxed);
                let sample_interval = (1.0 / self.sampling_rate) as u64;
                sample_interval > 0 && count % sample_interval == 0
            }
        }
    }
}

impl<S> Layer<S> for SamplingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn register_callsite(&self, metadata: &'static Metadata<'static>) -> Interest {
        let severe = matches!(*metadata.level(), Level::WARN | Level::ERROR);
        match self.mode {
            SamplingMode::All => Interest::always(),
            SamplingMode::ErrorOnly if severe => Interest::always(),
            SamplingMode::ErrorOnly => Interest::never(),
            // Cached interest would skip `enabled` and the counter with it.
            SamplingMode::Sampled if severe || metadata.is_span() => Interest::always(),
            SamplingMode::Sampled => Interest::sometimes(),
        }
    }

    fn enabled(&self, metadata: &Metadata<'_>, _ctx: LayerContext<'_, S>) -> bool {
        self.should_sample(metadata)
    }
}

/// Keeps the background writer alive; drop it last to flush buffered lines.
#[must_use = "dropping the guard stops the background log writer"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let level = parse_level(&config.log_level);
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    // Client disconnects are logged by may_minihttp below WARN.
    if let Ok(directive) = "may_minihttp::http_server=warn".parse() {
        env_filter = env_filter.add_directive(directive);
    }

    if let Some(target_filter) = &config.target_filter {
        for filter in target_filter.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            match filter.parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {filter}"),
            }
        }
    }
    env_filter
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails when a global subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<LoggingGuard> {
    let (writer, worker) = if config.async_logging {
        let (non_blocking, guard) = NonBlockingBuilder::default()
            .buffered_lines_limit(config.buffer_size.max(1))
            .finish(std::io::stdout());
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking),
            Some(guard),
        )
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(build_filter(config))
        .with(SamplingLayer::new(config.sampling_mode, config.sampling_rate))
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(LoggingGuard { _worker: worker })
}
