//! # Service Configuration
//!
//! Loads the service configuration from an optional YAML file and applies a
//! small set of environment overrides on top.
//!
//! ## File
//!
//! The default path is `config/config.yaml`. When that file does not exist the
//! built-in defaults apply; an explicitly requested path must exist.
//!
//! ```yaml
//! http:
//!   bind: 0.0.0.0:8080
//!   handler_workers: 4
//! upstream:
//!   timeout_ms: 5000
//! cors:
//!   allowed_origins: ["*"]
//! validation:
//!   name: { pattern: "^[a-z0-9-]+$", lowercase: true }
//!   isbn: { pattern: "^[0-9X]{10,13}$", case_insensitive: true }
//! lookups:
//!   pokemon: { enabled: true }
//!   book: { enabled: true }
//! ```
//!
//! Every section and field is optional. Validation rules supplied in the file
//! are merged over the built-in ones by field name.
//!
//! ## Environment Overrides
//!
//! | Variable | Overrides |
//! |---|---|
//! | `LOOKUP_BIND` | `http.bind` |
//! | `LOOKUP_UPSTREAM_TIMEOUT_MS` | `upstream.timeout_ms` |
//! | `LOOKUP_POKEMON_URL` | `lookups.pokemon.url_template` |
//! | `LOOKUP_BOOK_URL` | `lookups.book.url_template` |

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Path probed when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.yaml";

/// Start-up configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },

    #[error("no validation rule configured for field `{field}`")]
    MissingRule { field: String },

    #[error("validation rule for `{field}` has an invalid pattern: {source}")]
    InvalidPattern {
        field: String,
        #[source]
        source: regex::Error,
    },

    #[error("url template `{template}` must contain the `{placeholder}` placeholder")]
    MissingPlaceholder { template: String, placeholder: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub http: HttpConfig,
    pub upstream: UpstreamConfig,
    pub cors: CorsConfig,
    pub validation: BTreeMap<String, RuleConfig>,
    pub lookups: LookupsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    /// Handler coroutines per lookup route.
    pub handler_workers: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            handler_workers: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Deadline for one outbound call, connect through body.
    pub timeout_ms: u64,
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            user_agent: concat!("lookup-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// `"*"` allows any origin; otherwise exact origins are echoed back.
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    /// Preflight cache lifetime in seconds.
    pub max_age: Option<u32>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            allowed_origins: vec!["*".to_string()],
            allowed_headers: vec!["Content-Type".to_string(), "X-Request-ID".to_string()],
            max_age: None,
        }
    }
}

/// One entry of the validation rules table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleConfig {
    /// Regex the whole value must match.
    pub pattern: String,
    #[serde(default)]
    pub case_insensitive: bool,
    /// Lower-case the accepted value before URL substitution.
    #[serde(default)]
    pub lowercase: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupsConfig {
    pub pokemon: LookupConfig,
    pub book: LookupConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LookupConfig {
    pub enabled: bool,
    /// Falls back to the lookup's public upstream when unset.
    pub url_template: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url_template: None,
        }
    }
}

/// Built-in validation rules.
#[must_use]
pub fn default_rules() -> BTreeMap<String, RuleConfig> {
    let mut rules = BTreeMap::new();
    rules.insert(
        "name".to_string(),
        RuleConfig {
            pattern: "^[a-z0-9-]+$".to_string(),
            case_insensitive: false,
            lowercase: true,
        },
    );
    rules.insert(
        "isbn".to_string(),
        RuleConfig {
            pattern: "^[0-9X]{10,13}$".to_string(),
            case_insensitive: true,
            lowercase: false,
        },
    );
    rules
}

impl ServiceConfig {
    /// Defaults with the built-in rules table filled in.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            validation: default_rules(),
            ..Self::default()
        }
    }

    /// Parse a YAML document and merge in the built-in rules.
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        let mut config: ServiceConfig = if content.trim().is_empty() {
            ServiceConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        for (field, rule) in default_rules() {
            config.validation.entry(field).or_insert(rule);
        }
        Ok(config)
    }

    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] when it exists.
    ///
    /// Environment overrides are applied afterwards.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::with_defaults()
                }
            }
        };
        config.apply_overrides(|key| env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Apply `LOOKUP_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("LOOKUP_BIND") {
            self.http.bind = bind;
        }
        if let Some(raw) = lookup("LOOKUP_UPSTREAM_TIMEOUT_MS") {
            self.upstream.timeout_ms = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "LOOKUP_UPSTREAM_TIMEOUT_MS",
                value: raw.clone(),
            })?;
        }
        if let Some(url) = lookup("LOOKUP_POKEMON_URL") {
            self.lookups.pokemon.url_template = Some(url);
        }
        if let Some(url) = lookup("LOOKUP_BOOK_URL") {
            self.lookups.book.url_template = Some(url);
        }
        Ok(())
    }

    /// Checks that do not depend on which lookups exist.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstream.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "upstream.timeout_ms",
                value: "0".to_string(),
            });
        }
        if self.http.handler_workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "http.handler_workers",
                value: "0".to_string(),
            });
        }
        for (field, rule) in &self.validation {
            regex::Regex::new(&rule.pattern).map_err(|source| ConfigError::InvalidPattern {
                field: field.clone(),
                source,
            })?;
        }
        Ok(())
    }
}
