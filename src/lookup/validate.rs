//! Declarative validation of the single lookup parameter.

use std::collections::HashMap;
use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::config::{ConfigError, RuleConfig};

/// A compiled entry of the rules table.
#[derive(Debug)]
pub struct ValidationRule {
    field: String,
    pattern: Regex,
    lowercase: bool,
}

impl ValidationRule {
    /// Compile `config` for `field`. The pattern is always anchored so the
    /// whole value has to match.
    pub fn new(field: &str, config: &RuleConfig) -> Result<Self, ConfigError> {
        let anchored = format!("^(?:{})$", config.pattern);
        let pattern = RegexBuilder::new(&anchored)
            .case_insensitive(config.case_insensitive)
            .build()
            .map_err(|source| ConfigError::InvalidPattern {
                field: field.to_string(),
                source,
            })?;
        Ok(Self {
            field: field.to_string(),
            pattern,
            lowercase: config.lowercase,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns the value to substitute into the upstream URL, or `None` when
    /// the raw parameter is missing, blank or does not match.
    #[must_use]
    pub fn accept(&self, raw: Option<&str>) -> Option<String> {
        let value = raw?;
        if value.trim().is_empty() || !self.pattern.is_match(value) {
            return None;
        }
        if self.lowercase {
            Some(value.to_ascii_lowercase())
        } else {
            Some(value.to_string())
        }
    }
}

/// The rules table, keyed by field name.
#[derive(Debug, Default, Clone)]
pub struct RuleSet {
    rules: HashMap<String, Arc<ValidationRule>>,
}

impl RuleSet {
    pub fn from_config<'a, I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a String, &'a RuleConfig)>,
    {
        let mut rules = HashMap::new();
        for (field, config) in entries {
            rules.insert(field.clone(), Arc::new(ValidationRule::new(field, config)?));
        }
        Ok(Self { rules })
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<Arc<ValidationRule>> {
        self.rules.get(field).cloned()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
