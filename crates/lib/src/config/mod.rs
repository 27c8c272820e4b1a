//! User configuration.
//!
//! Configuration is an explicit object rather than ambient environment
//! lookups: a [`ConfigurationResolver`] declares the keys it knows about
//! (with defaults and descriptions) and holds the values that were actually
//! set. The binary seeds it from the process environment with
//! [`ConfigurationResolver::from_env`]; tests and embedders use
//! [`ConfigurationResolver::with_value`].

use std::collections::BTreeMap;
use std::env::{self, VarError};

use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("configuration {name} is not valid unicode")]
  NotUnicode { name: String },

  #[error("failed to parse arguments from {value:?}: {source}")]
  Arguments {
    value: String,
    #[source]
    source: shell_words::ParseError,
  },
}

/// A declared configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configuration {
  pub name: String,
  pub default: String,
  pub description: String,
}

impl Configuration {
  pub fn new(name: impl Into<String>, default: impl Into<String>, description: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      default: default.into(),
      description: description.into(),
    }
  }
}

/// Resolves configuration values with declared defaults.
#[derive(Debug, Clone, Default)]
pub struct ConfigurationResolver {
  configurations: Vec<Configuration>,
  values: BTreeMap<String, String>,
}

impl ConfigurationResolver {
  pub fn new(configurations: Vec<Configuration>) -> Self {
    Self {
      configurations,
      values: BTreeMap::new(),
    }
  }

  /// Create a resolver whose values come from the process environment.
  ///
  /// Only declared keys are read; unset keys fall back to their defaults.
  pub fn from_env(configurations: Vec<Configuration>) -> Result<Self, ConfigError> {
    let mut values = BTreeMap::new();
    for configuration in &configurations {
      match env::var(&configuration.name) {
        Ok(value) => {
          values.insert(configuration.name.clone(), value);
        }
        Err(VarError::NotPresent) => {}
        Err(VarError::NotUnicode(_)) => {
          return Err(ConfigError::NotUnicode {
            name: configuration.name.clone(),
          });
        }
      }
    }
    Ok(Self { configurations, values })
  }

  /// Set a value explicitly, as if the user had configured it.
  pub fn with_value(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.values.insert(name.into(), value.into());
    self
  }

  pub fn configurations(&self) -> &[Configuration] {
    &self.configurations
  }

  /// Resolve a key.
  ///
  /// Returns the configured value and `true` when the key was explicitly
  /// set, otherwise the declared default (empty if undeclared) and `false`.
  pub fn resolve(&self, name: &str) -> (String, bool) {
    if let Some(value) = self.values.get(name) {
      return (value.clone(), true);
    }
    let default = self
      .configurations
      .iter()
      .find(|c| c.name == name)
      .map(|c| c.default.clone())
      .unwrap_or_default();
    (default, false)
  }

  /// Resolve a colon-separated list, dropping empty segments.
  pub fn resolve_list(&self, name: &str) -> Vec<String> {
    let (value, _) = self.resolve(name);
    value
      .split(':')
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(String::from)
      .collect()
  }

  /// Log every declared key with its description and default.
  pub fn describe(&self) {
    for configuration in &self.configurations {
      let default = if configuration.default.is_empty() {
        "<none>"
      } else {
        configuration.default.as_str()
      };
      info!(
        key = %configuration.name,
        default = %default,
        "{}",
        configuration.description
      );
    }
  }
}

/// Resolve the arguments passed to the build tool.
///
/// The configured (or default) value is split into shell words.
pub fn resolve_arguments(key: &str, resolver: &ConfigurationResolver) -> Result<Vec<String>, ConfigError> {
  let (value, _) = resolver.resolve(key);
  shell_words::split(&value).map_err(|source| ConfigError::Arguments { value, source })
}
