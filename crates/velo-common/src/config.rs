//! Layered configuration loading
//!
//! Every service resolves its settings the same way: compiled-in defaults,
//! then a TOML file, then environment variables carrying the service prefix
//! (nested keys separated by `__`, e.g. `VELO_DATABASE__URL`).

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to parse configuration: {details}")]
    ParseError { details: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required value: {key}")]
    MissingValue { key: String },
}

/// Loads a configuration type from defaults, file and environment.
pub trait ConfigLoader: Default + Serialize + DeserializeOwned {
    /// Environment variable prefix, including the trailing underscore.
    const ENV_PREFIX: &'static str;

    /// File consulted when no explicit path is given. Missing is not an error.
    const DEFAULT_FILE: &'static str;

    /// Build the figment for an optional explicit config file.
    fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(Self::DEFAULT_FILE));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(Self::ENV_PREFIX).split("__"))
    }

    /// Load the configuration. An explicit path must exist.
    fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(ConfigurationError::FileNotFound {
                    path: p.display().to_string(),
                });
            }
        }

        let config: Self =
            Self::figment(path)
                .extract()
                .map_err(|e| ConfigurationError::ParseError {
                    details: e.to_string(),
                })?;

        config.validate()?;
        Ok(config)
    }

    /// Semantic checks run after extraction.
    fn validate(&self) -> Result<(), ConfigurationError> {
        Ok(())
    }

    /// Render the defaults as a TOML document.
    fn generate_example() -> Result<String, ConfigurationError> {
        toml::to_string_pretty(&Self::default()).map_err(|e| ConfigurationError::ParseError {
            details: format!("Failed to serialize config: {e}"),
        })
    }
}
