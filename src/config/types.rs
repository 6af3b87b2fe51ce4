//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use super::director::{DirectorConfig, InputConfig};
use super::lanes::LaneBlock;
use super::validation::{ValidationError, validate};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Director process configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Lane count, backpressure and dedupe.
    #[serde(default)]
    pub director: DirectorConfig,
    /// Where metric lines are read from.
    #[serde(default)]
    pub input: InputConfig,
    /// Worker lanes and their interests, in lane order.
    #[serde(default, rename = "lane")]
    pub lanes: Vec<LaneBlock>,
}

impl Config {
    /// Load and validate configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints, reporting every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate(self).map_err(ConfigError::Invalid)
    }
}
