use super::super::validation::ConfigGuardRailError;

use std::path::PathBuf;
use thiserror::Error;

/// Why configuration could not be produced.
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// An explicitly named config file does not exist.
    #[error("configuration file missing: {path}")]
    MissingConfig {
        /// The named path.
        path: PathBuf,
    },
    /// The config file exists but could not be read.
    #[error("failed to read configuration {path}")]
    Io {
        /// The config file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid for the schema.
    #[error("failed to parse configuration {path}")]
    Parse {
        /// The config file.
        path: PathBuf,
        /// TOML error, including unknown keys.
        #[source]
        source: toml::de::Error,
    },
    /// An environment variable holds an unparsable value.
    #[error("invalid value '{value}' for {name}: {reason}")]
    InvalidEnvValue {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
        /// Parser message.
        reason: String,
    },
    /// The resolved configuration failed a guard rail.
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    /// The `.env` file exists but is malformed.
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
