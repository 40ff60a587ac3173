//! Configuration for heliowatch.
//!
//! Values are layered: an optional `.env` file is loaded into the process
//! environment, environment variables override a TOML file, and anything
//! left unset falls back to built-in defaults. The resolved [`Config`] is
//! checked against guard rails before it is handed out; soft problems come
//! back as [`ConfigWarnings`].

/// Layered loading of `.env`, TOML and environment.
pub mod loader;
/// Resolved configuration types.
pub mod models;
/// Raw file and environment inputs.
pub mod sources;
/// Guard rails and warnings.
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use models::{
    ArchiveConfig, CacheConfig, Config, ConfigMetadata, FeedArchiveConfig,
    ScheduleConfig, UpstreamConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
