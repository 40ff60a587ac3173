use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::loader::error::ConfigLoadError;

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    /// `[upstream]`
    #[serde(default)]
    pub upstream: FileUpstreamConfig,
    /// `[schedule]`
    #[serde(default)]
    pub schedule: FileScheduleConfig,
    /// `[cache]`
    #[serde(default)]
    pub cache: FileCacheConfig,
    /// `[archive]`
    #[serde(default)]
    pub archive: FileArchiveConfig,
}

/// `[upstream]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileUpstreamConfig {
    /// Upstream host.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// `User-Agent` header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Whole-request timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,
}

/// `[schedule]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileScheduleConfig {
    /// Scalar feed period in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scalar_interval_secs: Option<u64>,
    /// Image feed period in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_interval_secs: Option<u64>,
}

/// `[cache]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileCacheConfig {
    /// Response lifetime in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    /// Maximum cached responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
}

/// `[archive]` table. Per-feed tables override the archive-wide values.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileArchiveConfig {
    /// Parent of the per-feed frame directories.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Where rebuilt animations are written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_dir: Option<PathBuf>,
    /// Minimum animation age before a rebuild, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regeneration_interval_secs: Option<u64>,
    /// Animation frame delay in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_delay_ms: Option<u64>,
    /// Frames kept per feed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_cap: Option<usize>,
    /// `[archive.suvi_304]`
    #[serde(default)]
    pub suvi_304: FileFeedArchiveConfig,
    /// `[archive.lasco_c3]`
    #[serde(default)]
    pub lasco_c3: FileFeedArchiveConfig,
}

/// `[archive.<feed>]` table.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileFeedArchiveConfig {
    /// Frames kept for this feed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention_cap: Option<usize>,
    /// Minimum animation age before a rebuild, in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regeneration_interval_secs: Option<u64>,
}

/// Config file path.
pub const ENV_CONFIG_PATH: &str = "HELIOWATCH_CONFIG";
/// Upstream host.
pub const ENV_BASE_URL: &str = "HELIOWATCH_BASE_URL";
/// `User-Agent` header.
pub const ENV_USER_AGENT: &str = "HELIOWATCH_USER_AGENT";
/// Request timeout.
pub const ENV_REQUEST_TIMEOUT: &str = "HELIOWATCH_REQUEST_TIMEOUT";
/// Scalar feed period.
pub const ENV_SCALAR_INTERVAL: &str = "HELIOWATCH_SCALAR_INTERVAL";
/// Image feed period.
pub const ENV_IMAGE_INTERVAL: &str = "HELIOWATCH_IMAGE_INTERVAL";
/// Response cache lifetime.
pub const ENV_CACHE_TTL: &str = "HELIOWATCH_CACHE_TTL";
/// Response cache entries.
pub const ENV_CACHE_CAPACITY: &str = "HELIOWATCH_CACHE_CAPACITY";
/// Frame archive root.
pub const ENV_ARCHIVE_DIR: &str = "HELIOWATCH_ARCHIVE_DIR";
/// Animation mirror directory.
pub const ENV_MIRROR_DIR: &str = "HELIOWATCH_MIRROR_DIR";
/// Rebuild throttle, applied to every image feed.
pub const ENV_REGENERATION_INTERVAL: &str = "HELIOWATCH_REGENERATION_INTERVAL";
/// Animation frame delay; bare numbers are milliseconds.
pub const ENV_FRAME_DELAY: &str = "HELIOWATCH_FRAME_DELAY";
/// Frames kept, applied to every image feed.
pub const ENV_RETENTION_CAP: &str = "HELIOWATCH_RETENTION_CAP";

/// Environment-derived configuration values. Each field mirrors the
/// `ENV_*` variable of the same name.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    /// [`ENV_CONFIG_PATH`]
    pub config_path: Option<PathBuf>,
    /// [`ENV_BASE_URL`]
    pub base_url: Option<String>,
    /// [`ENV_USER_AGENT`]
    pub user_agent: Option<String>,
    /// [`ENV_REQUEST_TIMEOUT`]
    pub request_timeout: Option<Duration>,
    /// [`ENV_SCALAR_INTERVAL`]
    pub scalar_interval: Option<Duration>,
    /// [`ENV_IMAGE_INTERVAL`]
    pub image_interval: Option<Duration>,
    /// [`ENV_CACHE_TTL`]
    pub cache_ttl: Option<Duration>,
    /// [`ENV_CACHE_CAPACITY`]
    pub cache_capacity: Option<usize>,
    /// [`ENV_ARCHIVE_DIR`]
    pub archive_dir: Option<PathBuf>,
    /// [`ENV_MIRROR_DIR`]
    pub mirror_dir: Option<PathBuf>,
    /// [`ENV_REGENERATION_INTERVAL`]
    pub regeneration_interval: Option<Duration>,
    /// [`ENV_FRAME_DELAY`]
    pub frame_delay: Option<Duration>,
    /// [`ENV_RETENTION_CAP`]
    pub retention_cap: Option<usize>,
}

impl EnvConfig {
    /// Read the process environment.
    pub fn gather() -> Result<Self, ConfigLoadError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigLoadError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };

        Ok(Self {
            config_path: var(ENV_CONFIG_PATH).map(PathBuf::from),
            base_url: var(ENV_BASE_URL),
            user_agent: var(ENV_USER_AGENT),
            request_timeout: parse_secs_var(ENV_REQUEST_TIMEOUT, var(ENV_REQUEST_TIMEOUT))?,
            scalar_interval: parse_secs_var(ENV_SCALAR_INTERVAL, var(ENV_SCALAR_INTERVAL))?,
            image_interval: parse_secs_var(ENV_IMAGE_INTERVAL, var(ENV_IMAGE_INTERVAL))?,
            cache_ttl: parse_secs_var(ENV_CACHE_TTL, var(ENV_CACHE_TTL))?,
            cache_capacity: parse_count_var(ENV_CACHE_CAPACITY, var(ENV_CACHE_CAPACITY))?,
            archive_dir: var(ENV_ARCHIVE_DIR).map(PathBuf::from),
            mirror_dir: var(ENV_MIRROR_DIR).map(PathBuf::from),
            regeneration_interval: parse_secs_var(
                ENV_REGENERATION_INTERVAL,
                var(ENV_REGENERATION_INTERVAL),
            )?,
            frame_delay: parse_millis_var(ENV_FRAME_DELAY, var(ENV_FRAME_DELAY))?,
            retention_cap: parse_count_var(ENV_RETENTION_CAP, var(ENV_RETENTION_CAP))?,
        })
    }
}

/// Bare integers are seconds; anything else goes through `humantime`.
fn parse_secs_var(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    parse_duration_var(name, raw, Duration::from_secs)
}

/// Bare integers are milliseconds; anything else goes through `humantime`.
fn parse_millis_var(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    parse_duration_var(name, raw, Duration::from_millis)
}

fn parse_duration_var(
    name: &'static str,
    raw: Option<String>,
    bare: fn(u64) -> Duration,
) -> Result<Option<Duration>, ConfigLoadError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if let Ok(value) = trimmed.parse::<u64>() {
        return Ok(Some(bare(value)));
    }
    humantime::parse_duration(trimmed).map(Some).map_err(|err| {
        ConfigLoadError::InvalidEnvValue {
            name,
            value: raw.clone(),
            reason: err.to_string(),
        }
    })
}

fn parse_count_var(
    name: &'static str,
    raw: Option<String>,
) -> Result<Option<usize>, ConfigLoadError> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    raw.trim().parse().map(Some).map_err(|err: std::num::ParseIntError| {
        ConfigLoadError::InvalidEnvValue {
            name,
            value: raw.clone(),
            reason: err.to_string(),
        }
    })
}
