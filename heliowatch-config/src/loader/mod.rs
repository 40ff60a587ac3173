/// Loader errors.
pub mod error;

use once_cell::sync::Lazy;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use heliowatch_core::{
    DEFAULT_BASE_URL, DEFAULT_USER_AGENT,
    fetch::{DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL},
    frames::DEFAULT_RETENTION_CAP,
    sequence::{DEFAULT_FRAME_DELAY, DEFAULT_REGENERATION_INTERVAL},
};

use self::error::ConfigLoadError;
use super::{
    models::{
        ArchiveConfig, CacheConfig, Config, ConfigMetadata,
        FeedArchiveConfig, ScheduleConfig, UpstreamConfig,
    },
    sources::{EnvConfig, FileConfig, FileFeedArchiveConfig},
    validation::{self, ConfigWarnings},
};

/// Upstream request timeout when unset.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Scalar feed period when unset.
pub const DEFAULT_SCALAR_INTERVAL: Duration = Duration::from_secs(60);
/// Image feed period when unset.
pub const DEFAULT_IMAGE_INTERVAL: Duration = Duration::from_secs(3600);
/// Frame archive root when unset.
pub const DEFAULT_ARCHIVE_ROOT: &str = "./data/images";

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("heliowatch.toml"),
        PathBuf::from("config/heliowatch.toml"),
    ]
});

/// Explicit inputs, usually from the command line.
#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    /// Config file; must exist when set.
    pub config_path: Option<PathBuf>,
    /// `.env` file to load instead of `./.env`.
    pub env_file: Option<PathBuf>,
}

/// Resolves a [`Config`] from defaults, file and environment.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

/// A resolved configuration and its warnings.
#[derive(Debug)]
pub struct ConfigLoad {
    /// The configuration.
    pub config: Config,
    /// Non-fatal findings to log.
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    /// Loader with no explicit inputs.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with explicit inputs.
    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    /// Read `path` instead of searching the default locations.
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Load `.env`, then the process environment, then the TOML file.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather()?)?;
        load.config.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Resolve against an already gathered environment. Does not touch
    /// `.env` files or the process environment.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) =
            self.compose_config(file_config, env, config_path)?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let (path, explicit) = if let Some(path) = &self.options.config_path {
            (Some(path.clone()), true)
        } else if let Some(path) = &env.config_path {
            (Some(path.clone()), true)
        } else {
            let found = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
            (found, false)
        };

        let Some(path) = path else {
            return Ok((None, None));
        };
        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if config_path.is_none() {
            warnings.push_with_hint(
                "No heliowatch.toml detected; using environment variables and defaults",
                "Create heliowatch.toml or point HELIOWATCH_CONFIG at a configuration file",
            );
        }

        let FileConfig {
            upstream: file_upstream,
            schedule: file_schedule,
            cache: file_cache,
            archive: file_archive,
        } = file_config.unwrap_or_default();

        let upstream = UpstreamConfig {
            base_url: env
                .base_url
                .clone()
                .or(file_upstream.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim()
                .trim_end_matches('/')
                .to_string(),
            user_agent: env
                .user_agent
                .clone()
                .or(file_upstream.user_agent)
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            request_timeout: env
                .request_timeout
                .or(file_upstream.request_timeout_secs.map(Duration::from_secs))
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };

        let schedule = ScheduleConfig {
            scalar_interval: env
                .scalar_interval
                .or(file_schedule.scalar_interval_secs.map(Duration::from_secs))
                .unwrap_or(DEFAULT_SCALAR_INTERVAL),
            image_interval: env
                .image_interval
                .or(file_schedule.image_interval_secs.map(Duration::from_secs))
                .unwrap_or(DEFAULT_IMAGE_INTERVAL),
        };

        let cache = CacheConfig {
            ttl: env
                .cache_ttl
                .or(file_cache.ttl_secs.map(Duration::from_secs))
                .unwrap_or(DEFAULT_CACHE_TTL),
            capacity: env
                .cache_capacity
                .or(file_cache.capacity)
                .unwrap_or(DEFAULT_CACHE_CAPACITY),
        };

        let shared_regeneration = file_archive
            .regeneration_interval_secs
            .map(Duration::from_secs);
        let feed_archive = |file_feed: &FileFeedArchiveConfig| {
            FeedArchiveConfig {
                retention_cap: env
                    .retention_cap
                    .or(file_feed.retention_cap)
                    .or(file_archive.retention_cap)
                    .unwrap_or(DEFAULT_RETENTION_CAP),
                regeneration_interval: env
                    .regeneration_interval
                    .or(file_feed
                        .regeneration_interval_secs
                        .map(Duration::from_secs))
                    .or(shared_regeneration)
                    .unwrap_or(DEFAULT_REGENERATION_INTERVAL),
            }
        };

        let archive = ArchiveConfig {
            root: env
                .archive_dir
                .clone()
                .or(file_archive.root.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_ARCHIVE_ROOT)),
            mirror_dir: env
                .mirror_dir
                .clone()
                .or(file_archive.mirror_dir.clone()),
            frame_delay: env
                .frame_delay
                .or(file_archive.frame_delay_ms.map(Duration::from_millis))
                .unwrap_or(DEFAULT_FRAME_DELAY),
            suvi_304: feed_archive(&file_archive.suvi_304),
            lasco_c3: feed_archive(&file_archive.lasco_c3),
        };

        let config = Config {
            upstream,
            schedule,
            cache,
            archive,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok((config, warnings))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
