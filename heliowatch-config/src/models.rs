use std::{path::PathBuf, time::Duration};

use heliowatch_core::ImageFeed;

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Upstream host and request settings.
    pub upstream: UpstreamConfig,
    /// Refresh periods.
    pub schedule: ScheduleConfig,
    /// Response cache sizing.
    pub cache: CacheConfig,
    /// Frame archive and animation settings.
    pub archive: ArchiveConfig,
    /// Where the values came from.
    pub metadata: ConfigMetadata,
}

/// `[upstream]`
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Scheme and host, no trailing slash.
    pub base_url: String,
    /// `User-Agent` sent on every request.
    pub user_agent: String,
    /// Whole-request timeout.
    pub request_timeout: Duration,
}

/// `[schedule]`
#[derive(Debug, Clone, Copy)]
pub struct ScheduleConfig {
    /// Period of the three scalar feeds.
    pub scalar_interval: Duration,
    /// Period of the two image feeds.
    pub image_interval: Duration,
}

/// `[cache]`
#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    /// Lifetime of a cached response.
    pub ttl: Duration,
    /// Maximum cached responses.
    pub capacity: usize,
}

/// `[archive]`
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    /// Parent of the per-feed frame directories.
    pub root: PathBuf,
    /// Where rebuilt sequences are mirrored, if anywhere.
    pub mirror_dir: Option<PathBuf>,
    /// Display time of each animation frame.
    pub frame_delay: Duration,
    /// SUVI 304 settings.
    pub suvi_304: FeedArchiveConfig,
    /// LASCO C3 settings.
    pub lasco_c3: FeedArchiveConfig,
}

impl ArchiveConfig {
    /// Settings of one image feed.
    pub fn feed(&self, feed: ImageFeed) -> &FeedArchiveConfig {
        match feed {
            ImageFeed::Suvi304 => &self.suvi_304,
            ImageFeed::LascoC3 => &self.lasco_c3,
        }
    }

    /// Frame directory of one image feed.
    pub fn frame_dir(&self, feed: ImageFeed) -> PathBuf {
        self.root.join(feed.key())
    }
}

/// Per-feed archive settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedArchiveConfig {
    /// Frames kept on disk.
    pub retention_cap: usize,
    /// Minimum age of the published animation before a rebuild.
    pub regeneration_interval: Duration,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    /// TOML file that was read, if any.
    pub config_path: Option<PathBuf>,
    /// Whether a `.env` file was applied.
    pub env_file_loaded: bool,
}
