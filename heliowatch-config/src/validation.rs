use std::time::Duration;

use heliowatch_core::ImageFeed;
use thiserror::Error;
use url::Url;

use super::models::Config;

const MIN_FRAME_DELAY: Duration = Duration::from_millis(20);
const MAX_FRAME_DELAY: Duration = Duration::from_millis(1000);

/// Configuration that must not be used.
#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    /// A duration or count that must be positive is zero.
    #[error("{field} must be greater than zero")]
    ZeroValue {
        /// Human readable setting name.
        field: &'static str,
    },
    /// The upstream base URL is unusable.
    #[error("base URL '{url}' {reason}")]
    InvalidBaseUrl {
        /// The configured value.
        url: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// A questionable but usable setting.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// What is questionable.
    pub message: String,
    /// How to fix it.
    pub hint: Option<String>,
}

/// Warnings collected while loading.
#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    /// Record a warning with a remediation hint.
    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append every warning of `other`.
    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    /// Warnings in the order they were recorded.
    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

/// Reject unusable values and collect warnings for questionable ones.
pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    validate_base_url(&config.upstream.base_url)?;

    non_zero("request timeout", config.upstream.request_timeout)?;
    non_zero("scalar interval", config.schedule.scalar_interval)?;
    non_zero("image interval", config.schedule.image_interval)?;
    if config.cache.capacity == 0 {
        return Err(ConfigGuardRailError::ZeroValue {
            field: "cache capacity",
        });
    }
    for feed in ImageFeed::ALL {
        if config.archive.feed(feed).retention_cap == 0 {
            return Err(ConfigGuardRailError::ZeroValue {
                field: "retention cap",
            });
        }
    }

    let ttl = config.cache.ttl;
    if config.schedule.scalar_interval < ttl {
        warnings.push_with_hint(
            format!(
                "scalar interval {} is shorter than the cache TTL {}; some ticks will be served from cache",
                humantime::format_duration(config.schedule.scalar_interval),
                humantime::format_duration(ttl),
            ),
            "Raise HELIOWATCH_SCALAR_INTERVAL or lower HELIOWATCH_CACHE_TTL",
        );
    }
    if config.schedule.image_interval < ttl {
        warnings.push_with_hint(
            format!(
                "image interval {} is shorter than the cache TTL {}; some ticks will be served from cache",
                humantime::format_duration(config.schedule.image_interval),
                humantime::format_duration(ttl),
            ),
            "Raise HELIOWATCH_IMAGE_INTERVAL or lower HELIOWATCH_CACHE_TTL",
        );
    }

    let delay = config.archive.frame_delay;
    if !(MIN_FRAME_DELAY..=MAX_FRAME_DELAY).contains(&delay) {
        warnings.push_with_hint(
            format!(
                "frame delay {} is outside {}..={}",
                humantime::format_duration(delay),
                humantime::format_duration(MIN_FRAME_DELAY),
                humantime::format_duration(MAX_FRAME_DELAY),
            ),
            "Most viewers clamp very short GIF delays; 100ms to 200ms is typical",
        );
    }

    for feed in ImageFeed::ALL {
        let regeneration = config.archive.feed(feed).regeneration_interval;
        if regeneration < config.schedule.image_interval {
            warnings.push_with_hint(
                format!(
                    "{feed}: regeneration interval {} is shorter than the image interval {}; every new frame triggers a rebuild",
                    humantime::format_duration(regeneration),
                    humantime::format_duration(config.schedule.image_interval),
                ),
                "Set HELIOWATCH_REGENERATION_INTERVAL above the image interval to throttle rebuilds",
            );
        }
    }

    Ok(warnings)
}

fn non_zero(
    field: &'static str,
    value: Duration,
) -> Result<(), ConfigGuardRailError> {
    if value.is_zero() {
        Err(ConfigGuardRailError::ZeroValue { field })
    } else {
        Ok(())
    }
}

fn validate_base_url(raw: &str) -> Result<(), ConfigGuardRailError> {
    let invalid = |reason: &str| ConfigGuardRailError::InvalidBaseUrl {
        url: raw.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(raw).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid("must use http or https"));
    }
    if url.host_str().is_none() {
        return Err(invalid("has no host"));
    }
    Ok(())
}
