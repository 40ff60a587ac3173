use std::{collections::HashMap, fs, path::Path, time::Duration};

use heliowatch_config::{
    ConfigGuardRailError, ConfigLoadError, ConfigLoader, EnvConfig,
};
use heliowatch_core::ImageFeed;

fn env(pairs: &[(&str, &str)]) -> EnvConfig {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| vars.get(name).cloned()).unwrap()
}

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("heliowatch.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn defaults_fill_an_empty_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");

    let load = ConfigLoader::new()
        .load_with_env(env(&[("HELIOWATCH_CONFIG", path.to_str().unwrap())]))
        .unwrap();
    let config = load.config;

    assert_eq!(config.upstream.base_url, "https://services.swpc.noaa.gov");
    assert!(config.upstream.user_agent.starts_with("heliowatch/"));
    assert_eq!(config.upstream.request_timeout, Duration::from_secs(30));
    assert_eq!(config.schedule.scalar_interval, Duration::from_secs(60));
    assert_eq!(config.schedule.image_interval, Duration::from_secs(3600));
    assert_eq!(config.cache.ttl, Duration::from_secs(60));
    assert_eq!(config.cache.capacity, 5);
    assert_eq!(config.archive.frame_delay, Duration::from_millis(100));
    assert!(config.archive.mirror_dir.is_none());
    for feed in ImageFeed::ALL {
        let archive = config.archive.feed(feed);
        assert_eq!(archive.retention_cap, 60);
        assert_eq!(archive.regeneration_interval, Duration::from_secs(12 * 3600));
    }
    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));
    assert!(load.warnings.is_empty());
}

#[test]
fn environment_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        [upstream]
        base_url = "http://mirror.local:8080/"

        [schedule]
        scalar_interval_secs = 120

        [archive]
        root = "/srv/frames"
        mirror_dir = "/srv/www"
        regeneration_interval_secs = 21600

        [archive.lasco_c3]
        retention_cap = 30
        "#,
    );

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env(&[
            ("HELIOWATCH_SCALAR_INTERVAL", "5m"),
            ("HELIOWATCH_ARCHIVE_DIR", "/tmp/frames"),
        ]))
        .unwrap();
    let config = load.config;

    assert_eq!(config.upstream.base_url, "http://mirror.local:8080");
    assert_eq!(config.schedule.scalar_interval, Duration::from_secs(300));
    assert_eq!(config.archive.root, Path::new("/tmp/frames"));
    assert_eq!(config.archive.mirror_dir.as_deref(), Some(Path::new("/srv/www")));
    assert_eq!(config.archive.feed(ImageFeed::LascoC3).retention_cap, 30);
    assert_eq!(config.archive.feed(ImageFeed::Suvi304).retention_cap, 60);
    assert_eq!(
        config.archive.feed(ImageFeed::Suvi304).regeneration_interval,
        Duration::from_secs(6 * 3600)
    );
    assert_eq!(
        config.archive.frame_dir(ImageFeed::Suvi304),
        Path::new("/tmp/frames/suvi_304")
    );
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn unknown_keys_fail_to_parse() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[schedule]\nscaler_interval_secs = 5\n");
    let err = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(EnvConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { .. }));
}

#[test]
fn guard_rails_reject_zero_values_and_bad_urls() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");
    let loader = ConfigLoader::new().with_config_path(&path);

    let err = loader
        .load_with_env(env(&[("HELIOWATCH_RETENTION_CAP", "0")]))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::ZeroValue { field: "retention cap" })
    ));

    let err = loader
        .load_with_env(env(&[("HELIOWATCH_IMAGE_INTERVAL", "0")]))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::ZeroValue { .. })
    ));

    let err = loader
        .load_with_env(env(&[("HELIOWATCH_BASE_URL", "ftp://example.org")]))
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::InvalidBaseUrl { .. })
    ));
}

#[test]
fn questionable_values_produce_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .load_with_env(env(&[
            ("HELIOWATCH_SCALAR_INTERVAL", "10"),
            ("HELIOWATCH_FRAME_DELAY", "5"),
            ("HELIOWATCH_REGENERATION_INTERVAL", "30m"),
        ]))
        .unwrap();

    let messages: Vec<_> =
        load.warnings.iter().map(|w| w.message.as_str()).collect();
    assert!(messages.iter().any(|m| m.starts_with("scalar interval")));
    assert!(messages.iter().any(|m| m.starts_with("frame delay")));
    assert_eq!(
        messages
            .iter()
            .filter(|m| m.contains("regeneration interval"))
            .count(),
        2
    );
}
