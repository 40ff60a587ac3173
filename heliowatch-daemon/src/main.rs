//! # heliowatch
//!
//! Polls the NOAA SWPC space-weather feeds: solar wind magnetic field and
//! speed, 10.7 cm radio flux, and the SUVI 304 and LASCO C3 still images.
//! Stills are archived per feed and periodically stitched into looping
//! GIFs that can be mirrored to a directory for a web server to pick up.

mod app;

use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args as ClapArgs, Parser, Subcommand};
use heliowatch_config::{Config, ConfigLoad, ConfigLoader, ConfigLoaderOptions};
use heliowatch_core::{ImageFeed, frames::list_frames_in};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::{FeedRuntime, build_archive, summary_lines};

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "heliowatch")]
#[command(
    about = "Space-weather feed poller with rolling animated image archives"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(ClapArgs, Debug, Clone)]
struct ConfigArgs {
    /// Path to heliowatch.toml
    #[arg(long, global = true, env = "HELIOWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Path to a .env file loaded before reading the environment
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Refresh every feed on its schedule until interrupted (default)
    Run,
    /// Refresh every feed once, print a summary and exit
    Once,
    /// Re-encode the archive of one image feed and write the GIF
    Rebuild {
        /// Image feed key (suvi_304 or lasco_c3)
        #[arg(value_parser = parse_image_feed)]
        feed: ImageFeed,

        /// Output directory (defaults to the configured mirror directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List archived frames of one image feed, oldest first
    Frames {
        /// Image feed key (suvi_304 or lasco_c3)
        #[arg(value_parser = parse_image_feed)]
        feed: ImageFeed,
    },
}

fn parse_image_feed(raw: &str) -> Result<ImageFeed, String> {
    ImageFeed::from_key(raw).ok_or_else(|| {
        let known: Vec<_> =
            ImageFeed::ALL.iter().map(|feed| feed.key()).collect();
        format!(
            "unknown image feed '{raw}' (expected one of {})",
            known.join(", ")
        )
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_runtime_config(&cli.config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Once => once(&config).await,
        Command::Rebuild { feed, out } => rebuild(&config, feed, out).await,
        Command::Frames { feed } => frames(&config, feed).await,
    }
}

fn load_runtime_config(args: &ConfigArgs) -> anyhow::Result<Config> {
    let ConfigLoad { config, warnings } =
        ConfigLoader::with_options(ConfigLoaderOptions {
            config_path: args.config.clone(),
            env_file: args.env_file.clone(),
        })
        .load()
        .context("failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                // Override via RUST_LOG.
                "info,heliowatch_core=info,reqwest=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.metadata.env_file_loaded {
        info!("loaded .env file");
    }
    if let Some(path) = &config.metadata.config_path {
        info!(path = %path.display(), "configuration file loaded");
    }

    for warning in warnings.iter() {
        match &warning.hint {
            Some(hint) => {
                warn!(message = %warning.message, hint = %hint, "configuration warning")
            }
            None => {
                warn!(message = %warning.message, "configuration warning")
            }
        }
    }

    info!(
        upstream = %config.upstream.base_url,
        scalar_interval = ?config.schedule.scalar_interval,
        image_interval = ?config.schedule.image_interval,
        archive.root = %config.archive.root.display(),
        archive.mirror = ?config.archive.mirror_dir,
        "configuration in effect"
    );

    Ok(config)
}

async fn run(config: &Config) -> anyhow::Result<()> {
    let mut runtime = FeedRuntime::build(config)?;

    for (task, result) in runtime.first_refresh().await {
        match result {
            Ok(()) => info!(task = %task, "initial refresh complete"),
            Err(err) => {
                warn!(task = %task, error = %err, "initial refresh failed")
            }
        }
    }

    runtime.start();
    info!("heliowatch running; press Ctrl-C to stop");

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }

    info!("shutting down");
    runtime.shutdown().await;
    Ok(())
}

async fn once(config: &Config) -> anyhow::Result<()> {
    let runtime = FeedRuntime::build(config)?;
    let failed = runtime
        .first_refresh()
        .await
        .into_iter()
        .filter(|(_, result)| result.is_err())
        .count();

    for line in summary_lines(&runtime) {
        println!("{line}");
    }

    if failed > 0 {
        bail!("{failed} feed(s) failed to refresh");
    }
    Ok(())
}

async fn rebuild(
    config: &Config,
    feed: ImageFeed,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let Some(target) = out.or_else(|| config.archive.mirror_dir.clone()) else {
        bail!("no output directory: pass --out or configure archive.mirror_dir");
    };

    let archive = build_archive(config, feed).with_mirror_dir(None);
    let sequence = archive
        .rebuild()
        .await
        .with_context(|| format!("failed to encode {feed} archive"))?;
    let path = archive
        .persist_to(&target, &sequence)
        .await
        .with_context(|| format!("failed to write {feed} animation"))?;

    println!(
        "{} ({} frames, {} bytes, newest {})",
        path.display(),
        sequence.frame_count,
        sequence.len(),
        sequence.created_at
    );
    Ok(())
}

async fn frames(config: &Config, feed: ImageFeed) -> anyhow::Result<()> {
    let dir = config.archive.frame_dir(feed);
    let frames = list_frames_in(&dir, feed.frame_extension())
        .await
        .with_context(|| format!("failed to list {}", dir.display()))?;

    for frame in &frames {
        println!(
            "{}  {}  {}",
            frame.captured_at.format("%Y-%m-%d %H:%M:%S"),
            frame.hash,
            frame.path.display()
        );
    }
    println!(
        "{}: {} frame(s), retention cap {}",
        feed.display_name(),
        frames.len(),
        config.archive.feed(feed).retention_cap
    );
    Ok(())
}
