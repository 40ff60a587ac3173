use std::sync::Arc;

use anyhow::Context;
use heliowatch_config::Config;
use heliowatch_core::{
    AnimatedSequence, FeedError, FetchClient, ImageArchive, ImageFeed, RefreshScheduler,
    RefreshTask, ReqwestTransport, ResponseCache, ScalarFeed, ScalarSnapshot,
    image_task, refresh::TickResult, scalar_task,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub fn build_archive(config: &Config, feed: ImageFeed) -> ImageArchive {
    let feed_config = config.archive.feed(feed);
    ImageArchive::new(
        feed,
        &config.archive.root,
        feed_config.retention_cap,
        config.archive.frame_delay,
        feed_config.regeneration_interval,
    )
    .with_mirror_dir(config.archive.mirror_dir.clone())
}

/// The five feed tasks and the observers logging what they publish.
pub struct FeedRuntime {
    scalars: Vec<RefreshTask<ScalarSnapshot>>,
    images: Vec<RefreshTask<AnimatedSequence>>,
    scheduler: RefreshScheduler,
    observers: Vec<JoinHandle<()>>,
    stop: CancellationToken,
}

impl FeedRuntime {
    pub fn build(config: &Config) -> anyhow::Result<Self> {
        let transport = ReqwestTransport::new(config.upstream.request_timeout)
            .context("failed to build HTTP client")?;
        let client = FetchClient::new(
            Arc::new(transport),
            ResponseCache::new(config.cache.ttl, config.cache.capacity),
            config.upstream.user_agent.clone(),
        );
        let base_url = config.upstream.base_url.as_str();

        let scalars: Vec<_> = ScalarFeed::ALL
            .into_iter()
            .map(|feed| {
                scalar_task(
                    client.clone(),
                    base_url,
                    feed,
                    config.schedule.scalar_interval,
                )
            })
            .collect();

        let images: Vec<_> = ImageFeed::ALL
            .into_iter()
            .map(|feed| {
                image_task(
                    client.clone(),
                    base_url,
                    Arc::new(build_archive(config, feed)),
                    config.schedule.image_interval,
                )
            })
            .collect();

        let mut scheduler = RefreshScheduler::new();
        for task in &scalars {
            scheduler.register(Arc::new(task.clone()));
        }
        for task in &images {
            scheduler.register(Arc::new(task.clone()));
        }

        Ok(Self {
            scalars,
            images,
            scheduler,
            observers: Vec::new(),
            stop: CancellationToken::new(),
        })
    }

    pub async fn first_refresh(&self) -> Vec<(String, TickResult)> {
        self.scheduler.first_refresh_all().await
    }

    /// Start every ticker plus one observer per task.
    pub fn start(&mut self) {
        for task in &self.scalars {
            self.observers
                .push(observe(task.clone(), self.stop.clone(), log_scalar));
        }
        for task in &self.images {
            self.observers
                .push(observe(task.clone(), self.stop.clone(), log_sequence));
        }
        self.scheduler.start_all();
    }

    pub async fn shutdown(self) {
        self.scheduler.shutdown_all().await;
        self.stop.cancel();
        for observer in self.observers {
            let _ = observer.await;
        }
    }

    pub fn scalars(&self) -> &[RefreshTask<ScalarSnapshot>] {
        &self.scalars
    }

    pub fn images(&self) -> &[RefreshTask<AnimatedSequence>] {
        &self.images
    }
}

/// Log every newly published value of `task` until `stop` fires.
fn observe<T: Send + Sync + 'static>(
    task: RefreshTask<T>,
    stop: CancellationToken,
    log: fn(&str, &T),
) -> JoinHandle<()> {
    let mut rx = task.subscribe();
    tokio::spawn(async move {
        let mut last = rx.borrow().value.clone();
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            let state = rx.borrow_and_update().clone();
            let fresh = match (&state.value, &last) {
                (Some(now), Some(before)) => !Arc::ptr_eq(now, before),
                (Some(_), None) => true,
                _ => false,
            };
            if fresh && let Some(value) = &state.value {
                log(task.name(), value);
            }
            if !state.last_update_success
                && let Some(err) = &state.last_error
            {
                warn!(
                    task = task.name(),
                    error = %err,
                    "serving last known good value"
                );
            }
            last = state.value;
        }
    })
}

fn log_scalar(task: &str, snapshot: &ScalarSnapshot) {
    for (sensor, value) in snapshot.readings() {
        match value {
            Some(value) => info!(
                task,
                sensor = sensor.name,
                value,
                unit = sensor.unit,
                "reading updated"
            ),
            None => {
                warn!(task, field = sensor.field, "reading missing from payload")
            }
        }
    }
}

fn log_sequence(task: &str, sequence: &AnimatedSequence) {
    info!(
        task,
        frames = sequence.frame_count,
        bytes = sequence.len(),
        created_at = %sequence.created_at,
        "animation published"
    );
}

/// One line per task: name, health and a short description of its value.
pub fn summary_lines(runtime: &FeedRuntime) -> Vec<String> {
    let mut lines = Vec::new();
    for task in runtime.scalars() {
        let state = task.snapshot();
        let detail = match &state.value {
            Some(snapshot) => snapshot
                .readings()
                .map(|(sensor, value)| match value {
                    Some(value) => {
                        format!("{}={} {}", sensor.field, value, sensor.unit)
                    }
                    None => format!("{}=?", sensor.field),
                })
                .collect::<Vec<_>>()
                .join(", "),
            None => describe_error(state.last_error.as_ref()),
        };
        lines.push(format!(
            "{:<12} {:<4} {}",
            task.name(),
            status(state.last_update_success),
            detail
        ));
    }
    for task in runtime.images() {
        let state = task.snapshot();
        let detail = match &state.value {
            Some(sequence) => format!(
                "{} frames, {} bytes, newest {}",
                sequence.frame_count,
                sequence.len(),
                sequence.created_at
            ),
            None => describe_error(state.last_error.as_ref()),
        };
        lines.push(format!(
            "{:<12} {:<4} {}",
            task.name(),
            status(state.last_update_success),
            detail
        ));
    }
    lines
}

fn status(success: bool) -> &'static str {
    if success { "ok" } else { "FAIL" }
}

fn describe_error(err: Option<&Arc<FeedError>>) -> String {
    err.map(|err| err.to_string())
        .unwrap_or_else(|| "no data".to_string())
}
