//! Per-feed refresh functions: what each task does on a tick.

use std::{
    any::type_name_of_val,
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    clock::{Clock, SystemClock},
    error::{FeedError, Result},
    feeds::{ImageFeed, ScalarFeed, SensorDescriptor, feed_url},
    fetch::FetchClient,
    frames::FrameStore,
    refresh::{Refresh, RefreshTask},
    sequence::{AnimatedSequence, RegenerationPolicy, SequenceBuilder},
};

/// Latest summary object published by a scalar feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarSnapshot {
    /// Feed the snapshot came from.
    pub feed: ScalarFeed,
    /// The upstream JSON object, shared with the response cache.
    pub values: Arc<Value>,
    /// When the object was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl ScalarSnapshot {
    /// Numeric value of `field`. Upstream sometimes quotes numbers.
    pub fn reading(&self, field: &str) -> Option<f64> {
        match self.values.get(field)? {
            Value::Number(number) => number.as_f64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    /// Every sensor the feed declares, with its current value if present.
    pub fn readings(
        &self,
    ) -> impl Iterator<Item = (&'static SensorDescriptor, Option<f64>)> + '_ {
        self.feed
            .sensors()
            .iter()
            .map(|sensor| (sensor, self.reading(sensor.field)))
    }
}

/// Frame archive, rebuild policy and optional mirror for one image feed.
pub struct ImageArchive {
    feed: ImageFeed,
    store: FrameStore,
    builder: SequenceBuilder,
    policy: RegenerationPolicy,
    mirror_dir: Option<PathBuf>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ImageArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageArchive")
            .field("feed", &self.feed)
            .field("store", &self.store)
            .field("builder", &self.builder)
            .field("policy", &self.policy)
            .field("mirror_dir", &self.mirror_dir)
            .field("clock", &type_name_of_val(self.clock.as_ref()))
            .finish()
    }
}

impl ImageArchive {
    /// Archive rooted at `<root>/<feed key>`.
    pub fn new(
        feed: ImageFeed,
        root: &Path,
        retention_cap: usize,
        frame_delay: Duration,
        regeneration_interval: Duration,
    ) -> Self {
        Self {
            feed,
            store: FrameStore::new(
                root.join(feed.key()),
                feed.frame_extension(),
                retention_cap,
            ),
            builder: SequenceBuilder::new(frame_delay, feed.frame_extension()),
            policy: RegenerationPolicy::new(regeneration_interval),
            mirror_dir: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Also write every rebuilt sequence to `mirror_dir`.
    pub fn with_mirror_dir(mut self, mirror_dir: Option<PathBuf>) -> Self {
        self.mirror_dir = mirror_dir;
        self
    }

    /// Take capture timestamps from `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The feed this archive belongs to.
    pub fn feed(&self) -> ImageFeed {
        self.feed
    }

    /// The underlying frame store.
    pub fn store(&self) -> &FrameStore {
        &self.store
    }

    /// Archive a freshly fetched still and rebuild the animation if the
    /// policy asks for it.
    ///
    /// Payloads that are not recognisable images are rejected before they
    /// reach the archive.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        previous: Option<&AnimatedSequence>,
    ) -> Result<Refresh<AnimatedSequence>> {
        if let Err(err) = image::guess_format(bytes) {
            warn!(
                feed = %self.feed,
                bytes = bytes.len(),
                error = %err,
                "payload is not an image, not archived"
            );
            return Err(err.into());
        }

        let write = self.store.store_frame_at(bytes, self.clock.now()).await?;
        let decision = self.policy.decide(previous, &write);
        debug!(
            feed = %self.feed,
            written = write.written,
            ?decision,
            "regeneration decision"
        );

        if !decision.should_rebuild() {
            return Ok(Refresh::Unchanged);
        }
        Ok(Refresh::Updated(self.rebuild().await?))
    }

    /// Encode the archive now and mirror the result if configured.
    ///
    /// A failed mirror write is logged; the sequence is still returned.
    pub async fn rebuild(&self) -> Result<AnimatedSequence> {
        let sequence: AnimatedSequence = self
            .builder
            .build_sequence(self.store.directory())
            .await?
            .into();

        info!(
            feed = %self.feed,
            frames = sequence.frame_count,
            bytes = sequence.len(),
            created_at = %sequence.created_at,
            "animated sequence rebuilt"
        );

        if let Some(dir) = &self.mirror_dir
            && let Err(err) = self.persist_to(dir, &sequence).await
        {
            warn!(feed = %self.feed, error = %err, "failed to mirror sequence");
        }
        Ok(sequence)
    }

    /// Write `sequence` as `<dir>/<feed>.gif`.
    pub async fn persist_to(
        &self,
        dir: &Path,
        sequence: &AnimatedSequence,
    ) -> Result<PathBuf> {
        SequenceBuilder::persist(
            dir,
            &self.feed.sequence_file_name(),
            &sequence.data,
        )
        .await
    }
}

/// Task polling one scalar summary.
///
/// A tick that hits the response cache republishes nothing.
pub fn scalar_task(
    client: FetchClient,
    base_url: &str,
    feed: ScalarFeed,
    interval: Duration,
) -> RefreshTask<ScalarSnapshot> {
    let url: Arc<str> = Arc::from(feed_url(base_url, feed.path()));

    RefreshTask::new(
        feed.key(),
        interval,
        move |previous: Option<Arc<ScalarSnapshot>>| {
            let client = client.clone();
            let url = Arc::clone(&url);
            async move {
                let values = client.get_json(&url).await?;
                if !values.is_object() {
                    return Err(FeedError::UnexpectedPayload {
                        url: url.to_string(),
                        expected: "json object",
                    });
                }
                if let Some(previous) = previous
                    && Arc::ptr_eq(&previous.values, &values)
                {
                    return Ok(Refresh::Unchanged);
                }
                Ok(Refresh::Updated(ScalarSnapshot {
                    feed,
                    values,
                    fetched_at: Utc::now(),
                }))
            }
        },
    )
}

/// Task polling one still image into its archive.
pub fn image_task(
    client: FetchClient,
    base_url: &str,
    archive: Arc<ImageArchive>,
    interval: Duration,
) -> RefreshTask<AnimatedSequence> {
    let feed = archive.feed();
    let url: Arc<str> = Arc::from(feed_url(base_url, feed.path()));

    RefreshTask::new(
        feed.key(),
        interval,
        move |previous: Option<Arc<AnimatedSequence>>| {
            let client = client.clone();
            let url = Arc::clone(&url);
            let archive = Arc::clone(&archive);
            async move {
                let bytes = client.get_image(&url, feed.accept()).await?;
                archive.ingest(&bytes, previous.as_deref()).await
            }
        },
    )
}
