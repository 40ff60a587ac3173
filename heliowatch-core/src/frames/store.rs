use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::name::{FrameName, content_hash, truncate_to_seconds};
use crate::error::{FeedError, Result};

/// Frames kept per feed directory unless configured otherwise.
pub const DEFAULT_RETENTION_CAP: usize = 60;

/// One archived still, as recovered from the directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Content hash from the file name.
    pub hash: String,
    /// Capture time from the file name.
    pub captured_at: DateTime<Utc>,
    /// Full path of the frame file.
    pub path: PathBuf,
}

/// Outcome of a single store attempt.
///
/// `timestamp` is the capture time of the stored frame, or of the already
/// archived frame with the same content when `written` is false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameWriteResult {
    /// Whether a new file was created.
    pub written: bool,
    /// Capture time of the stored or already archived frame.
    pub timestamp: DateTime<Utc>,
    /// Path of the stored or already archived frame.
    pub path: PathBuf,
}

/// Outcome of one retention pass.
#[derive(Debug, Default)]
pub struct RetentionReport {
    /// Frames deleted.
    pub removed: Vec<PathBuf>,
    /// Frames that could not be deleted, with the error.
    pub failed: Vec<(PathBuf, std::io::Error)>,
}

impl RetentionReport {
    /// True when every excess frame was deleted.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Content-addressed frame directory for one image feed.
///
/// The directory listing is the only index: dedup, ordering and eviction
/// all work from a fresh listing so the store survives restarts and
/// external tampering without drift.
#[derive(Debug, Clone)]
pub struct FrameStore {
    directory: PathBuf,
    extension: String,
    retention_cap: usize,
}

impl FrameStore {
    /// Store over `directory` keeping at most `retention_cap` frames. A zero
    /// cap is treated as one.
    pub fn new(
        directory: impl Into<PathBuf>,
        extension: impl Into<String>,
        retention_cap: usize,
    ) -> Self {
        Self {
            directory: directory.into(),
            extension: extension.into(),
            retention_cap: retention_cap.max(1),
        }
    }

    /// The feed directory.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Create the directory if needed and remove temp files left behind by
    /// writes that never reached their rename.
    pub async fn ensure_directory(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|err| FeedError::fs(&self.directory, err))?;
        sweep_temp_files(&self.directory).await?;
        Ok(())
    }

    /// [`FrameStore::store_frame_at`] with the current time.
    pub async fn store_frame(&self, bytes: &[u8]) -> Result<FrameWriteResult> {
        self.store_frame_at(bytes, Utc::now()).await
    }

    /// Store `bytes` as a frame captured at `captured_at`, unless a frame
    /// with identical content is already archived.
    pub async fn store_frame_at(
        &self,
        bytes: &[u8],
        captured_at: DateTime<Utc>,
    ) -> Result<FrameWriteResult> {
        self.ensure_directory().await?;
        let hash = content_hash(bytes);

        if let Some(existing) = self.find_by_hash(&hash).await? {
            debug!(
                dir = %self.directory.display(),
                hash = %hash,
                "duplicate frame, skipping write"
            );
            return Ok(FrameWriteResult {
                written: false,
                timestamp: existing.captured_at,
                path: existing.path,
            });
        }

        let name = FrameName::new(
            hash,
            truncate_to_seconds(captured_at),
            self.extension.clone(),
        );
        let path = self.directory.join(name.file_name());
        write_atomic(&self.directory, &path, bytes).await?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            "frame written"
        );

        let report = self.enforce_retention().await?;
        if !report.is_clean() {
            warn!(
                dir = %self.directory.display(),
                failed = report.failed.len(),
                "retention pass left excess frames behind"
            );
        }

        Ok(FrameWriteResult {
            written: true,
            timestamp: name.captured_at,
            path,
        })
    }

    /// All frames in the directory, oldest first. Ties on the timestamp are
    /// broken by file name.
    pub async fn list_frames(&self) -> Result<Vec<Frame>> {
        list_frames_in(&self.directory, &self.extension).await
    }

    /// The archived frame with content `hash`, if any.
    pub async fn find_by_hash(&self, hash: &str) -> Result<Option<Frame>> {
        let frames = self.list_frames().await?;
        Ok(frames.into_iter().find(|frame| frame.hash == hash))
    }

    /// Delete the oldest frames until at most `retention_cap` remain.
    ///
    /// A failed delete is recorded and the pass carries on with the rest.
    pub async fn enforce_retention(&self) -> Result<RetentionReport> {
        let frames = self.list_frames().await?;
        let mut report = RetentionReport::default();

        if frames.len() <= self.retention_cap {
            return Ok(report);
        }

        let excess = frames.len() - self.retention_cap;
        for frame in frames.into_iter().take(excess) {
            match tokio::fs::remove_file(&frame.path).await {
                Ok(()) => report.removed.push(frame.path),
                Err(err) => {
                    warn!(
                        path = %frame.path.display(),
                        error = %err,
                        "failed to evict frame"
                    );
                    report.failed.push((frame.path, err));
                }
            }
        }

        info!(
            dir = %self.directory.display(),
            removed = report.removed.len(),
            cap = self.retention_cap,
            "retention enforced"
        );
        Ok(report)
    }
}

/// List frame files with `extension` in `directory`, oldest first.
///
/// The directory is created if it does not exist yet.
pub async fn list_frames_in(
    directory: &Path,
    extension: &str,
) -> Result<Vec<Frame>> {
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|err| FeedError::fs(directory, err))?;

    let mut entries = tokio::fs::read_dir(directory)
        .await
        .map_err(|err| FeedError::fs(directory, err))?;

    let mut frames = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| FeedError::fs(directory, err))?
    {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Some(name) = FrameName::parse(file_name) else {
            continue;
        };
        if name.extension != extension {
            continue;
        }
        frames.push(Frame {
            hash: name.hash,
            captured_at: name.captured_at,
            path: entry.path(),
        });
    }

    frames.sort_by(|a, b| {
        a.captured_at
            .cmp(&b.captured_at)
            .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
    });
    Ok(frames)
}

fn is_temp_file(file_name: &str) -> bool {
    file_name.starts_with('.') && file_name.contains(".tmp-")
}

/// Delete every temp file in `directory`. Only the owning task writes
/// there, so any temp file present belongs to an abandoned write.
async fn sweep_temp_files(directory: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(directory)
        .await
        .map_err(|err| FeedError::fs(directory, err))?;

    let mut removed = 0;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| FeedError::fs(directory, err))?
    {
        let file_name = entry.file_name();
        if !file_name.to_str().is_some_and(is_temp_file) {
            continue;
        }
        let path = entry.path();
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(path = %path.display(), "removed stale temp file");
                removed += 1;
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to remove stale temp file")
            }
        }
    }
    Ok(removed)
}

/// Write to a hidden temp file in `dir`, then rename over `path`.
pub(crate) async fn write_atomic(
    dir: &Path,
    path: &Path,
    bytes: &[u8],
) -> Result<()> {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("frame");
    let tmp = dir.join(format!(".{file_name}.tmp-{}", Uuid::new_v4().simple()));

    let mut file = tokio::fs::File::create(&tmp)
        .await
        .map_err(|err| FeedError::fs(&tmp, err))?;
    file.write_all(bytes)
        .await
        .map_err(|err| FeedError::fs(&tmp, err))?;
    file.flush().await.map_err(|err| FeedError::fs(&tmp, err))?;
    drop(file);

    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(FeedError::fs(path, err));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn identical_payload_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path().join("suvi"), "png", 60);

        let first = store
            .store_frame_at(b"frame-a", base_time())
            .await
            .unwrap();
        let second = store
            .store_frame_at(b"frame-a", base_time() + Duration::hours(1))
            .await
            .unwrap();

        assert!(first.written);
        assert!(!second.written);
        assert_eq!(second.timestamp, first.timestamp);
        assert_eq!(second.path, first.path);
        assert_eq!(store.list_frames().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_directory_is_created() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FrameStore::new(&nested, "png", 60);

        assert!(store.list_frames().await.unwrap().is_empty());
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn sixty_five_frames_leave_the_sixty_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "png", 60);

        for i in 0..65 {
            let payload = format!("frame-{i}");
            store
                .store_frame_at(
                    payload.as_bytes(),
                    base_time() + Duration::minutes(i),
                )
                .await
                .unwrap();
        }

        let frames = store.list_frames().await.unwrap();
        assert_eq!(frames.len(), 60);
        assert_eq!(frames[0].captured_at, base_time() + Duration::minutes(5));
        for i in 0..5 {
            let hash = content_hash(format!("frame-{i}").as_bytes());
            assert!(store.find_by_hash(&hash).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn listing_is_ordered_and_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "png", 60);

        store
            .store_frame_at(b"later", base_time() + Duration::minutes(2))
            .await
            .unwrap();
        store.store_frame_at(b"earlier", base_time()).await.unwrap();
        std::fs::write(dir.path().join("suvi_304.gif"), b"gif").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let frames = store.list_frames().await.unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].hash, content_hash(b"earlier"));
        assert_eq!(frames[1].hash, content_hash(b"later"));
    }

    #[tokio::test]
    async fn failed_eviction_does_not_stop_the_pass() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "png", 2);

        // A directory named like the oldest frame cannot be removed as a file.
        let stuck = dir.path().join("aaaa_20240229000000.png");
        std::fs::create_dir(&stuck).unwrap();
        std::fs::write(dir.path().join("bbbb_20240229000100.png"), b"b").unwrap();
        std::fs::write(dir.path().join("cccc_20240229000200.png"), b"c").unwrap();

        let written = store.store_frame_at(b"new", base_time()).await.unwrap();
        assert!(written.written);

        let hashes: Vec<_> = store
            .list_frames()
            .await
            .unwrap()
            .into_iter()
            .map(|frame| frame.hash)
            .collect();
        assert_eq!(
            hashes,
            vec!["aaaa".to_string(), "cccc".to_string(), content_hash(b"new")]
        );

        let report = store.enforce_retention().await.unwrap();
        assert!(!report.is_clean());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, stuck);
        assert!(report.removed.is_empty());
    }

    #[tokio::test]
    async fn abandoned_temp_files_are_swept() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "png", 60);
        let stale = dir
            .path()
            .join(".0beef_20240301000000.png.tmp-5b1e0c2f9a6d4e8b");
        std::fs::write(&stale, b"partial").unwrap();

        store.store_frame_at(b"frame", base_time()).await.unwrap();

        assert!(!stale.exists());
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn sub_second_precision_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "jpg", 60);
        let at = base_time() + Duration::milliseconds(750);

        let result = store.store_frame_at(b"x", at).await.unwrap();
        assert_eq!(result.timestamp, base_time());
        assert!(result.path.to_string_lossy().ends_with("_20240301000000.jpg"));
    }
}
