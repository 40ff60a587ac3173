use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use image::{
    Delay, ImageReader,
    codecs::gif::{GifEncoder, Repeat},
};
use tracing::{debug, info, warn};

use crate::{
    error::{FeedError, Result},
    frames::{Frame, list_frames_in, store::write_atomic},
};

/// Display time of each frame in the animation.
pub const DEFAULT_FRAME_DELAY: Duration = Duration::from_millis(100);

/// Quantiser speed handed to the GIF encoder. 1 is slowest and best,
/// 30 fastest.
const ENCODER_SPEED: i32 = 10;

/// Output of one encode.
#[derive(Debug, Clone)]
pub struct EncodedSequence {
    /// GIF bytes.
    pub bytes: Vec<u8>,
    /// Frames that made it into the animation.
    pub frame_count: usize,
    /// Capture time of the newest contributing frame.
    pub newest: DateTime<Utc>,
}

/// Encodes a frame directory into a looping GIF. Never mutates the
/// directory it reads.
#[derive(Debug, Clone)]
pub struct SequenceBuilder {
    frame_delay: Duration,
    extension: String,
}

impl SequenceBuilder {
    /// Builder showing each frame for `frame_delay`, reading files with
    /// `extension`.
    pub fn new(frame_delay: Duration, extension: impl Into<String>) -> Self {
        Self {
            frame_delay,
            extension: extension.into(),
        }
    }

    /// Encoded bytes only, see [`SequenceBuilder::build_sequence`].
    pub async fn build(&self, directory: &Path) -> Result<Vec<u8>> {
        Ok(self.build_sequence(directory).await?.bytes)
    }

    /// Encode every frame in `directory`, oldest first.
    ///
    /// Frames are decoded one at a time on the blocking pool so only the
    /// current frame and the encoder state are resident. A frame that
    /// cannot be read or decoded is skipped; the build fails only when
    /// nothing decodes.
    pub async fn build_sequence(
        &self,
        directory: &Path,
    ) -> Result<EncodedSequence> {
        let frames = list_frames_in(directory, &self.extension).await?;
        if frames.is_empty() {
            return Err(FeedError::EmptyDirectory(directory.to_path_buf()));
        }

        let listed = frames.len();
        let delay = self.frame_delay;
        let encoded =
            tokio::task::spawn_blocking(move || encode_gif(frames, delay))
                .await
                .map_err(FeedError::join)??;

        let Some(encoded) = encoded else {
            return Err(FeedError::UndecodableFrames {
                directory: directory.to_path_buf(),
                skipped: listed,
            });
        };

        info!(
            dir = %directory.display(),
            frames = encoded.frame_count,
            skipped = listed - encoded.frame_count,
            bytes = encoded.bytes.len(),
            "animated sequence encoded"
        );
        Ok(encoded)
    }

    /// Write `bytes` to `<directory>/<name>`, replacing any previous file.
    pub async fn persist(
        directory: &Path,
        name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|err| FeedError::fs(directory, err))?;
        let path = directory.join(name);
        write_atomic(directory, &path, bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "sequence persisted");
        Ok(path)
    }
}

fn decode_frame(path: &Path) -> Result<image::RgbaImage> {
    Ok(ImageReader::open(path)
        .map_err(|err| FeedError::fs(path, err))?
        .with_guessed_format()
        .map_err(|err| FeedError::fs(path, err))?
        .decode()?
        .into_rgba8())
}

/// `None` when no frame decoded.
fn encode_gif(
    frames: Vec<Frame>,
    delay: Duration,
) -> Result<Option<EncodedSequence>> {
    let delay = Delay::from_saturating_duration(delay);
    let mut out = Vec::new();
    let mut frame_count = 0;
    let mut newest = None;
    {
        let mut encoder = GifEncoder::new_with_speed(&mut out, ENCODER_SPEED);
        encoder.set_repeat(Repeat::Infinite)?;

        for frame in frames {
            let buffer = match decode_frame(&frame.path) {
                Ok(buffer) => buffer,
                Err(err) => {
                    warn!(
                        path = %frame.path.display(),
                        error = %err,
                        "skipping undecodable frame"
                    );
                    continue;
                }
            };
            encoder.encode_frame(image::Frame::from_parts(buffer, 0, 0, delay))?;
            frame_count += 1;
            newest = Some(frame.captured_at);
        }
    }

    Ok(newest.map(|newest| EncodedSequence {
        bytes: out,
        frame_count,
        newest,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FrameStore;
    use chrono::TimeZone;
    use image::{AnimationDecoder, ImageFormat, Rgba, RgbaImage, codecs::gif::GifDecoder};
    use std::io::Cursor;

    fn png(shade: u8) -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 4, Rgba([shade, 0, 255 - shade, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn decoded_frames(bytes: &[u8]) -> usize {
        GifDecoder::new(Cursor::new(bytes))
            .unwrap()
            .into_frames()
            .collect_frames()
            .unwrap()
            .len()
    }

    #[tokio::test]
    async fn empty_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let builder = SequenceBuilder::new(DEFAULT_FRAME_DELAY, "png");

        let err = builder.build(dir.path()).await.unwrap_err();
        assert!(matches!(err, FeedError::EmptyDirectory(_)));
    }

    #[tokio::test]
    async fn encodes_every_frame_and_reports_newest() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "png", 60);
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        for i in 0..3u8 {
            store
                .store_frame_at(&png(i * 60), t0 + chrono::Duration::hours(i.into()))
                .await
                .unwrap();
        }

        let builder = SequenceBuilder::new(DEFAULT_FRAME_DELAY, "png");
        let encoded = builder.build_sequence(dir.path()).await.unwrap();

        assert_eq!(encoded.frame_count, 3);
        assert_eq!(encoded.newest, t0 + chrono::Duration::hours(2));
        assert_eq!(&encoded.bytes[..6], b"GIF89a");
        assert_eq!(decoded_frames(&encoded.bytes), 3);
    }

    #[tokio::test]
    async fn corrupt_frames_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "png", 60);
        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let mut truncated = png(90);
        truncated.truncate(truncated.len() / 2);
        store.store_frame_at(b"<html>502</html>", t0).await.unwrap();
        store
            .store_frame_at(&png(30), t0 + chrono::Duration::hours(1))
            .await
            .unwrap();
        store
            .store_frame_at(&truncated, t0 + chrono::Duration::hours(2))
            .await
            .unwrap();

        let builder = SequenceBuilder::new(DEFAULT_FRAME_DELAY, "png");
        let encoded = builder.build_sequence(dir.path()).await.unwrap();

        assert_eq!(encoded.frame_count, 1);
        assert_eq!(encoded.newest, t0 + chrono::Duration::hours(1));
        assert_eq!(decoded_frames(&encoded.bytes), 1);
    }

    #[tokio::test]
    async fn nothing_decodable_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "png", 60);
        store.store_frame(b"not an image").await.unwrap();

        let builder = SequenceBuilder::new(DEFAULT_FRAME_DELAY, "png");
        let err = builder.build(dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            FeedError::UndecodableFrames { skipped: 1, .. }
        ));
    }

    #[tokio::test]
    async fn single_frame_builds_single_frame_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let store = FrameStore::new(dir.path(), "png", 60);
        store.store_frame(&png(10)).await.unwrap();

        let builder = SequenceBuilder::new(Duration::from_millis(200), "png");
        let bytes = builder.build(dir.path()).await.unwrap();
        assert_eq!(decoded_frames(&bytes), 1);
    }

    #[tokio::test]
    async fn persist_overwrites_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("mirror");

        let first = SequenceBuilder::persist(&out, "suvi_304.gif", b"one")
            .await
            .unwrap();
        let second = SequenceBuilder::persist(&out, "suvi_304.gif", b"two")
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(std::fs::read(&second).unwrap(), b"two");
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }
}
