//! Content-addressed on-disk frame archive.
//!
//! Each image feed owns one directory of `<sha1>_<YYYYMMDDHHMMSS>.<ext>`
//! files. Writes are deduplicated by content hash and followed by a
//! retention pass that keeps only the newest frames.

/// Frame file naming and content hashing.
pub mod name;
/// Directory-backed frame store.
pub mod store;

pub use name::{FrameName, TIMESTAMP_FORMAT, content_hash, truncate_to_seconds};
pub use store::{
    DEFAULT_RETENTION_CAP, Frame, FrameStore, FrameWriteResult,
    RetentionReport, list_frames_in,
};
