use std::path::PathBuf;

use thiserror::Error;

/// Everything that can fail a single refresh tick.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Upstream answered with a status other than 200.
    #[error(
        "Error retrieving data from url '{url}'. Response status code is '{status}'"
    )]
    FetchFailed {
        /// Requested URL.
        url: String,
        /// Observed HTTP status.
        status: u16,
    },

    /// The request never produced a response (DNS, TLS, timeout, reset).
    #[error("HTTP transport error for '{url}': {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Transport error rendered as text.
        message: String,
    },

    /// The HTTP client could not be constructed.
    #[error("HTTP client setup failed: {0}")]
    ClientSetup(String),

    /// A JSON endpoint returned a body that is not JSON.
    #[error("Invalid JSON payload from '{url}': {source}")]
    Decode {
        /// Requested URL.
        url: String,
        /// Parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The payload decoded but has the wrong shape for the feed.
    #[error("Unexpected payload from '{url}': expected {expected}")]
    UnexpectedPayload {
        /// Requested URL.
        url: String,
        /// What the feed expects instead.
        expected: &'static str,
    },

    /// An encode was attempted on a directory without frames.
    #[error("No frames available in {0:?}")]
    EmptyDirectory(PathBuf),

    /// Frames exist but none of them could be decoded.
    #[error("None of the {skipped} frames in {directory:?} could be decoded")]
    UndecodableFrames {
        /// Frame directory that was read.
        directory: PathBuf,
        /// Number of frames that were skipped.
        skipped: usize,
    },

    /// Creating, reading, renaming or deleting a file failed.
    #[error("Filesystem error at {path:?}: {source}")]
    Filesystem {
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Image decode or GIF encode failed.
    #[error("Image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// A blocking worker panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl FeedError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FeedError::Filesystem {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn join(err: tokio::task::JoinError) -> Self {
        FeedError::Task(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FeedError>;
