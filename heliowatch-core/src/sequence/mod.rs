//! Animated sequences built from a frame archive, and the policy deciding
//! when a rebuild is worth its cost.

/// GIF encoding of a frame directory.
pub mod builder;
/// Rebuild throttling.
pub mod policy;

pub use builder::{DEFAULT_FRAME_DELAY, EncodedSequence, SequenceBuilder};
pub use policy::{
    DEFAULT_REGENERATION_INTERVAL, RegenerationDecision, RegenerationPolicy,
};

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// An encoded, looping GIF and the capture time of its newest frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimatedSequence {
    /// Encoded GIF.
    pub data: Bytes,
    /// Capture time of the newest frame in the animation.
    pub created_at: DateTime<Utc>,
    /// Number of frames in the animation.
    pub frame_count: usize,
}

impl AnimatedSequence {
    /// MIME type of [`AnimatedSequence::data`].
    pub const CONTENT_TYPE: &'static str = "image/gif";

    /// Same as [`AnimatedSequence::CONTENT_TYPE`].
    pub fn content_type(&self) -> &'static str {
        Self::CONTENT_TYPE
    }

    /// Size of the encoded GIF in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the encoded GIF is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<EncodedSequence> for AnimatedSequence {
    fn from(encoded: EncodedSequence) -> Self {
        Self {
            data: Bytes::from(encoded.bytes),
            created_at: encoded.newest,
            frame_count: encoded.frame_count,
        }
    }
}
