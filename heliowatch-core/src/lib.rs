//! Space-weather feed polling.
//!
//! Three scalar summaries and two still-image products are refreshed on
//! independent timers. Responses pass through a short-lived cache; images
//! are archived in a content-addressed frame directory and periodically
//! re-encoded into a looping GIF, throttled by a regeneration policy.

/// Injectable wall clock.
pub mod clock;
/// Crate error type.
pub mod error;
pub mod feeds;
pub mod fetch;
pub mod frames;
pub mod pipeline;
pub mod refresh;
pub mod sequence;

pub use clock::{Clock, SystemClock};
pub use error::{FeedError, Result};
pub use feeds::{
    DEFAULT_BASE_URL, ImageFeed, ScalarFeed, SensorDescriptor, feed_url,
};
pub use fetch::{
    DEFAULT_USER_AGENT, FetchClient, HttpTransport, Payload, ReqwestTransport,
    Resource, ResponseCache,
};
pub use frames::{Frame, FrameStore, FrameWriteResult};
pub use pipeline::{ImageArchive, ScalarSnapshot, image_task, scalar_task};
pub use refresh::{Refresh, RefreshScheduler, RefreshTask, ScheduledTask, TaskState};
pub use sequence::{AnimatedSequence, RegenerationPolicy, SequenceBuilder};
