use std::time::Duration;

use crate::frames::FrameWriteResult;

use super::AnimatedSequence;

/// Minimum age of a published sequence before new frames trigger a rebuild.
pub const DEFAULT_REGENERATION_INTERVAL: Duration =
    Duration::from_secs(12 * 60 * 60);

/// What to do with the published sequence after a frame write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegenerationDecision {
    /// Nothing has been published yet.
    RebuildInitial,
    /// Upstream served a frame that is already archived.
    KeepNoNewFrame,
    /// A new frame landed but the published sequence is still recent.
    KeepThrottled,
    /// A new frame landed and the published sequence is old enough.
    RebuildIntervalElapsed,
}

impl RegenerationDecision {
    /// Whether the decision calls for an encode.
    pub fn should_rebuild(self) -> bool {
        matches!(
            self,
            RegenerationDecision::RebuildInitial
                | RegenerationDecision::RebuildIntervalElapsed
        )
    }
}

/// Decouples "a new frame exists" from "re-encode the animation".
#[derive(Debug, Clone, Copy)]
pub struct RegenerationPolicy {
    interval: Duration,
}

impl Default for RegenerationPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_REGENERATION_INTERVAL)
    }
}

impl RegenerationPolicy {
    /// Policy rebuilding at most once per `interval` of frame time.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Decide from the published sequence and the outcome of this tick's
    /// frame write.
    pub fn decide(
        &self,
        previous: Option<&AnimatedSequence>,
        write: &FrameWriteResult,
    ) -> RegenerationDecision {
        let Some(previous) = previous else {
            return RegenerationDecision::RebuildInitial;
        };
        if !write.written {
            return RegenerationDecision::KeepNoNewFrame;
        }

        // A frame older than the sequence (clock step) counts as zero age.
        let age = (write.timestamp - previous.created_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if age >= self.interval {
            RegenerationDecision::RebuildIntervalElapsed
        } else {
            RegenerationDecision::KeepThrottled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chrono::{DateTime, TimeZone, Utc};
    use std::path::PathBuf;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn sequence() -> AnimatedSequence {
        AnimatedSequence {
            data: Bytes::from_static(b"GIF89a"),
            created_at: created(),
            frame_count: 1,
        }
    }

    fn write(written: bool, after: chrono::Duration) -> FrameWriteResult {
        FrameWriteResult {
            written,
            timestamp: created() + after,
            path: PathBuf::from("frame.png"),
        }
    }

    #[test]
    fn no_previous_sequence_always_rebuilds() {
        let policy = RegenerationPolicy::default();
        for written in [true, false] {
            let decision = policy.decide(None, &write(written, chrono::Duration::zero()));
            assert_eq!(decision, RegenerationDecision::RebuildInitial);
            assert!(decision.should_rebuild());
        }
    }

    #[test]
    fn duplicate_frame_keeps_previous() {
        let policy = RegenerationPolicy::default();
        let decision = policy.decide(
            Some(&sequence()),
            &write(false, chrono::Duration::hours(48)),
        );
        assert_eq!(decision, RegenerationDecision::KeepNoNewFrame);
        assert!(!decision.should_rebuild());
    }

    #[test]
    fn new_frame_within_interval_is_throttled() {
        let policy = RegenerationPolicy::default();
        let decision =
            policy.decide(Some(&sequence()), &write(true, chrono::Duration::hours(1)));
        assert_eq!(decision, RegenerationDecision::KeepThrottled);
    }

    #[test]
    fn new_frame_after_interval_rebuilds() {
        let policy = RegenerationPolicy::default();
        let decision =
            policy.decide(Some(&sequence()), &write(true, chrono::Duration::hours(13)));
        assert_eq!(decision, RegenerationDecision::RebuildIntervalElapsed);

        let boundary =
            policy.decide(Some(&sequence()), &write(true, chrono::Duration::hours(12)));
        assert!(boundary.should_rebuild());
    }

    #[test]
    fn frame_older_than_sequence_is_throttled() {
        let policy = RegenerationPolicy::default();
        let decision = policy.decide(
            Some(&sequence()),
            &write(true, chrono::Duration::minutes(-5)),
        );
        assert_eq!(decision, RegenerationDecision::KeepThrottled);
    }
}
