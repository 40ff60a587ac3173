use chrono::{DateTime, NaiveDateTime, Utc};
use sha1::{Digest, Sha1};

/// Capture timestamp layout embedded in frame file names.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Lowercase hex SHA-1 of the raw payload.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Drop sub-second precision so a timestamp survives a file name round trip.
pub fn truncate_to_seconds(at: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(at.timestamp(), 0).unwrap_or(at)
}

/// `<hash>_<YYYYMMDDHHMMSS>.<ext>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameName {
    /// Lowercase hex content hash.
    pub hash: String,
    /// Capture time, whole seconds.
    pub captured_at: DateTime<Utc>,
    /// File extension without the dot.
    pub extension: String,
}

impl FrameName {
    /// Name for a frame; `captured_at` is truncated to whole seconds.
    pub fn new(
        hash: impl Into<String>,
        captured_at: DateTime<Utc>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            hash: hash.into(),
            captured_at: truncate_to_seconds(captured_at),
            extension: extension.into(),
        }
    }

    /// Parse a frame file name. Anything else in the directory yields `None`.
    pub fn parse(file_name: &str) -> Option<Self> {
        let (stem, extension) = file_name.rsplit_once('.')?;
        let (hash, stamp) = stem.split_once('_')?;

        if hash.is_empty()
            || !hash.bytes().all(|b| b.is_ascii_hexdigit())
            || extension.is_empty()
        {
            return None;
        }

        let captured_at = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT)
            .ok()?
            .and_utc();

        Some(Self {
            hash: hash.to_string(),
            captured_at,
            extension: extension.to_string(),
        })
    }

    /// Rendered file name.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}.{}",
            self.hash,
            self.captured_at.format(TIMESTAMP_FORMAT),
            self.extension
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn hash_is_sha1_hex() {
        assert_eq!(
            content_hash(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }

    #[test]
    fn file_name_round_trips() {
        let at = Utc.with_ymd_and_hms(2024, 5, 10, 13, 4, 59).unwrap();
        let name = FrameName::new("a9993e36", at, "png");
        assert_eq!(name.file_name(), "a9993e36_20240510130459.png");
        assert_eq!(FrameName::parse(&name.file_name()), Some(name));
    }

    #[test]
    fn foreign_and_temp_files_do_not_parse() {
        assert_eq!(FrameName::parse("suvi_304.gif"), None);
        assert_eq!(FrameName::parse("README"), None);
        assert_eq!(FrameName::parse("abc_notadate.png"), None);
        assert_eq!(
            FrameName::parse(".abc_20240510130459.png.tmp-1f2e"),
            None
        );
    }
}
