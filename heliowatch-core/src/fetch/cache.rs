use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::time::Instant;

/// Upstream answers with `Cache-Control: max-age=60`; never ask more often.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);
/// One slot per feed is enough.
pub const DEFAULT_CACHE_CAPACITY: usize = 5;

/// A decoded upstream payload.
#[derive(Debug, Clone)]
pub enum Payload {
    /// Parsed JSON document, shared between cache and callers.
    Json(Arc<serde_json::Value>),
    /// Raw image bytes.
    Binary(Bytes),
}

#[derive(Debug, Clone)]
struct CachedResponse {
    payload: Payload,
    inserted_at: Instant,
}

/// Short-lived, capacity-bounded response cache keyed by URL.
///
/// Entries expire `ttl` after insertion regardless of reads. When full, the
/// entry inserted earliest makes room for a new key. Size of the payloads
/// is not considered.
#[derive(Debug)]
pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<HashMap<String, CachedResponse>>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL, DEFAULT_CACHE_CAPACITY)
    }
}

impl ResponseCache {
    /// Cache holding at most `capacity` entries for `ttl` each. A zero
    /// capacity is treated as one.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(HashMap::with_capacity(capacity.max(1))),
        }
    }

    /// Unexpired payload for `url`, if any. Expired entries are dropped.
    pub fn get(&self, url: &str) -> Option<Payload> {
        let mut entries = self.entries.lock();
        let now = Instant::now();

        match entries.get(url) {
            Some(entry) if now.duration_since(entry.inserted_at) < self.ttl => {
                Some(entry.payload.clone())
            }
            Some(_) => {
                entries.remove(url);
                None
            }
            None => None,
        }
    }

    /// Store `payload` under `url`, evicting expired entries first and the
    /// earliest inserted one if still full.
    pub fn insert(&self, url: impl Into<String>, payload: Payload) {
        let url = url.into();
        let mut entries = self.entries.lock();
        let now = Instant::now();

        entries.retain(|_, entry| now.duration_since(entry.inserted_at) < self.ttl);

        if !entries.contains_key(&url) {
            while entries.len() >= self.capacity {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.inserted_at)
                    .map(|(key, _)| key.clone());
                match oldest {
                    Some(key) => {
                        entries.remove(&key);
                    }
                    None => break,
                }
            }
        }

        entries.insert(
            url,
            CachedResponse {
                payload,
                inserted_at: now,
            },
        );
    }

    /// Number of stored entries, expired ones included until next touch.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
