//! URL-keyed cache of raw response bodies
//!
//! Provides a `ResponseCache` that remembers the most recent successful body
//! for each exact request URL, along with when it was stored.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// A cached response body and the time it was stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBody {
    /// The raw response body
    pub body: String,
    /// When the body was cached
    pub cached_at: DateTime<Utc>,
}

/// Maps request URLs to their last successfully retrieved body
///
/// Keys are compared exactly (case-sensitive, query string included). Entries
/// are overwritten on every successful fetch and never evicted; the key set is
/// bounded by the URLs the client can build. Backed by a sharded concurrent map,
/// so readers and writers of different URLs do not contend.
#[derive(Debug, Default)]
pub struct ResponseCache {
    entries: DashMap<String, CachedBody>,
}

impl ResponseCache {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached body for `url`, if one was ever stored
    pub fn get(&self, url: &str) -> Option<CachedBody> {
        self.entries.get(url).map(|entry| entry.value().clone())
    }

    /// Stores `body` for `url`, replacing any previous entry
    pub fn put(&self, url: &str, body: impl Into<String>) {
        let entry = CachedBody {
            body: body.into(),
            cached_at: Utc::now(),
        };
        self.entries.insert(url.to_string(), entry);
    }

    /// Number of cached URLs
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been cached yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
