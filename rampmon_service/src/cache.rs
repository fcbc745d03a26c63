//! In-memory fetch cache with a fixed time-to-live.
//!
//! Maps a request fingerprint (station, window, parameter codes) to the
//! dataset it produced and when it was fetched. The fetch pipeline asks the
//! cache first and only goes to the network on a miss or a stale entry.
//!
//! # Clock injection
//! Every time-dependent call takes `now: DateTime<Utc>` instead of reading
//! the clock, so expiry is deterministic in tests.

use crate::model::{Dataset, DateWindow};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Identity of a request. Two requests with equal fingerprints hit the
/// same URL and may share a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestFingerprint {
    pub station: String,
    pub window: DateWindow,
    pub pcodes: Vec<String>,
}

impl RequestFingerprint {
    pub fn new(station: &str, window: DateWindow, pcodes: &[&str]) -> Self {
        Self {
            station: station.to_string(),
            window,
            pcodes: pcodes.iter().map(|p| p.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub dataset: Dataset,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Stale means strictly older than `ttl`:
    ///   age >  ttl → stale
    ///   age == ttl → still fresh
    pub fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.fetched_at > ttl
    }
}

#[derive(Debug)]
pub struct FetchCache {
    ttl: Duration,
    entries: HashMap<RequestFingerprint, CacheEntry>,
}

impl FetchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached dataset if present and not stale at `now`.
    pub fn get(&self, key: &RequestFingerprint, now: DateTime<Utc>) -> Option<&Dataset> {
        self.entries
            .get(key)
            .filter(|entry| !entry.is_stale(now, self.ttl))
            .map(|entry| &entry.dataset)
    }

    /// Stores a freshly fetched dataset, replacing any previous entry.
    pub fn insert(&mut self, key: RequestFingerprint, dataset: Dataset, now: DateTime<Utc>) {
        self.entries.insert(
            key,
            CacheEntry {
                dataset,
                fetched_at: now,
            },
        );
    }

    /// When the entry for `key` was fetched, fresh or not.
    pub fn fetched_at(&self, key: &RequestFingerprint) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|e| e.fetched_at)
    }

    /// Drops every stale entry and returns how many were removed.
    pub fn purge_stale(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_stale(now, ttl));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
