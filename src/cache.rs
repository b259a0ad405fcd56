//! Time-bounded memoization of upstream pages
//!
//! Shared process-wide behind an `Arc`. The lock is only held for the map
//! access itself, never across an upstream call, so two computations that
//! miss the same key at the same time will both fetch. That duplicate fetch is
//! accepted; serializing misses would stall unrelated requests.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use crate::models::{Kind, UpstreamPageResult};

/// Which upstream endpoint a cached page came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceId {
    Listing(Kind),
    Search,
}

impl std::fmt::Display for SourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceId::Listing(kind) => write!(f, "listing:{}", kind),
            SourceId::Search => f.write_str("search"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: SourceId,
    pub native_page: u32,
    pub native_sort: String,
    /// Search text plus any filter that changes the upstream response.
    pub query: String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: UpstreamPageResult,
    expires_at: Instant,
}

pub struct PageCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    default_ttl: Duration,
}

impl PageCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(256)),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached page for `key` if it has not expired. Expired entries are
    /// removed on the way out.
    pub fn get(&self, key: &CacheKey) -> Option<UpstreamPageResult> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                Some(entry) if now <= entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write();
        // Another writer may have refreshed it in between.
        if let Some(entry) = entries.get(key) {
            if now > entry.expires_at {
                entries.remove(key);
                debug!(source = %key.source, page = key.native_page, "cache entry expired");
            } else {
                return Some(entry.value.clone());
            }
        }
        None
    }

    pub fn put(&self, key: CacheKey, value: UpstreamPageResult, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries.write().insert(key, CacheEntry { value, expires_at });
    }

    pub fn put_default(&self, key: CacheKey, value: UpstreamPageResult) {
        self.put(key, value, self.default_ttl);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| now <= entry.expires_at);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
