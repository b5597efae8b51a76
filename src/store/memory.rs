//! In-process store with per-key expiry.
//!
//! Behaves like the Redis backend for the operations the gateway uses, but
//! lives only as long as the process. Useful for development and tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// A thread-safe key/value map with TTLs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, MemoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = self
            .inner
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone());

        if value.is_none() {
            self.inner.remove_if(key, |_, entry| !entry.is_live(now));
        }
        value
    }

    pub fn put(&self, key: &str, value: &str, ttl: Duration) {
        self.inner.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Push the expiry of a live key forward. Missing keys are ignored.
    pub fn expire(&self, key: &str, ttl: Duration) {
        let now = Instant::now();
        if let Some(mut entry) = self.inner.get_mut(key) {
            if entry.is_live(now) {
                entry.expires_at = now + ttl;
            }
        }
    }

    pub fn delete(&self, key: &str) {
        self.inner.remove(key);
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
