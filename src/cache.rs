//! In-memory key/value cache with per-entry expiry.
//!
//! A read past the deadline evicts the entry and reports a miss. Every
//! `SWEEP_INTERVAL` inserts, and on every `len`, all expired entries are
//! dropped, so keys that are never read again do not accumulate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

const SWEEP_INTERVAL: usize = 64;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    inserts_since_sweep: AtomicUsize,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            inserts_since_sweep: AtomicUsize::new(0),
        }
    }

    /// Stores `value` until `now + ttl`; `None` uses the cache default.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let entry = CacheEntry::new(value, ttl.unwrap_or(self.default_ttl));
        let mut entries = self.lock();
        entries.insert(key.into(), entry);

        if self.inserts_since_sweep.fetch_add(1, Ordering::Relaxed) + 1 >= SWEEP_INTERVAL {
            self.inserts_since_sweep.store(0, Ordering::Relaxed);
            drop_expired(&mut entries, Instant::now());
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Removes all expired entries and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        drop_expired(&mut self.lock(), Instant::now())
    }

    /// Number of live entries. Expired entries are dropped first.
    pub fn len(&self) -> usize {
        let mut entries = self.lock();
        drop_expired(&mut entries, Instant::now());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // Entries stay consistent even if a holder panicked mid-operation.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn drop_expired<V>(entries: &mut HashMap<String, CacheEntry<V>>, now: Instant) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired(now));
    before - entries.len()
}

/// Stable cache key: `prefix:` followed by the hex SHA-256 of the parts.
pub fn cache_key(prefix: &str, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    format!("{}:{}", prefix, hex::encode(hasher.finalize()))
}
