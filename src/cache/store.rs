//! Key/value storage behind the micro-cache.
//!
//! [`KeyValueCache`] is the collaborator contract: single-key reads and
//! inserts are atomic, values are produced lazily, and invalidation works by
//! key prefix. [`MemoryCache`] is the in-process implementation: an LRU with
//! per-entry expiry.

use std::{
    sync::RwLock,
    time::{Duration, Instant},
};

use lru::LruCache;
use thiserror::Error;

use super::{
    config::MicroCacheConfig,
    lock::{rw_read, rw_write},
};

const SOURCE: &str = "cache::store";

/// Failure of the backing store. Never escapes the micro-cache.
#[derive(Debug, Error)]
pub enum CacheFault {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache entry `{key}` could not be stored: {reason}")]
    Rejected { key: String, reason: String },
}

/// Deferred value factory, invoked at most once per insert.
pub type Producer<'a, V> = Box<dyn FnOnce() -> V + Send + 'a>;

pub trait KeyValueCache<V>: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<V>, CacheFault>;

    fn insert(&self, key: String, producer: Producer<'_, V>, ttl: Duration)
    -> Result<(), CacheFault>;

    /// Remove every entry whose key starts with `prefix`. Returns the number
    /// of removed entries.
    fn clear_by_prefix(&self, prefix: &str) -> Result<usize, CacheFault>;
}

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

pub struct MemoryCache<V> {
    entries: RwLock<LruCache<String, Entry<V>>>,
}

impl<V> MemoryCache<V> {
    pub fn new(config: &MicroCacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    /// Number of stored entries, expired ones included until touched.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> KeyValueCache<V> for MemoryCache<V>
where
    V: Clone + Send + Sync,
{
    fn get(&self, key: &str) -> Result<Option<V>, CacheFault> {
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            None => return Ok(None),
            Some(entry) if entry.expires_at > Instant::now() => {
                return Ok(Some(entry.value.clone()));
            }
            Some(_) => {}
        }
        entries.pop(key);
        Ok(None)
    }

    fn insert(
        &self,
        key: String,
        producer: Producer<'_, V>,
        ttl: Duration,
    ) -> Result<(), CacheFault> {
        // Produce outside the lock; the producer may be arbitrarily slow.
        let value = producer();
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| CacheFault::Rejected {
                key: key.clone(),
                reason: format!("ttl {ttl:?} overflows the clock"),
            })?;
        rw_write(&self.entries, SOURCE, "insert").put(key, Entry { value, expires_at });
        Ok(())
    }

    fn clear_by_prefix(&self, prefix: &str) -> Result<usize, CacheFault> {
        let mut entries = rw_write(&self.entries, SOURCE, "clear_by_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }
}
