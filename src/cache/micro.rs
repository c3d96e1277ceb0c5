//! The micro-cache: a short-lived, request-shaped cache of data models.
//!
//! Faults of the backing store are logged, counted and otherwise ignored: a
//! failed read is a miss and a failed write is a no-op.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use metrics::counter;
use serde::{Deserialize, Serialize};
use spa_api_types::DataModel;
use tracing::{debug, info, warn};

use crate::domain::culture::Culture;

use super::{
    config::MicroCacheConfig,
    events::ContentEvent,
    keys::CACHE_PREFIX,
    store::{KeyValueCache, MemoryCache},
};

pub const METRIC_HIT: &str = "spa_micro_cache_hit_total";
pub const METRIC_MISS: &str = "spa_micro_cache_miss_total";
pub const METRIC_FAULT: &str = "spa_micro_cache_fault_total";
pub const METRIC_CLEAR: &str = "spa_micro_cache_clear_total";

/// A cached data model and the culture it was built for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedDataModel {
    pub data: DataModel,
    pub culture: Option<Culture>,
}

pub struct MicroCache {
    store: Arc<dyn KeyValueCache<CachedDataModel>>,
    config: MicroCacheConfig,
    generation: AtomicU64,
}

impl MicroCache {
    pub fn new(store: Arc<dyn KeyValueCache<CachedDataModel>>, config: MicroCacheConfig) -> Self {
        Self {
            store,
            config,
            generation: AtomicU64::new(0),
        }
    }

    /// Micro-cache backed by an in-process LRU.
    pub fn in_memory(config: MicroCacheConfig) -> Self {
        let store = Arc::new(MemoryCache::new(&config));
        Self::new(store, config)
    }

    pub fn ttl(&self) -> Duration {
        self.config.ttl()
    }

    /// Content generation. Bumped whenever the namespace is cleared.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn try_read(&self, key: &str) -> Option<CachedDataModel> {
        if !self.config.enabled {
            debug!(cache = "micro", outcome = "disabled", key);
            return None;
        }

        match self.store.get(key) {
            Ok(Some(model)) => {
                counter!(METRIC_HIT).increment(1);
                debug!(cache = "micro", outcome = "hit", key);
                Some(model)
            }
            Ok(None) => {
                counter!(METRIC_MISS).increment(1);
                debug!(cache = "micro", outcome = "miss", key);
                None
            }
            Err(fault) => {
                counter!(METRIC_FAULT, "op" => "read").increment(1);
                counter!(METRIC_MISS).increment(1);
                warn!(cache = "micro", outcome = "fault", key, error = %fault, "Micro-cache read failed");
                None
            }
        }
    }

    /// Store the model produced by `producer` under `key` for `ttl`.
    pub fn write<'a, F>(&self, key: String, producer: F, ttl: Duration)
    where
        F: FnOnce() -> CachedDataModel + Send + 'a,
    {
        if !self.config.enabled {
            return;
        }

        if let Err(fault) = self.store.insert(key.clone(), Box::new(producer), ttl) {
            counter!(METRIC_FAULT, "op" => "write").increment(1);
            warn!(cache = "micro", outcome = "fault", key = %key, error = %fault, "Micro-cache write failed");
            return;
        }
        debug!(cache = "micro", outcome = "stored", key = %key, ttl_secs = ttl.as_secs());
    }

    /// Remove every entry under `prefix` and start a new generation.
    pub fn clear_namespace(&self, prefix: &str) -> usize {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        counter!(METRIC_CLEAR).increment(1);

        match self.store.clear_by_prefix(prefix) {
            Ok(removed) => {
                debug!(cache = "micro", outcome = "cleared", prefix, removed, generation);
                removed
            }
            Err(fault) => {
                counter!(METRIC_FAULT, "op" => "clear").increment(1);
                warn!(cache = "micro", outcome = "fault", prefix, error = %fault, "Micro-cache clear failed");
                0
            }
        }
    }

    /// Invalidate the micro-cache after a content change.
    pub fn handle(&self, event: &ContentEvent) -> usize {
        info!(
            event_id = %event.id,
            kind = %event.kind,
            ids = ?event.ids,
            "Content changed, clearing micro-cache"
        );
        self.clear_namespace(CACHE_PREFIX)
    }
}
