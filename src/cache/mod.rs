//! Micro-cache for SPA data models.
//!
//! A short-TTL cache sitting in front of the build phases of the request
//! pipeline. Keys are derived from the normalized request arguments and share
//! a single namespace prefix, which is the only unit of invalidation.
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 60
//! capacity = 1000
//! ```

mod config;
mod events;
mod keys;
mod lock;
mod micro;
mod store;

pub use config::MicroCacheConfig;
pub use events::{ContentEvent, ContentEventKind};
pub use keys::{CACHE_PREFIX, cache_key};
pub use micro::{
    CachedDataModel, METRIC_CLEAR, METRIC_FAULT, METRIC_HIT, METRIC_MISS, MicroCache,
};
pub use store::{CacheFault, KeyValueCache, MemoryCache, Producer};
