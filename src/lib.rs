//! Redis Cache Provider - A cache adapter over a Redis-compatible store
//!
//! Provides typed `get`/`put` with self-describing entry encoding, per-cache
//! key namespacing and fixed or sliding expiration.

pub mod cache;
pub mod codec;
pub mod config;
pub mod error;
pub mod store;
pub mod tasks;

pub use cache::{Cache, CacheStats, Provider, RedisCache};
pub use config::{CacheConfig, EvictionMode, ProviderConfig};
pub use error::{CacheError, Result, StoreError};
pub use store::Store;
