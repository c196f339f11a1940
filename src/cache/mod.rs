//! Cache Module
//!
//! The uniform cache contract and its Redis-backed implementation.

mod adapter;
mod provider;
mod stats;

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

// Re-export public types
pub use adapter::RedisCache;
pub use provider::Provider;
pub use stats::CacheStats;

// == Public Constants ==
/// Joins a cache name and a logical key into the stored key
pub const KEY_SEPARATOR: &str = "-";

// == Cache Trait ==
/// Operations every named cache instance supports.
///
/// A `ttl` of zero stores the entry without expiration.
#[async_trait]
pub trait Cache: Send + Sync {
    /// The logical cache name.
    fn name(&self) -> &str;

    /// Returns the value stored under `key`, or `None` on a miss.
    ///
    /// Store and decode failures are logged and also return `None`.
    async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Send + 'static;

    /// Stores `value` under `key` for `ttl`.
    async fn put<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + Sync + 'static;

    /// Returns the stored value, or stores `value` and returns it.
    ///
    /// Not atomic: concurrent callers racing on an absent key may all store,
    /// and the last write wins.
    async fn get_or_put<T>(&self, key: &str, value: T, ttl: Duration) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns true if `key` is present. Store failures are logged and report false.
    async fn exists(&self, key: &str) -> bool;

    /// Empties the whole backing database, including keys of every other
    /// cache instance sharing it.
    async fn flush(&self) -> Result<()>;
}
