//! Store Module
//!
//! The remote key/value boundary the cache adapter talks to.

mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use redis_store::{RedisStore, RetryPolicy};

// == Store Trait ==
/// Round trips against a remote key/value store.
///
/// Implementations must be safe for concurrent use; the adapter shares one
/// store across every cache instance a provider creates.
#[async_trait]
pub trait Store: Send + Sync {
    /// Connection handshake.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Reads `key`. `Ok(None)` is a miss, never an error.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Writes `value` under `key`. `None` means the key never expires.
    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Re-arms the expiration of `key`. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Deletes `key`. Returns false if the key did not exist.
    async fn del(&self, key: &str) -> Result<bool, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError>;

    /// Deletes every key in the backing database.
    async fn flush_db(&self) -> Result<(), StoreError>;
}
