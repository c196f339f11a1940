//! Redis Cache Adapter
//!
//! Implements the cache contract with entry encoding, key prefixing and
//! fixed or sliding expiration.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::provider::Shared;
use crate::cache::stats::StatsRecorder;
use crate::cache::{Cache, CacheStats, KEY_SEPARATOR};
use crate::codec::Entry;
use crate::config::EvictionMode;
use crate::error::Result;

// == Redis Cache ==
/// A named cache instance backed by a provider's store.
///
/// Cloning is cheap; clones share the store, codec and statistics.
#[derive(Clone)]
pub struct RedisCache {
    name: String,
    key_prefix: String,
    eviction_mode: EvictionMode,
    shared: Arc<Shared>,
    stats: Arc<StatsRecorder>,
}

impl RedisCache {
    // == Constructor ==
    pub(crate) fn new(name: String, eviction_mode: EvictionMode, shared: Arc<Shared>) -> Self {
        let key_prefix = format!("{}{}", name, KEY_SEPARATOR);
        Self {
            name,
            key_prefix,
            eviction_mode,
            shared,
            stats: Arc::new(StatsRecorder::default()),
        }
    }

    /// Prefix prepended to every logical key.
    pub fn key_prefix(&self) -> &str {
        &self.key_prefix
    }

    pub fn eviction_mode(&self) -> EvictionMode {
        self.eviction_mode
    }

    /// Read counters for this instance.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    fn prefixed(&self, key: &str) -> String {
        let mut full = String::with_capacity(self.key_prefix.len() + key.len());
        full.push_str(&self.key_prefix);
        full.push_str(key);
        full
    }

    /// Re-arms the entry's lifetime after a successful read. Failures only log.
    async fn refresh(&self, key: &str, full_key: &str, ttl: Duration) {
        match self.shared.store.expire(full_key, ttl).await {
            Ok(true) => {}
            Ok(false) => debug!(cache = %self.name, key, "entry expired before its ttl was refreshed"),
            Err(e) => warn!(cache = %self.name, key, error = %e, "failed to refresh sliding ttl"),
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let full_key = self.prefixed(key);

        let bytes = match self.shared.store.get(&full_key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                self.stats.record_miss();
                return None;
            }
            Err(e) => {
                error!(cache = %self.name, key, error = %e, "cache read failed");
                self.stats.record_read_error();
                return None;
            }
        };

        let entry: Entry<T> = match self.shared.codec.decode(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                error!(cache = %self.name, key, error = %e, "cached entry could not be decoded");
                self.stats.record_read_error();
                return None;
            }
        };

        if self.eviction_mode == EvictionMode::Sliding && !entry.ttl.is_zero() {
            self.refresh(key, &full_key, entry.ttl).await;
        }

        self.stats.record_hit();
        Some(entry.value)
    }

    async fn put<T>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>
    where
        T: Serialize + Sync + 'static,
    {
        let buf = self.shared.codec.encode(ttl, value)?;
        let expiry = (!ttl.is_zero()).then_some(ttl);

        self.shared
            .store
            .set(&self.prefixed(key), &buf, expiry)
            .await?;
        debug!(cache = %self.name, key, bytes = buf.len(), "cache entry stored");
        Ok(())
    }

    async fn get_or_put<T>(&self, key: &str, value: T, ttl: Duration) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        if let Some(existing) = self.get::<T>(key).await {
            return Ok(existing);
        }
        self.put(key, &value, ttl).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let removed = self.shared.store.del(&self.prefixed(key)).await?;
        if !removed {
            debug!(cache = %self.name, key, "delete of absent key");
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> bool {
        match self.shared.store.exists(&self.prefixed(key)).await {
            Ok(found) => found,
            Err(e) => {
                error!(cache = %self.name, key, error = %e, "cache existence check failed");
                false
            }
        }
    }

    async fn flush(&self) -> Result<()> {
        self.shared.store.flush_db().await?;
        info!(cache = %self.name, "backing database flushed");
        Ok(())
    }
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("name", &self.name)
            .field("eviction_mode", &self.eviction_mode)
            .finish_non_exhaustive()
    }
}
