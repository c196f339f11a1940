//! Shared test helpers: an in-memory `Store` double with TTL support.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use redis_cache_provider::{Provider, ProviderConfig, Store, StoreError};

// == Memory Store ==
/// In-process stand-in for a Redis server.
///
/// Expiration follows tokio's clock so tests can run with paused time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (Vec<u8>, Option<Instant>)>>,
    failing: AtomicBool,
    expire_failing: AtomicBool,
    expire_calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every subsequent command fail as if the server were unreachable.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Makes only `expire` fail, leaving reads and writes healthy.
    pub fn set_expire_failing(&self, failing: bool) {
        self.expire_failing.store(failing, Ordering::SeqCst);
    }

    /// Stores bytes directly, bypassing the codec.
    pub fn insert_raw(&self, key: &str, value: &[u8]) {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_vec(), None));
    }

    /// Live keys as the store sees them, sorted.
    pub fn raw_keys(&self) -> Vec<String> {
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, (_, deadline))| deadline.map_or(true, |d| d > now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn expire_calls(&self) -> usize {
        self.expire_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    fn live<'a>(
        entries: &'a mut HashMap<String, (Vec<u8>, Option<Instant>)>,
        key: &str,
    ) -> Option<&'a mut (Vec<u8>, Option<Instant>)> {
        let expired = matches!(entries.get(key), Some((_, Some(deadline))) if *deadline <= Instant::now());
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get_mut(key)
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.check()?;
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key).map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> Result<(), StoreError> {
        self.check()?;
        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_vec(), deadline));
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.check()?;
        self.expire_calls.fetch_add(1, Ordering::SeqCst);
        if self.expire_failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("expire rejected".to_string()));
        }
        let mut entries = self.entries.lock();
        match Self::live(&mut entries, key) {
            Some((_, deadline)) => {
                *deadline = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn del(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        let mut entries = self.entries.lock();
        let existed = Self::live(&mut entries, key).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        let mut entries = self.entries.lock();
        Ok(Self::live(&mut entries, key).is_some())
    }

    async fn flush_db(&self) -> Result<(), StoreError> {
        self.check()?;
        self.entries.lock().clear();
        Ok(())
    }
}

// == Helper Functions ==

/// Provider named "redis1" over `store` with default settings.
pub async fn provider_with(store: &Arc<MemoryStore>) -> Provider {
    Provider::with_store("redis1", ProviderConfig::default(), store.clone())
        .await
        .expect("provider should initialize over a healthy store")
}
