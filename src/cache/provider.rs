//! Cache Provider
//!
//! Owns the store connection and entry codec shared by every cache instance
//! it creates.

use std::sync::Arc;

use deadpool_redis::Pool;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cache::RedisCache;
use crate::codec::EntryCodec;
use crate::config::{CacheConfig, ProviderConfig};
use crate::error::{CacheError, Result};
use crate::store::{RedisStore, Store};
use crate::tasks::spawn_idle_reaper;

/// State shared between a provider and its cache instances.
pub(crate) struct Shared {
    pub store: Arc<dyn Store>,
    pub codec: EntryCodec,
}

// == Provider ==
/// A connected Redis cache provider.
///
/// Create one per configured provider at startup, register the value types
/// the application caches, then create named cache instances from it.
pub struct Provider {
    name: String,
    config: ProviderConfig,
    shared: Arc<Shared>,
    pool: Option<Pool>,
    reaper: Option<JoinHandle<()>>,
}

impl Provider {
    // == Initialize ==
    /// Reads `cache.<name>.*` from `tree` and connects.
    pub async fn initialize(name: &str, tree: &Value) -> Result<Self> {
        let config = ProviderConfig::from_tree(name, tree);
        Self::connect(name, config).await
    }

    /// Connects to the Redis server described by `config`.
    ///
    /// Fails if the provider role is not "redis" or the server does not
    /// answer a ping.
    pub async fn connect(name: &str, config: ProviderConfig) -> Result<Self> {
        config.validate()?;
        let store = RedisStore::new(&config)?;
        let pool = store.pool().clone();

        let mut provider = Self::with_store(name, config, Arc::new(store)).await?;

        let idle = provider.config.timeout.idle;
        let interval = provider.config.idle_check_interval;
        if !idle.is_zero() && !interval.is_zero() {
            provider.reaper = Some(spawn_idle_reaper(pool.clone(), idle, interval));
        }
        provider.pool = Some(pool);
        Ok(provider)
    }

    /// Builds a provider over an already constructed store.
    ///
    /// Applies the same role check and ping as [`connect`](Self::connect).
    pub async fn with_store(
        name: &str,
        config: ProviderConfig,
        store: Arc<dyn Store>,
    ) -> Result<Self> {
        config.validate()?;

        if let Err(e) = store.ping().await {
            error!(provider = name, address = %config.address, error = %e, "cache provider handshake failed");
            return Err(CacheError::Connectivity(e));
        }

        info!(
            "cache provider {} connected successfully with {}",
            name, config.address
        );

        Ok(Self {
            name: name.to_string(),
            config,
            shared: Arc::new(Shared {
                store,
                codec: EntryCodec::default(),
            }),
            pool: None,
            reaper: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    // == Type Registration ==
    /// Makes `T` storable by every cache instance of this provider.
    ///
    /// Primitive scalars and `String` are registered already.
    pub fn register<T: 'static>(&self) -> Result<()> {
        self.shared.codec.registry().register::<T>()
    }

    /// Registers `T` under a tag that stays stable across builds.
    pub fn register_as<T: 'static>(&self, tag: &str) -> Result<()> {
        self.shared.codec.registry().register_as::<T>(tag)
    }

    // == Create ==
    /// Creates a named cache instance sharing this provider's connection.
    pub fn create(&self, config: CacheConfig) -> Result<RedisCache> {
        if config.name.is_empty() {
            return Err(CacheError::Configuration(
                "cache name must not be empty".to_string(),
            ));
        }
        info!(
            provider = %self.name,
            "creating cache {} ({:?} eviction)",
            config.name, config.eviction_mode
        );
        Ok(RedisCache::new(
            config.name,
            config.eviction_mode,
            Arc::clone(&self.shared),
        ))
    }

    // == Escape Hatches ==
    /// The raw connection pool, when connected through [`connect`](Self::connect).
    pub fn client(&self) -> Option<&Pool> {
        self.pool.as_ref()
    }

    /// The store every cache instance talks to.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.shared.store
    }
}

impl Drop for Provider {
    fn drop(&mut self) {
        if let Some(reaper) = self.reaper.take() {
            reaper.abort();
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("address", &self.config.address)
            .field("db", &self.config.db)
            .field("connected_pool", &self.pool.is_some())
            .finish()
    }
}
