//! Redis Store Module
//!
//! `Store` implementation over a deadpool-redis connection pool.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Pool, PoolConfig as PoolSizing, Runtime};
use redis::{Cmd, FromRedisValue};
use tracing::{debug, warn};

use crate::config::{ProviderConfig, RetryBackoff};
use crate::error::{CacheError, Result, StoreError};
use crate::store::Store;

// == Retry Policy ==
/// How often and how patiently transport faults are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: RetryBackoff,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (zero based): `min * 2^attempt`,
    /// capped at `max` and never below `min`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff
            .min
            .saturating_mul(factor)
            .min(self.backoff.max)
            .max(self.backoff.min)
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or
    /// `max_retries` retries are spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> std::result::Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff(attempt);
                    warn!(attempt = attempt + 1, error = %e, "redis command failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// == Redis Store ==
/// Pooled Redis connection handle.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    command_timeout: Duration,
    retry: RetryPolicy,
}

impl RedisStore {
    // == Constructor ==
    /// Builds the connection pool described by `config`.
    ///
    /// No connection is opened here; the first command (usually `ping`) does that.
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;

        let mut sizing = PoolSizing::new(config.pool_size);
        sizing.timeouts.wait = Some(config.timeout.pool);
        sizing.timeouts.create = Some(config.timeout.connect);
        sizing.timeouts.recycle = Some(config.timeout.read);

        let mut pool_config = PoolConfig::from_url(config.connection_url()?);
        pool_config.pool = Some(sizing);

        let pool = pool_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Configuration(format!("failed to create redis pool: {}", e)))?;

        Ok(Self {
            pool,
            command_timeout: config.timeout.write + config.timeout.read,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                backoff: config.retry_backoff.clone(),
            },
        })
    }

    /// The underlying pool, for commands the cache contract does not cover.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    // == Query ==
    /// Runs `cmd`, retrying transport faults per the retry policy.
    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> std::result::Result<T, StoreError> {
        self.retry.run(|| self.query_once(cmd)).await
    }

    async fn query_once<T: FromRedisValue>(&self, cmd: &Cmd) -> std::result::Result<T, StoreError> {
        let mut conn = self.pool.get().await?;
        match tokio::time::timeout(self.command_timeout, cmd.query_async(&mut *conn)).await {
            Ok(reply) => reply.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.command_timeout)),
        }
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> std::result::Result<(), StoreError> {
        let reply: String = self.query(&redis::cmd("PING")).await?;
        debug!(reply = %reply, "redis ping");
        Ok(())
    }

    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        let mut cmd = redis::cmd("GET");
        cmd.arg(key);
        self.query(&cmd).await
    }

    async fn set(
        &self,
        key: &str,
        value: &[u8],
        ttl: Option<Duration>,
    ) -> std::result::Result<(), StoreError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        self.query(&cmd).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> std::result::Result<bool, StoreError> {
        let mut cmd = redis::cmd("PEXPIRE");
        cmd.arg(key).arg(ttl_millis(ttl));
        self.query(&cmd).await
    }

    async fn del(&self, key: &str) -> std::result::Result<bool, StoreError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let removed: u64 = self.query(&cmd).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> std::result::Result<bool, StoreError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(key);
        let count: u64 = self.query(&cmd).await?;
        Ok(count > 0)
    }

    async fn flush_db(&self) -> std::result::Result<(), StoreError> {
        self.query(&redis::cmd("FLUSHDB")).await
    }
}

/// Redis rejects a zero PX, so sub-millisecond lifetimes round up to 1ms.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
