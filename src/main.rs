//! Cache Probe - connects a Redis cache provider and exercises one cache
//!
//! Reads `REDIS_ADDRESS`, `REDIS_PASSWORD` and `REDIS_DB` from the environment.

use std::env;
use std::time::Duration;

use anyhow::Context;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use redis_cache_provider::{Cache, CacheConfig, EvictionMode, Provider};

const PROVIDER_NAME: &str = "redis";
const PROBE_KEY: &str = "probe";

/// Main entry point for the cache probe.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Build the provider configuration tree from environment variables
/// 3. Connect the provider (fails fast on a bad role or unreachable server)
/// 4. Create a sliding cache and run put/get/exists/delete against it
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "redis_cache_provider=info,cache_probe=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let tree = json!({
        "cache": {
            PROVIDER_NAME: {
                "provider": "redis",
                "address": env::var("REDIS_ADDRESS").unwrap_or_else(|_| ":6379".to_string()),
                "password": env::var("REDIS_PASSWORD").unwrap_or_default(),
                "db": env::var("REDIS_DB").unwrap_or_else(|_| "0".to_string()),
            }
        }
    });

    let provider = Provider::initialize(PROVIDER_NAME, &tree)
        .await
        .context("cache provider failed to initialize")?;

    let cache = provider.create(CacheConfig::new("probe", EvictionMode::Sliding))?;
    let ttl = Duration::from_secs(30);

    cache
        .put(PROBE_KEY, &"hello from cache_probe".to_string(), ttl)
        .await
        .context("probe write failed")?;

    match cache.get::<String>(PROBE_KEY).await {
        Some(value) => info!("read back '{}'", value),
        None => warn!("probe key was not readable after write"),
    }
    info!("exists: {}", cache.exists(PROBE_KEY).await);

    cache.delete(PROBE_KEY).await.context("probe delete failed")?;
    info!("exists after delete: {}", cache.exists(PROBE_KEY).await);
    info!("stats: {:?}", cache.stats());

    Ok(())
}
