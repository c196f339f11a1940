//! Integration Tests for the Cache Adapter
//!
//! Runs every cache operation through a provider over an in-memory store.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use common::{provider_with, MemoryStore};
use redis_cache_provider::{
    Cache, CacheConfig, CacheError, EvictionMode, Provider, ProviderConfig,
};

const TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Sample {
    name: String,
    present: bool,
    value: String,
}

fn sample() -> Sample {
    Sample {
        name: "Jeeva".to_string(),
        present: true,
        value: "redis cache provider".to_string(),
    }
}

fn fixed(name: &str) -> CacheConfig {
    CacheConfig::new(name, EvictionMode::Fixed)
}

fn sliding(name: &str) -> CacheConfig {
    CacheConfig::new(name, EvictionMode::Sliding)
}

// == Provider Tests ==

#[tokio::test]
async fn test_provider_rejects_wrong_role() {
    let store = MemoryStore::new();
    let config = ProviderConfig {
        provider: "myredis".to_string(),
        ..ProviderConfig::default()
    };

    let result = Provider::with_store("redis1", config, store).await;
    assert!(matches!(result, Err(CacheError::Configuration(_))));
}

#[tokio::test]
async fn test_provider_role_is_case_insensitive() {
    let store = MemoryStore::new();
    let config = ProviderConfig {
        provider: "REDIS".to_string(),
        ..ProviderConfig::default()
    };

    assert!(Provider::with_store("redis1", config, store).await.is_ok());
}

#[tokio::test]
async fn test_provider_fails_fast_when_ping_fails() {
    let store = MemoryStore::new();
    store.set_failing(true);

    let result = Provider::with_store("redis1", ProviderConfig::default(), store).await;
    assert!(matches!(result, Err(CacheError::Connectivity(_))));
}

#[tokio::test]
async fn test_provider_initialize_rejects_invalid_address() {
    let tree = serde_json::json!({
        "cache": { "redis1": { "provider": "redis", "address": "localhost:637967" } }
    });

    let result = Provider::initialize("redis1", &tree).await;
    assert!(matches!(result, Err(CacheError::Configuration(_))));
}

#[tokio::test]
async fn test_create_names_cache_and_prefix() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;

    let cache = provider.create(fixed("addgetcache")).unwrap();
    assert_eq!(cache.name(), "addgetcache");
    assert_eq!(cache.key_prefix(), "addgetcache-");
    assert_eq!(provider.name(), "redis1");
    assert!(provider.client().is_none(), "Injected stores expose no pool");
}

#[tokio::test]
async fn test_create_rejects_empty_name() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;

    assert!(matches!(
        provider.create(fixed("")),
        Err(CacheError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_keys_are_stored_with_prefix() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    cache.put("key1", &1i32, TTL).await.unwrap();
    assert_eq!(store.raw_keys(), vec!["cache1-key1".to_string()]);
}

// == Round Trip Tests ==

#[tokio::test]
async fn test_roundtrip_primitives() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    cache.put("key1", &342348347i64, TTL).await.unwrap();
    cache.put("key2", &0.78346374f64, TTL).await.unwrap();
    cache
        .put("key3", &"This is my cache string".to_string(), TTL)
        .await
        .unwrap();

    assert_eq!(cache.get::<i64>("key1").await, Some(342348347));
    assert_eq!(cache.get::<f64>("key2").await, Some(0.78346374));
    assert_eq!(
        cache.get::<String>("key3").await.as_deref(),
        Some("This is my cache string")
    );
}

#[tokio::test]
async fn test_unregistered_type_rejected_until_registered() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    let result = cache.put("pre-test-key1", &sample(), TTL).await;
    assert!(matches!(result, Err(CacheError::Encoding(_))));
    assert!(!cache.exists("pre-test-key1").await);

    provider.register::<Sample>().unwrap();
    cache.put("pre-test-key1", &sample(), TTL).await.unwrap();
    assert_eq!(cache.get::<Sample>("pre-test-key1").await, Some(sample()));
}

#[tokio::test]
async fn test_roundtrip_registered_map() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    provider
        .register_as::<HashMap<String, String>>("string-map")
        .unwrap();
    let cache = provider.create(fixed("cache1")).unwrap();

    let mut map = HashMap::new();
    map.insert("key1".to_string(), "343434".to_string());
    map.insert("key2".to_string(), "kjdhdsjkdhjs".to_string());

    cache.put("key4", &map, TTL).await.unwrap();
    assert_eq!(cache.get::<HashMap<String, String>>("key4").await, Some(map));
}

#[tokio::test]
async fn test_registration_shared_across_instances() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let writer = provider.create(fixed("writer")).unwrap();
    provider.register::<Sample>().unwrap();
    let late = provider.create(fixed("late")).unwrap();

    writer.put("k", &sample(), TTL).await.unwrap();
    late.put("k", &sample(), TTL).await.unwrap();
    assert_eq!(late.get::<Sample>("k").await, Some(sample()));
}

// == Miss Semantics Tests ==

#[tokio::test]
async fn test_get_never_written_is_absent() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    assert_eq!(cache.get::<i32>("missing").await, None);
    assert!(!cache.exists("missing").await);

    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.read_errors, 0);
}

#[tokio::test]
async fn test_get_after_delete_is_absent() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    cache.put("key1", &7u32, TTL).await.unwrap();
    assert!(cache.exists("key1").await);

    cache.delete("key1").await.unwrap();
    assert_eq!(cache.get::<u32>("key1").await, None);
    assert!(!cache.exists("key1").await);
}

#[tokio::test]
async fn test_delete_absent_key_succeeds() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    assert!(cache.delete("never-written").await.is_ok());
    assert!(cache.delete("never-written").await.is_ok());
}

#[tokio::test]
async fn test_get_with_wrong_type_is_absent() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    cache.put("key1", &"text".to_string(), TTL).await.unwrap();
    assert_eq!(cache.get::<u64>("key1").await, None);
    assert_eq!(cache.stats().read_errors, 1);
}

#[tokio::test]
async fn test_corrupt_payload_is_absent() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    store.insert_raw("cache1-key1", b"{\"not\":\"an entry\"}");
    assert_eq!(cache.get::<String>("key1").await, None);
    assert!(cache.exists("key1").await, "Raw key is still present");
    assert_eq!(cache.stats().read_errors, 1);
}

// == Namespace Isolation Tests ==

#[tokio::test]
async fn test_instances_do_not_share_keys() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let a = provider.create(fixed("testcache1")).unwrap();
    let b = provider.create(fixed("testcache2")).unwrap();

    a.put("key_1", &1i32, TTL).await.unwrap();

    assert_eq!(b.get::<i32>("key_1").await, None);
    assert!(!b.exists("key_1").await);

    b.put("key_1", &2i32, TTL).await.unwrap();
    assert_eq!(a.get::<i32>("key_1").await, Some(1));
    assert_eq!(b.get::<i32>("key_1").await, Some(2));

    b.delete("key_1").await.unwrap();
    assert_eq!(a.get::<i32>("key_1").await, Some(1));
}

// == GetOrPut Tests ==

#[tokio::test]
async fn test_get_or_put_keeps_first_value() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    let first = cache
        .get_or_put("key1", "first".to_string(), TTL)
        .await
        .unwrap();
    assert_eq!(first, "first");

    let second = cache
        .get_or_put("key1", "second".to_string(), TTL)
        .await
        .unwrap();
    assert_eq!(second, "first");
}

#[tokio::test]
async fn test_get_or_put_propagates_encoding_failure() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    let result = cache.get_or_put("key1", sample(), TTL).await;
    assert!(matches!(result, Err(CacheError::Encoding(_))));
}

// == Expiration Tests ==

#[tokio::test(start_paused = true)]
async fn test_fixed_entry_expires_despite_reads() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    cache.put("key1", &5i32, TTL).await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get::<i32>("key1").await, Some(5));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get::<i32>("key1").await, None);
    assert_eq!(store.expire_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_sliding_entry_outlives_initial_ttl() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(sliding("cache1")).unwrap();

    cache.put("key1", &5i32, TTL).await.unwrap();

    // Read every 2s; the initial deadline (3s) passes without expiry.
    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(cache.get::<i32>("key1").await, Some(5));
    }

    // No reads for longer than the ttl: gone.
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(cache.get::<i32>("key1").await, None);
}

#[tokio::test]
async fn test_failed_sliding_refresh_still_returns_value() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(sliding("cache1")).unwrap();
    cache.put("key1", &5i32, TTL).await.unwrap();

    store.set_expire_failing(true);

    assert_eq!(cache.get::<i32>("key1").await, Some(5));
    assert_eq!(store.expire_calls(), 1);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.read_errors, 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_ttl_never_expires() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(sliding("cache1")).unwrap();

    cache.put("key1", &1u8, Duration::ZERO).await.unwrap();
    tokio::time::sleep(Duration::from_secs(3600)).await;

    assert_eq!(cache.get::<u8>("key1").await, Some(1));
    assert_eq!(store.expire_calls(), 0, "No refresh for entries without ttl");
}

#[tokio::test(start_paused = true)]
async fn test_sliding_get_or_put_refreshes() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(sliding("addgetcache")).unwrap();

    for i in 0..20 {
        cache.put(&format!("key_{}", i), &i, TTL).await.unwrap();
    }
    for i in 5..10 {
        let v = cache.get_or_put(&format!("key_{}", i), i, TTL).await.unwrap();
        assert_eq!(v, i);
    }
    assert_eq!(store.expire_calls(), 5);
}

// == Flush Tests ==

#[tokio::test]
async fn test_flush_clears_every_instance() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let a = provider.create(fixed("testcache1")).unwrap();
    let b = provider.create(fixed("testcache2")).unwrap();

    for i in 0..5 {
        a.put(&format!("key_{}", i), &i, TTL).await.unwrap();
        b.put(&format!("key_{}", i), &i, TTL).await.unwrap();
    }

    a.flush().await.unwrap();

    for i in 0..5 {
        assert!(!a.exists(&format!("key_{}", i)).await);
        assert!(!b.exists(&format!("key_{}", i)).await);
    }
    assert!(store.raw_keys().is_empty());
}

// == Store Failure Tests ==

#[tokio::test]
async fn test_read_failures_degrade_to_absent() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();
    cache.put("key1", &1i32, TTL).await.unwrap();

    store.set_failing(true);

    assert_eq!(cache.get::<i32>("key1").await, None);
    assert!(!cache.exists("key1").await);

    let stats = cache.stats();
    assert_eq!(stats.read_errors, 1);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn test_write_failures_are_surfaced() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    store.set_failing(true);

    assert!(matches!(
        cache.put("key1", &1i32, TTL).await,
        Err(CacheError::Connectivity(_))
    ));
    assert!(matches!(
        cache.delete("key1").await,
        Err(CacheError::Connectivity(_))
    ));
    assert!(matches!(cache.flush().await, Err(CacheError::Connectivity(_))));
    assert!(matches!(
        cache.get_or_put("key1", 1i32, TTL).await,
        Err(CacheError::Connectivity(_))
    ));
}

#[tokio::test]
async fn test_failed_writes_release_buffers() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("cache1")).unwrap();

    store.set_failing(true);
    for i in 0..10 {
        let _ = cache.put(&format!("key_{}", i), &i, TTL).await;
    }
    store.set_failing(false);

    cache.put("after", &"fresh".to_string(), TTL).await.unwrap();
    assert_eq!(cache.get::<String>("after").await.as_deref(), Some("fresh"));
}

// == Concurrency Tests ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_puts_to_distinct_keys() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = provider.create(fixed("concurrent")).unwrap();

    let handles: Vec<_> = (0..64u32)
        .map(|i| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.put(&format!("key_{}", i), &i, TTL).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for i in 0..64u32 {
        assert_eq!(cache.get::<u32>(&format!("key_{}", i)).await, Some(i));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_get_or_put_leaves_one_value() {
    let store = MemoryStore::new();
    let provider = provider_with(&store).await;
    let cache = Arc::new(provider.create(fixed("race")).unwrap());

    let handles: Vec<_> = (0..16u32)
        .map(|i| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get_or_put("contended", i, TTL).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let stored = cache.get::<u32>("contended").await.unwrap();
    assert!(stored < 16, "Final value must be one of the attempted values");
    assert_eq!(store.raw_keys(), vec!["race-contended".to_string()]);
}
