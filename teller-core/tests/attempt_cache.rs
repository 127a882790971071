//! Credential reads through the attempt cache.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use teller_config::AttemptCacheConfig;
use teller_core::auth::infrastructure::{
    CachedCredentialStore, InMemoryAttemptCache,
};
use teller_core::auth::{
    AttemptCache, AuthError, CacheKeys, CredentialRecord, CredentialStore,
};

#[path = "support/mod.rs"]
mod support;

use support::{AuthHarness, TEST_PIN, TEST_USERNAME, WRONG_PIN};

fn cache_config() -> AttemptCacheConfig {
    AttemptCacheConfig {
        ttl: Duration::from_secs(60),
        write_timeout: Duration::from_millis(250),
    }
}

/// Cache whose writes always fail and whose reads always miss.
#[derive(Debug)]
struct BrokenCache;

#[async_trait]
impl AttemptCache for BrokenCache {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Err(anyhow!("cache unavailable"))
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(anyhow!("cache unavailable"))
    }
}

/// Keeps answering reads with whatever it held first and rejects writes.
#[derive(Debug, Default)]
struct StuckCache {
    inner: InMemoryAttemptCache,
}

#[async_trait]
impl AttemptCache for StuckCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        if self.inner.get(key).await?.is_some() {
            return Err(anyhow!("cache is read-only"));
        }
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, _key: &str) -> Result<()> {
        Err(anyhow!("cache is read-only"))
    }
}

async fn cached_entry(
    cache: &InMemoryAttemptCache,
    username: &str,
) -> Option<CredentialRecord> {
    let bytes = cache
        .get(&CacheKeys::credential(username))
        .await
        .ok()??;
    serde_json::from_slice(&bytes).ok()
}

#[tokio::test]
async fn miss_writes_the_record_back() -> Result<()> {
    let harness = AuthHarness::new()?;
    let user_id = harness.create_user(TEST_USERNAME, TEST_PIN).await?;
    let cached = CachedCredentialStore::new(
        harness.store.clone(),
        harness.cache.clone(),
        cache_config(),
    );

    let found = cached.find_by_username(TEST_USERNAME).await?;
    assert_eq!(found.map(|r| r.user_id), Some(user_id));

    let entry = cached_entry(&harness.cache, TEST_USERNAME)
        .await
        .expect("cache populated after miss");
    assert_eq!(entry.user_id, user_id);
    assert_eq!(entry.failed_attempts, 0);
    Ok(())
}

#[tokio::test]
async fn failing_cache_never_changes_outcomes() -> Result<()> {
    let harness = AuthHarness::new()?;
    let user_id = harness.create_user(TEST_USERNAME, TEST_PIN).await?;
    let cached = Arc::new(CachedCredentialStore::new(
        harness.store.clone(),
        Arc::new(BrokenCache),
        cache_config(),
    ));
    let service = harness.service_over(cached);

    let err = service
        .verify_pin(TEST_USERNAME, WRONG_PIN)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::InvalidPin {
            remaining_attempts: 2
        }
    ));
    assert_eq!(harness.record(user_id).await.failed_attempts, 1);

    service.verify_pin(TEST_USERNAME, TEST_PIN).await?;
    assert_eq!(harness.record(user_id).await.failed_attempts, 0);
    Ok(())
}

#[tokio::test]
async fn failed_attempt_refreshes_cached_counter() -> Result<()> {
    let harness = AuthHarness::new()?;
    harness.create_user(TEST_USERNAME, TEST_PIN).await?;
    let cached = Arc::new(CachedCredentialStore::new(
        harness.store.clone(),
        harness.cache.clone(),
        cache_config(),
    ));
    let service = harness.service_over(cached);

    let _ = service.verify_pin(TEST_USERNAME, WRONG_PIN).await;

    // Written through before the PIN check returns.
    let entry = cached_entry(&harness.cache, TEST_USERNAME)
        .await
        .expect("cache entry present");
    assert_eq!(entry.failed_attempts, 1);
    Ok(())
}

async fn assert_locks_after_threshold(
    harness: &AuthHarness,
    cache: Arc<dyn AttemptCache>,
) -> Result<()> {
    let user_id = harness.create_user(TEST_USERNAME, TEST_PIN).await?;
    let cached = Arc::new(CachedCredentialStore::new(
        harness.store.clone(),
        cache,
        cache_config(),
    ));
    // Warm the cache with the clean record.
    cached.find_by_username(TEST_USERNAME).await?;
    let service = harness.service_over(cached);

    for remaining in [2, 1] {
        let err = service
            .verify_pin(TEST_USERNAME, WRONG_PIN)
            .await
            .unwrap_err();
        assert!(
            matches!(err, AuthError::InvalidPin { remaining_attempts } if remaining_attempts == remaining),
            "got {err:?}"
        );
    }

    let err = service
        .verify_pin(TEST_USERNAME, WRONG_PIN)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::PinLocked { .. }), "got {err:?}");
    assert_eq!(harness.record(user_id).await.failed_attempts, 3);

    let err = service.verify_pin(TEST_USERNAME, TEST_PIN).await.unwrap_err();
    assert!(matches!(err, AuthError::PinLocked { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn consecutive_failures_through_cache_lock() -> Result<()> {
    let harness = AuthHarness::new()?;
    let cache = harness.cache.clone();
    assert_locks_after_threshold(&harness, cache).await
}

#[tokio::test]
async fn stuck_cache_entry_cannot_hold_back_the_counter() -> Result<()> {
    let harness = AuthHarness::new()?;
    assert_locks_after_threshold(&harness, Arc::new(StuckCache::default()))
        .await
}

#[tokio::test]
async fn unlock_from_another_instance_clears_the_cached_lock() -> Result<()> {
    let harness = AuthHarness::new()?;
    let user_id = harness.create_user(TEST_USERNAME, TEST_PIN).await?;
    let server_side = Arc::new(CachedCredentialStore::new(
        harness.store.clone(),
        harness.cache.clone(),
        cache_config(),
    ));
    let service = harness.service_over(server_side);
    for _ in 0..3 {
        let _ = service.verify_pin(TEST_USERNAME, WRONG_PIN).await;
    }
    let entry = cached_entry(&harness.cache, TEST_USERNAME)
        .await
        .expect("cache entry present");
    assert!(entry.locked_until.is_some());

    // An operator tool with its own store over the same cache.
    let operator = harness.service_over(Arc::new(CachedCredentialStore::new(
        harness.store.clone(),
        harness.cache.clone(),
        cache_config(),
    )));
    operator.unlock(user_id).await?;

    let entry = cached_entry(&harness.cache, TEST_USERNAME)
        .await
        .expect("cache entry present");
    assert_eq!(entry.failed_attempts, 0);
    assert_eq!(entry.locked_until, None);

    service.verify_pin(TEST_USERNAME, TEST_PIN).await?;
    Ok(())
}
