use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use teller_config::AttemptCacheConfig;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::credential::CredentialRecord;
use crate::auth::repositories::{AttemptCache, CacheKeys, CredentialStore};

/// Read-through, write-through cache in front of a [`CredentialStore`].
///
/// Reads try the cache first and fall back to the store on a miss, a cache
/// error or an undecodable entry. Writes go to the store first and then
/// overwrite the cache entry before returning; if that fails the entry is
/// deleted instead. Cache work runs on a spawned task bounded by
/// `write_timeout` and never fails a PIN check.
///
/// When neither the overwrite nor the delete lands, the user is marked
/// suspect and this instance reads them from the store until a later cache
/// write succeeds. A counter read from the cache is therefore never older
/// than the last write made through this instance.
#[derive(Clone)]
pub struct CachedCredentialStore {
    store: Arc<dyn CredentialStore>,
    cache: Arc<dyn AttemptCache>,
    ttl: Duration,
    write_timeout: Duration,
    suspect: Arc<RwLock<HashSet<Uuid>>>,
}

impl fmt::Debug for CachedCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CachedCredentialStore")
            .field("ttl", &self.ttl)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

impl CachedCredentialStore {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn AttemptCache>,
        config: AttemptCacheConfig,
    ) -> Self {
        Self {
            store,
            cache,
            ttl: config.ttl,
            write_timeout: config.write_timeout,
            suspect: Arc::default(),
        }
    }

    async fn read_cached(&self, key: &str) -> Option<CredentialRecord> {
        let bytes = match self.cache.get(key).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(key, "credential cache miss");
                return None;
            }
            Err(err) => {
                warn!(key, error = %err, "credential cache read failed");
                return None;
            }
        };

        let record: CredentialRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(err) => {
                warn!(key, error = %err, "discarding undecodable credential cache entry");
                return None;
            }
        };

        if self.suspect.read().await.contains(&record.user_id) {
            debug!(key, "bypassing credential cache entry that may be stale");
            return None;
        }
        debug!(key, "credential cache hit");
        Some(record)
    }

    /// Run cache work on its own task, cut off after `write_timeout`.
    fn spawn_bounded<F>(&self, work: F) -> JoinHandle<Result<()>>
    where
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let timeout = self.write_timeout;
        tokio::spawn(async move {
            tokio::time::timeout(timeout, work)
                .await
                .map_err(|_| anyhow!("timed out after {timeout:?}"))?
        })
    }

    /// Wait for cache work and track whether the user's entry can be
    /// trusted afterwards.
    async fn settle(&self, user_id: Uuid, work: JoinHandle<Result<()>>) {
        let outcome = match work.await {
            Ok(outcome) => outcome,
            Err(err) => Err(anyhow!("cache task failed: {err}")),
        };

        match outcome {
            Ok(()) => {
                self.suspect.write().await.remove(&user_id);
            }
            Err(err) => {
                warn!(
                    %user_id,
                    error = %err,
                    "credential cache entry may be stale, reading through to the store"
                );
                self.suspect.write().await.insert(user_id);
            }
        }
    }

    /// Write `record` to the cache, or drop its entry if that fails.
    async fn store_entry(&self, record: CredentialRecord) {
        let user_id = record.user_id;
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;

        let work = self.spawn_bounded(async move {
            write_or_invalidate(cache.as_ref(), &record, ttl).await
        });
        self.settle(user_id, work).await;
    }

    /// Re-read the record after a store write and bring its entry up to date.
    async fn refresh_entry(&self, user_id: Uuid) {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);
        let ttl = self.ttl;

        let work = self.spawn_bounded(async move {
            match store.find_by_id(user_id).await? {
                Some(record) => {
                    write_or_invalidate(cache.as_ref(), &record, ttl).await
                }
                None => Ok(()),
            }
        });
        self.settle(user_id, work).await;
    }
}

async fn write_entry(
    cache: &dyn AttemptCache,
    record: &CredentialRecord,
    ttl: Duration,
) -> Result<()> {
    let bytes = serde_json::to_vec(record)?;
    cache
        .set(&CacheKeys::credential(&record.username), bytes, ttl)
        .await
}

async fn write_or_invalidate(
    cache: &dyn AttemptCache,
    record: &CredentialRecord,
    ttl: Duration,
) -> Result<()> {
    let Err(err) = write_entry(cache, record, ttl).await else {
        return Ok(());
    };
    warn!(
        user_id = %record.user_id,
        error = %err,
        "credential cache write failed, dropping entry"
    );
    cache
        .delete(&CacheKeys::credential(&record.username))
        .await
        .map_err(|delete_err| {
            anyhow!("write failed ({err}) and delete failed ({delete_err})")
        })
}

#[async_trait]
impl CredentialStore for CachedCredentialStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>> {
        let key = CacheKeys::credential(username);
        if let Some(record) = self.read_cached(&key).await {
            return Ok(Some(record));
        }

        let record = self.store.find_by_username(username).await?;
        if let Some(record) = &record {
            self.store_entry(record.clone()).await;
        }
        Ok(record)
    }

    /// Entries are keyed by username, so lookups by ID go to the store.
    async fn find_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CredentialRecord>> {
        self.store.find_by_id(user_id).await
    }

    async fn update_failed_attempts(
        &self,
        user_id: Uuid,
        failed_attempts: u32,
        attempted_at: DateTime<Utc>,
    ) -> Result<()> {
        self.store
            .update_failed_attempts(user_id, failed_attempts, attempted_at)
            .await?;
        self.refresh_entry(user_id).await;
        Ok(())
    }

    async fn update_lock_expiry(
        &self,
        user_id: Uuid,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.store.update_lock_expiry(user_id, locked_until).await?;
        self.refresh_entry(user_id).await;
        Ok(())
    }
}
