use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::credential::CredentialRecord;
use crate::auth::repositories::{AttemptCache, CredentialStore};

/// Process-local credential store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    records: RwLock<HashMap<Uuid, CredentialRecord>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails if the username is already taken by another user.
    pub async fn insert(&self, record: CredentialRecord) -> Result<()> {
        let mut records = self.records.write().await;
        if records.values().any(|existing| {
            existing.username == record.username
                && existing.user_id != record.user_id
        }) {
            return Err(anyhow!("username {} already exists", record.username));
        }
        records.insert(record.user_id, record);
        Ok(())
    }

    pub async fn get(&self, user_id: Uuid) -> Option<CredentialRecord> {
        self.records.read().await.get(&user_id).cloned()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|record| record.username == username)
            .cloned())
    }

    async fn find_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CredentialRecord>> {
        Ok(self.get(user_id).await)
    }

    async fn update_failed_attempts(
        &self,
        user_id: Uuid,
        failed_attempts: u32,
        attempted_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("credential record {user_id} not found"))?;
        record.failed_attempts = failed_attempts;
        record.last_attempt_at = Some(attempted_at);
        Ok(())
    }

    async fn update_lock_expiry(
        &self,
        user_id: Uuid,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("credential record {user_id} not found"))?;
        record.locked_until = locked_until;
        Ok(())
    }
}

/// TTL map standing in for Redis.
#[derive(Debug, Default)]
pub struct InMemoryAttemptCache {
    entries: RwLock<HashMap<String, (Vec<u8>, Instant)>>,
}

impl InMemoryAttemptCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        matches!(self.get(key).await, Ok(Some(_)))
    }
}

#[async_trait]
impl AttemptCache for InMemoryAttemptCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > now)
            .map(|(value, _)| value.clone()))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_updates_counter_and_lock() {
        let store = InMemoryCredentialStore::new();
        let record = CredentialRecord::new(Uuid::now_v7(), "amy", "Amy", "h");
        let id = record.user_id;
        store.insert(record).await.unwrap();

        let now = Utc::now();
        store.update_failed_attempts(id, 2, now).await.unwrap();
        store.update_lock_expiry(id, Some(now)).await.unwrap();

        let stored = store.find_by_username("amy").await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 2);
        assert_eq!(stored.last_attempt_at, Some(now));
        assert_eq!(stored.locked_until, Some(now));
        assert!(store.find_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn store_rejects_duplicate_usernames_and_unknown_ids() {
        let store = InMemoryCredentialStore::new();
        store
            .insert(CredentialRecord::new(Uuid::now_v7(), "amy", "Amy", "h"))
            .await
            .unwrap();
        assert!(
            store
                .insert(CredentialRecord::new(Uuid::now_v7(), "amy", "A", "h"))
                .await
                .is_err()
        );
        assert!(
            store
                .update_failed_attempts(Uuid::now_v7(), 1, Utc::now())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn cache_entries_expire() {
        let cache = InMemoryAttemptCache::new();
        cache
            .set("short", b"v".to_vec(), Duration::from_millis(20))
            .await
            .unwrap();
        cache
            .set("long", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(cache.contains("short").await);

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!cache.contains("short").await);
        assert_eq!(cache.get("long").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn deleted_entries_miss() {
        let cache = InMemoryAttemptCache::new();
        cache
            .set("user:amy", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        cache.delete("user:amy").await.unwrap();
        cache.delete("user:nobody").await.unwrap();
        assert!(!cache.contains("user:amy").await);
    }
}
