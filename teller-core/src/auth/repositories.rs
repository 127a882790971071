use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;
use uuid::Uuid;

use super::credential::CredentialRecord;

/// Source of truth for PIN credentials and their lockout state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>>;

    async fn find_by_id(&self, user_id: Uuid)
    -> Result<Option<CredentialRecord>>;

    /// Overwrite the failure counter and stamp the attempt time.
    async fn update_failed_attempts(
        &self,
        user_id: Uuid,
        failed_attempts: u32,
        attempted_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn update_lock_expiry(
        &self,
        user_id: Uuid,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()>;
}

/// Byte-oriented TTL cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AttemptCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration)
    -> Result<()>;

    /// Remove `key`. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy)]
pub struct CacheKeys;

impl CacheKeys {
    pub fn credential(username: &str) -> String {
        format!("user:{username}")
    }

    pub fn banned_token(jti: &Uuid) -> String {
        format!("token:banned:{jti}")
    }
}
