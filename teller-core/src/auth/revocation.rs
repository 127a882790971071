use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::lockout::ceil_to_seconds;
use super::repositories::{AttemptCache, CacheKeys};
use super::token::Claims;

/// Ban list for access tokens revoked before they expire.
///
/// Entries live in the attempt cache and expire with the token they ban.
/// Cache failures never block a request: an unreadable ban list reads as
/// "not banned".
#[derive(Clone)]
pub struct TokenRevocationList {
    cache: Arc<dyn AttemptCache>,
}

impl fmt::Debug for TokenRevocationList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRevocationList").finish_non_exhaustive()
    }
}

impl TokenRevocationList {
    pub fn new(cache: Arc<dyn AttemptCache>) -> Self {
        Self { cache }
    }

    /// Returns `false` when the token had already expired or the ban could
    /// not be written.
    pub async fn revoke(&self, claims: &Claims, now: DateTime<Utc>) -> bool {
        let Some(remaining) = claims
            .expires_at()
            .and_then(|expires_at| (expires_at - now).to_std().ok())
            .filter(|remaining| !remaining.is_zero())
        else {
            return false;
        };

        let ttl = ceil_to_seconds(remaining).max(Duration::from_secs(1));
        let key = CacheKeys::banned_token(&claims.jti);
        match self.cache.set(&key, vec![1], ttl).await {
            Ok(()) => true,
            Err(err) => {
                warn!(jti = %claims.jti, error = %err, "failed to record revoked token");
                false
            }
        }
    }

    pub async fn is_revoked(&self, claims: &Claims) -> bool {
        let key = CacheKeys::banned_token(&claims.jti);
        match self.cache.get(&key).await {
            Ok(entry) => entry.is_some(),
            Err(err) => {
                warn!(jti = %claims.jti, error = %err, "revocation lookup failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::infrastructure::InMemoryAttemptCache;
    use crate::auth::repositories::MockAttemptCache;
    use crate::auth::token::TokenType;
    use anyhow::anyhow;
    use chrono::TimeDelta;
    use uuid::Uuid;

    fn claims(expires_in: TimeDelta) -> Claims {
        let now = Utc::now();
        Claims {
            sub: Uuid::now_v7(),
            username: "testuser".into(),
            token_type: TokenType::Access,
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            iss: "teller".into(),
            aud: "teller-api".into(),
            jti: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn revoked_tokens_are_reported() {
        let cache = Arc::new(InMemoryAttemptCache::new());
        let list = TokenRevocationList::new(cache.clone());
        let live = claims(TimeDelta::minutes(10));
        let other = claims(TimeDelta::minutes(10));

        assert!(!list.is_revoked(&live).await);
        assert!(list.revoke(&live, Utc::now()).await);
        assert!(list.is_revoked(&live).await);
        assert!(!list.is_revoked(&other).await);
        assert!(cache.contains(&CacheKeys::banned_token(&live.jti)).await);
    }

    #[tokio::test]
    async fn expired_tokens_are_not_stored() {
        let mut cache = MockAttemptCache::new();
        cache.expect_set().never();

        let list = TokenRevocationList::new(Arc::new(cache));
        assert!(!list.revoke(&claims(TimeDelta::minutes(-1)), Utc::now()).await);
    }

    #[tokio::test]
    async fn ban_lives_as_long_as_the_token() {
        let mut cache = MockAttemptCache::new();
        cache
            .expect_set()
            .withf(|key, _, ttl| {
                key.starts_with("token:banned:")
                    && *ttl > Duration::from_secs(590)
                    && *ttl <= Duration::from_secs(600)
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let list = TokenRevocationList::new(Arc::new(cache));
        assert!(list.revoke(&claims(TimeDelta::minutes(10)), Utc::now()).await);
    }

    #[tokio::test]
    async fn cache_failures_never_block() {
        let mut cache = MockAttemptCache::new();
        cache
            .expect_get()
            .returning(|_| Err(anyhow!("connection refused")));
        cache
            .expect_set()
            .returning(|_, _, _| Err(anyhow!("connection refused")));

        let list = TokenRevocationList::new(Arc::new(cache));
        let live = claims(TimeDelta::minutes(10));
        assert!(!list.revoke(&live, Utc::now()).await);
        assert!(!list.is_revoked(&live).await);
    }
}
