use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use super::credential::CredentialRecord;
use super::crypto::AuthCrypto;
use super::error::AuthError;
use super::lockout::{self, LockDecision, LockoutPolicy};
use super::repositories::CredentialStore;
use super::token::{Claims, TokenError, TokenPair, TokenSigner, TokenType};

/// PIN verification, lockout bookkeeping and token refresh.
///
/// The service keeps no mutable state of its own; every decision is made
/// from the credential record read at the start of the call. Two concurrent
/// failures for the same user may therefore both write `count + 1`, which
/// under-counts by one. That race is accepted.
pub struct AuthenticationService {
    store: Arc<dyn CredentialStore>,
    signer: Arc<TokenSigner>,
    crypto: Arc<AuthCrypto>,
    policy: LockoutPolicy,
}

impl fmt::Debug for AuthenticationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticationService")
            .field("signer", &self.signer)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl AuthenticationService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        signer: Arc<TokenSigner>,
        crypto: Arc<AuthCrypto>,
        policy: LockoutPolicy,
    ) -> Self {
        Self {
            store,
            signer,
            crypto,
            policy,
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    pub async fn verify_pin(
        &self,
        username: &str,
        pin: &str,
    ) -> Result<TokenPair, AuthError> {
        self.verify_pin_at(username, pin, Utc::now()).await
    }

    /// [`Self::verify_pin`] evaluated at an explicit instant.
    pub async fn verify_pin_at(
        &self,
        username: &str,
        pin: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        let record = self
            .store
            .find_by_username(username)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let snapshot = record.snapshot();

        if let Some(retry_after) = lockout::remaining_lock(&snapshot, now) {
            info!(user_id = %record.user_id, ?retry_after, "PIN check rejected while locked");
            return Err(AuthError::PinLocked { retry_after });
        }

        if self.policy.is_stale(&snapshot, now) {
            info!(user_id = %record.user_id, "PIN check rejected, PIN expired");
            return Err(AuthError::PinExpired);
        }

        if self.check_pin(pin, &record.pin_hash).await? {
            self.reset_attempts(&record, now).await;
            let tokens = self.signer.generate_tokens_at(
                record.user_id,
                &record.username,
                now,
            )?;
            info!(user_id = %record.user_id, "PIN verified");
            return Ok(tokens);
        }

        self.record_failure(&record, now).await
    }

    /// Runs Argon2 verification on the blocking pool.
    async fn check_pin(
        &self,
        pin: &str,
        pin_hash: &str,
    ) -> Result<bool, AuthError> {
        let crypto = Arc::clone(&self.crypto);
        let pin = Zeroizing::new(pin.to_owned());
        let pin_hash = pin_hash.to_owned();

        let matched = tokio::task::spawn_blocking(move || {
            crypto.verify_pin(&pin, &pin_hash)
        })
        .await
        .context("PIN verification task failed")??;
        Ok(matched)
    }

    /// Validate a refresh token and pair a new access token with it. The
    /// refresh token is returned unchanged.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenPair, AuthError> {
        let (access, claims) = self.signer.refresh_access_token(refresh_token)?;
        let refresh_expires_at = claims
            .expires_at()
            .ok_or(AuthError::Token(TokenError::Malformed))?;

        Ok(TokenPair {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh_token.trim().to_string(),
            refresh_expires_at,
            user_id: claims.sub,
            username: claims.username,
        })
    }

    /// Clear the failure counter and any lock. Unlike the reset after a
    /// successful PIN check, write failures here are reported.
    pub async fn unlock(&self, user_id: Uuid) -> Result<(), AuthError> {
        let record = self
            .store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;
        let now = Utc::now();
        self.store.update_failed_attempts(user_id, 0, now).await?;
        self.store.update_lock_expiry(user_id, None).await?;
        info!(user_id = %record.user_id, "credential unlocked");
        Ok(())
    }

    pub fn validate_access_token(
        &self,
        token: &str,
    ) -> Result<Claims, AuthError> {
        Ok(self.signer.validate_token(token, TokenType::Access)?)
    }

    async fn record_failure(
        &self,
        record: &CredentialRecord,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, AuthError> {
        let attempts = record.failed_attempts.saturating_add(1);

        // Without a persisted counter the lockout cannot be enforced.
        self.store
            .update_failed_attempts(record.user_id, attempts, now)
            .await?;

        match self.policy.evaluate(attempts) {
            LockDecision::Open { remaining_attempts } => {
                info!(
                    user_id = %record.user_id,
                    attempts,
                    remaining_attempts,
                    "invalid PIN"
                );
                Err(AuthError::InvalidPin { remaining_attempts })
            }
            LockDecision::Locked { duration } => {
                let locked_until = TimeDelta::from_std(duration)
                    .ok()
                    .and_then(|delta| now.checked_add_signed(delta))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);

                if let Err(err) = self
                    .store
                    .update_lock_expiry(record.user_id, Some(locked_until))
                    .await
                {
                    warn!(
                        user_id = %record.user_id,
                        error = %err,
                        "failed to persist PIN lock"
                    );
                }

                warn!(
                    user_id = %record.user_id,
                    attempts,
                    lock_secs = duration.as_secs(),
                    "PIN locked after repeated failures"
                );
                Err(AuthError::PinLocked {
                    retry_after: lockout::ceil_to_seconds(duration),
                })
            }
        }
    }

    async fn reset_attempts(&self, record: &CredentialRecord, now: DateTime<Utc>) {
        if let Err(err) = self
            .store
            .update_failed_attempts(record.user_id, 0, now)
            .await
        {
            warn!(user_id = %record.user_id, error = %err, "failed to reset PIN attempts");
        }

        if record.locked_until.is_some()
            && let Err(err) =
                self.store.update_lock_expiry(record.user_id, None).await
        {
            warn!(user_id = %record.user_id, error = %err, "failed to clear PIN lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repositories::MockCredentialStore;
    use crate::auth::token::TokenSettings;
    use anyhow::anyhow;
    use std::time::Duration;

    fn signer() -> Arc<TokenSigner> {
        Arc::new(
            TokenSigner::new(TokenSettings {
                access_secret: b"access-secret".to_vec(),
                refresh_secret: b"refresh-secret".to_vec(),
                access_ttl: Duration::from_secs(900),
                refresh_ttl: Duration::from_secs(86_400),
                issuer: "teller".into(),
                audience: "teller-api".into(),
            })
            .unwrap(),
        )
    }

    fn crypto() -> Arc<AuthCrypto> {
        Arc::new(AuthCrypto::insecure_for_tests("pepper").unwrap())
    }

    fn policy() -> LockoutPolicy {
        LockoutPolicy::new(3, Duration::from_secs(10), Duration::from_secs(300))
    }

    fn record(crypto: &AuthCrypto, failed_attempts: u32) -> CredentialRecord {
        let mut record = CredentialRecord::new(
            Uuid::now_v7(),
            "testuser",
            "Test User",
            crypto.hash_pin("123456").unwrap(),
        );
        record.failed_attempts = failed_attempts;
        record
    }

    fn service(store: MockCredentialStore, crypto: Arc<AuthCrypto>) -> AuthenticationService {
        AuthenticationService::new(Arc::new(store), signer(), crypto, policy())
    }

    #[tokio::test]
    async fn pin_check_yields_to_other_tasks() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let crypto = crypto();
        let stored = record(&crypto, 0);

        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_username()
            .returning(move |_| Ok(Some(stored.clone())));
        store.expect_update_failed_attempts().returning(|_, _, _| Ok(()));

        let ticks = Arc::new(AtomicU32::new(0));
        let ticker = tokio::spawn({
            let ticks = Arc::clone(&ticks);
            async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            }
        });

        let outcome = service(store, crypto)
            .verify_pin("testuser", "000000")
            .await;
        let seen = ticks.load(Ordering::Relaxed);
        ticker.abort();

        assert!(matches!(outcome, Err(AuthError::InvalidPin { .. })));
        assert!(seen > 0, "runtime was blocked during PIN verification");
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let mut store = MockCredentialStore::new();
        store.expect_find_by_username().returning(|_| Ok(None));
        store.expect_update_failed_attempts().never();

        let err = service(store, crypto())
            .verify_pin("ghost", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UserNotFound));
    }

    #[tokio::test]
    async fn locked_account_short_circuits() {
        let crypto = crypto();
        let now = Utc::now();
        let mut locked = record(&crypto, 3);
        locked.locked_until = Some(now + TimeDelta::milliseconds(7_300));

        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_username()
            .returning(move |_| Ok(Some(locked.clone())));
        store.expect_update_failed_attempts().never();
        store.expect_update_lock_expiry().never();

        let err = service(store, crypto)
            .verify_pin_at("testuser", "123456", now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::PinLocked { retry_after } if retry_after == Duration::from_secs(8)
        ));
    }

    #[tokio::test]
    async fn stale_pin_is_expired_without_mutation() {
        let crypto = crypto();
        let now = Utc::now();
        let mut stale = record(&crypto, 0);
        stale.last_attempt_at = Some(now - TimeDelta::days(120));

        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_username()
            .returning(move |_| Ok(Some(stale.clone())));
        store.expect_update_failed_attempts().never();
        store.expect_update_lock_expiry().never();

        let service = AuthenticationService::new(
            Arc::new(store),
            signer(),
            crypto,
            policy().with_pin_freshness(Duration::from_secs(90 * 86_400)),
        );
        let err = service
            .verify_pin_at("testuser", "123456", now)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::PinExpired));
    }

    #[tokio::test]
    async fn failed_counter_write_is_fatal() {
        let crypto = crypto();
        let existing = record(&crypto, 0);

        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_username()
            .returning(move |_| Ok(Some(existing.clone())));
        store
            .expect_update_failed_attempts()
            .times(1)
            .returning(|_, _, _| Err(anyhow!("database unavailable")));
        store.expect_update_lock_expiry().never();

        let err = service(store, crypto)
            .verify_pin("testuser", "wrong1")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[tokio::test]
    async fn lock_write_failure_still_reports_lock() {
        let crypto = crypto();
        let existing = record(&crypto, 2);
        let user_id = existing.user_id;

        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_username()
            .returning(move |_| Ok(Some(existing.clone())));
        store
            .expect_update_failed_attempts()
            .withf(move |id, count, _| *id == user_id && *count == 3)
            .times(1)
            .returning(|_, _, _| Ok(()));
        store
            .expect_update_lock_expiry()
            .times(1)
            .returning(|_, _| Err(anyhow!("database unavailable")));

        let err = service(store, crypto)
            .verify_pin("testuser", "wrong1")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuthError::PinLocked { retry_after } if retry_after == Duration::from_secs(10)
        ));
    }

    #[tokio::test]
    async fn reset_failure_does_not_block_login() {
        let crypto = crypto();
        let now = Utc::now();
        let mut existing = record(&crypto, 2);
        existing.locked_until = Some(now - TimeDelta::seconds(1));

        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_username()
            .returning(move |_| Ok(Some(existing.clone())));
        store
            .expect_update_failed_attempts()
            .withf(|_, count, _| *count == 0)
            .returning(|_, _, _| Err(anyhow!("database unavailable")));
        store
            .expect_update_lock_expiry()
            .withf(|_, until| until.is_none())
            .returning(|_, _| Err(anyhow!("database unavailable")));

        let tokens = service(store, crypto)
            .verify_pin_at("testuser", "123456", now)
            .await
            .unwrap();
        assert_eq!(tokens.username, "testuser");
    }

    #[tokio::test]
    async fn unusable_hash_is_internal() {
        let crypto = crypto();
        let mut broken = record(&crypto, 0);
        broken.pin_hash = "plaintext".into();

        let mut store = MockCredentialStore::new();
        store
            .expect_find_by_username()
            .returning(move |_| Ok(Some(broken.clone())));
        store.expect_update_failed_attempts().never();

        let err = service(store, crypto)
            .verify_pin("testuser", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Internal(_)));
    }

    #[tokio::test]
    async fn refresh_returns_same_refresh_token() {
        let signer = signer();
        let user_id = Uuid::now_v7();
        let pair = signer.generate_tokens(user_id, "testuser").unwrap();

        let service = AuthenticationService::new(
            Arc::new(MockCredentialStore::new()),
            signer.clone(),
            crypto(),
            policy(),
        );
        let refreshed = service.refresh_token(&pair.refresh_token).await.unwrap();

        assert_eq!(refreshed.refresh_token, pair.refresh_token);
        assert_eq!(refreshed.refresh_expires_at, pair.refresh_expires_at);
        assert_eq!(refreshed.user_id, user_id);
        assert_ne!(refreshed.access_token, pair.access_token);
        signer
            .validate_token(&refreshed.access_token, TokenType::Access)
            .unwrap();
    }

    #[tokio::test]
    async fn refresh_rejects_access_tokens() {
        let signer = signer();
        let pair = signer.generate_tokens(Uuid::now_v7(), "testuser").unwrap();
        let service = AuthenticationService::new(
            Arc::new(MockCredentialStore::new()),
            signer,
            crypto(),
            policy(),
        );

        let err = service.refresh_token(&pair.access_token).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Token(TokenError::WrongType { .. })
        ));
    }
}
