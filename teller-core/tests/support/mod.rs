//! Shared fixtures for core integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use teller_core::auth::infrastructure::{
    InMemoryAttemptCache, InMemoryCredentialStore,
};
use teller_core::auth::{
    AuthCrypto, AuthenticationService, CredentialRecord, CredentialStore,
    LockoutPolicy, TokenSettings, TokenSigner,
};
use uuid::Uuid;

pub const TEST_USERNAME: &str = "testuser";
pub const TEST_PIN: &str = "123456";
pub const WRONG_PIN: &str = "wrong1";

pub const THRESHOLD: u32 = 3;
pub const BASE_LOCK: Duration = Duration::from_secs(10);
pub const MAX_LOCK: Duration = Duration::from_secs(300);

pub fn token_settings() -> TokenSettings {
    TokenSettings {
        access_secret: b"integration-access-secret".to_vec(),
        refresh_secret: b"integration-refresh-secret".to_vec(),
        access_ttl: Duration::from_secs(15 * 60),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
        issuer: "teller".into(),
        audience: "teller-api".into(),
    }
}

/// Authentication service over in-memory adapters.
pub struct AuthHarness {
    pub store: Arc<InMemoryCredentialStore>,
    pub cache: Arc<InMemoryAttemptCache>,
    pub crypto: Arc<AuthCrypto>,
    pub signer: Arc<TokenSigner>,
    pub policy: LockoutPolicy,
}

impl AuthHarness {
    pub fn new() -> Result<Self> {
        Ok(Self {
            store: Arc::new(InMemoryCredentialStore::new()),
            cache: Arc::new(InMemoryAttemptCache::new()),
            crypto: Arc::new(AuthCrypto::insecure_for_tests("test-pepper")?),
            signer: Arc::new(TokenSigner::new(token_settings())?),
            policy: LockoutPolicy::new(THRESHOLD, BASE_LOCK, MAX_LOCK),
        })
    }

    pub fn with_policy(mut self, policy: LockoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Service reading straight from the store.
    pub fn service(&self) -> AuthenticationService {
        self.service_over(self.store.clone())
    }

    pub fn service_over(
        &self,
        store: Arc<dyn CredentialStore>,
    ) -> AuthenticationService {
        AuthenticationService::new(
            store,
            self.signer.clone(),
            self.crypto.clone(),
            self.policy,
        )
    }

    pub async fn create_user(&self, username: &str, pin: &str) -> Result<Uuid> {
        let user_id = Uuid::now_v7();
        let record = CredentialRecord::new(
            user_id,
            username,
            username,
            self.crypto.hash_pin(pin)?,
        );
        self.store.insert(record).await?;
        Ok(user_id)
    }

    pub async fn record(&self, user_id: Uuid) -> CredentialRecord {
        self.store
            .get(user_id)
            .await
            .expect("user exists in the store")
    }
}
