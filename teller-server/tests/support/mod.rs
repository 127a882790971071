//! In-memory application harness for HTTP tests.

#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Result, anyhow};
use axum_test::TestServer;
use serde_json::Value;
use teller_config::models::sources::EnvConfig;
use teller_config::{Config, ConfigLoader, ConfigMetadata};
use teller_core::auth::infrastructure::{
    InMemoryAttemptCache, InMemoryCredentialStore,
};
use teller_core::auth::{AuthCrypto, CredentialRecord};
use teller_core::users::InMemoryDirectory;
use teller_server::infra::startup::{Backends, assemble_state};
use uuid::Uuid;

pub const TEST_USERNAME: &str = "testuser";
pub const TEST_PIN: &str = "123456";
pub const WRONG_PIN: &str = "wrong1";

pub fn test_config() -> Result<Config> {
    let env = EnvConfig {
        dev_mode: Some(true),
        lockout_threshold: Some(3),
        lockout_base_duration: Some("10s".into()),
        lockout_max_duration: Some("5m".into()),
        auth_access_secret: Some("http-test-access-secret".into()),
        auth_refresh_secret: Some("http-test-refresh-secret".into()),
        ..EnvConfig::default()
    };
    Ok(ConfigLoader::compose(None, env, ConfigMetadata::default())?.config)
}

pub struct TestApp {
    pub server: TestServer,
    pub store: Arc<InMemoryCredentialStore>,
    pub directory: Arc<InMemoryDirectory>,
    pub cache: Arc<InMemoryAttemptCache>,
    pub crypto: Arc<AuthCrypto>,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        let config = Arc::new(test_config()?);
        let store = Arc::new(InMemoryCredentialStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let cache = Arc::new(InMemoryAttemptCache::new());
        let crypto = Arc::new(AuthCrypto::insecure_for_tests("test-pepper")?);

        let state = assemble_state(
            config,
            crypto.clone(),
            Backends {
                credentials: store.clone(),
                users: directory.clone(),
                dashboard: directory.clone(),
                cache: cache.clone(),
            },
        )?;
        let server = TestServer::new(teller_server::create_app(state))
            .map_err(|err| anyhow!(err.to_string()))?;

        Ok(Self {
            server,
            store,
            directory,
            cache,
            crypto,
        })
    }

    pub async fn create_user(&self, username: &str, pin: &str) -> Result<Uuid> {
        let user_id = Uuid::now_v7();
        self.store
            .insert(CredentialRecord::new(
                user_id,
                username,
                username,
                self.crypto.hash_pin(pin)?,
            ))
            .await?;
        self.directory.add_user(user_id, username, username).await;
        Ok(user_id)
    }
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

pub fn token_field<'a>(body: &'a Value, key: &str) -> &'a str {
    body["data"][key]
        .as_str()
        .unwrap_or_else(|| panic!("{key} missing"))
}
