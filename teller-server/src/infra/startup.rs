//! Wiring from a loaded [`Config`] to a ready [`AppState`].

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use teller_config::Config;
use teller_core::auth::infrastructure::{
    CachedCredentialStore, InMemoryAttemptCache, InMemoryCredentialStore,
    PostgresCredentialStore, RedisAttemptCache,
};
use teller_core::auth::{
    AttemptCache, AuthCrypto, AuthenticationService, CredentialRecord,
    CredentialStore, LockoutPolicy, TokenRevocationList, TokenSigner,
};
use teller_core::dashboard::{
    AccountSummary, DashboardRepository, DashboardService,
    PostgresDashboardRepository, TransactionSummary,
};
use teller_core::users::{
    InMemoryDirectory, PostgresUserRepository, UserRepository, UserService,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::infra::app_state::AppState;

pub const DEMO_USERNAME: &str = "demo";
pub const DEMO_PIN: &str = "123456";

/// Storage adapters selected for this process.
pub struct Backends {
    pub credentials: Arc<dyn CredentialStore>,
    pub users: Arc<dyn UserRepository>,
    pub dashboard: Arc<dyn DashboardRepository>,
    pub cache: Arc<dyn AttemptCache>,
}

impl std::fmt::Debug for Backends {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backends").finish_non_exhaustive()
    }
}

pub async fn connect_database(config: &Config) -> Result<PgPool> {
    let Some(url) = config.database.url.as_deref() else {
        bail!("DATABASE_URL is not configured");
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(url)
        .await
        .context("failed to connect to PostgreSQL")?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    teller_core::MIGRATOR
        .run(pool)
        .await
        .context("database migration failed")?;
    info!("database migrations applied");
    Ok(())
}

pub fn build_crypto(config: &Config) -> Result<Arc<AuthCrypto>> {
    Ok(Arc::new(
        AuthCrypto::new(&config.auth.pin_pepper)
            .context("invalid PIN hashing configuration")?,
    ))
}

/// Redis attempt cache, when one is configured.
pub async fn connect_attempt_cache(
    config: &Config,
) -> Result<Option<Arc<dyn AttemptCache>>> {
    let Some(redis) = &config.redis else {
        return Ok(None);
    };
    let cache = RedisAttemptCache::connect(&redis.url)
        .await
        .context("failed to connect to Redis")?;
    info!("attempt cache backed by Redis");
    Ok(Some(Arc::new(cache)))
}

/// Put `cache` in front of `store`. Every process that writes credential
/// state must go through this so cached entries follow the store.
pub fn front_with_cache(
    store: Arc<dyn CredentialStore>,
    cache: Option<Arc<dyn AttemptCache>>,
    config: &Config,
) -> Arc<dyn CredentialStore> {
    match cache {
        Some(cache) => {
            Arc::new(CachedCredentialStore::new(store, cache, config.cache))
        }
        None => store,
    }
}

/// Postgres when a database is configured, process memory otherwise.
/// A configured Redis fronts the credential store with the attempt cache.
pub async fn build_backends(config: &Config, crypto: &AuthCrypto) -> Result<Backends> {
    let redis_cache = connect_attempt_cache(config).await?;

    let (credentials, users, dashboard): (
        Arc<dyn CredentialStore>,
        Arc<dyn UserRepository>,
        Arc<dyn DashboardRepository>,
    ) = if config.database.url.is_some() {
        let pool = connect_database(config).await?;
        if config.database.run_migrations {
            run_migrations(&pool).await?;
        }
        (
            Arc::new(PostgresCredentialStore::new(pool.clone())),
            Arc::new(PostgresUserRepository::new(pool.clone())),
            Arc::new(PostgresDashboardRepository::new(pool)),
        )
    } else if config.dev_mode {
        warn!("no database configured; using in-memory stores with a demo user");
        let store = Arc::new(InMemoryCredentialStore::new());
        let directory = Arc::new(InMemoryDirectory::new());
        seed_demo_user(&store, &directory, crypto).await?;
        (store, directory.clone(), directory)
    } else {
        bail!("a database is required outside dev mode");
    };

    let cache = redis_cache
        .clone()
        .unwrap_or_else(|| {
            Arc::new(InMemoryAttemptCache::new()) as Arc<dyn AttemptCache>
        });
    let credentials = front_with_cache(credentials, redis_cache, config);

    Ok(Backends {
        credentials,
        users,
        dashboard,
        cache,
    })
}

/// Assemble the services over already-built backends.
pub fn assemble_state(
    config: Arc<Config>,
    crypto: Arc<AuthCrypto>,
    backends: Backends,
) -> Result<AppState> {
    let signer = Arc::new(
        TokenSigner::from_config(&config.auth)
            .context("invalid token signing configuration")?,
    );
    let policy = LockoutPolicy::from(&config.lockout);

    info!(
        lockout.threshold = policy.threshold,
        lockout.base_secs = policy.base_duration.as_secs(),
        lockout.max_secs = policy.max_duration.as_secs(),
        lockout.pin_freshness = ?policy.pin_freshness,
        "lockout policy in effect"
    );

    let auth_service = Arc::new(AuthenticationService::new(
        backends.credentials,
        signer,
        crypto,
        policy,
    ));

    Ok(AppState {
        auth_service,
        user_service: UserService::new(backends.users),
        dashboard_service: DashboardService::new(backends.dashboard),
        revocations: TokenRevocationList::new(backends.cache),
        config,
    })
}

pub async fn build_app_state(config: Arc<Config>) -> Result<AppState> {
    let crypto = build_crypto(&config)?;
    let backends = build_backends(&config, &crypto).await?;
    assemble_state(config, crypto, backends)
}

async fn seed_demo_user(
    store: &InMemoryCredentialStore,
    directory: &InMemoryDirectory,
    crypto: &AuthCrypto,
) -> Result<()> {
    let user_id = Uuid::now_v7();
    let pin_hash = crypto.hash_pin(DEMO_PIN)?;
    store
        .insert(CredentialRecord::new(
            user_id,
            DEMO_USERNAME,
            "Demo User",
            pin_hash,
        ))
        .await?;
    directory.add_user(user_id, DEMO_USERNAME, "Demo User").await;

    let checking = AccountSummary {
        id: Uuid::now_v7(),
        name: "Everyday".into(),
        kind: "checking".into(),
        currency: "EUR".into(),
        balance_minor: 152_340,
    };
    let savings = AccountSummary {
        id: Uuid::now_v7(),
        name: "Rainy day".into(),
        kind: "savings".into(),
        currency: "EUR".into(),
        balance_minor: 1_250_000,
    };
    directory
        .add_transaction(TransactionSummary {
            id: Uuid::now_v7(),
            account_id: checking.id,
            amount_minor: -4_250,
            currency: "EUR".into(),
            description: "Groceries".into(),
            posted_at: chrono::Utc::now(),
        })
        .await;
    directory.add_account(user_id, checking).await;
    directory.add_account(user_id, savings).await;

    info!(username = DEMO_USERNAME, "seeded demo user");
    Ok(())
}
