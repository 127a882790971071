pub mod sources;

use crate::constants::{
    DEFAULT_ACCESS_SECRET, DEFAULT_PIN_PEPPER, DEFAULT_REFRESH_SECRET,
};

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub redis: Option<RedisConfig>,
    pub cors: CorsConfig,
    pub auth: AuthConfig,
    pub lockout: LockoutConfig,
    pub cache: AttemptCacheConfig,
    pub dev_mode: bool,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    /// Apply embedded migrations before serving.
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl CorsConfig {
    pub fn is_wildcard_included(&self) -> bool {
        self.allowed_origins
            .iter()
            .any(|origin| origin.trim() == "*")
    }
}

/// Secrets and lifetimes for PIN hashing and token signing.
#[derive(Clone)]
pub struct AuthConfig {
    pub pin_pepper: String,
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub issuer: String,
    pub audience: String,
}

impl AuthConfig {
    pub fn is_default_pepper(&self) -> bool {
        self.pin_pepper == DEFAULT_PIN_PEPPER
    }

    pub fn is_default_access_secret(&self) -> bool {
        self.access_secret == DEFAULT_ACCESS_SECRET
    }

    pub fn is_default_refresh_secret(&self) -> bool {
        self.refresh_secret == DEFAULT_REFRESH_SECRET
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("pin_pepper", &"<redacted>")
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .finish()
    }
}

/// Escalating lockout applied after repeated PIN failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutConfig {
    /// Failures tolerated before the first lock.
    pub threshold: u32,
    /// Lock length at the threshold; doubles per additional failure.
    pub base_duration: Duration,
    /// Upper bound on any single lock.
    pub max_duration: Duration,
    /// PINs whose last attempt is older than this window are treated as
    /// expired. `None` disables the check.
    pub pin_freshness: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptCacheConfig {
    /// TTL of cached credential entries.
    pub ttl: Duration,
    /// Upper bound on background cache writes.
    pub write_timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
