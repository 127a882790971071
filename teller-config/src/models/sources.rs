use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::util::{
    duration_var, parse_bool_var, parse_csv_var, parse_var, path_var,
};

/// Raw configuration as defined in a TOML file.
///
/// Durations are humantime strings such as `"30s"` or `"15m"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    pub redis: Option<FileRedisConfig>,
    #[serde(default)]
    pub cors: FileCorsConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub lockout: FileLockoutConfig,
    #[serde(default)]
    pub cache: FileCacheConfig,
    pub dev_mode: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_migrations: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FileRedisConfig {
    pub url: String,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_methods: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_headers: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_credentials: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_pepper: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileLockoutConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_duration: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_freshness: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCacheConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_timeout: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub database_max_connections: Option<u32>,
    pub database_run_migrations: Option<bool>,
    pub redis_url: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    pub cors_allowed_methods: Option<Vec<String>>,
    pub cors_allowed_headers: Option<Vec<String>>,
    pub cors_allow_credentials: Option<bool>,
    pub dev_mode: Option<bool>,
    pub auth_pin_pepper: Option<String>,
    pub auth_access_secret: Option<String>,
    pub auth_refresh_secret: Option<String>,
    pub auth_access_ttl: Option<String>,
    pub auth_refresh_ttl: Option<String>,
    pub auth_issuer: Option<String>,
    pub auth_audience: Option<String>,
    pub lockout_threshold: Option<u32>,
    pub lockout_base_duration: Option<String>,
    pub lockout_max_duration: Option<String>,
    pub pin_freshness: Option<String>,
    pub attempt_cache_ttl: Option<String>,
    pub cache_write_timeout: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self {
            config_path: path_var("TELLER_CONFIG_PATH"),
            server_host: std::env::var("SERVER_HOST").ok(),
            server_port: parse_var("SERVER_PORT"),
            database_url: std::env::var("DATABASE_URL").ok(),
            database_max_connections: parse_var("DATABASE_MAX_CONNECTIONS"),
            database_run_migrations: parse_bool_var("DATABASE_RUN_MIGRATIONS"),
            redis_url: std::env::var("REDIS_URL")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            cors_allowed_origins: parse_csv_var("CORS_ALLOWED_ORIGINS"),
            cors_allowed_methods: parse_csv_var("CORS_ALLOWED_METHODS"),
            cors_allowed_headers: parse_csv_var("CORS_ALLOWED_HEADERS"),
            cors_allow_credentials: parse_bool_var("CORS_ALLOW_CREDENTIALS"),
            dev_mode: parse_bool_var("DEV_MODE"),
            auth_pin_pepper: std::env::var("AUTH_PIN_PEPPER").ok(),
            auth_access_secret: std::env::var("AUTH_ACCESS_SECRET").ok(),
            auth_refresh_secret: std::env::var("AUTH_REFRESH_SECRET").ok(),
            auth_access_ttl: duration_var("AUTH_ACCESS_TTL"),
            auth_refresh_ttl: duration_var("AUTH_REFRESH_TTL"),
            auth_issuer: std::env::var("AUTH_ISSUER").ok(),
            auth_audience: std::env::var("AUTH_AUDIENCE").ok(),
            lockout_threshold: parse_var("LOCKOUT_THRESHOLD"),
            lockout_base_duration: duration_var("LOCKOUT_BASE_DURATION"),
            lockout_max_duration: duration_var("LOCKOUT_MAX_DURATION"),
            pin_freshness: duration_var("PIN_FRESHNESS_WINDOW"),
            attempt_cache_ttl: duration_var("ATTEMPT_CACHE_TTL"),
            cache_write_timeout: duration_var("CACHE_WRITE_TIMEOUT"),
        }
    }
}
