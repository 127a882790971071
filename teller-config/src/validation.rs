use axum::http::{Method, header::HeaderName};
use std::time::Duration;
use thiserror::Error;

use crate::models::{AttemptCacheConfig, AuthConfig, Config, CorsConfig, LockoutConfig};

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("authentication secret {field} {reason}")]
    WeakSecret { field: &'static str, reason: String },
    #[error("AUTH_ACCESS_SECRET and AUTH_REFRESH_SECRET must differ")]
    SharedTokenSecret,
    #[error("invalid lockout policy: {reason}")]
    InvalidLockout { reason: String },
    #[error("invalid attempt cache configuration: {reason}")]
    InvalidCache { reason: String },
    #[error("DATABASE_URL is required when DEV_MODE is false")]
    MissingDatabase,
    #[error("CORS wildcard origins are not allowed when DEV_MODE is false")]
    DangerousCorsWildcard,
    #[error("invalid CORS configuration: {reason}")]
    InvalidCorsConfig { reason: String },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if !config.dev_mode {
        enforce_secrets(&config.auth)?;
        if config.cors.is_wildcard_included() {
            return Err(ConfigGuardRailError::DangerousCorsWildcard);
        }
        if config.database.url.is_none() {
            return Err(ConfigGuardRailError::MissingDatabase);
        }
    } else if config.database.url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not configured; credentials, users and accounts are held in memory",
            "Set DATABASE_URL to persist lockout state across restarts",
        );
    }

    if config.auth.access_secret == config.auth.refresh_secret {
        return Err(ConfigGuardRailError::SharedTokenSecret);
    }

    validate_lockout(&config.lockout)?;
    validate_cache(&config.cache)?;
    validate_cors(&config.cors)?;
    token_lifetime_warnings(&config.auth, &mut warnings);

    if config.redis.is_none() {
        warnings.push_with_hint(
            "REDIS_URL not configured; credential lookups go straight to the database",
            "Set REDIS_URL to enable the attempt cache and token revocation",
        );
    }

    if config.cors.allow_credentials && config.cors.is_wildcard_included() {
        warnings.push(
            "CORS credentials allowed alongside wildcard origin; browsers will reject such configuration",
        );
    }

    Ok(warnings)
}

fn enforce_secrets(auth: &AuthConfig) -> Result<(), ConfigGuardRailError> {
    const MIN_SECRET_LENGTH: usize = 32;

    let checks: [(&'static str, &str, bool); 3] = [
        ("AUTH_PIN_PEPPER", &auth.pin_pepper, auth.is_default_pepper()),
        (
            "AUTH_ACCESS_SECRET",
            &auth.access_secret,
            auth.is_default_access_secret(),
        ),
        (
            "AUTH_REFRESH_SECRET",
            &auth.refresh_secret,
            auth.is_default_refresh_secret(),
        ),
    ];

    for (field, value, is_default) in checks {
        if is_default {
            return Err(ConfigGuardRailError::WeakSecret {
                field,
                reason: "uses the default placeholder value".into(),
            });
        }
        if value.len() < MIN_SECRET_LENGTH {
            return Err(ConfigGuardRailError::WeakSecret {
                field,
                reason: format!(
                    "must be at least {MIN_SECRET_LENGTH} characters"
                ),
            });
        }
    }

    Ok(())
}

fn validate_lockout(lockout: &LockoutConfig) -> Result<(), ConfigGuardRailError> {
    if lockout.threshold == 0 {
        return Err(ConfigGuardRailError::InvalidLockout {
            reason: "LOCKOUT_THRESHOLD must be at least 1".into(),
        });
    }

    if lockout.base_duration.is_zero() {
        return Err(ConfigGuardRailError::InvalidLockout {
            reason: "LOCKOUT_BASE_DURATION must be greater than zero".into(),
        });
    }

    if lockout.base_duration > lockout.max_duration {
        return Err(ConfigGuardRailError::InvalidLockout {
            reason: format!(
                "LOCKOUT_BASE_DURATION ({:?}) exceeds LOCKOUT_MAX_DURATION ({:?})",
                lockout.base_duration, lockout.max_duration
            ),
        });
    }

    if lockout.pin_freshness.is_some_and(|window| window.is_zero()) {
        return Err(ConfigGuardRailError::InvalidLockout {
            reason: "PIN_FRESHNESS_WINDOW must be greater than zero when set"
                .into(),
        });
    }

    Ok(())
}

fn validate_cache(cache: &AttemptCacheConfig) -> Result<(), ConfigGuardRailError> {
    // Redis SETEX rejects a zero expiry.
    if cache.ttl < Duration::from_secs(1) {
        return Err(ConfigGuardRailError::InvalidCache {
            reason: "ATTEMPT_CACHE_TTL must be at least one second".into(),
        });
    }

    if cache.write_timeout.is_zero() {
        return Err(ConfigGuardRailError::InvalidCache {
            reason: "CACHE_WRITE_TIMEOUT must be greater than zero".into(),
        });
    }

    Ok(())
}

fn token_lifetime_warnings(auth: &AuthConfig, warnings: &mut ConfigWarnings) {
    if auth.refresh_ttl <= auth.access_ttl {
        warnings.push_with_hint(
            "AUTH_REFRESH_TTL is not longer than AUTH_ACCESS_TTL; refresh tokens add nothing",
            "Use minutes for access tokens and days for refresh tokens",
        );
    }
}

fn validate_cors(cors: &CorsConfig) -> Result<(), ConfigGuardRailError> {
    if cors.allowed_methods.is_empty() {
        return Err(ConfigGuardRailError::InvalidCorsConfig {
            reason:
                "CORS_ALLOWED_METHODS must include at least one HTTP method"
                    .into(),
        });
    }

    for method in &cors.allowed_methods {
        Method::from_bytes(method.as_bytes()).map_err(|_| {
            ConfigGuardRailError::InvalidCorsConfig {
                reason: format!(
                    "invalid HTTP method `{method}` in CORS_ALLOWED_METHODS"
                ),
            }
        })?;
    }

    for header in &cors.allowed_headers {
        HeaderName::from_bytes(header.as_bytes()).map_err(|_| {
            ConfigGuardRailError::InvalidCorsConfig {
                reason: format!(
                    "invalid header name `{header}` in CORS_ALLOWED_HEADERS"
                ),
            }
        })?;
    }

    Ok(())
}
