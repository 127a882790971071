pub mod error;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::debug;
use url::Url;

use crate::constants::{
    DEFAULT_ACCESS_SECRET, DEFAULT_ACCESS_TTL, DEFAULT_ATTEMPT_CACHE_TTL,
    DEFAULT_AUDIENCE, DEFAULT_CACHE_WRITE_TIMEOUT,
    DEFAULT_DATABASE_MAX_CONNECTIONS, DEFAULT_ISSUER, DEFAULT_LOCKOUT_BASE,
    DEFAULT_LOCKOUT_MAX, DEFAULT_LOCKOUT_THRESHOLD, DEFAULT_PIN_PEPPER,
    DEFAULT_REFRESH_SECRET, DEFAULT_REFRESH_TTL,
};
use crate::models::{
    AttemptCacheConfig, AuthConfig, Config, ConfigMetadata, CorsConfig,
    DatabaseConfig, LockoutConfig, RedisConfig, ServerConfig,
    sources::{EnvConfig, FileConfig},
};
use crate::util::parse_duration;
use crate::validation::{self, ConfigWarnings};

pub use error::ConfigLoadError;

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["teller.toml", "config/teller.toml"];

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load `.env`, the TOML file and the process environment, in that
    /// order of increasing precedence.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let env_config = EnvConfig::gather();
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        Self::compose(
            file_config,
            env_config,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingConfig { path });
                }
                path
            }
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        debug!(path = %path.display(), "reading configuration file");
        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }

    /// Merge file and environment sources (environment wins), fill in
    /// defaults and run the guard rails.
    pub fn compose(
        file_config: Option<FileConfig>,
        env: EnvConfig,
        metadata: ConfigMetadata,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if metadata.config_path.is_none() {
            warnings.push_with_hint(
                "No teller.toml detected; falling back to environment variables",
                "Pass --config or set TELLER_CONFIG_PATH to use a configuration file",
            );
        }

        let FileConfig {
            server: file_server,
            database: file_database,
            redis: file_redis,
            cors: file_cors,
            auth: file_auth,
            lockout: file_lockout,
            cache: file_cache,
            dev_mode: file_dev_mode,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .or(file_server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.server_port.or(file_server.port).unwrap_or(8080),
        };

        let database_url = env
            .database_url
            .or(file_database.url)
            .filter(|value| !value.trim().is_empty());
        if let Some(url) = &database_url {
            Url::parse(url).map_err(|source| {
                ConfigLoadError::InvalidDatabaseUrl { source }
            })?;
        }
        let database = DatabaseConfig {
            url: database_url,
            max_connections: env
                .database_max_connections
                .or(file_database.max_connections)
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            run_migrations: env
                .database_run_migrations
                .or(file_database.run_migrations)
                .unwrap_or(true),
        };

        let redis = env
            .redis_url
            .map(|url| RedisConfig { url })
            .or_else(|| file_redis.map(|r| RedisConfig { url: r.url }));

        let cors = CorsConfig {
            allowed_origins: env
                .cors_allowed_origins
                .or(file_cors.allowed_origins)
                .unwrap_or_else(default_cors_origins),
            allowed_methods: env
                .cors_allowed_methods
                .or(file_cors.allowed_methods)
                .unwrap_or_else(default_cors_methods),
            allowed_headers: env
                .cors_allowed_headers
                .or(file_cors.allowed_headers)
                .unwrap_or_else(default_cors_headers),
            allow_credentials: env
                .cors_allow_credentials
                .or(file_cors.allow_credentials)
                .unwrap_or(false),
        };

        let dev_mode = env.dev_mode.or(file_dev_mode).unwrap_or(false);

        let auth = AuthConfig {
            pin_pepper: env
                .auth_pin_pepper
                .or(file_auth.pin_pepper)
                .unwrap_or_else(|| DEFAULT_PIN_PEPPER.to_string()),
            access_secret: env
                .auth_access_secret
                .or(file_auth.access_secret)
                .unwrap_or_else(|| DEFAULT_ACCESS_SECRET.to_string()),
            refresh_secret: env
                .auth_refresh_secret
                .or(file_auth.refresh_secret)
                .unwrap_or_else(|| DEFAULT_REFRESH_SECRET.to_string()),
            access_ttl: resolve_duration(
                "AUTH_ACCESS_TTL",
                env.auth_access_ttl.or(file_auth.access_ttl),
                DEFAULT_ACCESS_TTL,
            )?,
            refresh_ttl: resolve_duration(
                "AUTH_REFRESH_TTL",
                env.auth_refresh_ttl.or(file_auth.refresh_ttl),
                DEFAULT_REFRESH_TTL,
            )?,
            issuer: env
                .auth_issuer
                .or(file_auth.issuer)
                .unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            audience: env
                .auth_audience
                .or(file_auth.audience)
                .unwrap_or_else(|| DEFAULT_AUDIENCE.to_string()),
        };

        let lockout = LockoutConfig {
            threshold: env
                .lockout_threshold
                .or(file_lockout.threshold)
                .unwrap_or(DEFAULT_LOCKOUT_THRESHOLD),
            base_duration: resolve_duration(
                "LOCKOUT_BASE_DURATION",
                env.lockout_base_duration.or(file_lockout.base_duration),
                DEFAULT_LOCKOUT_BASE,
            )?,
            max_duration: resolve_duration(
                "LOCKOUT_MAX_DURATION",
                env.lockout_max_duration.or(file_lockout.max_duration),
                DEFAULT_LOCKOUT_MAX,
            )?,
            pin_freshness: resolve_optional_duration(
                "PIN_FRESHNESS_WINDOW",
                env.pin_freshness.or(file_lockout.pin_freshness),
            )?,
        };

        let cache = AttemptCacheConfig {
            ttl: resolve_duration(
                "ATTEMPT_CACHE_TTL",
                env.attempt_cache_ttl.or(file_cache.ttl),
                DEFAULT_ATTEMPT_CACHE_TTL,
            )?,
            write_timeout: resolve_duration(
                "CACHE_WRITE_TIMEOUT",
                env.cache_write_timeout.or(file_cache.write_timeout),
                DEFAULT_CACHE_WRITE_TIMEOUT,
            )?,
        };

        let config = Config {
            server,
            database,
            redis,
            cors,
            auth,
            lockout,
            cache,
            dev_mode,
            metadata,
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok(ConfigLoad { config, warnings })
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve_duration(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(value) => parse_duration(&value).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        }),
        None => Ok(default),
    }
}

/// `"off"` and `"none"` disable the setting.
fn resolve_optional_duration(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    match raw {
        Some(value)
            if matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "off" | "none"
            ) =>
        {
            Ok(None)
        }
        Some(value) => parse_duration(&value).map(Some).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        }),
        None => Ok(None),
    }
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

fn default_cors_methods() -> Vec<String> {
    vec![
        "GET".to_string(),
        "POST".to_string(),
        "OPTIONS".to_string(),
    ]
}

fn default_cors_headers() -> Vec<String> {
    vec!["Authorization".to_string(), "Content-Type".to_string()]
}
