//! Configuration for the Teller banking backend.
//!
//! Values are resolved from (lowest to highest precedence) built-in
//! defaults, an optional `teller.toml`, a `.env` file and the process
//! environment. Guard rails reject unsafe production settings before the
//! server starts.

pub mod constants;
pub mod loader;
pub mod models;
pub mod util;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError};
pub use models::{
    AttemptCacheConfig, AuthConfig, Config, ConfigMetadata, CorsConfig,
    DatabaseConfig, LockoutConfig, RedisConfig, ServerConfig,
};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
