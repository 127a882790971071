//! Default values used when neither the config file nor the environment
//! provides a setting.

use std::time::Duration;

pub const DEFAULT_PIN_PEPPER: &str = "change-me-pin-pepper";
pub const DEFAULT_ACCESS_SECRET: &str = "change-me-access-secret";
pub const DEFAULT_REFRESH_SECRET: &str = "change-me-refresh-secret";

pub const DEFAULT_ISSUER: &str = "teller";
pub const DEFAULT_AUDIENCE: &str = "teller-api";

pub const DEFAULT_ACCESS_TTL: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

pub const DEFAULT_LOCKOUT_THRESHOLD: u32 = 3;
pub const DEFAULT_LOCKOUT_BASE: Duration = Duration::from_secs(30);
pub const DEFAULT_LOCKOUT_MAX: Duration = Duration::from_secs(60 * 60);

pub const DEFAULT_ATTEMPT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_CACHE_WRITE_TIMEOUT: Duration = Duration::from_millis(500);

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;
