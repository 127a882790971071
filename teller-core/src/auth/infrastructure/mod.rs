mod cached;
mod memory;
#[cfg(feature = "database")]
mod postgres;
#[cfg(feature = "database")]
mod redis;

pub use cached::CachedCredentialStore;
pub use memory::{InMemoryAttemptCache, InMemoryCredentialStore};
#[cfg(feature = "database")]
pub use postgres::PostgresCredentialStore;
#[cfg(feature = "database")]
pub use redis::RedisAttemptCache;
