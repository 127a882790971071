use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info};

use crate::auth::repositories::AttemptCache;

#[derive(Clone)]
pub struct RedisAttemptCache {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisAttemptCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisAttemptCache")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisAttemptCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        info!("Connecting to Redis attempt cache");

        let client = redis::Client::open(redis_url)
            .context("failed to create Redis client")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to Redis")?;

        info!("Connected to Redis attempt cache");
        Ok(Self { conn })
    }
}

#[async_trait]
impl AttemptCache for RedisAttemptCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> =
            conn.get(key).await.context("Redis GET failed")?;
        debug!(key, hit = value.is_some(), "attempt cache GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        // SETEX rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, seconds)
            .await
            .context("Redis SETEX failed")?;
        debug!(key, seconds, "attempt cache SETEX");
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.context("Redis DEL failed")?;
        debug!(key, "attempt cache DEL");
        Ok(())
    }
}
