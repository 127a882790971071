use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use std::fmt;
use uuid::Uuid;

use crate::auth::credential::CredentialRecord;
use crate::auth::repositories::CredentialStore;

pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl fmt::Debug for PostgresCredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresCredentialStore").finish()
    }
}

const SELECT_CREDENTIAL: &str = r#"
    SELECT
        u.id,
        u.username,
        u.display_name,
        c.pin_hash,
        c.failed_attempts,
        c.locked_until,
        c.last_attempt_at
    FROM users u
    INNER JOIN user_credentials c ON c.user_id = u.id
"#;

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn map_row(row: &PgRow) -> Result<CredentialRecord> {
        let failed_attempts: i32 = row
            .try_get("failed_attempts")
            .context("failed to read failed_attempts")?;

        Ok(CredentialRecord {
            user_id: row.try_get("id").context("failed to read user id")?,
            username: row
                .try_get("username")
                .context("failed to read username")?,
            display_name: row
                .try_get("display_name")
                .context("failed to read display_name")?,
            pin_hash: row
                .try_get("pin_hash")
                .context("failed to read pin_hash")?,
            failed_attempts: decode_failed_attempts(failed_attempts)?,
            locked_until: row
                .try_get("locked_until")
                .context("failed to read locked_until")?,
            last_attempt_at: row
                .try_get("last_attempt_at")
                .context("failed to read last_attempt_at")?,
        })
    }

    /// Create a user together with its PIN credential.
    pub async fn create_user(
        &self,
        username: &str,
        display_name: &str,
        pin_hash: &str,
    ) -> Result<Uuid> {
        let user_id = Uuid::now_v7();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO users (id, username, display_name)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id)
        .bind(username)
        .bind(display_name)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("failed to create user {username}"))?;

        sqlx::query(
            r#"
            INSERT INTO user_credentials (user_id, pin_hash)
            VALUES ($1, $2)
            "#,
        )
        .bind(user_id)
        .bind(pin_hash)
        .execute(&mut *tx)
        .await
        .context("failed to store PIN credential")?;

        tx.commit().await?;
        Ok(user_id)
    }
}

/// Negative counters are errors, never zero.
fn decode_failed_attempts(raw: i32) -> Result<u32> {
    u32::try_from(raw)
        .with_context(|| format!("corrupt failed_attempts value {raw}"))
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_by_username(
        &self,
        username: &str,
    ) -> Result<Option<CredentialRecord>> {
        let row = sqlx::query(&format!("{SELECT_CREDENTIAL} WHERE u.username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load credential by username")?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn find_by_id(
        &self,
        user_id: Uuid,
    ) -> Result<Option<CredentialRecord>> {
        let row = sqlx::query(&format!("{SELECT_CREDENTIAL} WHERE u.id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to load credential by id")?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn update_failed_attempts(
        &self,
        user_id: Uuid,
        failed_attempts: u32,
        attempted_at: DateTime<Utc>,
    ) -> Result<()> {
        let failed_attempts = i32::try_from(failed_attempts).unwrap_or(i32::MAX);
        let result = sqlx::query(
            r#"
            UPDATE user_credentials
            SET failed_attempts = $2,
                last_attempt_at = $3,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(failed_attempts)
        .bind(attempted_at)
        .execute(&self.pool)
        .await
        .context("failed to update failed attempts")?;

        if result.rows_affected() == 0 {
            bail!("credential record {user_id} not found");
        }
        Ok(())
    }

    async fn update_lock_expiry(
        &self,
        user_id: Uuid,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE user_credentials
            SET locked_until = $2,
                updated_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .bind(locked_until)
        .execute(&self.pool)
        .await
        .context("failed to update lock expiry")?;

        if result.rows_affected() == 0 {
            bail!("credential record {user_id} not found");
        }
        Ok(())
    }
}
