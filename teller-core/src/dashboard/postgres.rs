use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;

use super::{AccountSummary, DashboardRepository, TransactionSummary};
use crate::users::UserSummary;

pub struct PostgresDashboardRepository {
    pool: PgPool,
}

impl fmt::Debug for PostgresDashboardRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresDashboardRepository").finish()
    }
}

impl PostgresDashboardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    id: Uuid,
    name: String,
    kind: String,
    currency: String,
    balance_minor: i64,
}

impl From<AccountRow> for AccountSummary {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            kind: row.kind,
            currency: row.currency.trim().to_string(),
            balance_minor: row.balance_minor,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    amount_minor: i64,
    currency: String,
    description: String,
    posted_at: DateTime<Utc>,
}

impl From<TransactionRow> for TransactionSummary {
    fn from(row: TransactionRow) -> Self {
        Self {
            id: row.id,
            account_id: row.account_id,
            amount_minor: row.amount_minor,
            currency: row.currency.trim().to_string(),
            description: row.description,
            posted_at: row.posted_at,
        }
    }
}

#[async_trait]
impl DashboardRepository for PostgresDashboardRepository {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserSummary>> {
        let row = sqlx::query_as::<_, crate::users::postgres::UserRow>(
            r#"
            SELECT id, username, display_name, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load user")?;

        Ok(row.map(UserSummary::from))
    }

    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<AccountSummary>> {
        let rows = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT id, name, kind, currency, balance_minor
            FROM accounts
            WHERE user_id = $1
            ORDER BY created_at, name
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to list accounts")?;

        Ok(rows.into_iter().map(AccountSummary::from).collect())
    }

    async fn recent_transactions(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<TransactionSummary>> {
        let rows = sqlx::query_as::<_, TransactionRow>(
            r#"
            SELECT t.id, t.account_id, t.amount_minor, t.currency,
                   t.description, t.posted_at
            FROM transactions t
            INNER JOIN accounts a ON a.id = t.account_id
            WHERE a.user_id = $1
            ORDER BY t.posted_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to list recent transactions")?;

        Ok(rows.into_iter().map(TransactionSummary::from).collect())
    }
}
