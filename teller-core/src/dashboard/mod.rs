//! Per-user account overview shown after login.

#[cfg(feature = "database")]
mod postgres;

#[cfg(feature = "database")]
pub use postgres::PostgresDashboardRepository;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::users::UserSummary;

pub const RECENT_TRANSACTION_LIMIT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSummary {
    pub id: Uuid,
    pub name: String,
    pub kind: String,
    /// ISO 4217 code.
    pub currency: String,
    /// Balance in minor units (cents).
    pub balance_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub account_id: Uuid,
    pub amount_minor: i64,
    pub currency: String,
    pub description: String,
    pub posted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub user: UserSummary,
    pub accounts: Vec<AccountSummary>,
    pub totals_by_currency: BTreeMap<String, i64>,
    pub recent_transactions: Vec<TransactionSummary>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DashboardRepository: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserSummary>>;

    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<AccountSummary>>;

    /// Newest first, across all of the user's accounts.
    async fn recent_transactions(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<TransactionSummary>>;
}

#[derive(Clone)]
pub struct DashboardService {
    repo: Arc<dyn DashboardRepository>,
}

impl fmt::Debug for DashboardService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DashboardService").finish_non_exhaustive()
    }
}

impl DashboardService {
    pub fn new(repo: Arc<dyn DashboardRepository>) -> Self {
        Self { repo }
    }

    /// `None` when the user does not exist.
    pub async fn summary(
        &self,
        user_id: Uuid,
    ) -> Result<Option<DashboardSummary>> {
        let Some(user) = self.repo.find_user(user_id).await? else {
            return Ok(None);
        };

        let accounts = self.repo.list_accounts(user_id).await?;
        let recent_transactions = self
            .repo
            .recent_transactions(user_id, RECENT_TRANSACTION_LIMIT)
            .await?;

        Ok(Some(DashboardSummary {
            totals_by_currency: totals_by_currency(&accounts),
            user,
            accounts,
            recent_transactions,
        }))
    }
}

fn totals_by_currency(accounts: &[AccountSummary]) -> BTreeMap<String, i64> {
    let mut totals = BTreeMap::new();
    for account in accounts {
        let total = totals.entry(account.currency.clone()).or_insert(0i64);
        *total = total.saturating_add(account.balance_minor);
    }
    totals
}
