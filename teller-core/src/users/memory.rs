use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::cmp::Reverse;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{UserRepository, UserSummary};
use crate::dashboard::{
    AccountSummary, DashboardRepository, TransactionSummary,
};

#[derive(Debug, Default)]
struct Directory {
    users: HashMap<Uuid, UserSummary>,
    accounts: HashMap<Uuid, Vec<AccountSummary>>,
    transactions: Vec<TransactionSummary>,
}

/// Users, accounts and transactions held in process memory. Backs both
/// read models when the server runs without a database.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    inner: RwLock<Directory>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(
        &self,
        id: Uuid,
        username: &str,
        display_name: &str,
    ) -> UserSummary {
        let user = UserSummary {
            id,
            username: username.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };
        self.inner.write().await.users.insert(id, user.clone());
        user
    }

    pub async fn add_account(&self, user_id: Uuid, account: AccountSummary) {
        self.inner
            .write()
            .await
            .accounts
            .entry(user_id)
            .or_default()
            .push(account);
    }

    pub async fn add_transaction(&self, transaction: TransactionSummary) {
        self.inner.write().await.transactions.push(transaction);
    }
}

#[async_trait]
impl UserRepository for InMemoryDirectory {
    async fn list_users(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<UserSummary>> {
        let inner = self.inner.read().await;
        let mut users: Vec<_> = inner.users.values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count_users(&self) -> Result<u64> {
        Ok(self.inner.read().await.users.len() as u64)
    }
}

#[async_trait]
impl DashboardRepository for InMemoryDirectory {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<UserSummary>> {
        Ok(self.inner.read().await.users.get(&user_id).cloned())
    }

    async fn list_accounts(&self, user_id: Uuid) -> Result<Vec<AccountSummary>> {
        Ok(self
            .inner
            .read()
            .await
            .accounts
            .get(&user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn recent_transactions(
        &self,
        user_id: Uuid,
        limit: u32,
    ) -> Result<Vec<TransactionSummary>> {
        let inner = self.inner.read().await;
        let Some(accounts) = inner.accounts.get(&user_id) else {
            return Ok(Vec::new());
        };

        let mut transactions: Vec<_> = inner
            .transactions
            .iter()
            .filter(|tx| accounts.iter().any(|acc| acc.id == tx.account_id))
            .cloned()
            .collect();
        transactions.sort_by_key(|tx| Reverse(tx.posted_at));
        transactions.truncate(limit as usize);
        Ok(transactions)
    }
}
