//! User directory listing.

mod memory;
#[cfg(feature = "database")]
pub(crate) mod postgres;

pub use memory::InMemoryDirectory;
#[cfg(feature = "database")]
pub use postgres::PostgresUserRepository;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::api_types::Page;

pub const DEFAULT_PAGE_LIMIT: u32 = 25;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Public view of a user. Never carries credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Users ordered by username.
    async fn list_users(
        &self,
        offset: u32,
        limit: u32,
    ) -> Result<Vec<UserSummary>>;

    async fn count_users(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct UserService {
    repo: Arc<dyn UserRepository>,
}

impl fmt::Debug for UserService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

impl UserService {
    pub fn new(repo: Arc<dyn UserRepository>) -> Self {
        Self { repo }
    }

    pub async fn list(
        &self,
        offset: Option<u32>,
        limit: Option<u32>,
    ) -> Result<Page<UserSummary>> {
        let offset = offset.unwrap_or(0);
        let limit = limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);

        let items = self.repo.list_users(offset, limit).await?;
        let total = self.repo.count_users().await?;

        Ok(Page {
            items,
            offset,
            limit,
            total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn limit_is_clamped() {
        let mut repo = MockUserRepository::new();
        repo.expect_list_users()
            .withf(|offset, limit| *offset == 0 && *limit == MAX_PAGE_LIMIT)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        repo.expect_list_users()
            .withf(|offset, limit| *offset == 5 && *limit == 1)
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        repo.expect_count_users().returning(|| Ok(0));

        let service = UserService::new(Arc::new(repo));
        let page = service.list(None, Some(10_000)).await.unwrap();
        assert_eq!(page.limit, MAX_PAGE_LIMIT);

        let page = service.list(Some(5), Some(0)).await.unwrap();
        assert_eq!(page.limit, 1);
        assert_eq!(page.offset, 5);
    }

    #[tokio::test]
    async fn pages_through_the_directory() {
        let directory = InMemoryDirectory::new();
        for name in ["carol", "alice", "bob"] {
            directory.add_user(Uuid::now_v7(), name, name).await;
        }

        let service = UserService::new(Arc::new(directory));
        let first = service.list(Some(0), Some(2)).await.unwrap();
        assert_eq!(first.total, 3);
        let names: Vec<_> =
            first.items.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, ["alice", "bob"]);

        let rest = service.list(Some(2), None).await.unwrap();
        assert_eq!(rest.items.len(), 1);
        assert_eq!(rest.items[0].username, "carol");
        assert_eq!(rest.limit, DEFAULT_PAGE_LIMIT);
    }
}
