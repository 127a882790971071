use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Persisted PIN credential for a single user.
///
/// Owned by the credential store and mutated only through its explicit
/// update operations. The same JSON form is what the attempt cache holds.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub user_id: Uuid,
    pub username: String,
    pub display_name: String,
    /// Argon2id PHC string.
    pub pin_hash: String,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn new(
        user_id: Uuid,
        username: impl Into<String>,
        display_name: impl Into<String>,
        pin_hash: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            username: username.into(),
            display_name: display_name.into(),
            pin_hash: pin_hash.into(),
            failed_attempts: 0,
            locked_until: None,
            last_attempt_at: None,
        }
    }

    pub fn snapshot(&self) -> AttemptSnapshot {
        AttemptSnapshot {
            user_id: self.user_id,
            failed_attempts: self.failed_attempts,
            locked_until: self.locked_until,
            last_attempt_at: self.last_attempt_at,
        }
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("user_id", &self.user_id)
            .field("username", &self.username)
            .field("display_name", &self.display_name)
            .field("pin_hash", &"<redacted>")
            .field("failed_attempts", &self.failed_attempts)
            .field("locked_until", &self.locked_until)
            .field("last_attempt_at", &self.last_attempt_at)
            .finish()
    }
}

/// The mutable lockout fields of a [`CredentialRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptSnapshot {
    pub user_id: Uuid,
    pub failed_attempts: u32,
    pub locked_until: Option<DateTime<Utc>>,
    pub last_attempt_at: Option<DateTime<Utc>>,
}
