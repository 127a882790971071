use std::time::Duration;
use thiserror::Error;

use super::crypto::AuthCryptoError;
use super::token::TokenError;

/// Outcome of a failed PIN check or token refresh.
///
/// Everything but [`AuthError::Internal`] is an expected business result.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user not found")]
    UserNotFound,
    #[error("PIN locked, retry in {}s", retry_after.as_secs())]
    PinLocked { retry_after: Duration },
    #[error("PIN expired")]
    PinExpired,
    #[error("invalid PIN, {remaining_attempts} attempts remaining")]
    InvalidPin { remaining_attempts: u32 },
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("internal authentication error")]
    Internal(#[from] anyhow::Error),
}

impl From<AuthCryptoError> for AuthError {
    fn from(err: AuthCryptoError) -> Self {
        AuthError::Internal(err.into())
    }
}
