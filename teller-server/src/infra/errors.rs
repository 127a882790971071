use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::fmt;
use std::time::Duration;
use teller_core::{AuthError, TokenError, api_types::ApiResponse};
use tracing::error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
    /// Sent as `Retry-After` on locked responses.
    pub retry_after: Option<Duration>,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn locked(retry_after: Duration) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(StatusCode::LOCKED, "PIN locked")
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retry_secs = self.retry_after.map(|after| after.as_secs());

        let mut envelope = ApiResponse::<()>::error(self.message);
        if let Some(secs) = retry_secs {
            envelope =
                envelope.with_message(format!("retry in {secs} seconds"));
        }

        let mut response = (self.status, Json(envelope)).into_response();
        if let Some(secs) = retry_secs
            && let Ok(value) = HeaderValue::from_str(&secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        response
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UserNotFound => Self::not_found("invalid credentials"),
            AuthError::InvalidPin { remaining_attempts } => Self::unauthorized(
                format!("invalid PIN, {remaining_attempts} attempts remaining"),
            ),
            AuthError::PinLocked { retry_after } => Self::locked(retry_after),
            AuthError::PinExpired => {
                Self::forbidden("PIN expired, reset required")
            }
            AuthError::Token(err) => Self::from(err),
            AuthError::Internal(err) => {
                error!(error = ?err, "authentication failed internally");
                Self::internal("internal server error")
            }
        }
    }
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Empty
            | TokenError::Expired
            | TokenError::Malformed
            | TokenError::WrongType { .. }
            | TokenError::InvalidSignature => Self::unauthorized(err.to_string()),
            TokenError::EmptySecret(_)
            | TokenError::InvalidLifetime
            | TokenError::Signing(_) => {
                error!(error = %err, "token signer failure");
                Self::internal("internal server error")
            }
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = ?err, "request failed");
        Self::internal("internal server error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use teller_core::TokenType;

    #[test]
    fn lock_sets_retry_after_header() {
        let response =
            AppError::from(AuthError::PinLocked {
                retry_after: Duration::from_secs(10),
            })
            .into_response();

        assert_eq!(response.status(), StatusCode::LOCKED);
        assert_eq!(
            response.headers().get(header::RETRY_AFTER).unwrap(),
            "10"
        );
    }

    #[tokio::test]
    async fn errors_use_the_response_envelope() {
        let response =
            AppError::from(AuthError::PinLocked {
                retry_after: Duration::from_secs(10),
            })
            .into_response();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");
        assert_eq!(body["error"], "PIN locked");
        assert_eq!(body["message"], "retry in 10 seconds");
        assert!(body.get("data").is_none());
    }

    #[test]
    fn maps_auth_outcomes_to_statuses() {
        let cases = [
            (AuthError::UserNotFound, StatusCode::NOT_FOUND),
            (
                AuthError::InvalidPin {
                    remaining_attempts: 1,
                },
                StatusCode::UNAUTHORIZED,
            ),
            (AuthError::PinExpired, StatusCode::FORBIDDEN),
            (
                AuthError::Token(TokenError::WrongType {
                    expected: TokenType::Refresh,
                }),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AuthError::Internal(anyhow::anyhow!("db down")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(AppError::from(err).status, status);
        }
    }

    #[test]
    fn internal_causes_are_not_echoed() {
        let err = AppError::from(AuthError::Internal(anyhow::anyhow!(
            "password authentication failed for user postgres"
        )));
        assert_eq!(err.message, "internal server error");
    }
}
