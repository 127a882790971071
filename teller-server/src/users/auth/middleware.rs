use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::infra::app_state::AppState;
use crate::infra::errors::AppError;

/// Require a valid, unrevoked access token and expose its
/// [`teller_core::Claims`] to handlers as a request extension.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer_token(&request)?;
    let claims = state.auth().validate_access_token(token)?;

    if state.revocations.is_revoked(&claims).await {
        debug!(user_id = %claims.sub, "rejected revoked access token");
        return Err(AppError::unauthorized("token has been revoked"));
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

fn extract_bearer_token(request: &Request) -> Result<&str, AppError> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| AppError::unauthorized("missing bearer token"))
}
