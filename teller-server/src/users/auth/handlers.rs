use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use teller_core::{Claims, TokenPair, api_types::ApiResponse};
use tracing::info;

use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

#[derive(Debug, Deserialize)]
pub struct VerifyPinRequest {
    pub username: String,
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

pub async fn verify_pin(
    State(state): State<AppState>,
    Json(request): Json<VerifyPinRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let username = request.username.trim();
    if username.is_empty() || request.pin.is_empty() {
        return Err(AppError::bad_request("username and pin are required"));
    }

    let tokens = state.auth().verify_pin(username, &request.pin).await?;
    Ok(Json(ApiResponse::success(tokens)))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> AppResult<Json<ApiResponse<TokenPair>>> {
    let tokens = state.auth().refresh_token(&request.refresh_token).await?;
    Ok(Json(ApiResponse::success(tokens)))
}

/// Ban the presented access token for the rest of its lifetime.
pub async fn logout(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> StatusCode {
    if state.revocations.revoke(&claims, Utc::now()).await {
        info!(user_id = %claims.sub, "access token revoked on logout");
    }
    StatusCode::NO_CONTENT
}
