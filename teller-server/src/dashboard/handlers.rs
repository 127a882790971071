use axum::{Extension, Json, extract::State};
use teller_core::Claims;
use teller_core::api_types::ApiResponse;
use teller_core::dashboard::DashboardSummary;

use crate::infra::app_state::AppState;
use crate::infra::errors::{AppError, AppResult};

pub async fn get_dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> AppResult<Json<ApiResponse<DashboardSummary>>> {
    let summary = state
        .dashboard_service
        .summary(claims.sub)
        .await?
        .ok_or_else(|| AppError::not_found("user not found"))?;
    Ok(Json(ApiResponse::success(summary)))
}
