use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use teller_core::api_types::{ApiResponse, Page};
use teller_core::users::UserSummary;

use crate::infra::app_state::AppState;
use crate::infra::errors::AppResult;

#[derive(Debug, Default, Deserialize)]
pub struct ListUsersQuery {
    pub offset: Option<u32>,
    pub limit: Option<u32>,
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListUsersQuery>,
) -> AppResult<Json<ApiResponse<Page<UserSummary>>>> {
    let page = state.user_service.list(query.offset, query.limit).await?;
    Ok(Json(ApiResponse::success(page)))
}
