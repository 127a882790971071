use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::{
    AppState,
    dashboard::handlers as dashboard_handlers,
    users::{auth, user_handlers},
};

pub fn create_v1_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/pin/verify", post(auth::handlers::verify_pin))
        .route("/auth/refresh", post(auth::handlers::refresh))
        .merge(create_protected_routes(state))
}

/// Routes that require a valid access token.
fn create_protected_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/auth/logout", post(auth::handlers::logout))
        .route("/users", get(user_handlers::list_users))
        .route("/dashboard", get(dashboard_handlers::get_dashboard))
        .layer(middleware::from_fn_with_state(
            state,
            auth::middleware::auth_middleware,
        ))
}

async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
