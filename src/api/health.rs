// src/api/health.rs
use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde_json::json;

use crate::app_state::AppState;
use crate::utils::api_response::ApiResponse;

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(liveness))
        .route("/health/ready", get(readiness))
}

/// Process liveness
pub async fn liveness() -> ApiResponse<serde_json::Value> {
    ApiResponse::success(
        StatusCode::OK,
        "OK",
        json!({ "version": env!("CARGO_PKG_VERSION") }),
    )
}

/// Readiness: verifies the database answers
pub async fn readiness(
    State(state): State<AppState>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::SERVICE_UNAVAILABLE,
                "Database unavailable",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(StatusCode::OK, "Ready", ()))
}
