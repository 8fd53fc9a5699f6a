// src/api/requests.rs
use crate::app_state::AppState;
use crate::db::queries::requests::*;
use axum::{
    routing::{get, post},
    Router,
};

pub fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/requests", post(create_request).get(all_requests))
        .route("/requests/mine", get(my_requests))
        .route("/requests/pending", get(pending_requests))
        .route("/requests/{request_id}", get(get_request))
        .route("/requests/{request_id}/submit", post(submit_request))
        .route("/requests/{request_id}/withdraw", post(withdraw_request))
        .route("/requests/{request_id}/approve", post(approve_request))
        .route("/requests/{request_id}/reject", post(reject_request))
        .route("/requests/{request_id}/close", post(close_request))
        .route("/requests/{request_id}/reopen", post(reopen_request))
}
