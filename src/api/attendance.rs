// src/api/attendance.rs
use crate::app_state::AppState;
use crate::db::queries::attendance::*;
use axum::{
    routing::{get, post},
    Router,
};

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/attendance/check-in", post(check_in))
        .route("/attendance/check-out", post(check_out))
        .route("/attendance/today", get(today))
        .route("/attendance/history", get(history))
}
