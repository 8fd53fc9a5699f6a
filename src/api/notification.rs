// src/api/notification.rs
use crate::app_state::AppState;
use crate::db::queries::notification::*;
use axum::{
    routing::{delete, get, patch},
    Router,
};

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(my_notifications))
        .route("/notifications/unread-count", get(unread_count))
        .route("/notifications/read-all", patch(mark_all_read))
        .route("/notifications/clear-read", delete(clear_read))
        .route(
            "/notifications/{notification_id}",
            delete(delete_notification),
        )
        .route("/notifications/{notification_id}/read", patch(mark_read))
}
