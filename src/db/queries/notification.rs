// src/db/queries/notification.rs
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use serde_json::json;

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::db::models::notification::{
    Notification, NotificationFeed, NotificationFilter, NotificationWithSender,
};
use crate::utils::api_response::ApiResponse;

const DEFAULT_LIMIT: i64 = 50;

fn db_error(e: sqlx::Error, message: &str) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        message,
        Some(json!({ "error": e.to_string() })),
    )
}

/// List the caller's notifications, newest first, with the unread total
#[utoipa::path(
    get,
    path = "/notifications",
    params(NotificationFilter),
    responses(
        (status = 200, description = "Notifications retrieved", body = NotificationFeed)
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn my_notifications(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(filter): Query<NotificationFilter>,
) -> Result<ApiResponse<NotificationFeed>, ApiResponse<()>> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 200);

    let notifications = sqlx::query_as::<_, NotificationWithSender>(
        "SELECT n.id, n.recipient, n.sender, n.type, n.title, n.message,
                n.related_request, n.related_team, n.is_read, n.link, n.created_at,
                u.username AS sender_username, u.role AS sender_role
         FROM notifications n
         LEFT JOIN users u ON u.id = n.sender
         WHERE n.recipient = ?1
         ORDER BY n.created_at DESC, n.id DESC
         LIMIT ?2",
    )
    .bind(claims.sub)
    .bind(limit)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch notifications"))?;

    let unread_count = count_unread(&state, claims.sub).await?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications retrieved",
        NotificationFeed {
            notifications,
            unread_count,
        },
    ))
}

/// Count of the caller's unread notifications
#[utoipa::path(
    get,
    path = "/notifications/unread-count",
    responses(
        (status = 200, description = "Unread count retrieved", body = i64)
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<i64>, ApiResponse<()>> {
    let count = count_unread(&state, claims.sub).await?;
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Unread count retrieved",
        count,
    ))
}

async fn count_unread(state: &AppState, recipient: i64) -> Result<i64, ApiResponse<()>> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient = ?1 AND is_read = 0")
        .bind(recipient)
        .fetch_one(&state.pool)
        .await
        .map_err(|e| db_error(e, "Failed to count unread notifications"))
}

/// Mark one notification as read. Idempotent; marking an already-read
/// notification succeeds without change.
#[utoipa::path(
    patch,
    path = "/notifications/{notification_id}/read",
    params(("notification_id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification marked as read", body = Notification),
        (status = 404, description = "Notification not found")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<i64>,
) -> Result<ApiResponse<Notification>, ApiResponse<()>> {
    // Scoped to the recipient: another user's notification is a 404, never a 403.
    let notification = sqlx::query_as::<_, Notification>(
        "UPDATE notifications SET is_read = 1
         WHERE id = ?1 AND recipient = ?2
         RETURNING id, recipient, sender, type, title, message, related_request, related_team, is_read, link, created_at",
    )
    .bind(notification_id)
    .bind(claims.sub)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to mark notification as read"))?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Notification not found", None)
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification marked as read",
        notification,
    ))
}

/// Mark all of the caller's notifications as read, returning how many changed
#[utoipa::path(
    patch,
    path = "/notifications/read-all",
    responses(
        (status = 200, description = "Notifications marked as read", body = u64)
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<u64>, ApiResponse<()>> {
    let result = sqlx::query(
        "UPDATE notifications SET is_read = 1 WHERE recipient = ?1 AND is_read = 0",
    )
    .bind(claims.sub)
    .execute(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to mark notifications as read"))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications marked as read",
        result.rows_affected(),
    ))
}

/// Delete one of the caller's notifications
#[utoipa::path(
    delete,
    path = "/notifications/{notification_id}",
    params(("notification_id" = i64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Notification deleted"),
        (status = 404, description = "Notification not found")
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<i64>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = ?1 AND recipient = ?2")
        .bind(notification_id)
        .bind(claims.sub)
        .execute(&state.pool)
        .await
        .map_err(|e| db_error(e, "Failed to delete notification"))?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Notification not found",
            None,
        ));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Notification deleted", ()))
}

/// Delete all of the caller's read notifications
#[utoipa::path(
    delete,
    path = "/notifications/clear-read",
    responses(
        (status = 200, description = "Read notifications cleared", body = u64)
    ),
    tag = "Notifications",
    security(("bearerAuth" = []))
)]
pub async fn clear_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<u64>, ApiResponse<()>> {
    let result = sqlx::query("DELETE FROM notifications WHERE recipient = ?1 AND is_read = 1")
        .bind(claims.sub)
        .execute(&state.pool)
        .await
        .map_err(|e| db_error(e, "Failed to clear read notifications"))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Read notifications cleared",
        result.rows_affected(),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        my_notifications,
        unread_count,
        mark_read,
        mark_all_read,
        delete_notification,
        clear_read,
    ),
    components(schemas(
        crate::db::models::notification::Notification,
        crate::db::models::notification::NotificationWithSender,
        crate::db::models::notification::NotificationFeed,
        crate::db::models::notification::NotificationType,
    ))
)]
pub struct NotificationDoc;
