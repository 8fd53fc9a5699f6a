// src/db/models/notification.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::user::Role;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationType {
    RequestSubmitted,
    RequestApproved,
    RequestRejected,
    RequestClosed,
    RequestReopened,
    TeamAdded,
    TeamRemoved,
    AttendanceMarked,
    General,
}

/// A persisted notification. Immutable except for `is_read`, which only ever
/// moves false -> true.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Notification {
    pub id: i64,
    pub recipient: i64,
    pub sender: Option<i64>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_request: Option<i64>,
    pub related_team: Option<i64>,
    pub is_read: bool,
    pub link: Option<String>,
    pub created_at: NaiveDateTime,
}

/// Notification joined with the sender's identity for list responses.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct NotificationWithSender {
    pub id: i64,
    pub recipient: i64,
    pub sender: Option<i64>,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub related_request: Option<i64>,
    pub related_team: Option<i64>,
    pub is_read: bool,
    pub link: Option<String>,
    pub created_at: NaiveDateTime,
    pub sender_username: Option<String>,
    pub sender_role: Option<Role>,
}

/// Payload for `GET /notifications`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationFeed {
    pub notifications: Vec<NotificationWithSender>,
    pub unread_count: i64,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct NotificationFilter {
    /// Maximum number of notifications to return (newest first). Defaults to 50.
    pub limit: Option<i64>,
}
