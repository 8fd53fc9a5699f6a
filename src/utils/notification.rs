use serde_json::json;
use sqlx::SqlitePool;

use crate::db::models::notification::{Notification, NotificationType};
use crate::realtime::ConnectionRegistry;

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur while dispatching a notification
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid notification: {0}")]
    Invalid(String),
}

/// Builder for a single-recipient notification. `send` persists the row
/// unconditionally and then attempts a live push; the push is best-effort and
/// never affects the persisted result.
pub struct NotificationBuilder {
    recipient: i64,
    sender: Option<i64>,
    kind: NotificationType,
    title: String,
    message: String,
    related_request: Option<i64>,
    related_team: Option<i64>,
    link: Option<String>,
}

impl NotificationBuilder {
    pub fn new(recipient: i64, kind: NotificationType) -> Self {
        Self {
            recipient,
            sender: None,
            kind,
            title: String::new(),
            message: String::new(),
            related_request: None,
            related_team: None,
            link: None,
        }
    }

    pub fn sender(mut self, sender: i64) -> Self {
        self.sender = Some(sender);
        self
    }

    /// Fill title and message from one of the `templates` helpers.
    pub fn template(mut self, (title, message): (String, String)) -> Self {
        self.title = title;
        self.message = message;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn request(mut self, request_id: i64) -> Self {
        self.related_request = Some(request_id);
        self
    }

    pub fn team(mut self, team_id: i64) -> Self {
        self.related_team = Some(team_id);
        self
    }

    pub fn link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    /// Persist the notification, then push it to the recipient's live channel
    /// if one is registered. Exactly one row per call; no deduplication.
    pub async fn send(
        self,
        pool: &SqlitePool,
        registry: &ConnectionRegistry,
    ) -> NotificationResult<Notification> {
        if self.title.trim().is_empty() || self.message.trim().is_empty() {
            return Err(NotificationError::Invalid(
                "title and message are required".to_string(),
            ));
        }

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (recipient, sender, type, title, message, related_request, related_team, link)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING id, recipient, sender, type, title, message, related_request, related_team, is_read, link, created_at
            "#,
        )
        .bind(self.recipient)
        .bind(self.sender)
        .bind(self.kind)
        .bind(&self.title)
        .bind(&self.message)
        .bind(self.related_request)
        .bind(self.related_team)
        .bind(&self.link)
        .fetch_one(pool)
        .await?;

        let unread_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient = ?1 AND is_read = 0",
        )
        .bind(self.recipient)
        .fetch_one(pool)
        .await?;

        let delivered = registry
            .push(
                self.recipient,
                json!({
                    "event": "new-notification",
                    "notification": &notification,
                    "unread_count": unread_count,
                }),
            )
            .await;

        if delivered {
            tracing::debug!(recipient = self.recipient, "notification pushed live");
        } else {
            tracing::debug!(
                recipient = self.recipient,
                "recipient not connected, stored only"
            );
        }

        Ok(notification)
    }
}

/// Title/message templates, one per notification kind.
pub mod templates {
    pub fn request_submitted(request_title: &str, employee_name: &str) -> (String, String) {
        (
            "📝 New Request Submitted".to_string(),
            format!("{employee_name} has submitted a new request: \"{request_title}\""),
        )
    }

    pub fn request_approved(request_title: &str, manager_name: &str) -> (String, String) {
        (
            "✅ Request Approved".to_string(),
            format!("Your request \"{request_title}\" has been approved by {manager_name}"),
        )
    }

    pub fn request_rejected(request_title: &str, manager_name: &str) -> (String, String) {
        (
            "❌ Request Rejected".to_string(),
            format!("Your request \"{request_title}\" has been rejected by {manager_name}"),
        )
    }

    pub fn request_closed(request_title: &str, admin_name: &str) -> (String, String) {
        (
            "🔒 Request Closed".to_string(),
            format!("Your request \"{request_title}\" has been closed by {admin_name}"),
        )
    }

    pub fn request_reopened(request_title: &str, admin_name: &str) -> (String, String) {
        (
            "🔓 Request Reopened".to_string(),
            format!("Your request \"{request_title}\" has been reopened by {admin_name} for review"),
        )
    }

    pub fn team_added(team_name: &str, manager_name: &str) -> (String, String) {
        (
            "👥 Added to Team".to_string(),
            format!("You have been added to team \"{team_name}\" by {manager_name}"),
        )
    }

    pub fn team_removed(team_name: &str, manager_name: &str) -> (String, String) {
        (
            "👋 Removed from Team".to_string(),
            format!("You have been removed from team \"{team_name}\" by {manager_name}"),
        )
    }

    pub fn attendance_marked(date: &str) -> (String, String) {
        (
            "✓ Attendance Marked".to_string(),
            format!("Your attendance for {date} has been marked successfully"),
        )
    }
}
