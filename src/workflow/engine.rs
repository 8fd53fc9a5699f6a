//! Request workflow engine: role-gated status transitions plus per-transition
//! notification fan-out.
//!
//! Transitions are committed with a compare-and-swap on the stored status and
//! version, so two racing actions on the same request cannot silently
//! overwrite each other; the loser observes the winner's state as an
//! `InvalidTransition`. Fan-out runs only after the transition has committed
//! and is never allowed to fail it.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db::models::notification::NotificationType;
use crate::db::models::requests::{NewRequest, Request, RequestStatus};
use crate::db::models::user::Role;
use crate::db::queries::user;
use crate::realtime::ConnectionRegistry;
use crate::utils::notification::{templates, NotificationBuilder};
use crate::workflow::error::WorkflowError;

/// An authenticated actor, resolved from JWT claims by the HTTP layer.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestAction {
    Submit,
    Withdraw,
    Approve,
    Reject,
    Close,
    Reopen,
}

impl RequestAction {
    pub fn required_role(self) -> Role {
        match self {
            RequestAction::Submit | RequestAction::Withdraw => Role::Employee,
            RequestAction::Approve | RequestAction::Reject => Role::Manager,
            RequestAction::Close | RequestAction::Reopen => Role::Admin,
        }
    }

    /// Submit and withdraw are restricted to the request's creator.
    pub fn creator_only(self) -> bool {
        matches!(self, RequestAction::Submit | RequestAction::Withdraw)
    }

    pub fn preconditions(self) -> &'static [RequestStatus] {
        match self {
            RequestAction::Submit => &[RequestStatus::Draft, RequestStatus::Withdrawn],
            RequestAction::Withdraw => &[RequestStatus::Submitted],
            RequestAction::Approve | RequestAction::Reject => &[RequestStatus::Submitted],
            RequestAction::Close => &[RequestStatus::Approved, RequestStatus::Rejected],
            RequestAction::Reopen => &[RequestStatus::Closed],
        }
    }

    pub fn resulting_status(self) -> RequestStatus {
        match self {
            RequestAction::Submit => RequestStatus::Submitted,
            RequestAction::Withdraw => RequestStatus::Withdrawn,
            RequestAction::Approve => RequestStatus::Approved,
            RequestAction::Reject => RequestStatus::Rejected,
            RequestAction::Close => RequestStatus::Closed,
            // Reopened requests go straight back to SUBMITTED for re-review.
            RequestAction::Reopen => RequestStatus::Submitted,
        }
    }

    /// Approve and reject stamp reviewed_by/reviewed_at.
    pub fn records_review(self) -> bool {
        matches!(self, RequestAction::Approve | RequestAction::Reject)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestAction::Submit => "submit",
            RequestAction::Withdraw => "withdraw",
            RequestAction::Approve => "approve",
            RequestAction::Reject => "reject",
            RequestAction::Close => "close",
            RequestAction::Reopen => "reopen",
        }
    }
}

const REQUEST_COLUMNS: &str =
    "id, title, description, status, created_by, reviewed_by, reviewed_at, version, created_at, updated_at";

/// Create a new request in DRAFT. Employees only; no notification is emitted
/// for creation.
pub async fn create_request(
    pool: &SqlitePool,
    actor: &Principal,
    new: NewRequest,
) -> Result<Request, WorkflowError> {
    if actor.role != Role::Employee {
        return Err(WorkflowError::Forbidden(
            "Only Employees can create requests".to_string(),
        ));
    }
    if new.title.trim().is_empty() {
        return Err(WorkflowError::Validation(
            "Request title is required".to_string(),
        ));
    }

    let request = sqlx::query_as::<_, Request>(&format!(
        "INSERT INTO requests (title, description, created_by) VALUES (?1, ?2, ?3) RETURNING {REQUEST_COLUMNS}"
    ))
    .bind(new.title.trim())
    .bind(&new.description)
    .bind(actor.id)
    .fetch_one(pool)
    .await?;

    tracing::info!(request_id = request.id, actor = actor.id, "request created");
    Ok(request)
}

pub async fn get_request(pool: &SqlitePool, request_id: i64) -> Result<Request, WorkflowError> {
    sqlx::query_as::<_, Request>(&format!(
        "SELECT {REQUEST_COLUMNS} FROM requests WHERE id = ?1"
    ))
    .bind(request_id)
    .fetch_optional(pool)
    .await?
    .ok_or(WorkflowError::NotFound("Request"))
}

/// Validate and apply a workflow action. The status mutation is a single
/// compare-and-swap UPDATE; on success the notification fan-out runs, with
/// per-recipient failures logged and swallowed.
pub async fn apply_transition(
    pool: &SqlitePool,
    registry: &ConnectionRegistry,
    actor: &Principal,
    request_id: i64,
    action: RequestAction,
) -> Result<Request, WorkflowError> {
    if actor.role != action.required_role() {
        return Err(WorkflowError::Forbidden(format!(
            "Only {}s can {} requests",
            action.required_role(),
            action.as_str()
        )));
    }

    let request = get_request(pool, request_id).await?;

    if action.creator_only() && request.created_by != actor.id {
        return Err(WorkflowError::Forbidden(format!(
            "You can only {} your own requests",
            action.as_str()
        )));
    }

    if !action.preconditions().contains(&request.status) {
        return Err(WorkflowError::InvalidTransition {
            current: request.status,
        });
    }

    let updated = if action.records_review() {
        sqlx::query_as::<_, Request>(&format!(
            "UPDATE requests
             SET status = ?1, reviewed_by = ?2, reviewed_at = ?3, version = version + 1, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?4 AND status = ?5 AND version = ?6
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(action.resulting_status())
        .bind(actor.id)
        .bind(Utc::now().naive_utc())
        .bind(request.id)
        .bind(request.status)
        .bind(request.version)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_as::<_, Request>(&format!(
            "UPDATE requests
             SET status = ?1, version = version + 1, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2 AND status = ?3 AND version = ?4
             RETURNING {REQUEST_COLUMNS}"
        ))
        .bind(action.resulting_status())
        .bind(request.id)
        .bind(request.status)
        .bind(request.version)
        .fetch_optional(pool)
        .await?
    };

    let Some(updated) = updated else {
        // Lost the CAS race: report whatever state won.
        let current = get_request(pool, request_id).await?;
        return Err(WorkflowError::InvalidTransition {
            current: current.status,
        });
    };

    tracing::info!(
        request_id = updated.id,
        actor = actor.id,
        action = action.as_str(),
        status = %updated.status,
        "request transitioned"
    );

    fan_out(pool, registry, actor, &updated, action).await;

    Ok(updated)
}

/// Compute the full recipient set for a committed transition, then dispatch
/// one notification per recipient. One recipient's failure never blocks the
/// rest, and nothing here can undo the transition.
async fn fan_out(
    pool: &SqlitePool,
    registry: &ConnectionRegistry,
    actor: &Principal,
    request: &Request,
    action: RequestAction,
) {
    let recipients = match recipient_set(pool, actor, request, action).await {
        Ok(recipients) => recipients,
        Err(e) => {
            tracing::warn!(
                request_id = request.id,
                error = %e,
                "failed to resolve notification recipients"
            );
            return;
        }
    };

    let Some(kind) = notification_kind(action) else {
        return;
    };

    for recipient in recipients {
        let result = NotificationBuilder::new(recipient, kind)
            .sender(actor.id)
            .template(notification_template(action, &request.title, &actor.username))
            .request(request.id)
            .link(format!("/requests/{}", request.id))
            .send(pool, registry)
            .await;

        if let Err(e) = result {
            tracing::warn!(
                request_id = request.id,
                recipient,
                error = %e,
                "failed to dispatch notification"
            );
        }
    }
}

/// Who must be told about a transition. The set is enumerated in full before
/// any dispatch happens; the acting principal is always excluded.
async fn recipient_set(
    pool: &SqlitePool,
    actor: &Principal,
    request: &Request,
    action: RequestAction,
) -> Result<Vec<i64>, sqlx::Error> {
    let mut recipients = match action {
        RequestAction::Submit => user::ids_by_roles(pool, &[Role::Manager, Role::Admin]).await?,
        RequestAction::Approve | RequestAction::Reject => {
            let mut ids = user::ids_by_roles(pool, &[Role::Admin]).await?;
            ids.push(request.created_by);
            ids
        }
        RequestAction::Close | RequestAction::Reopen => {
            let mut ids = user::ids_by_roles(pool, &[Role::Manager]).await?;
            ids.push(request.created_by);
            ids
        }
        // Withdraw emits no notifications, mirroring the source behavior.
        RequestAction::Withdraw => Vec::new(),
    };

    recipients.sort_unstable();
    recipients.dedup();
    recipients.retain(|&id| id != actor.id);
    Ok(recipients)
}

fn notification_kind(action: RequestAction) -> Option<NotificationType> {
    match action {
        RequestAction::Submit => Some(NotificationType::RequestSubmitted),
        RequestAction::Approve => Some(NotificationType::RequestApproved),
        RequestAction::Reject => Some(NotificationType::RequestRejected),
        RequestAction::Close => Some(NotificationType::RequestClosed),
        RequestAction::Reopen => Some(NotificationType::RequestReopened),
        RequestAction::Withdraw => None,
    }
}

fn notification_template(
    action: RequestAction,
    request_title: &str,
    actor_name: &str,
) -> (String, String) {
    match action {
        RequestAction::Submit => templates::request_submitted(request_title, actor_name),
        RequestAction::Approve => templates::request_approved(request_title, actor_name),
        RequestAction::Reject => templates::request_rejected(request_title, actor_name),
        RequestAction::Close => templates::request_closed(request_title, actor_name),
        RequestAction::Reopen => templates::request_reopened(request_title, actor_name),
        RequestAction::Withdraw => (String::new(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_ACTIONS: [RequestAction; 6] = [
        RequestAction::Submit,
        RequestAction::Withdraw,
        RequestAction::Approve,
        RequestAction::Reject,
        RequestAction::Close,
        RequestAction::Reopen,
    ];

    #[test]
    fn submit_allowed_from_draft_and_withdrawn_only() {
        assert_eq!(
            RequestAction::Submit.preconditions(),
            &[RequestStatus::Draft, RequestStatus::Withdrawn]
        );
        assert_eq!(
            RequestAction::Submit.resulting_status(),
            RequestStatus::Submitted
        );
    }

    #[test]
    fn close_requires_a_reviewed_request() {
        assert_eq!(
            RequestAction::Close.preconditions(),
            &[RequestStatus::Approved, RequestStatus::Rejected]
        );
    }

    #[test]
    fn reopen_returns_to_submitted() {
        assert_eq!(
            RequestAction::Reopen.preconditions(),
            &[RequestStatus::Closed]
        );
        assert_eq!(
            RequestAction::Reopen.resulting_status(),
            RequestStatus::Submitted
        );
    }

    #[test]
    fn only_review_actions_stamp_reviewer() {
        for action in ALL_ACTIONS {
            let expected =
                matches!(action, RequestAction::Approve | RequestAction::Reject);
            assert_eq!(action.records_review(), expected, "{}", action.as_str());
        }
    }

    #[test]
    fn role_gates_match_the_transition_table() {
        assert_eq!(RequestAction::Submit.required_role(), Role::Employee);
        assert_eq!(RequestAction::Withdraw.required_role(), Role::Employee);
        assert_eq!(RequestAction::Approve.required_role(), Role::Manager);
        assert_eq!(RequestAction::Reject.required_role(), Role::Manager);
        assert_eq!(RequestAction::Close.required_role(), Role::Admin);
        assert_eq!(RequestAction::Reopen.required_role(), Role::Admin);
    }

    #[test]
    fn creator_gate_applies_to_employee_actions_only() {
        for action in ALL_ACTIONS {
            let expected = action.required_role() == Role::Employee;
            assert_eq!(action.creator_only(), expected, "{}", action.as_str());
        }
    }

    #[test]
    fn every_notifying_action_has_a_template() {
        for action in ALL_ACTIONS {
            if notification_kind(action).is_some() {
                let (title, message) = notification_template(action, "Laptop", "alice");
                assert!(!title.is_empty());
                assert!(message.contains("Laptop") || message.contains("alice"));
            }
        }
    }

    #[test]
    fn withdraw_is_silent() {
        assert!(notification_kind(RequestAction::Withdraw).is_none());
    }
}
