use axum::http::StatusCode;
use serde_json::json;

use crate::db::models::requests::RequestStatus;
use crate::utils::api_response::ApiResponse;
use crate::utils::notification::NotificationError;

/// Failure taxonomy for workflow operations. `Dispatch` is only surfaced for
/// notification persistence failures observed *after* the triggering
/// transition has committed; the engine logs and swallows it per recipient.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("invalid transition from {current}")]
    InvalidTransition { current: RequestStatus },

    #[error("{0}")]
    Validation(String),

    #[error("notification dispatch failed: {0}")]
    Dispatch(#[from] NotificationError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl WorkflowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::Forbidden(_) => StatusCode::FORBIDDEN,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::InvalidTransition { .. } => StatusCode::CONFLICT,
            WorkflowError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::Dispatch(_) | WorkflowError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<WorkflowError> for ApiResponse<()> {
    fn from(err: WorkflowError) -> Self {
        let status = err.status_code();
        match err {
            WorkflowError::InvalidTransition { current } => ApiResponse::error(
                status,
                format!("Invalid transition: request is currently {current}"),
                Some(json!({ "status": current })),
            ),
            // Expected failures carry their reason; internal faults stay generic.
            WorkflowError::Forbidden(_) | WorkflowError::NotFound(_) | WorkflowError::Validation(_) => {
                ApiResponse::error(status, err.to_string(), None)
            }
            WorkflowError::Dispatch(e) => {
                ApiResponse::error(status, "Failed to dispatch notification", Some(json!({ "error": e.to_string() })))
            }
            WorkflowError::Database(e) => {
                ApiResponse::error(status, "Database error", Some(json!({ "error": e.to_string() })))
            }
        }
    }
}
