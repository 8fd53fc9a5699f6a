// src/db/models/requests.rs
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::user::Role;

/// Lifecycle states of a request. The source schema also listed a REOPENED
/// label, but every reopen path sets SUBMITTED directly, so the label is
/// unreachable and deliberately omitted here.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Closed,
    Withdrawn,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Draft => "DRAFT",
            RequestStatus::Submitted => "SUBMITTED",
            RequestStatus::Approved => "APPROVED",
            RequestStatus::Rejected => "REJECTED",
            RequestStatus::Closed => "CLOSED",
            RequestStatus::Withdrawn => "WITHDRAWN",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Request {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: RequestStatus,
    pub created_by: i64,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub version: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Request row joined with its creator's identity, for manager/admin listings.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct RequestWithCreator {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub status: RequestStatus,
    pub created_by: i64,
    pub creator_username: String,
    pub creator_role: Role,
    pub reviewed_by: Option<i64>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
