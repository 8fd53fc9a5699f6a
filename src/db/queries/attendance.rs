// src/db/queries/attendance.rs
use axum::{
    extract::{Extension, State},
    http::StatusCode,
};
use chrono::Utc;
use serde_json::json;

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::db::models::attendance::Attendance;
use crate::db::models::notification::NotificationType;
use crate::utils::api_response::ApiResponse;
use crate::utils::notification::{templates, NotificationBuilder};

const COLUMNS: &str = "id, user_id, work_date, check_in, check_out, total_hours";

fn db_error(e: sqlx::Error, message: &str) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        message,
        Some(json!({ "error": e.to_string() })),
    )
}

/// Check in for today. One attendance row per user per day.
#[utoipa::path(
    post,
    path = "/attendance/check-in",
    responses(
        (status = 201, description = "Checked in", body = Attendance),
        (status = 409, description = "Already checked in today")
    ),
    tag = "Attendance",
    security(("bearerAuth" = []))
)]
pub async fn check_in(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Attendance>, ApiResponse<()>> {
    let now = Utc::now().naive_utc();
    let today = now.date();

    let existing: Option<i64> =
        sqlx::query_scalar("SELECT id FROM attendance WHERE user_id = ?1 AND work_date = ?2")
            .bind(claims.sub)
            .bind(today)
            .fetch_optional(&state.pool)
            .await
            .map_err(|e| db_error(e, "Failed to check attendance"))?;

    if existing.is_some() {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Attendance already marked for today",
            None,
        ));
    }

    let attendance = sqlx::query_as::<_, Attendance>(&format!(
        "INSERT INTO attendance (user_id, work_date, check_in) VALUES (?1, ?2, ?3)
         RETURNING {COLUMNS}"
    ))
    .bind(claims.sub)
    .bind(today)
    .bind(now)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to check in"))?;

    // Self-notification confirming the mark; no sender.
    let result = NotificationBuilder::new(claims.sub, NotificationType::AttendanceMarked)
        .template(templates::attendance_marked(&today.to_string()))
        .link("/attendance".to_string())
        .send(&state.pool, &state.registry)
        .await;
    if let Err(e) = result {
        tracing::warn!(user_id = claims.sub, error = %e, "failed to dispatch attendance notification");
    }

    Ok(ApiResponse::created("Checked in", attendance))
}

/// Check out for today, recording total hours worked
#[utoipa::path(
    post,
    path = "/attendance/check-out",
    responses(
        (status = 200, description = "Checked out", body = Attendance),
        (status = 404, description = "No check-in found for today"),
        (status = 409, description = "Already checked out today")
    ),
    tag = "Attendance",
    security(("bearerAuth" = []))
)]
pub async fn check_out(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Attendance>, ApiResponse<()>> {
    let now = Utc::now().naive_utc();
    let today = now.date();

    let attendance = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {COLUMNS} FROM attendance WHERE user_id = ?1 AND work_date = ?2"
    ))
    .bind(claims.sub)
    .bind(today)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch attendance"))?
    .ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::NOT_FOUND, "No check-in found for today", None)
    })?;

    if attendance.check_out.is_some() {
        return Err(ApiResponse::<()>::error(
            StatusCode::CONFLICT,
            "Already checked out today",
            None,
        ));
    }

    let worked = now - attendance.check_in;
    let total_hours = (worked.num_seconds() as f64 / 3600.0 * 100.0).round() / 100.0;

    let attendance = sqlx::query_as::<_, Attendance>(&format!(
        "UPDATE attendance SET check_out = ?1, total_hours = ?2 WHERE id = ?3
         RETURNING {COLUMNS}"
    ))
    .bind(now)
    .bind(total_hours)
    .bind(attendance.id)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to check out"))?;

    Ok(ApiResponse::success(StatusCode::OK, "Checked out", attendance))
}

/// Today's attendance record for the caller, if any
#[utoipa::path(
    get,
    path = "/attendance/today",
    responses(
        (status = 200, description = "Attendance retrieved", body = Attendance)
    ),
    tag = "Attendance",
    security(("bearerAuth" = []))
)]
pub async fn today(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Option<Attendance>>, ApiResponse<()>> {
    let today = Utc::now().date_naive();

    let attendance = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {COLUMNS} FROM attendance WHERE user_id = ?1 AND work_date = ?2"
    ))
    .bind(claims.sub)
    .bind(today)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch attendance"))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Attendance retrieved",
        attendance,
    ))
}

/// The caller's attendance history, newest first
#[utoipa::path(
    get,
    path = "/attendance/history",
    responses(
        (status = 200, description = "Attendance history retrieved", body = Vec<Attendance>)
    ),
    tag = "Attendance",
    security(("bearerAuth" = []))
)]
pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<Attendance>>, ApiResponse<()>> {
    let records = sqlx::query_as::<_, Attendance>(&format!(
        "SELECT {COLUMNS} FROM attendance WHERE user_id = ?1 ORDER BY work_date DESC"
    ))
    .bind(claims.sub)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch attendance history"))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Attendance history retrieved",
        records,
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(check_in, check_out, today, history),
    components(schemas(crate::db::models::attendance::Attendance))
)]
pub struct AttendanceDoc;
