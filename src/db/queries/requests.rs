// src/db/queries/requests.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};
use axum::Json;
use serde_json::json;

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::db::models::requests::{NewRequest, Request, RequestWithCreator};
use crate::db::models::user::Role;
use crate::utils::api_response::ApiResponse;
use crate::workflow::engine::{self, RequestAction};

const WITH_CREATOR: &str = "SELECT r.id, r.title, r.description, r.status, r.created_by,
        u.username AS creator_username, u.role AS creator_role,
        r.reviewed_by, r.reviewed_at, r.created_at, r.updated_at
     FROM requests r JOIN users u ON u.id = r.created_by";

/// Create a new request in DRAFT state
#[utoipa::path(
    post,
    path = "/requests",
    request_body = NewRequest,
    responses(
        (status = 201, description = "Request created", body = Request),
        (status = 403, description = "Only Employees can create requests"),
        (status = 422, description = "Missing title")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn create_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewRequest>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let actor = claims.principal();
    let request = engine::create_request(&state.pool, &actor, payload)
        .await
        .map_err(ApiResponse::<()>::from)?;
    Ok(ApiResponse::created("Request created", request))
}

/// Get a single request. Employees see only their own; Managers and Admins
/// see everything.
#[utoipa::path(
    get,
    path = "/requests/{request_id}",
    params(("request_id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request found", body = Request),
        (status = 404, description = "Request not found")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn get_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let request = engine::get_request(&state.pool, request_id)
        .await
        .map_err(ApiResponse::<()>::from)?;

    // Foreign requests look like missing ones to Employees.
    if claims.role == Role::Employee && request.created_by != claims.sub {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "Request not found",
            None,
        ));
    }

    Ok(ApiResponse::success(StatusCode::OK, "Request found", request))
}

/// List the authenticated user's own requests, newest first
#[utoipa::path(
    get,
    path = "/requests/mine",
    responses(
        (status = 200, description = "Requests retrieved", body = Vec<Request>)
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn my_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<Request>>, ApiResponse<()>> {
    let requests = sqlx::query_as::<_, Request>(
        "SELECT id, title, description, status, created_by, reviewed_by, reviewed_at, version, created_at, updated_at
         FROM requests WHERE created_by = ?1 ORDER BY created_at DESC, id DESC",
    )
    .bind(claims.sub)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch requests",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Requests retrieved",
        requests,
    ))
}

/// List SUBMITTED requests awaiting review. Managers and Admins only.
#[utoipa::path(
    get,
    path = "/requests/pending",
    responses(
        (status = 200, description = "Pending requests retrieved", body = Vec<RequestWithCreator>),
        (status = 403, description = "Insufficient permissions")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn pending_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<RequestWithCreator>>, ApiResponse<()>> {
    if claims.role == Role::Employee {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Insufficient permissions to view pending requests",
            None,
        ));
    }

    let requests = sqlx::query_as::<_, RequestWithCreator>(&format!(
        "{WITH_CREATOR} WHERE r.status = 'SUBMITTED' ORDER BY r.updated_at ASC, r.id ASC"
    ))
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch pending requests",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Pending requests retrieved",
        requests,
    ))
}

/// List every request in the system. Admins only.
#[utoipa::path(
    get,
    path = "/requests",
    responses(
        (status = 200, description = "Requests retrieved", body = Vec<RequestWithCreator>),
        (status = 403, description = "Insufficient permissions")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn all_requests(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<RequestWithCreator>>, ApiResponse<()>> {
    if claims.role != Role::Admin {
        return Err(ApiResponse::<()>::error(
            StatusCode::FORBIDDEN,
            "Insufficient permissions to view all requests",
            None,
        ));
    }

    let requests = sqlx::query_as::<_, RequestWithCreator>(&format!(
        "{WITH_CREATOR} ORDER BY r.created_at DESC, r.id DESC"
    ))
    .fetch_all(&state.pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to fetch requests",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Requests retrieved",
        requests,
    ))
}

async fn transition(
    state: &AppState,
    claims: &Claims,
    request_id: i64,
    action: RequestAction,
    message: &str,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    let actor = claims.principal();
    let request = engine::apply_transition(&state.pool, &state.registry, &actor, request_id, action)
        .await
        .map_err(ApiResponse::<()>::from)?;
    Ok(ApiResponse::success(StatusCode::OK, message, request))
}

/// Submit a DRAFT or WITHDRAWN request for review
#[utoipa::path(
    post,
    path = "/requests/{request_id}/submit",
    params(("request_id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request submitted", body = Request),
        (status = 403, description = "Not the creator, or not an Employee"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not in a submittable state")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn submit_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    transition(&state, &claims, request_id, RequestAction::Submit, "Request submitted").await
}

/// Withdraw a SUBMITTED request
#[utoipa::path(
    post,
    path = "/requests/{request_id}/withdraw",
    params(("request_id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request withdrawn", body = Request),
        (status = 403, description = "Not the creator, or not an Employee"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not SUBMITTED")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn withdraw_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    transition(&state, &claims, request_id, RequestAction::Withdraw, "Request withdrawn").await
}

/// Approve a SUBMITTED request. Managers only.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/approve",
    params(("request_id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request approved", body = Request),
        (status = 403, description = "Only Managers can approve requests"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not SUBMITTED")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn approve_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    transition(&state, &claims, request_id, RequestAction::Approve, "Request approved").await
}

/// Reject a SUBMITTED request. Managers only.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/reject",
    params(("request_id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request rejected", body = Request),
        (status = 403, description = "Only Managers can reject requests"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not SUBMITTED")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn reject_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    transition(&state, &claims, request_id, RequestAction::Reject, "Request rejected").await
}

/// Close an APPROVED or REJECTED request. Admins only.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/close",
    params(("request_id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request closed", body = Request),
        (status = 403, description = "Only Admins can close requests"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request has not been reviewed")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn close_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    transition(&state, &claims, request_id, RequestAction::Close, "Request closed").await
}

/// Reopen a CLOSED request back into the review queue. Admins only.
#[utoipa::path(
    post,
    path = "/requests/{request_id}/reopen",
    params(("request_id" = i64, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Request reopened", body = Request),
        (status = 403, description = "Only Admins can reopen requests"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request is not CLOSED")
    ),
    tag = "Requests",
    security(("bearerAuth" = []))
)]
pub async fn reopen_request(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(request_id): Path<i64>,
) -> Result<ApiResponse<Request>, ApiResponse<()>> {
    transition(&state, &claims, request_id, RequestAction::Reopen, "Request reopened").await
}

use utoipa::OpenApi;
#[derive(OpenApi)]
#[openapi(
    paths(
        create_request,
        get_request,
        my_requests,
        pending_requests,
        all_requests,
        submit_request,
        withdraw_request,
        approve_request,
        reject_request,
        close_request,
        reopen_request,
    ),
    components(schemas(
        crate::db::models::requests::Request,
        crate::db::models::requests::NewRequest,
        crate::db::models::requests::RequestWithCreator,
        crate::db::models::requests::RequestStatus,
    ))
)]
pub struct RequestDoc;
