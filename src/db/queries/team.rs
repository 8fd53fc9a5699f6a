// src/db/queries/team.rs
use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::{QueryBuilder, SqlitePool};

use crate::api::auth::Claims;
use crate::app_state::AppState;
use crate::db::models::team::{NewTeam, Team, TeamWithMembers, UpdateTeam};
use crate::db::models::user::{Role, UserPublic};
use crate::db::models::notification::NotificationType;
use crate::db::queries::user;
use crate::utils::api_response::ApiResponse;
use crate::utils::notification::{templates, NotificationBuilder};

fn db_error(e: sqlx::Error, message: &str) -> ApiResponse<()> {
    ApiResponse::<()>::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        message,
        Some(json!({ "error": e.to_string() })),
    )
}

fn forbidden(message: &str) -> ApiResponse<()> {
    ApiResponse::<()>::error(StatusCode::FORBIDDEN, message, None)
}

async fn load_members(pool: &SqlitePool, team_id: i64) -> Result<Vec<UserPublic>, sqlx::Error> {
    sqlx::query_as::<_, UserPublic>(
        "SELECT u.id, u.username, u.email, u.role
         FROM team_members tm JOIN users u ON u.id = tm.user_id
         WHERE tm.team_id = ?1 ORDER BY u.username",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await
}

async fn member_ids(pool: &SqlitePool, team_id: i64) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar("SELECT user_id FROM team_members WHERE team_id = ?1 ORDER BY user_id")
        .bind(team_id)
        .fetch_all(pool)
        .await
}

/// Verify that every id names an existing Employee.
async fn validate_members(
    pool: &SqlitePool,
    members: &[i64],
) -> Result<(), ApiResponse<()>> {
    if members.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE role = 'Employee' AND id IN (");
    let mut separated = qb.separated(", ");
    for id in members {
        separated.push_bind(id);
    }
    qb.push(")");

    let count: i64 = qb
        .build_query_scalar()
        .fetch_one(pool)
        .await
        .map_err(|e| db_error(e, "Failed to validate team members"))?;

    if count as usize != members.len() {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "All team members must be existing Employees",
            None,
        ));
    }
    Ok(())
}

async fn notify_membership_change(
    state: &AppState,
    claims: &Claims,
    team: &Team,
    user_id: i64,
    kind: NotificationType,
) {
    let template = match kind {
        NotificationType::TeamRemoved => templates::team_removed(&team.name, &claims.username),
        _ => templates::team_added(&team.name, &claims.username),
    };

    let result = NotificationBuilder::new(user_id, kind)
        .sender(claims.sub)
        .template(template)
        .team(team.id)
        .link(format!("/teams/{}", team.id))
        .send(&state.pool, &state.registry)
        .await;

    if let Err(e) = result {
        tracing::warn!(team_id = team.id, user_id, error = %e, "failed to dispatch team notification");
    }
}

/// Create a team. Managers and Admins only; the caller becomes the team's
/// manager and every listed Employee is notified.
#[utoipa::path(
    post,
    path = "/teams",
    request_body = NewTeam,
    responses(
        (status = 201, description = "Team created", body = TeamWithMembers),
        (status = 403, description = "Insufficient permissions"),
        (status = 422, description = "Invalid member list")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn create_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<NewTeam>,
) -> Result<ApiResponse<TeamWithMembers>, ApiResponse<()>> {
    if claims.role == Role::Employee {
        return Err(forbidden("Insufficient permissions to create teams"));
    }
    if payload.name.trim().is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Team name is required",
            None,
        ));
    }

    let mut members = payload.members.clone();
    members.sort_unstable();
    members.dedup();
    validate_members(&state.pool, &members).await?;

    let team = sqlx::query_as::<_, Team>(
        "INSERT INTO teams (name, manager) VALUES (?1, ?2)
         RETURNING id, name, manager, created_at, updated_at",
    )
    .bind(payload.name.trim())
    .bind(claims.sub)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to create team"))?;

    for user_id in &members {
        sqlx::query("INSERT INTO team_members (team_id, user_id) VALUES (?1, ?2)")
            .bind(team.id)
            .bind(user_id)
            .execute(&state.pool)
            .await
            .map_err(|e| db_error(e, "Failed to add team member"))?;
    }

    for user_id in &members {
        notify_membership_change(&state, &claims, &team, *user_id, NotificationType::TeamAdded)
            .await;
    }

    let members = load_members(&state.pool, team.id)
        .await
        .map_err(|e| db_error(e, "Failed to load team members"))?;

    Ok(ApiResponse::created(
        "Team created",
        TeamWithMembers { team, members },
    ))
}

/// Teams the caller manages or belongs to
#[utoipa::path(
    get,
    path = "/teams/mine",
    responses(
        (status = 200, description = "Teams retrieved", body = Vec<TeamWithMembers>)
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn my_teams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<TeamWithMembers>>, ApiResponse<()>> {
    let teams = sqlx::query_as::<_, Team>(
        "SELECT DISTINCT t.id, t.name, t.manager, t.created_at, t.updated_at
         FROM teams t LEFT JOIN team_members tm ON tm.team_id = t.id
         WHERE t.manager = ?1 OR tm.user_id = ?1
         ORDER BY t.name",
    )
    .bind(claims.sub)
    .fetch_all(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch teams"))?;

    let mut result = Vec::with_capacity(teams.len());
    for team in teams {
        let members = load_members(&state.pool, team.id)
            .await
            .map_err(|e| db_error(e, "Failed to load team members"))?;
        result.push(TeamWithMembers { team, members });
    }

    Ok(ApiResponse::success(StatusCode::OK, "Teams retrieved", result))
}

/// Every team in the system. Admins only.
#[utoipa::path(
    get,
    path = "/teams",
    responses(
        (status = 200, description = "Teams retrieved", body = Vec<TeamWithMembers>),
        (status = 403, description = "Insufficient permissions")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn all_teams(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<TeamWithMembers>>, ApiResponse<()>> {
    if claims.role != Role::Admin {
        return Err(forbidden("Insufficient permissions to view all teams"));
    }

    let teams = sqlx::query_as::<_, Team>(
        "SELECT id, name, manager, created_at, updated_at FROM teams ORDER BY name",
    )
    .fetch_all(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch teams"))?;

    let mut result = Vec::with_capacity(teams.len());
    for team in teams {
        let members = load_members(&state.pool, team.id)
            .await
            .map_err(|e| db_error(e, "Failed to load team members"))?;
        result.push(TeamWithMembers { team, members });
    }

    Ok(ApiResponse::success(StatusCode::OK, "Teams retrieved", result))
}

async fn fetch_team(state: &AppState, team_id: i64) -> Result<Team, ApiResponse<()>> {
    sqlx::query_as::<_, Team>(
        "SELECT id, name, manager, created_at, updated_at FROM teams WHERE id = ?1",
    )
    .bind(team_id)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| db_error(e, "Failed to fetch team"))?
    .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Team not found", None))
}

/// Get one team with its members
#[utoipa::path(
    get,
    path = "/teams/{team_id}",
    params(("team_id" = i64, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team retrieved", body = TeamWithMembers),
        (status = 404, description = "Team not found")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn get_team(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
    Path(team_id): Path<i64>,
) -> Result<ApiResponse<TeamWithMembers>, ApiResponse<()>> {
    let team = fetch_team(&state, team_id).await?;
    let members = load_members(&state.pool, team.id)
        .await
        .map_err(|e| db_error(e, "Failed to load team members"))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Team retrieved",
        TeamWithMembers { team, members },
    ))
}

/// Rename a team and/or replace its member list. The owning Manager or an
/// Admin only. Added and removed Employees each get a notification.
#[utoipa::path(
    patch,
    path = "/teams/{team_id}",
    params(("team_id" = i64, Path, description = "Team ID")),
    request_body = UpdateTeam,
    responses(
        (status = 200, description = "Team updated", body = TeamWithMembers),
        (status = 403, description = "Not the team's manager"),
        (status = 404, description = "Team not found"),
        (status = 422, description = "Invalid member list")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn update_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(team_id): Path<i64>,
    Json(payload): Json<UpdateTeam>,
) -> Result<ApiResponse<TeamWithMembers>, ApiResponse<()>> {
    let mut team = fetch_team(&state, team_id).await?;

    if claims.role != Role::Admin && team.manager != claims.sub {
        return Err(forbidden("Only the team's manager can update it"));
    }

    if let Some(name) = payload.name.as_deref() {
        if name.trim().is_empty() {
            return Err(ApiResponse::<()>::error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Team name is required",
                None,
            ));
        }
        team = sqlx::query_as::<_, Team>(
            "UPDATE teams SET name = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2
             RETURNING id, name, manager, created_at, updated_at",
        )
        .bind(name.trim())
        .bind(team_id)
        .fetch_one(&state.pool)
        .await
        .map_err(|e| db_error(e, "Failed to rename team"))?;
    }

    if let Some(new_members) = payload.members {
        let mut desired = new_members;
        desired.sort_unstable();
        desired.dedup();
        validate_members(&state.pool, &desired).await?;

        let current = member_ids(&state.pool, team_id)
            .await
            .map_err(|e| db_error(e, "Failed to load team members"))?;

        let added: Vec<i64> = desired
            .iter()
            .copied()
            .filter(|id| !current.contains(id))
            .collect();
        let removed: Vec<i64> = current
            .iter()
            .copied()
            .filter(|id| !desired.contains(id))
            .collect();

        for user_id in &removed {
            sqlx::query("DELETE FROM team_members WHERE team_id = ?1 AND user_id = ?2")
                .bind(team_id)
                .bind(user_id)
                .execute(&state.pool)
                .await
                .map_err(|e| db_error(e, "Failed to remove team member"))?;
        }
        for user_id in &added {
            sqlx::query("INSERT INTO team_members (team_id, user_id) VALUES (?1, ?2)")
                .bind(team_id)
                .bind(user_id)
                .execute(&state.pool)
                .await
                .map_err(|e| db_error(e, "Failed to add team member"))?;
        }

        for user_id in added {
            notify_membership_change(&state, &claims, &team, user_id, NotificationType::TeamAdded)
                .await;
        }
        for user_id in removed {
            notify_membership_change(&state, &claims, &team, user_id, NotificationType::TeamRemoved)
                .await;
        }
    }

    let members = load_members(&state.pool, team.id)
        .await
        .map_err(|e| db_error(e, "Failed to load team members"))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Team updated",
        TeamWithMembers { team, members },
    ))
}

/// Delete a team. The owning Manager or an Admin only.
#[utoipa::path(
    delete,
    path = "/teams/{team_id}",
    params(("team_id" = i64, Path, description = "Team ID")),
    responses(
        (status = 200, description = "Team deleted"),
        (status = 403, description = "Not the team's manager"),
        (status = 404, description = "Team not found")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn delete_team(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(team_id): Path<i64>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let team = fetch_team(&state, team_id).await?;

    if claims.role != Role::Admin && team.manager != claims.sub {
        return Err(forbidden("Only the team's manager can delete it"));
    }

    sqlx::query("DELETE FROM teams WHERE id = ?1")
        .bind(team_id)
        .execute(&state.pool)
        .await
        .map_err(|e| db_error(e, "Failed to delete team"))?;

    Ok(ApiResponse::success(StatusCode::OK, "Team deleted", ()))
}

/// List every Employee, for member selection. Managers and Admins only.
#[utoipa::path(
    get,
    path = "/teams/employees",
    responses(
        (status = 200, description = "Employees retrieved", body = Vec<UserPublic>),
        (status = 403, description = "Insufficient permissions")
    ),
    tag = "Teams",
    security(("bearerAuth" = []))
)]
pub async fn get_employees(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<Vec<UserPublic>>, ApiResponse<()>> {
    if claims.role == Role::Employee {
        return Err(forbidden("Insufficient permissions to list employees"));
    }

    let employees = user::employees(&state.pool)
        .await
        .map_err(|e| db_error(e, "Failed to fetch employees"))?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Employees retrieved",
        employees,
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        create_team,
        my_teams,
        all_teams,
        get_team,
        update_team,
        delete_team,
        get_employees,
    ),
    components(schemas(
        crate::db::models::team::Team,
        crate::db::models::team::NewTeam,
        crate::db::models::team::UpdateTeam,
        crate::db::models::team::TeamWithMembers,
        crate::db::models::user::UserPublic,
    ))
)]
pub struct TeamDoc;
