// src/api/auth.rs
use axum::{extract::State, http::StatusCode, routing::post, Extension, Json, Router};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::config::Config;
use crate::db::models::user::Role;
use crate::db::queries::user;
use crate::utils::api_response::ApiResponse;
use crate::workflow::engine::Principal;

/// JWT claims carried on every authenticated request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - user ID
    pub sub: i64,
    pub username: String,
    pub role: Role,
    /// Expiration timestamp (UNIX time)
    pub exp: usize,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal {
            id: self.sub,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: String,
    pub password: String,
    /// Role assigned to the new account; defaults to Employee.
    pub role: Option<Role>,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub role: Role,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

pub fn issue_token(user_id: i64, username: &str, role: Role) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        role,
        exp: chrono::Utc::now().timestamp() as usize + 36000, // 10 hour expiration
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
    )
}

/// Handles user registration
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 409, description = "Username already taken"),
        (status = 422, description = "Missing username or password")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, ApiResponse<()>> {
    if payload.username.trim().is_empty() || payload.password.is_empty() {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Username and password are required",
            None,
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let role = payload.role.unwrap_or(Role::Employee);

    let result = sqlx::query("INSERT INTO users (username, email, password_hash, role) VALUES (?1, ?2, ?3, ?4)")
        .bind(payload.username.trim())
        .bind(&payload.email)
        .bind(&password_hash)
        .bind(role)
        .execute(&state.pool)
        .await;

    match result {
        Ok(_) => {
            info!("✅ Registered new {role}: {}", payload.username);
            Ok(ApiResponse::created(
                "User registered",
                RegisterResponse {
                    message: "User registered".into(),
                },
            ))
        }
        Err(e) => {
            if e.as_database_error()
                .is_some_and(|db_err| db_err.is_unique_violation())
            {
                return Err(ApiResponse::<()>::error(
                    StatusCode::CONFLICT,
                    "Username already taken",
                    None,
                ));
            }
            Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Handles user login, returning a JWT on success
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    tag = "Authentication",
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid username or password")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ApiResponse<LoginResponse>, ApiResponse<()>> {
    let user = user::find_by_username(&state.pool, &payload.username)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    let Some(user) = user else {
        warn!("❌ Login attempt for non-existent user: {}", payload.username);
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password",
            None,
        ));
    };

    if !verify(&payload.password, &user.password_hash).unwrap_or(false) {
        warn!("❌ Invalid password attempt for user: {}", payload.username);
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid username or password",
            None,
        ));
    }

    let token = issue_token(user.id, &user.username, user.role).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Token generation failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    info!("✅ Login successful for user: {}", payload.username);
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Login successful",
        LoginResponse {
            token,
            role: user.role,
        },
    ))
}

/// Change the authenticated user's own password
#[utoipa::path(
    post,
    path = "/auth/change-password",
    request_body = ChangePasswordRequest,
    tag = "Authentication",
    responses(
        (status = 200, description = "Password updated"),
        (status = 401, description = "Incorrect old password")
    ),
    security(("bearerAuth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let password_hash: Option<String> =
        sqlx::query_scalar("SELECT password_hash FROM users WHERE id = ?1")
            .bind(claims.sub)
            .fetch_optional(&state.pool)
            .await
            .map_err(|e| {
                ApiResponse::<()>::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database error",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

    let Some(password_hash) = password_hash else {
        return Err(ApiResponse::<()>::error(
            StatusCode::NOT_FOUND,
            "User not found",
            None,
        ));
    };

    if !verify(&payload.old_password, &password_hash).unwrap_or(false) {
        return Err(ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Incorrect old password",
            None,
        ));
    }

    let new_hash = hash(&payload.new_password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    sqlx::query("UPDATE users SET password_hash = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2")
        .bind(&new_hash)
        .bind(claims.sub)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(StatusCode::OK, "Password updated", ()))
}

/// Public authentication routes (no JWT required).
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

/// Authentication routes that require a valid JWT.
pub fn secure_auth_routes() -> Router<AppState> {
    Router::new().route("/auth/change-password", post(change_password))
}

use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::Modify;
use utoipa::OpenApi;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut components = openapi.components.clone().unwrap_or(Components::default());
        components.add_security_scheme(
            "bearerAuth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        );
        openapi.components = Some(components);
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(login, register, change_password),
    components(schemas(
        LoginRequest,
        LoginResponse,
        RegisterRequest,
        RegisterResponse,
        ChangePasswordRequest
    )),
    tags(
        (name = "Authentication", description = "User auth endpoints")
    ),
    modifiers(&SecurityAddon)
)]
pub struct AuthDoc;
