#![allow(dead_code)]

use workorbit_backend::api::auth::Claims;
use workorbit_backend::app_state::AppState;
use workorbit_backend::db::models::user::Role;
use workorbit_backend::db::pool;
use workorbit_backend::workflow::engine::Principal;

/// Fresh in-memory database with migrations applied. A single connection is
/// required: every connection to `sqlite::memory:` gets its own database.
pub async fn test_state() -> AppState {
    let pool = pool::connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .expect("in-memory pool");
    pool::run_migrations(&pool).await.expect("migrations");
    AppState::new(pool)
}

pub async fn seed_user(state: &AppState, username: &str, role: Role) -> Principal {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO users (username, email, password_hash, role)
         VALUES (?1, ?2, 'not-a-real-hash', ?3) RETURNING id",
    )
    .bind(username)
    .bind(format!("{username}@example.com"))
    .bind(role)
    .fetch_one(&state.pool)
    .await
    .expect("seed user");

    Principal {
        id,
        username: username.to_string(),
        role,
    }
}

pub fn claims_for(principal: &Principal) -> Claims {
    Claims {
        sub: principal.id,
        username: principal.username.clone(),
        role: principal.role,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    }
}

/// (kind, is_read) pairs of a user's notifications, newest first.
pub async fn notification_kinds(state: &AppState, recipient: i64) -> Vec<(String, bool)> {
    sqlx::query_as(
        "SELECT type, is_read FROM notifications WHERE recipient = ?1 ORDER BY id DESC",
    )
    .bind(recipient)
    .fetch_all(&state.pool)
    .await
    .expect("fetch notifications")
}

pub async fn notification_count(state: &AppState, recipient: i64) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE recipient = ?1")
        .bind(recipient)
        .fetch_one(&state.pool)
        .await
        .expect("count notifications")
}
