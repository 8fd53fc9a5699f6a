// src/db/queries/user.rs
use sqlx::SqlitePool;

use crate::db::models::user::{Role, User, UserPublic};

pub async fn find_by_username(
    pool: &SqlitePool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "SELECT id, username, email, password_hash, role, created_at, updated_at
         FROM users WHERE username = ?1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn get_public(
    pool: &SqlitePool,
    user_id: i64,
) -> Result<Option<UserPublic>, sqlx::Error> {
    sqlx::query_as::<_, UserPublic>(
        "SELECT id, username, email, role FROM users WHERE id = ?1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// All user ids holding any of the given roles. Used to enumerate
/// notification recipients before dispatch.
pub async fn ids_by_roles(pool: &SqlitePool, roles: &[Role]) -> Result<Vec<i64>, sqlx::Error> {
    let mut ids = Vec::new();
    for role in roles {
        let mut batch: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM users WHERE role = ?1 ORDER BY id")
                .bind(role)
                .fetch_all(pool)
                .await?;
        ids.append(&mut batch);
    }
    Ok(ids)
}

/// Every Employee, for team membership pickers.
pub async fn employees(pool: &SqlitePool) -> Result<Vec<UserPublic>, sqlx::Error> {
    sqlx::query_as::<_, UserPublic>(
        "SELECT id, username, email, role FROM users WHERE role = 'Employee' ORDER BY username",
    )
    .fetch_all(pool)
    .await
}
