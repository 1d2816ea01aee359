//! User lookups needed by the login and password-reset flows.

use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{User, UserWithPassword};

type UserRow = (Uuid, String, Option<String>, String, String);

fn into_user((id, email, name, role, password_hash): UserRow) -> UserWithPassword {
    UserWithPassword {
        user: User {
            id,
            email,
            name,
            role,
        },
        password_hash,
    }
}

/// Fetch a user (with password hash) by email, case-insensitively.
pub async fn find_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserWithPassword>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, name, role, password_hash FROM users WHERE lower(email) = lower($1)",
    )
    .bind(email.trim())
    .fetch_optional(pool)
    .await?;
    Ok(row.map(into_user))
}

/// Fetch a user by ID.
pub async fn get_user_by_id(pool: &PgPool, user_id: Uuid) -> Result<Option<User>, AuthError> {
    let row = sqlx::query_as::<_, UserRow>(
        "SELECT id, email, name, role, password_hash FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| into_user(r).user))
}

/// Create a new user, returning the user ID.
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    name: Option<&str>,
    password_hash: &str,
    role: &str,
) -> Result<Uuid, AuthError> {
    let user_id = sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO users (email, name, password_hash, role) VALUES ($1, $2, $3, $4) RETURNING id",
    )
    .bind(email.trim())
    .bind(name)
    .bind(password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;
    Ok(user_id)
}

/// Replace a user's password hash.
pub async fn update_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<(), AuthError> {
    let result =
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(AuthError::Persistence(sqlx::Error::RowNotFound));
    }
    Ok(())
}
