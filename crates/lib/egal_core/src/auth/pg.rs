//! PostgreSQL-backed [`AuthRepository`](super::repository::AuthRepository).
//!
//! Rotation and password-reset consumption lock the digest row with
//! `SELECT ... FOR UPDATE` inside a transaction, so concurrent callers holding
//! the same token are serialized and the loser sees the winner's update.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use uuid::Uuid;

use super::AuthError;
use super::repository::{PasswordResetRepository, RefreshTokenRepository};
use crate::models::auth::{ClientInfo, RefreshTokenRecord, RotationOutcome};
use crate::uuid::uuidv7;

type RefreshTokenRow = (
    Uuid,
    Uuid,
    String,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    DateTime<Utc>,
    bool,
    Option<String>,
    Option<String>,
    Option<String>,
);

/// Token store over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Fetch a refresh-token record by digest, regardless of state.
    pub async fn find_refresh_token(
        &self,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let row = sqlx::query_as::<_, RefreshTokenRow>(
            "SELECT id, user_id, token_hash, created_at, last_used_at, expires_at, \
                    revoked, replaced_by, ip, user_agent \
             FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(
                id,
                user_id,
                token_hash,
                created_at,
                last_used_at,
                expires_at,
                revoked,
                replaced_by,
                ip,
                user_agent,
            )| RefreshTokenRecord {
                id,
                user_id,
                token_hash,
                created_at,
                last_used_at,
                expires_at,
                revoked,
                replaced_by,
                ip,
                user_agent,
            },
        ))
    }
}

/// Read the user's current role inside the caller's transaction.
async fn fetch_role(conn: &mut PgConnection, user_id: Uuid) -> Result<String, AuthError> {
    sqlx::query_scalar::<_, String>("SELECT role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?
        .ok_or(AuthError::InvalidRefreshToken)
}

async fn insert_refresh_row(
    conn: &mut PgConnection,
    token_hash: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    client: ClientInfo<'_>,
) -> Result<(), AuthError> {
    sqlx::query(
        "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, ip, user_agent) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(uuidv7())
    .bind(user_id)
    .bind(token_hash)
    .bind(expires_at)
    .bind(client.ip)
    .bind(client.user_agent)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl RefreshTokenRepository for PgAuthRepository {
    async fn insert_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        client: ClientInfo<'_>,
    ) -> Result<(), AuthError> {
        let mut conn = self.pool.acquire().await?;
        insert_refresh_row(&mut conn, token_hash, user_id, expires_at, client).await
    }

    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        client: ClientInfo<'_>,
    ) -> Result<RotationOutcome, AuthError> {
        let mut tx = self.pool.begin().await?;

        // Dropping `tx` without commit rolls back.
        let (user_id, revoked, expired) = sqlx::query_as::<_, (Uuid, bool, bool)>(
            "SELECT user_id, revoked, expires_at <= now() \
             FROM refresh_tokens WHERE token_hash = $1 FOR UPDATE",
        )
        .bind(old_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::InvalidRefreshToken)?;

        if revoked {
            let revoked_count = sqlx::query(
                "UPDATE refresh_tokens SET revoked = TRUE \
                 WHERE user_id = $1 AND revoked = FALSE",
            )
            .bind(user_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
            let role = fetch_role(&mut tx, user_id).await?;
            tx.commit().await?;

            warn!(%user_id, revoked_count, "refresh token reuse detected, revoked all sessions");
            return Ok(RotationOutcome {
                user_id,
                role,
                reused: true,
            });
        }

        if expired {
            return Err(AuthError::InvalidRefreshToken);
        }

        insert_refresh_row(&mut tx, new_hash, user_id, new_expires_at, client).await?;

        sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked = TRUE, replaced_by = $2, last_used_at = now() \
             WHERE token_hash = $1",
        )
        .bind(old_hash)
        .bind(new_hash)
        .execute(&mut *tx)
        .await?;

        let role = fetch_role(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(RotationOutcome {
            user_id,
            role,
            reused: false,
        })
    }

    async fn revoke_refresh_token_by_hash(
        &self,
        token_hash: &str,
        replaced_by: Option<&str>,
    ) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked = TRUE, replaced_by = COALESCE($2, replaced_by) \
             WHERE token_hash = $1",
        )
        .bind(token_hash)
        .bind(replaced_by)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::InvalidRefreshToken);
        }
        Ok(())
    }

    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = TRUE \
             WHERE user_id = $1 AND revoked = FALSE",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        info!(%user_id, revoked = result.rows_affected(), "revoked all refresh tokens");
        Ok(())
    }
}

#[async_trait]
impl PasswordResetRepository for PgAuthRepository {
    async fn insert_password_reset(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            "INSERT INTO password_resets (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(uuidv7())
        .bind(user_id)
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn verify_and_mark_password_reset(&self, token_hash: &str) -> Result<Uuid, AuthError> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM password_resets \
             WHERE token_hash = $1 AND used = FALSE AND expires_at > now() \
             FOR UPDATE",
        )
        .bind(token_hash)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(AuthError::InvalidOrExpiredToken)?;

        sqlx::query("UPDATE password_resets SET used = TRUE WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(user_id)
    }
}
