//! Persistence contract for refresh-token and password-reset records.
//!
//! Implementations own every durable mutation of token records. The two
//! read-modify-write operations, [`AuthRepository::rotate_refresh_token`] and
//! [`AuthRepository::verify_and_mark_password_reset`], must be atomic with
//! respect to concurrent callers presenting the same digest.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::AuthError;
use crate::models::auth::{ClientInfo, RotationOutcome};

/// Refresh-token persistence.
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Store a new refresh-token record.
    async fn insert_refresh_token(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
        client: ClientInfo<'_>,
    ) -> Result<(), AuthError>;

    /// Atomically rotate `old_hash` into `new_hash`.
    ///
    /// * unknown or expired digest: [`AuthError::InvalidRefreshToken`]
    /// * already revoked: every token of the owner is revoked and the call
    ///   succeeds with `reused = true`; `new_hash` is not stored
    /// * active: `new_hash` is stored, the parent is revoked with
    ///   `replaced_by = new_hash`, `reused = false`
    async fn rotate_refresh_token(
        &self,
        old_hash: &str,
        new_hash: &str,
        new_expires_at: DateTime<Utc>,
        client: ClientInfo<'_>,
    ) -> Result<RotationOutcome, AuthError>;

    /// Mark a single record revoked. [`AuthError::InvalidRefreshToken`] if
    /// nothing matches.
    async fn revoke_refresh_token_by_hash(
        &self,
        token_hash: &str,
        replaced_by: Option<&str>,
    ) -> Result<(), AuthError>;

    /// Revoke every refresh token of a user. Idempotent.
    async fn revoke_all_for_user(&self, user_id: Uuid) -> Result<(), AuthError>;
}

/// Password-reset persistence.
#[async_trait]
pub trait PasswordResetRepository: Send + Sync {
    /// Store a new password-reset record.
    async fn insert_password_reset(
        &self,
        token_hash: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Consume an unused, unexpired record and return its owner.
    ///
    /// Fails with [`AuthError::InvalidOrExpiredToken`] when no such record
    /// exists; a second caller for the same digest always fails.
    async fn verify_and_mark_password_reset(&self, token_hash: &str) -> Result<Uuid, AuthError>;
}

/// Everything the auth service needs from storage.
pub trait AuthRepository: RefreshTokenRepository + PasswordResetRepository {}

impl<T> AuthRepository for T where T: RefreshTokenRepository + PasswordResetRepository {}
