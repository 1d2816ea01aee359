//! Authentication and session security.
//!
//! Provides access-token signing, opaque secret generation, refresh-token
//! rotation with reuse detection and password-reset tokens, shared by the
//! HTTP layer in `egal_api`.

pub mod config;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod pg;
pub mod queries;
pub mod repository;
pub mod secrets;
pub mod service;
pub mod users;

use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    #[error("Refresh token reuse detected")]
    RefreshTokenReuse,

    #[error("Invalid or expired token")]
    InvalidOrExpiredToken,

    #[error("Invalid credentials")]
    Credential,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Entropy source failure: {0}")]
    Entropy(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether the error means "the presented credential is not acceptable"
    /// as opposed to a server-side failure.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidToken
                | AuthError::InvalidRefreshToken
                | AuthError::RefreshTokenReuse
                | AuthError::InvalidOrExpiredToken
                | AuthError::Credential
        )
    }
}
