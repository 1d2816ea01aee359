//! Authentication service: decides when tokens are minted, rotated and
//! revoked, and delegates every durable mutation to an [`AuthRepository`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::config::JwtConfig;
use super::jwt::TokenCodec;
use super::repository::AuthRepository;
use super::secrets::{
    PASSWORD_RESET_TOKEN_BYTES, REFRESH_TOKEN_BYTES, digest_token, generate_secret,
};
use crate::models::auth::{ClientInfo, TokenClaims};
use crate::uuid::parse_user_id;

/// Password-reset token lifetime in minutes.
const PASSWORD_RESET_TTL_MINUTES: i64 = 60;

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Orchestrates access tokens, refresh-token rotation and password resets.
#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn AuthRepository>,
    codec: TokenCodec,
    refresh_token_ttl: Duration,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("codec", &self.codec)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    /// Validate `config` and build the service.
    pub fn new(config: &JwtConfig, repo: Arc<dyn AuthRepository>) -> Result<Self, AuthError> {
        config.validate()?;
        Ok(Self {
            repo,
            codec: TokenCodec::from_config(config)?,
            refresh_token_ttl: Duration::days(config.refresh_token_expiration_days),
        })
    }

    /// Access-token lifetime in seconds, as advertised to clients.
    pub fn access_token_ttl_secs(&self) -> i64 {
        self.codec.lifetime().num_seconds()
    }

    /// Verify an access token.
    pub fn parse_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.codec.parse_token(token)
    }

    /// Sign an access token for a user and role.
    pub fn create_access_token(&self, user_id: Uuid, role: &str) -> Result<String, AuthError> {
        self.codec.create_access_token(&user_id.to_string(), role)
    }

    /// Create and persist a refresh token, returning the plaintext.
    pub async fn create_refresh_token(
        &self,
        user_id: Uuid,
        client: ClientInfo<'_>,
    ) -> Result<String, AuthError> {
        let secret = generate_secret(REFRESH_TOKEN_BYTES)?;
        let expires_at = Utc::now() + self.refresh_token_ttl;
        self.repo
            .insert_refresh_token(&secret.digest, user_id, expires_at, client)
            .await?;
        debug!(%user_id, "refresh token issued");
        Ok(secret.plaintext)
    }

    /// Issue a fresh access/refresh pair after a successful login.
    pub async fn issue_session(
        &self,
        user_id: Uuid,
        role: &str,
        client: ClientInfo<'_>,
    ) -> Result<TokenPair, AuthError> {
        let access_token = self.create_access_token(user_id, role)?;
        let refresh_token = self.create_refresh_token(user_id, client).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// Rotate a refresh token into a new access/refresh pair.
    ///
    /// Presenting an already rotated or revoked token fails with
    /// [`AuthError::RefreshTokenReuse`] after the repository has revoked every
    /// session of the owner. Callers must force a new login, not retry.
    pub async fn refresh_tokens(
        &self,
        old_refresh_token: &str,
        client: ClientInfo<'_>,
    ) -> Result<TokenPair, AuthError> {
        let old_hash = digest_token(old_refresh_token);
        let next = generate_secret(REFRESH_TOKEN_BYTES)?;
        let expires_at = Utc::now() + self.refresh_token_ttl;

        let outcome = self
            .repo
            .rotate_refresh_token(&old_hash, &next.digest, expires_at, client)
            .await?;

        if outcome.reused {
            warn!(
                user_id = %outcome.user_id,
                ip = client.ip.unwrap_or("-"),
                "refresh token reuse; all sessions revoked"
            );
            return Err(AuthError::RefreshTokenReuse);
        }

        let access_token = self.create_access_token(outcome.user_id, &outcome.role)?;
        Ok(TokenPair {
            access_token,
            refresh_token: next.plaintext,
        })
    }

    /// Revoke one refresh token (logout).
    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), AuthError> {
        let token_hash = digest_token(refresh_token);
        self.repo
            .revoke_refresh_token_by_hash(&token_hash, None)
            .await
    }

    /// Revoke every refresh token of a user (logout everywhere).
    pub async fn revoke_all_refresh_tokens(&self, user_id: &str) -> Result<(), AuthError> {
        let user_id = parse_user_id(user_id)
            .ok_or_else(|| AuthError::Validation(format!("invalid user ID: {user_id:?}")))?;
        self.repo.revoke_all_for_user(user_id).await?;
        info!(%user_id, "all refresh tokens revoked");
        Ok(())
    }

    /// Create a single-use password-reset token, returning the plaintext.
    ///
    /// Delivering it (e.g. by email) is the caller's job.
    pub async fn create_password_reset_for_user(&self, user_id: Uuid) -> Result<String, AuthError> {
        let secret = generate_secret(PASSWORD_RESET_TOKEN_BYTES)?;
        let expires_at = Utc::now() + Duration::minutes(PASSWORD_RESET_TTL_MINUTES);
        self.repo
            .insert_password_reset(&secret.digest, user_id, expires_at)
            .await?;
        Ok(secret.plaintext)
    }

    /// Consume a password-reset token, returning the user it was issued to.
    pub async fn verify_password_reset_token(&self, token: &str) -> Result<Uuid, AuthError> {
        self.repo
            .verify_and_mark_password_reset(&digest_token(token))
            .await
    }
}
