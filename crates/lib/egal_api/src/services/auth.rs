//! Authentication flows composed from `egal_core::auth`.

use egal_core::auth::AuthError;
use egal_core::auth::password::{hash_password, validate_new_password, verify_password};
use egal_core::auth::service::TokenPair;
use egal_core::models::auth::{ClientInfo, TokenClaims};
use egal_core::uuid::parse_user_id;
use tracing::{error, info, trace, warn};
use uuid::Uuid;

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{MeResponse, SuccessResponse, TokenResponse, UserView};

fn token_response(state: &AppState, pair: TokenPair) -> TokenResponse {
    TokenResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.access_token_ttl_secs(),
    }
}

/// Authenticate with email + password.
///
/// Unknown email and wrong password produce the same error.
pub async fn login(
    state: &AppState,
    email: &str,
    password: &str,
    client: ClientInfo<'_>,
) -> AppResult<TokenResponse> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AppError::Validation("Email and password are required".into()));
    }

    let Some(found) = state.users.find_user_by_email(email).await? else {
        return Err(AuthError::Credential.into());
    };
    if !verify_password(password, &found.password_hash)? {
        return Err(AuthError::Credential.into());
    }

    let pair = state
        .auth
        .issue_session(found.user.id, &found.user.role, client)
        .await?;
    info!(user_id = %found.user.id, "login succeeded");
    Ok(token_response(state, pair))
}

/// Exchange a refresh token for a new pair.
pub async fn refresh(
    state: &AppState,
    refresh_token: &str,
    client: ClientInfo<'_>,
) -> AppResult<TokenResponse> {
    let pair = state.auth.refresh_tokens(refresh_token, client).await?;
    Ok(token_response(state, pair))
}

/// Revoke one refresh token.
pub async fn logout(state: &AppState, refresh_token: &str) -> AppResult<SuccessResponse> {
    state.auth.revoke_refresh_token(refresh_token).await?;
    Ok(SuccessResponse { success: true })
}

/// Revoke every refresh token of the caller.
pub async fn logout_all(state: &AppState, claims: &TokenClaims) -> AppResult<SuccessResponse> {
    state.auth.revoke_all_refresh_tokens(&claims.sub).await?;
    Ok(SuccessResponse { success: true })
}

/// Revoke every refresh token of another user (admin action).
pub async fn revoke_user_sessions(state: &AppState, user_id: &str) -> AppResult<SuccessResponse> {
    let id = parse_user_id(user_id)
        .ok_or_else(|| AppError::Validation(format!("Invalid user ID: {user_id}")))?;
    if state.users.get_user_by_id(id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {id} not found")));
    }
    state.auth.revoke_all_refresh_tokens(user_id).await?;
    Ok(SuccessResponse { success: true })
}

/// Start a password reset.
///
/// Never fails from the caller's point of view, whether or not the email is
/// registered. The link carries a live token, so it is only emitted at
/// `trace` until a mailer exists.
pub async fn forgot_password(state: &AppState, email: &str) {
    let user = match state.users.find_user_by_email(email).await {
        Ok(Some(found)) => found.user,
        Ok(None) => return,
        Err(e) => {
            error!(error = %e, "password reset lookup failed");
            return;
        }
    };

    match state.auth.create_password_reset_for_user(user.id).await {
        Ok(token) => {
            info!(user_id = %user.id, "password reset requested");
            let link = format!("{}?token={token}", state.config.password_reset_url);
            trace!(user_id = %user.id, %link, "password reset link");
        }
        Err(e) => error!(user_id = %user.id, error = %e, "failed to create password reset token"),
    }
}

/// Finish a password reset: consume the token, store the new hash and end
/// every session of the user.
pub async fn reset_password(
    state: &AppState,
    token: &str,
    password: &str,
    password_confirm: &str,
) -> AppResult<SuccessResponse> {
    validate_new_password(password, password_confirm)?;

    // Consume the token before writing the hash so two concurrent submissions
    // cannot both reset. If the update then fails the user must request a new link.
    let user_id: Uuid = state.auth.verify_password_reset_token(token).await?;
    let password_hash = hash_password(password)?;
    state.users.update_password(user_id, &password_hash).await?;

    if let Err(e) = state
        .auth
        .revoke_all_refresh_tokens(&user_id.to_string())
        .await
    {
        warn!(%user_id, error = %e, "password changed but sessions could not be revoked");
        return Err(e.into());
    }
    info!(%user_id, "password reset completed");
    Ok(SuccessResponse { success: true })
}

/// Profile of the authenticated user.
pub async fn current_user(state: &AppState, claims: &TokenClaims) -> AppResult<MeResponse> {
    let id = parse_user_id(&claims.sub).ok_or(AuthError::InvalidToken)?;
    let user = state
        .users
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok(MeResponse {
        user: UserView::from(user),
    })
}
