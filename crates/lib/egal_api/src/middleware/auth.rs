//! Authentication middleware: Bearer token extraction, JWT verification and
//! role checks.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use egal_core::models::auth::{ROLE_ADMIN, TokenClaims};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Key used to store `TokenClaims` in request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub TokenClaims);

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies the JWT,
/// and injects `AuthenticatedUser` into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let claims = state.auth.parse_token(token)?;

    request.extensions_mut().insert(AuthenticatedUser(claims));

    Ok(next.run(request).await)
}

/// Reject unless the authenticated role equals `role`. Must run after
/// [`require_auth`].
pub async fn require_role(role: &str, request: Request, next: Next) -> Result<Response, AppError> {
    let Some(AuthenticatedUser(claims)) = request.extensions().get::<AuthenticatedUser>() else {
        return Err(AppError::Forbidden("forbidden".into()));
    };
    if claims.role != role {
        debug!(user_id = %claims.sub, role = %claims.role, required = role, "role check failed");
        return Err(AppError::Forbidden("forbidden".into()));
    }
    Ok(next.run(request).await)
}

/// [`require_role`] for administrators.
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AppError> {
    require_role(ROLE_ADMIN, request, next).await
}
