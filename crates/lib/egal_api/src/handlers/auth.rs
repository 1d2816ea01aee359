//! Session request handlers.

use axum::extract::State;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::AppResult;
use crate::extract::ClientMeta;
use crate::middleware::auth::AuthenticatedUser;
use crate::models::{
    LoginRequest, LogoutRequest, MeResponse, RefreshRequest, SuccessResponse, TokenResponse,
};
use crate::services::auth;

/// `POST /api/v1/auth/login`: authenticate with email + password.
pub async fn login_handler(
    State(state): State<AppState>,
    client: ClientMeta,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::login(&state, &body.email, &body.password, client.as_client_info()).await?;
    Ok(Json(resp))
}

/// `POST /api/v1/auth/refresh`: exchange a refresh token for a new token pair.
pub async fn refresh_handler(
    State(state): State<AppState>,
    client: ClientMeta,
    Json(body): Json<RefreshRequest>,
) -> AppResult<Json<TokenResponse>> {
    let resp = auth::refresh(&state, &body.refresh_token, client.as_client_info()).await?;
    Ok(Json(resp))
}

/// `POST /api/v1/auth/logout`: revoke a refresh token.
pub async fn logout_handler(
    State(state): State<AppState>,
    Json(body): Json<LogoutRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let resp = auth::logout(&state, &body.refresh_token).await?;
    Ok(Json(resp))
}

/// `POST /api/v1/auth/logout-all`: revoke every session of the caller.
pub async fn logout_all_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<SuccessResponse>> {
    let resp = auth::logout_all(&state, &claims).await?;
    Ok(Json(resp))
}

/// `GET /api/v1/auth/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(AuthenticatedUser(claims)): Extension<AuthenticatedUser>,
) -> AppResult<Json<MeResponse>> {
    let resp = auth::current_user(&state, &claims).await?;
    Ok(Json(resp))
}
