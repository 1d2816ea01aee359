//! Password reset request handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::AppState;
use crate::error::AppResult;
use crate::models::{ForgotPasswordRequest, ResetPasswordRequest, SuccessResponse};
use crate::services::auth;

/// `POST /api/v1/auth/forgot-password`: always `202 Accepted`.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> StatusCode {
    auth::forgot_password(&state, &body.email).await;
    StatusCode::ACCEPTED
}

/// `POST /api/v1/auth/reset-password`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> AppResult<Json<SuccessResponse>> {
    let resp = auth::reset_password(
        &state,
        &body.token,
        &body.password,
        &body.password_confirm,
    )
    .await?;
    Ok(Json(resp))
}
