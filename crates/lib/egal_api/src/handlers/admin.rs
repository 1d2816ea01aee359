//! Administrative handlers. Mounted behind the admin role guard.

use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::AppResult;
use crate::models::SuccessResponse;
use crate::services::auth;

/// `POST /api/v1/admin/users/{id}/revoke-sessions`
pub async fn revoke_user_sessions_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> AppResult<Json<SuccessResponse>> {
    let resp = auth::revoke_user_sessions(&state, &user_id).await?;
    Ok(Json(resp))
}
