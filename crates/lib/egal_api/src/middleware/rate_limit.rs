//! Per-route, per-client throttling for the credential endpoints.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::AppState;
use crate::error::AppError;
use crate::extract::{UNKNOWN_CLIENT, client_ip};

/// Axum middleware: admits the request if the client is within
/// `auth_rate_limit_per_minute` requests to this path, else `429`.
pub async fn rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let client = client_ip(
        request.headers(),
        request.extensions(),
        state.config.trust_proxy_headers,
    )
    .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());
    let route = request.uri().path();
    let limit = state.config.auth_rate_limit_per_minute;

    if !state.rate_limiter.allow(&client, route, limit) {
        warn!(%client, route, limit, "rate limit exceeded");
        return Err(AppError::TooManyRequests);
    }

    Ok(next.run(request).await)
}
