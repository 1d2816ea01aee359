//! # egal_api
//!
//! HTTP API library for Egaldeutsch authentication.

pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use egal_core::auth::service::AuthService;
use egal_core::auth::users::UserStore;
use egal_core::rate_limit::RateLimiter;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::handlers::{admin, auth, health, password_reset};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Token issuance, rotation and password-reset tokens.
    pub auth: AuthService,
    /// User lookups for login and password reset.
    pub users: Arc<dyn UserStore>,
    /// Throttle for the credential endpoints.
    pub rate_limiter: Arc<RateLimiter>,
    /// API configuration.
    pub config: ApiConfig,
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Credential endpoints, throttled per route and client
    let throttled = Router::new()
        .route(routes::POST_AUTH_LOGIN, post(auth::login_handler))
        .route(routes::POST_AUTH_REFRESH, post(auth::refresh_handler))
        .route(
            routes::POST_AUTH_FORGOT_PASSWORD,
            post(password_reset::forgot_password_handler),
        )
        .route(
            routes::POST_AUTH_RESET_PASSWORD,
            post(password_reset::reset_password_handler),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::rate_limit::rate_limit,
        ));

    let public = Router::new()
        .route(routes::GET_HEALTH, get(health::health_handler))
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler));

    let protected = Router::new()
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::POST_AUTH_LOGOUT_ALL, post(auth::logout_all_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    // Layers run bottom-up: authenticate first, then check the role.
    let admin = Router::new()
        .route(
            routes::POST_ADMIN_USER_REVOKE_SESSIONS,
            post(admin::revoke_user_sessions_handler),
        )
        .route_layer(axum::middleware::from_fn(middleware::auth::require_admin))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(throttled)
        .merge(public)
        .merge(protected)
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
