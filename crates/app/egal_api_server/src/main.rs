//! Egaldeutsch authentication API server.
//!
//! Loads `.env`, validates token configuration, migrates the database and
//! serves the REST API until Ctrl-C, then stops the rate limiter sweep.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use egal_api::config::{ApiConfig, normalize_rate_limit};
use egal_core::auth::config::{
    DEFAULT_EXPIRATION_HOURS, DEFAULT_ISSUER, DEFAULT_REFRESH_TOKEN_EXPIRATION_DAYS, JwtConfig,
};
use egal_core::auth::pg::PgAuthRepository;
use egal_core::auth::service::AuthService;
use egal_core::rate_limit::RateLimiter;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const DEFAULT_LOG_FILTER: &str = "info,egal_api=debug,egal_core=debug";

/// CLI arguments; every option falls back to an environment variable.
#[derive(Parser, Debug)]
#[command(name = "egal_api_server", about = "Egaldeutsch authentication API server")]
struct Args {
    /// Address to listen on.
    #[arg(long, env = "BIND_ADDR", default_value = egal_api::config::DEFAULT_BIND_ADDR)]
    bind_addr: String,

    /// PostgreSQL connection URL.
    #[arg(long, env = "DATABASE_URL", default_value = egal_api::config::DEFAULT_DATABASE_URL)]
    database_url: String,

    /// Maximum number of database connections in the pool.
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 10)]
    max_connections: u32,

    /// HMAC secret for access tokens (at least 32 characters).
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: String,

    /// `iss` claim of issued access tokens.
    #[arg(long, env = "JWT_ISSUER", default_value = DEFAULT_ISSUER)]
    jwt_issuer: String,

    /// Access-token lifetime in hours (1..=8760).
    #[arg(long, env = "JWT_EXPIRATION_HOURS", default_value_t = DEFAULT_EXPIRATION_HOURS)]
    jwt_expiration_hours: i64,

    /// Refresh-token lifetime in days.
    #[arg(
        long,
        env = "REFRESH_TOKEN_EXPIRATION_DAYS",
        default_value_t = DEFAULT_REFRESH_TOKEN_EXPIRATION_DAYS
    )]
    refresh_token_expiration_days: i64,

    /// Requests per minute per route and client on credential endpoints.
    /// Non-positive values fall back to 60.
    #[arg(
        long,
        env = "AUTH_RATE_LIMIT_PER_MINUTE",
        default_value_t = egal_api::config::DEFAULT_AUTH_RATE_LIMIT,
        allow_negative_numbers = true
    )]
    auth_rate_limit_per_minute: i64,

    /// Page that receives `?token=` in password-reset links.
    #[arg(
        long,
        env = "PASSWORD_RESET_URL",
        default_value = egal_api::config::DEFAULT_PASSWORD_RESET_URL
    )]
    password_reset_url: String,

    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`.
    /// Enable only behind a reverse proxy that sets those headers.
    #[arg(long, env = "TRUST_PROXY_HEADERS")]
    trust_proxy_headers: bool,
}

impl Args {
    fn into_config(self) -> Result<ApiConfig, egal_core::auth::AuthError> {
        let jwt = JwtConfig {
            secret: self.jwt_secret,
            issuer: self.jwt_issuer,
            expiration_hours: self.jwt_expiration_hours,
            refresh_token_expiration_days: self.refresh_token_expiration_days,
        };
        jwt.validate()?;
        Ok(ApiConfig {
            bind_addr: self.bind_addr,
            pg_connection_url: self.database_url,
            jwt,
            auth_rate_limit_per_minute: normalize_rate_limit(self.auth_rate_limit_per_minute),
            password_reset_url: self.password_reset_url,
            trust_proxy_headers: self.trust_proxy_headers,
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let args = Args::parse();
    let max_connections = args.max_connections;
    let config = args.into_config().inspect_err(|e| {
        error!(error = %e, "invalid configuration");
    })?;

    info!(
        bind_addr = %config.bind_addr,
        max_connections,
        rate_limit = config.auth_rate_limit_per_minute,
        trust_proxy_headers = config.trust_proxy_headers,
        "starting egal_api_server"
    );

    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.pg_connection_url)
        .await?;

    egal_core::migrate::migrate(&pool).await?;

    let repo = Arc::new(PgAuthRepository::new(pool.clone()));
    let rate_limiter = RateLimiter::start();
    let state = egal_api::AppState {
        auth: AuthService::new(&config.jwt, repo.clone())?,
        users: repo,
        rate_limiter: rate_limiter.clone(),
        config: config.clone(),
    };

    let app = egal_api::router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %listener.local_addr()?, "REST API listening");

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
                return;
            }
            info!("shutdown requested");
            shutdown.cancel();
        }
    });

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await;

    rate_limiter.shutdown().await;
    pool.close().await;
    info!("server stopped");

    result?;
    Ok(())
}
