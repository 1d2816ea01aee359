//! API server configuration.

use egal_core::auth::AuthError;
use egal_core::auth::config::JwtConfig;

/// Default `BIND_ADDR`.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

/// Default `DATABASE_URL`.
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost:5432/egaldeutsch";

/// Default `AUTH_RATE_LIMIT_PER_MINUTE`.
pub const DEFAULT_AUTH_RATE_LIMIT: i64 = 10;

/// Limit used when the configured one is not positive.
pub const FALLBACK_RATE_LIMIT: usize = 60;

/// Default `PASSWORD_RESET_URL`.
pub const DEFAULT_PASSWORD_RESET_URL: &str = "http://localhost:3000/reset-password";

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:8080").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub pg_connection_url: String,
    /// Token signing and lifetimes.
    pub jwt: JwtConfig,
    /// Requests per minute per route and client on the credential endpoints.
    pub auth_rate_limit_per_minute: usize,
    /// Page that receives `?token=` in password-reset links.
    pub password_reset_url: String,
    /// Take the client address from `X-Forwarded-For`/`X-Real-IP`.
    /// Only safe behind a reverse proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

/// Clamp a configured per-minute limit to something enforceable.
pub fn normalize_rate_limit(limit: i64) -> usize {
    usize::try_from(limit)
        .ok()
        .filter(|l| *l > 0)
        .unwrap_or(FALLBACK_RATE_LIMIT)
}

/// Parse a boolean flag value as accepted in the environment.
pub fn parse_flag(key: &str, raw: &str) -> Result<bool, AuthError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(AuthError::Config(format!("{key} is not a boolean: {raw:?}"))),
    }
}

impl ApiConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                     | Default                                  |
    /// |------------------------------|------------------------------------------|
    /// | `BIND_ADDR`                  | `127.0.0.1:8080`                         |
    /// | `DATABASE_URL`               | `postgres://localhost:5432/egaldeutsch`  |
    /// | `AUTH_RATE_LIMIT_PER_MINUTE` | `10`                                     |
    /// | `PASSWORD_RESET_URL`         | `http://localhost:3000/reset-password`   |
    /// | `TRUST_PROXY_HEADERS`        | `false`                                  |
    ///
    /// JWT settings come from [`JwtConfig::from_env`]; `JWT_SECRET` is required.
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`ApiConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let rate_limit = match lookup("AUTH_RATE_LIMIT_PER_MINUTE") {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                AuthError::Config(format!("AUTH_RATE_LIMIT_PER_MINUTE is not a number: {raw:?}"))
            })?,
            None => DEFAULT_AUTH_RATE_LIMIT,
        };
        let trust_proxy_headers = match lookup("TRUST_PROXY_HEADERS") {
            Some(raw) => parse_flag("TRUST_PROXY_HEADERS", &raw)?,
            None => false,
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            pg_connection_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            jwt: JwtConfig::from_lookup(&lookup)?,
            auth_rate_limit_per_minute: normalize_rate_limit(rate_limit),
            password_reset_url: lookup("PASSWORD_RESET_URL")
                .unwrap_or_else(|| DEFAULT_PASSWORD_RESET_URL.into()),
            trust_proxy_headers,
        })
    }
}
