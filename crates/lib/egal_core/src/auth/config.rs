//! JWT and session-token configuration.
//!
//! Invalid values are rejected once at startup; nothing here is re-checked
//! per request.

use super::AuthError;

/// Minimum accepted length of the signing secret.
pub const MIN_SECRET_LEN: usize = 32;

/// Longest accepted access-token lifetime: one year.
pub const MAX_EXPIRATION_HOURS: i64 = 8760;

/// Default issuer claim.
pub const DEFAULT_ISSUER: &str = "egaldeutsch";

/// Default access-token lifetime in hours.
pub const DEFAULT_EXPIRATION_HOURS: i64 = 1;

/// Default refresh-token lifetime in days.
pub const DEFAULT_REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 30;

/// Signing and lifetime settings for issued tokens.
#[derive(Clone)]
pub struct JwtConfig {
    /// HMAC signing secret (at least 32 characters).
    pub secret: String,
    /// `iss` claim written into and required from access tokens.
    pub issuer: String,
    /// Access-token lifetime in hours (1..=8760).
    pub expiration_hours: i64,
    /// Refresh-token lifetime in days (> 0).
    pub refresh_token_expiration_days: i64,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("expiration_hours", &self.expiration_hours)
            .field(
                "refresh_token_expiration_days",
                &self.refresh_token_expiration_days,
            )
            .finish()
    }
}

impl JwtConfig {
    /// Build a config with default issuer and lifetimes.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: DEFAULT_ISSUER.to_string(),
            expiration_hours: DEFAULT_EXPIRATION_HOURS,
            refresh_token_expiration_days: DEFAULT_REFRESH_TOKEN_EXPIRATION_DAYS,
        }
    }

    /// Validate the JWT configuration parameters.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.secret.is_empty() {
            return Err(AuthError::Config("jwt secret key cannot be empty".into()));
        }
        if self.secret.chars().count() < MIN_SECRET_LEN {
            return Err(AuthError::Config(format!(
                "jwt secret key must be at least {MIN_SECRET_LEN} characters, got {}",
                self.secret.chars().count()
            )));
        }
        if self.issuer.trim().is_empty() {
            return Err(AuthError::Config("jwt issuer cannot be empty".into()));
        }
        if self.expiration_hours <= 0 {
            return Err(AuthError::Config(format!(
                "jwt expiration hours must be positive, got {}",
                self.expiration_hours
            )));
        }
        if self.expiration_hours > MAX_EXPIRATION_HOURS {
            return Err(AuthError::Config(format!(
                "jwt expiration hours too long (max {MAX_EXPIRATION_HOURS}), got {}",
                self.expiration_hours
            )));
        }
        if self.refresh_token_expiration_days <= 0 {
            return Err(AuthError::Config(format!(
                "refresh token expiration days must be positive, got {}",
                self.refresh_token_expiration_days
            )));
        }
        Ok(())
    }

    /// Reads configuration from environment variables and validates it.
    ///
    /// | Variable                        | Default        |
    /// |---------------------------------|----------------|
    /// | `JWT_SECRET`                    | required       |
    /// | `JWT_ISSUER`                    | `egaldeutsch`  |
    /// | `JWT_EXPIRATION_HOURS`          | `1`            |
    /// | `REFRESH_TOKEN_EXPIRATION_DAYS` | `30`           |
    pub fn from_env() -> Result<Self, AuthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`JwtConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AuthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthError::Config("JWT_SECRET is not set".into()))?;
        let issuer = lookup("JWT_ISSUER").unwrap_or_else(|| DEFAULT_ISSUER.to_string());
        let expiration_hours =
            parse_i64(&lookup, "JWT_EXPIRATION_HOURS", DEFAULT_EXPIRATION_HOURS)?;
        let refresh_token_expiration_days = parse_i64(
            &lookup,
            "REFRESH_TOKEN_EXPIRATION_DAYS",
            DEFAULT_REFRESH_TOKEN_EXPIRATION_DAYS,
        )?;

        let config = Self {
            secret,
            issuer,
            expiration_hours,
            refresh_token_expiration_days,
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_i64<F>(lookup: &F, key: &str, default: i64) -> Result<i64, AuthError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<i64>()
            .map_err(|_| AuthError::Config(format!("{key} must be an integer, got {raw:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const SECRET: &str = "this-is-a-very-secure-secret-key-with-32-plus-characters";

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_validate() {
        JwtConfig::with_secret(SECRET).validate().unwrap();
    }

    #[test]
    fn rejects_short_secret() {
        let err = JwtConfig::with_secret("short").validate().unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn rejects_empty_secret() {
        let err = JwtConfig::with_secret("").validate().unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn rejects_out_of_range_hours() {
        let mut cfg = JwtConfig::with_secret(SECRET);
        cfg.expiration_hours = 0;
        assert!(cfg.validate().is_err());
        cfg.expiration_hours = MAX_EXPIRATION_HOURS + 1;
        assert!(cfg.validate().is_err());
        cfg.expiration_hours = MAX_EXPIRATION_HOURS;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_refresh_days() {
        let mut cfg = JwtConfig::with_secret(SECRET);
        cfg.refresh_token_expiration_days = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn from_lookup_requires_secret() {
        let err = JwtConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn from_lookup_reads_overrides() {
        let cfg = JwtConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("JWT_ISSUER", "tests"),
            ("JWT_EXPIRATION_HOURS", "24"),
            ("REFRESH_TOKEN_EXPIRATION_DAYS", "7"),
        ]))
        .unwrap();
        assert_eq!(cfg.issuer, "tests");
        assert_eq!(cfg.expiration_hours, 24);
        assert_eq!(cfg.refresh_token_expiration_days, 7);
    }

    #[test]
    fn from_lookup_rejects_unparsable_numbers() {
        let err = JwtConfig::from_lookup(lookup(&[
            ("JWT_SECRET", SECRET),
            ("JWT_EXPIRATION_HOURS", "soon"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("JWT_EXPIRATION_HOURS"));
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", JwtConfig::with_secret(SECRET));
        assert!(!rendered.contains(SECRET));
    }
}
