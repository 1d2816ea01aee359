//! Authentication domain models.
//!
//! Internal domain models, distinct from the request/response shapes the HTTP
//! layer serializes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role granted full administrative access.
pub const ROLE_ADMIN: &str = "admin";

/// Default role for new accounts.
pub const ROLE_USER: &str = "user";

/// Domain user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: String,
}

/// User with password hash (for internal auth flows).
#[derive(Debug, Clone)]
pub struct UserWithPassword {
    pub user: User,
    pub password_hash: String,
}

/// JWT claims embedded in access tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: the user ID (standard JWT `sub` claim).
    pub sub: String,
    /// User role (e.g. `"learner"`).
    pub role: String,
    /// Issuer.
    pub iss: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// Refresh token record stored in the database.
///
/// Only the digest is ever persisted; the plaintext goes to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshTokenRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub replaced_by: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl RefreshTokenRecord {
    /// Whether the record is past its `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Password reset token record stored in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordResetRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

/// Client metadata recorded alongside a refresh token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClientInfo<'a> {
    pub ip: Option<&'a str>,
    pub user_agent: Option<&'a str>,
}

impl<'a> ClientInfo<'a> {
    /// Build from raw header values, treating blank strings as absent.
    pub fn new(ip: Option<&'a str>, user_agent: Option<&'a str>) -> Self {
        Self {
            ip: ip.map(str::trim).filter(|s| !s.is_empty()),
            user_agent: user_agent.map(str::trim).filter(|s| !s.is_empty()),
        }
    }
}

/// Result of an atomic refresh-token rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationOutcome {
    pub user_id: Uuid,
    /// Role read inside the rotation transaction.
    pub role: String,
    /// `true` when the presented token had already been revoked.
    pub reused: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_info_drops_blank_values() {
        let info = ClientInfo::new(Some("  "), Some("curl/8"));
        assert_eq!(info.ip, None);
        assert_eq!(info.user_agent, Some("curl/8"));
    }

    #[test]
    fn claims_serialize_with_registered_names() {
        let claims = TokenClaims {
            sub: "u1".into(),
            role: "learner".into(),
            iss: "egaldeutsch".into(),
            iat: 1,
            exp: 2,
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], "u1");
        assert_eq!(json["iss"], "egaldeutsch");
        assert_eq!(json["exp"], 2);
    }
}
