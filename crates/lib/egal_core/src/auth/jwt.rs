//! Access-token signing and verification (HS256).

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use tracing::debug;

use super::AuthError;
use super::config::JwtConfig;
use crate::models::auth::TokenClaims;

/// The only algorithm accepted when signing or verifying.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Signs and verifies access tokens with a symmetric secret.
///
/// Stateless apart from the keys; safe to share across request tasks.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("issuer", &self.issuer)
            .field("lifetime", &self.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec. Fails with [`AuthError::Config`] on an empty secret.
    pub fn new(secret: &str, issuer: &str, lifetime: Duration) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::Config("jwt secret key is empty".into()));
        }
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            lifetime,
        })
    }

    /// Build a codec from a validated [`JwtConfig`].
    pub fn from_config(config: &JwtConfig) -> Result<Self, AuthError> {
        Self::new(
            &config.secret,
            &config.issuer,
            Duration::hours(config.expiration_hours),
        )
    }

    /// Access-token lifetime.
    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Generate a signed access token for `user_id` carrying `role`.
    pub fn create_access_token(&self, user_id: &str, role: &str) -> Result<String, AuthError> {
        if user_id.trim().is_empty() {
            return Err(AuthError::Validation("invalid user ID: empty".into()));
        }
        if role.trim().is_empty() {
            return Err(AuthError::Validation("invalid role: empty".into()));
        }

        let now = Utc::now();
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role: role.to_string(),
            iss: self.issuer.clone(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
        };
        encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature, algorithm, issuer and expiry, returning the claims.
    ///
    /// Every failure is reported as [`AuthError::InvalidToken`].
    pub fn parse_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss"]);

        decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(reason = %e, "access token rejected");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    use super::*;

    const SECRET: &str = "this-is-a-very-secure-secret-key-with-32-plus-characters";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET, "egaldeutsch", Duration::hours(1)).unwrap()
    }

    #[test]
    fn create_and_parse_roundtrip() {
        let codec = codec();
        let user_id = uuid::Uuid::new_v4().to_string();
        let token = codec.create_access_token(&user_id, "learner").unwrap();
        let claims = codec.parse_token(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, "learner");
        assert_eq!(claims.iss, "egaldeutsch");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn empty_secret_is_config_error() {
        let err = TokenCodec::new("", "egaldeutsch", Duration::hours(1)).unwrap_err();
        assert!(matches!(err, AuthError::Config(_)));
    }

    #[test]
    fn rejects_blank_role_and_user() {
        let codec = codec();
        assert!(matches!(
            codec.create_access_token("u1", "   "),
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            codec.create_access_token("", "learner"),
            Err(AuthError::Validation(_))
        ));
    }

    #[test]
    fn rejects_expired_token() {
        let codec = TokenCodec::new(SECRET, "egaldeutsch", Duration::zero()).unwrap();
        let token = codec.create_access_token("u1", "learner").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(matches!(codec.parse_token(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn rejects_token_signed_with_other_secret() {
        let other = TokenCodec::new(
            "another-secret-that-is-also-long-enough-to-pass",
            "egaldeutsch",
            Duration::hours(1),
        )
        .unwrap();
        let token = other.create_access_token("u1", "learner").unwrap();
        assert!(matches!(codec().parse_token(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn rejects_token_signed_with_other_algorithm() {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: "u1".into(),
            role: "admin".into(),
            iss: "egaldeutsch".into(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(1)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS512),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();
        assert!(matches!(codec().parse_token(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn rejects_unsigned_token() {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let payload = URL_SAFE_NO_PAD.encode(format!(
            r#"{{"sub":"u1","role":"admin","iss":"egaldeutsch","iat":0,"exp":{exp}}}"#
        ));
        let token = format!("{header}.{payload}.");
        assert!(matches!(codec().parse_token(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn rejects_wrong_issuer() {
        let other = TokenCodec::new(SECRET, "someone-else", Duration::hours(1)).unwrap();
        let token = other.create_access_token("u1", "learner").unwrap();
        assert!(matches!(codec().parse_token(&token), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(matches!(codec().parse_token("garbage"), Err(AuthError::InvalidToken)));
        assert!(matches!(codec().parse_token(""), Err(AuthError::InvalidToken)));
    }
}
