//! Opaque secret generation and one-way digests.
//!
//! Refresh and password-reset tokens are random bytes handed to the client as
//! URL-safe base64. Only their SHA-256 digest is stored.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

use super::AuthError;

/// Entropy for refresh tokens (long-lived, higher-value).
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Entropy for password-reset tokens (one hour lifetime).
pub const PASSWORD_RESET_TOKEN_BYTES: usize = 32;

/// Fill `byte_len` bytes from the OS random source and encode them URL-safe.
///
/// A failing random source is reported as [`AuthError::Entropy`] and is not
/// retried.
pub fn generate_token(byte_len: usize) -> Result<String, AuthError> {
    let mut bytes = vec![0u8; byte_len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::Entropy(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 hash a token for storage and lookup, rendered as lowercase hex.
pub fn digest_token(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}

/// A freshly generated secret together with its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSecret {
    pub plaintext: String,
    pub digest: String,
}

/// Generate a secret of `byte_len` bytes and compute its digest.
pub fn generate_secret(byte_len: usize) -> Result<GeneratedSecret, AuthError> {
    let plaintext = generate_token(byte_len)?;
    let digest = digest_token(&plaintext);
    Ok(GeneratedSecret { plaintext, digest })
}
