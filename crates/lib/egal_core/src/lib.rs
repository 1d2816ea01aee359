//! # egal_core
//!
//! Core domain logic for Egaldeutsch: access tokens, refresh-token rotation,
//! password-reset tokens and the sliding-window rate limiter.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod rate_limit;
pub mod uuid;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
