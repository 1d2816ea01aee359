//! Client metadata taken from request headers.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::{Extensions, HeaderMap};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use egal_core::models::auth::ClientInfo;

use crate::AppState;

/// Key used for requests whose address cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// First `X-Forwarded-For` hop, else `X-Real-IP`.
pub fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());
    if forwarded.is_some() {
        return forwarded.map(str::to_string);
    }
    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolve the client address.
///
/// Proxy headers are honored only when `trust_proxy_headers` is set, since any
/// client can send them; otherwise only the peer address counts.
pub fn client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trust_proxy_headers: bool,
) -> Option<String> {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());
    if trust_proxy_headers {
        extract_client_ip(headers).or(peer)
    } else {
        peer
    }
}

/// Client IP and user agent of the current request.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub ip: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientMeta {
    /// Borrow as the shape the token store records.
    pub fn as_client_info(&self) -> ClientInfo<'_> {
        ClientInfo::new(self.ip.as_deref(), self.user_agent.as_deref())
    }
}

impl FromRequestParts<AppState> for ClientMeta {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self {
            ip: client_ip(
                &parts.headers,
                &parts.extensions,
                state.config.trust_proxy_headers,
            ),
            user_agent: parts
                .headers
                .get(USER_AGENT)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string),
        })
    }
}
