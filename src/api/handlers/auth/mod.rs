//! Auth gateway: registration, login, token refresh, logout, identity.

pub mod cookies;
pub mod login;
pub mod me;
pub mod principal;
pub mod refresh;
pub mod register;
pub mod service;
pub mod session;
pub mod state;
pub mod types;


use axum::http::header::USER_AGENT;
use axum::http::HeaderMap;

use self::service::ClientMeta;

/// Client context from request headers. The service runs behind a proxy, so
/// the client address comes from `X-Forwarded-For` when present.
#[must_use]
pub fn client_meta(headers: &HeaderMap) -> ClientMeta {
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or("unknown")
        .to_string();
    ClientMeta { user_agent, ip }
}
