//! Hand-built auth cookies.
//!
//! Both tokens travel as `HttpOnly; SameSite=Strict; Path=/` cookies so
//! browser scripts can never read them; `Secure` is added when the frontend
//! is served over https.

use anyhow::{Context, Result};
use axum::http::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};

use crate::tokens::{ACCESS_TTL_SECS, REFRESH_TTL_SECS};

pub const ACCESS_COOKIE: &str = "access_token";
pub const REFRESH_COOKIE: &str = "refresh_token";

fn cookie(name: &str, value: &str, max_age: i64, secure: bool) -> Result<HeaderValue> {
    let secure = if secure { "; Secure" } else { "" };
    HeaderValue::from_str(&format!(
        "{name}={value}; Max-Age={max_age}; Path=/; HttpOnly; SameSite=Strict{secure}"
    ))
    .context("invalid cookie value")
}

/// `SET_COOKIE` headers installing both tokens.
pub fn install(access_token: &str, refresh_token: &str, secure: bool) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, cookie(ACCESS_COOKIE, access_token, ACCESS_TTL_SECS, secure)?);
    headers.append(SET_COOKIE, cookie(REFRESH_COOKIE, refresh_token, REFRESH_TTL_SECS, secure)?);
    Ok(headers)
}

/// `SET_COOKIE` headers expiring both tokens immediately.
pub fn clear(secure: bool) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.append(SET_COOKIE, cookie(ACCESS_COOKIE, "", 0, secure)?);
    headers.append(SET_COOKIE, cookie(REFRESH_COOKIE, "", 0, secure)?);
    Ok(headers)
}

/// Pull a cookie value out of the request `Cookie` header.
#[must_use]
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| {
            let (key, value) = pair.trim().split_once('=')?;
            (key == name).then(|| value.to_string())
        })
        .next()
}

/// `Authorization: Bearer …`, the fallback transport for access tokens.
#[must_use]
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
