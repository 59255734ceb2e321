//! Logout and active-session listing.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use super::principal::require_auth;
use super::state::AppState;
use super::types::ApiResponse;
use super::{cookies, service};
use crate::domain::SessionView;
use crate::error::AppError;

/// Log out, revoking the current session (or all of them when the refresh
/// cookie is missing) and clearing both cookies.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Not authenticated"),
    ),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    let refresh_token = cookies::cookie_value(&headers, cookies::REFRESH_COOKIE);
    service::logout(&state, &principal.user_public_id, refresh_token.as_deref()).await?;
    let clearing = cookies::clear(state.config.cookie_secure())?;
    Ok((clearing, Json(ApiResponse::message("logged out"))))
}

/// List the caller's active sessions, without their identifiers.
#[utoipa::path(
    get,
    path = "/api/v1/auth/sessions",
    responses(
        (status = 200, description = "Active sessions", body = ApiResponse<Vec<SessionView>>),
        (status = 401, description = "Not authenticated"),
    ),
    tag = "auth"
)]
pub async fn sessions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    let sessions = service::list_sessions(&state, &principal.user_public_id).await?;
    Ok(Json(ApiResponse::ok("active sessions", sessions)))
}
