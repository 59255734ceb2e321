use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use super::principal::require_auth;
use super::service;
use super::state::AppState;
use super::types::{ApiResponse, AuthData};
use crate::error::AppError;

/// Return the authenticated caller's profile and company.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<AuthData>),
        (status = 401, description = "Not authenticated"),
    ),
    tag = "auth"
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let principal = require_auth(&state, &headers).await?;
    let (user, company) = service::whoami(&state, &principal.user_public_id).await?;
    let body = ApiResponse::ok(
        "current user",
        AuthData {
            user: (&user).into(),
            company: (&company).into(),
        },
    );
    Ok(Json(body))
}
