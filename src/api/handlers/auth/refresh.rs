use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;

use super::state::AppState;
use super::types::{ApiResponse, AuthData};
use super::{client_meta, cookies, service};
use crate::error::AppError;

/// Rotate the refresh token and mint a fresh access token.
///
/// Any failure clears both auth cookies so the browser does not keep
/// replaying a dead token.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    responses(
        (status = 200, description = "Tokens rotated", body = ApiResponse<AuthData>),
        (status = 401, description = "Missing, invalid, expired, or revoked refresh token"),
    ),
    tag = "auth"
)]
pub async fn refresh(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let secure = state.config.cookie_secure();
    match try_refresh(&state, &headers).await {
        Ok(response) => response,
        Err(err) => {
            let mut response = err.into_response();
            if let Ok(clearing) = cookies::clear(secure) {
                response.headers_mut().extend(clearing);
            }
            response
        }
    }
}

async fn try_refresh(state: &AppState, headers: &HeaderMap) -> Result<Response, AppError> {
    let token = cookies::cookie_value(headers, cookies::REFRESH_COOKIE)
        .ok_or_else(|| AppError::Unauthenticated("refresh token required".to_string()))?;
    let client = client_meta(headers);
    let (user, company, bundle) = service::refresh(state, &token, &client).await?;
    let cookies = cookies::install(
        &bundle.access_token,
        &bundle.refresh_token,
        state.config.cookie_secure(),
    )?;
    let body = ApiResponse::ok(
        "token refreshed",
        AuthData {
            user: (&user).into(),
            company: (&company).into(),
        },
    );
    Ok((cookies, Json(body)).into_response())
}
