use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;

use super::state::AppState;
use super::types::{ApiResponse, AuthData, LoginRequest};
use super::{client_meta, cookies, service};
use crate::error::AppError;

/// Log in with email and password.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = ApiResponse<AuthData>),
        (status = 401, description = "Invalid credentials"),
        (status = 423, description = "Account locked"),
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = client_meta(&headers);
    let (user, company, bundle) = service::login(&state, req, &client).await?;
    let cookies = cookies::install(
        &bundle.access_token,
        &bundle.refresh_token,
        state.config.cookie_secure(),
    )?;
    let body = ApiResponse::ok(
        "login successful",
        AuthData {
            user: (&user).into(),
            company: (&company).into(),
        },
    );
    Ok((cookies, Json(body)))
}
