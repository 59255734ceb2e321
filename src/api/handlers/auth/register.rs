use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use super::state::AppState;
use super::types::{ApiResponse, AuthData, RegisterRequest};
use super::{client_meta, cookies, service};
use crate::error::AppError;

/// Register a company and its first super-admin user.
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Company and owner created", body = ApiResponse<AuthData>),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Company email already registered"),
    ),
    tag = "auth"
)]
pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = client_meta(&headers);
    let (user, company, bundle) = service::register(&state, req, &client).await?;
    let cookies = cookies::install(
        &bundle.access_token,
        &bundle.refresh_token,
        state.config.cookie_secure(),
    )?;
    let body = ApiResponse::ok(
        "company registered",
        AuthData {
            user: (&user).into(),
            company: (&company).into(),
        },
    );
    Ok((StatusCode::CREATED, cookies, Json(body)))
}
