//! Liveness endpoint backed by a database ping.

use axum::extract::State;
use axum::http::header::{HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::auth::state::AppState;
use crate::store::Store;

const X_APP: HeaderName = HeaderName::from_static("x-app");

/// `HEAD` gets only the status and `X-App` header; `GET` adds a body.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database reachable"),
        (status = 503, description = "Database unreachable"),
    ),
    tag = "health"
)]
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let app = HeaderValue::from_static(concat!(
        env!("CARGO_PKG_NAME"),
        "/",
        env!("CARGO_PKG_VERSION")
    ));
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, [(X_APP, app)], "ok"),
        Err(err) => {
            tracing::error!(%err, "health check failed");
            (StatusCode::SERVICE_UNAVAILABLE, [(X_APP, app)], "degraded")
        }
    }
}
