//! Welcome route.

use axum::Json;
use serde_json::{json, Value};

pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "fitcore API",
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/docs",
    }))
}
