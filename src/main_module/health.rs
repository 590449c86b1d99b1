//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use log::warn;
use std::sync::Arc;

use crate::core::shared::state::AppState;

pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let storage_ok = match state.store().ping() {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check: storage unavailable: {e}");
            false
        }
    };

    let status = if storage_ok { "healthy" } else { "degraded" };
    let code = if storage_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(serde_json::json!({
            "status": status,
            "service": "cspserver",
            "version": env!("CARGO_PKG_VERSION"),
            "storage": storage_ok
        })),
    )
}

pub async fn health_check_simple() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub fn configure_health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/health", get(health_check_simple))
}
