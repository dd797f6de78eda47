//! HTTP handlers for the request/response endpoints.

use crate::metrics::publisher::process_document;
use crate::web::AppState;
use axum::{extract::State, response::Json};
use serde_json::json;

/// Latest process table as one JSON document.
///
/// Never fails the request: an unsampled or unencodable table comes back as
/// `{"error": ...}`.
pub async fn get_process(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(process_document(&state.store))
}

/// Health check endpoint.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "hostpulse",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
