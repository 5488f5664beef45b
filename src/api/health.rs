//! Health check endpoint

use axum::{extract::State, Json};

use crate::state::AppState;

/// Liveness only; the database is not queried.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "kervan-ecommerce",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "events": state.events.is_connected(),
    }))
}
