use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub const SERVICE_BANNER: &str = "AI Resume Analyzer backend running";

/// GET /
pub async fn root_handler() -> Json<Value> {
    Json(json!({ "message": SERVICE_BANNER }))
}

/// GET /health
/// Returns a simple status object with service version and whether a model is configured.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": env!("CARGO_PKG_NAME"),
        "model_configured": state.model.is_some()
    }))
}
