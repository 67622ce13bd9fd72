use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::llm_client::MODEL;
use crate::state::AppState;

/// GET /health
/// Returns service status, version, and the configured backends.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "curriclick-api",
        "model": MODEL,
        "answer_interpreter": state.orchestrator.interpreter_name(),
        "narrative_phraser": state.orchestrator.phraser_name(),
        "active_sessions": state.sessions.len().await,
    }))
}
