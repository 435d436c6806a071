use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn root(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "app_name": state.config.app_name,
        "version": state.config.version,
        "status": "running"
    }))
}

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "environment": state.config.environment,
        "model": state.config.llm.model,
        "rag_enabled": state.orchestrator.retrieval().is_enabled()
    }))
}
