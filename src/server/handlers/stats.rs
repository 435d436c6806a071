use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn get_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.orchestrator.stats().await)
}

pub async fn clear_cache(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.orchestrator.clear_cache();
    Json(json!({ "status": "cleared" }))
}
