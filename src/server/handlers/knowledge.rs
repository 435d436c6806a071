use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::core::errors::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddKnowledgeBody {
    pub content: String,
    pub category: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

pub async fn add_knowledge(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AddKnowledgeBody>,
) -> Result<impl IntoResponse, ApiError> {
    let id = state
        .orchestrator
        .add_knowledge(
            &payload.content,
            payload.category.as_deref(),
            payload.metadata,
        )
        .await?;

    Ok(Json(json!({ "id": id })))
}

#[derive(Debug, Deserialize)]
pub struct SearchBody {
    pub query: String,
    pub n: Option<usize>,
    pub category: Option<String>,
}

pub async fn search_knowledge(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<SearchBody>,
) -> Result<impl IntoResponse, ApiError> {
    let results = state
        .orchestrator
        .retrieval()
        .try_search_in(&payload.query, payload.n, payload.category.as_deref())
        .await?;

    Ok(Json(json!({ "results": results })))
}

pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let categories = state.orchestrator.retrieval().categories().await?;
    Ok(Json(json!({ "categories": categories })))
}

pub async fn clear_knowledge(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = state.orchestrator.clear_knowledge().await?;
    Ok(Json(json!({ "removed": removed })))
}
