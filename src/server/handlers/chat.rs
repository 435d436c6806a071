use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

fn default_use_cache() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    pub user_id: Option<String>,
    #[serde(default = "default_use_cache")]
    pub use_cache: bool,
}

/// Always answers 200: failures are already rendered into the response text.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatBody>,
) -> impl IntoResponse {
    let response = state
        .orchestrator
        .get_response_with_cache(
            &payload.message,
            payload.user_id.as_deref(),
            payload.use_cache,
        )
        .await;

    Json(json!({ "response": response }))
}
