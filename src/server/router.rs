use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{chat, health, knowledge, stats};
use crate::state::AppState;

/// Creates the application router.
///
/// Exposes the collaborator operations (chat, knowledge ingestion and search,
/// stats, cache invalidation) plus health checks, with request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health::root))
        .route("/health", get(health::health))
        .route("/api/chat", post(chat::chat))
        .route(
            "/api/knowledge",
            post(knowledge::add_knowledge).delete(knowledge::clear_knowledge),
        )
        .route("/api/knowledge/search", post(knowledge::search_knowledge))
        .route("/api/knowledge/categories", get(knowledge::list_categories))
        .route("/api/stats", get(stats::get_stats))
        .route("/api/cache/clear", post(stats::clear_cache))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
