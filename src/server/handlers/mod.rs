pub mod chat;
pub mod health;
pub mod knowledge;
pub mod stats;

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use axum::response::Response;
    use serde_json::Value;

    use crate::core::config::{AppConfig, AppPaths};
    use crate::llm::service::tests::ScriptedProvider;
    use crate::state::AppState;

    /// Fully wired state over a fresh data dir and a scripted LLM.
    pub(crate) async fn test_state() -> Arc<AppState> {
        let root = std::env::temp_dir().join(format!("homebot-server-{}", uuid::Uuid::new_v4()));
        let paths = Arc::new(AppPaths::with_dirs(root.clone(), root.join("data")));
        AppState::with_provider(
            paths,
            AppConfig::default(),
            Arc::new(ScriptedProvider::default()),
        )
        .await
        .unwrap()
    }

    pub(crate) async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }
}
