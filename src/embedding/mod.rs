//! Text embedding providers.
//!
//! - `HashingEmbedder`: deterministic, offline n-gram hashing
//! - `HttpEmbedder`: OpenAI-compatible `/embeddings` endpoint

mod hashing;
mod http;

use std::env;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::config::{EmbeddingBackend, RagConfig};
use crate::core::errors::ApiError;

pub use hashing::HashingEmbedder;
pub use http::HttpEmbedder;

/// Turns text into a fixed-length vector.
///
/// Output is deterministic for a given model and always `dimension()` long.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn model_id(&self) -> &str;

    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError>;
}

/// Builds the configured embedder. HTTP embedders are probed once here so a
/// broken endpoint fails startup instead of the first request.
pub async fn build_embedder(config: &RagConfig) -> Result<Arc<dyn EmbeddingProvider>, ApiError> {
    match config.embedding_provider {
        EmbeddingBackend::Hashing => {
            tracing::info!(
                "Using hashing embedder ({} dimensions)",
                config.embedding_dimension
            );
            Ok(Arc::new(HashingEmbedder::new(config.embedding_dimension)))
        }
        EmbeddingBackend::Http => {
            let endpoint = config
                .embedding_endpoint
                .clone()
                .ok_or_else(|| ApiError::config("rag.embedding_endpoint is required"))?;
            let api_key = match &config.embedding_api_key_env {
                Some(var) => Some(env::var(var).map_err(|_| {
                    ApiError::config(format!("Missing {} environment variable", var))
                })?),
                None => None,
            };

            tracing::info!("Loading embedding model: {}", config.embedding_model);
            let embedder =
                HttpEmbedder::connect(endpoint, config.embedding_model.clone(), api_key).await?;
            Ok(Arc::new(embedder))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builds_hashing_embedder_by_default() {
        let config = RagConfig::default();
        let embedder = build_embedder(&config).await.unwrap();
        assert_eq!(embedder.dimension(), 384);
        assert_eq!(embedder.embed("ciao").await.unwrap().len(), 384);
    }

    #[tokio::test]
    async fn http_embedder_requires_its_api_key() {
        let config = RagConfig {
            embedding_provider: EmbeddingBackend::Http,
            embedding_endpoint: Some("http://127.0.0.1:9/v1".to_string()),
            embedding_api_key_env: Some("HOMEBOT_TEST_UNSET_EMBEDDING_KEY".to_string()),
            ..RagConfig::default()
        };

        let err = build_embedder(&config).await.err().unwrap();
        assert!(matches!(err, ApiError::Config(_)));
    }
}
