use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::EmbeddingProvider;
use crate::core::errors::ApiError;

/// Embedder backed by an OpenAI-compatible `POST {base_url}/embeddings`.
#[derive(Clone)]
pub struct HttpEmbedder {
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimension: usize,
    client: Client,
}

impl HttpEmbedder {
    /// Connects and probes the endpoint once to learn the vector dimension.
    pub async fn connect(
        base_url: String,
        model: String,
        api_key: Option<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(ApiError::internal)?;

        let mut embedder = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key,
            dimension: 0,
            client,
        };

        let probe = embedder.request("dimension probe").await?;
        if probe.is_empty() {
            return Err(ApiError::ServiceUnavailable(format!(
                "Embedding endpoint {} returned an empty vector",
                embedder.base_url
            )));
        }
        embedder.dimension = probe.len();
        tracing::info!(
            "Embedding model {} ready ({} dimensions)",
            embedder.model,
            embedder.dimension
        );

        Ok(embedder)
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let url = format!("{}/embeddings", self.base_url);
        let body = json!({
            "model": self.model,
            "input": [text],
        });

        let mut builder = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let res = builder.send().await.map_err(ApiError::internal)?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                message: format!("embedding error: {}", text),
            });
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        parse_embedding(&payload)
    }
}

fn parse_embedding(payload: &Value) -> Result<Vec<f32>, ApiError> {
    let values = payload["data"][0]["embedding"]
        .as_array()
        .ok_or_else(|| ApiError::internal("embedding response has no data[0].embedding"))?;

    values
        .iter()
        .enumerate()
        .map(|(idx, v)| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                ApiError::internal(format!("embedding element {} is not a number: {}", idx, v))
            })
        })
        .collect()
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ApiError> {
        let embedding = self.request(text).await?;
        if embedding.len() != self.dimension {
            return Err(ApiError::internal(format!(
                "embedding dimension changed: expected {}, got {}",
                self.dimension,
                embedding.len()
            )));
        }
        Ok(embedding)
    }
}
