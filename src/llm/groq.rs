use std::env;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::config::LlmConfig;
use crate::core::errors::ApiError;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq's OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct GroqProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl GroqProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }

    /// Reads the API key from the configured environment variable.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ApiError> {
        let api_key = env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ApiError::config(format!(
                    "Missing {} environment variable",
                    config.api_key_env
                ))
            })?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| GROQ_BASE_URL.to_string());

        tracing::info!("Groq client initialized with model: {}", config.model);
        Ok(Self::new(base_url, api_key))
    }
}

fn build_body(request: &ChatRequest, model_id: &str) -> Value {
    let mut body = json!({
        "model": model_id,
        "messages": request.messages,
        "stream": false,
    });

    if let Some(obj) = body.as_object_mut() {
        if let Some(t) = request.temperature {
            obj.insert("temperature".to_string(), json!(t));
        }
        if let Some(t) = request.max_tokens {
            obj.insert("max_tokens".to_string(), json!(t));
        }
        if let Some(s) = &request.stop {
            obj.insert("stop".to_string(), json!(s));
        }
    }

    body
}

fn parse_content(payload: &Value) -> Result<String, ApiError> {
    payload["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ApiError::internal("chat response has no choices[0].message.content"))
}

#[async_trait]
impl LlmProvider for GroqProvider {
    fn name(&self) -> &str {
        "groq"
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = build_body(&request, model_id);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::ServiceUnavailable(format!("Groq request failed: {}", e)))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            let message = if status == StatusCode::TOO_MANY_REQUESTS {
                format!("Groq rate limit exceeded: {}", text)
            } else {
                format!("Groq chat error: {}", text)
            };
            return Err(ApiError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        parse_content(&payload)
    }
}
