use std::sync::Arc;
use std::time::Duration;

use super::provider::LlmProvider;
use super::retry::{retry_with_backoff, RetryPolicy};
use super::types::{ChatMessage, ChatRequest};
use crate::core::config::LlmConfig;
use crate::core::errors::ApiError;

pub const DIAGNOSTIC_PREFIX: &str = "⚠️ Error generating response: ";
const DIAGNOSTIC_MAX_CHARS: usize = 200;

/// Generation with the configured model, bounded retries and a per-attempt timeout.
#[derive(Clone)]
pub struct GenerationService {
    provider: Arc<dyn LlmProvider>,
    config: LlmConfig,
    retry: RetryPolicy,
    timeout: Duration,
}

impl GenerationService {
    pub fn new(provider: Arc<dyn LlmProvider>, config: LlmConfig) -> Self {
        Self {
            provider,
            retry: RetryPolicy::from(&config.retry),
            timeout: config.request_timeout(),
            config,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn generate(&self, messages: Vec<ChatMessage>) -> Result<String, ApiError> {
        let model = self.config.model.as_str();

        let content = retry_with_backoff(&self.retry, |attempt| {
            let request = ChatRequest::new(messages.clone()).with_config(&self.config);
            async move {
                tracing::debug!("Generation attempt {} with model {}", attempt + 1, model);
                match tokio::time::timeout(self.timeout, self.provider.chat(request, model)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(ApiError::Timeout(format!(
                        "no response from {} after {:?}",
                        self.provider.name(),
                        self.timeout
                    ))),
                }
            }
        })
        .await
        .map_err(|e| {
            tracing::error!("Error generating response: {}", e);
            e
        })?;

        let content = content.trim().to_string();
        tracing::debug!("Generated response: {} characters", content.chars().count());
        Ok(content)
    }

    /// User-safe rendering of a generation failure, bounded in length.
    pub fn user_diagnostic(err: &ApiError) -> String {
        let detail: String = err.to_string().chars().take(DIAGNOSTIC_MAX_CHARS).collect();
        format!("{}{}", DIAGNOSTIC_PREFIX, detail)
    }
}
