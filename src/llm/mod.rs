pub mod groq;
pub mod provider;
pub mod retry;
pub mod service;
pub mod types;

use std::sync::Arc;

use crate::core::config::LlmConfig;
use crate::core::errors::ApiError;

pub use groq::GroqProvider;
pub use provider::LlmProvider;
pub use retry::{retry_with_backoff, RetryPolicy};
pub use service::GenerationService;
pub use types::{ChatMessage, ChatRequest};

/// Builds the configured provider. Unknown names are a configuration error.
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, ApiError> {
    match config.provider.trim().to_lowercase().as_str() {
        "groq" => Ok(Arc::new(GroqProvider::from_config(config)?)),
        other => Err(ApiError::config(format!(
            "Provider '{}' not supported",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_rejected() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            ..LlmConfig::default()
        };
        let err = build_provider(&config).err().unwrap();
        assert!(matches!(err, ApiError::Config(msg) if msg.contains("openai")));
    }
}
