//! Request pipeline: response cache, retrieval, prompt assembly, generation.
//!
//! Internals return `ResponseError`; `get_response` is the only place a
//! failure becomes user-facing text.

pub mod prompt;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures_util::FutureExt;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::cache::{cache_key, TtlCache};
use crate::core::config::AppConfig;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, GenerationService};
use crate::rag::{RetrievalStats, RetrievalSystem};

pub const APOLOGY: &str = "⚠️ Mi dispiace, ho avuto un problema tecnico. Riprova tra poco!";

#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("generation failed: {0}")]
    Generation(#[source] ApiError),
    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ResponseError {
    pub fn user_message(&self) -> String {
        match self {
            ResponseError::Generation(e) => GenerationService::user_diagnostic(e),
            ResponseError::Unexpected(_) => APOLOGY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppInfo {
    pub app_name: String,
    pub version: String,
    pub environment: String,
}

impl From<&AppConfig> for AppInfo {
    fn from(config: &AppConfig) -> Self {
        Self {
            app_name: config.app_name.clone(),
            version: config.version.clone(),
            environment: config.environment.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmInfo {
    pub provider: String,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestratorStats {
    #[serde(flatten)]
    pub info: AppInfo,
    pub llm: LlmInfo,
    pub rag: RetrievalStats,
    pub cache_size: usize,
    pub uptime_secs: u64,
}

pub struct Orchestrator {
    info: AppInfo,
    retrieval: RetrievalSystem,
    generation: GenerationService,
    response_cache: TtlCache<String>,
    started_at: Instant,
}

impl Orchestrator {
    pub fn new(
        info: AppInfo,
        retrieval: RetrievalSystem,
        generation: GenerationService,
        response_cache: TtlCache<String>,
    ) -> Self {
        Self {
            info,
            retrieval,
            generation,
            response_cache,
            started_at: Instant::now(),
        }
    }

    pub fn retrieval(&self) -> &RetrievalSystem {
        &self.retrieval
    }

    pub async fn get_response(&self, user_message: &str, user_id: Option<&str>) -> String {
        self.get_response_with_cache(user_message, user_id, true)
            .await
    }

    /// Never fails: errors are rendered as a user-facing message.
    pub async fn get_response_with_cache(
        &self,
        user_message: &str,
        user_id: Option<&str>,
        use_cache: bool,
    ) -> String {
        match self.respond(user_message, user_id, use_cache).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error generating response: {}", e);
                e.user_message()
            }
        }
    }

    pub async fn respond(
        &self,
        user_message: &str,
        user_id: Option<&str>,
        use_cache: bool,
    ) -> Result<String, ResponseError> {
        tracing::debug!(
            "get_response: message_length={}, user_id={:?}",
            user_message.chars().count(),
            user_id
        );

        let key = cache_key("response", &[user_message]);
        if use_cache {
            if let Some(cached) = self.response_cache.get(&key) {
                tracing::debug!("Using cached response");
                return Ok(cached);
            }
        }

        let response = match AssertUnwindSafe(self.answer(user_message))
            .catch_unwind()
            .await
        {
            Ok(result) => result?,
            Err(panic) => return Err(ResponseError::Unexpected(panic_message(&*panic))),
        };

        if use_cache {
            self.response_cache.set(key, response.clone(), None);
        }
        tracing::info!(
            "Generated response for user {}",
            user_id.unwrap_or("anonymous")
        );
        Ok(response)
    }

    async fn answer(&self, user_message: &str) -> Result<String, ResponseError> {
        let knowledge = self.retrieval.search(user_message, None).await;
        let prompt = prompt::build_prompt(user_message, &knowledge);

        self.generation
            .generate(vec![ChatMessage::user(prompt)])
            .await
            .map_err(ResponseError::Generation)
    }

    pub async fn add_knowledge(
        &self,
        content: &str,
        category: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String, ApiError> {
        self.retrieval
            .add_knowledge(content, category, metadata)
            .await
    }

    pub async fn stats(&self) -> OrchestratorStats {
        OrchestratorStats {
            info: self.info.clone(),
            llm: LlmInfo {
                provider: self.generation.provider_name().to_string(),
                model: self.generation.model().to_string(),
            },
            rag: self.retrieval.stats().await,
            cache_size: self.response_cache.len(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }

    /// Drops every stored item; cached responses built on them go too.
    pub async fn clear_knowledge(&self) -> Result<usize, ApiError> {
        let removed = self.retrieval.clear_knowledge().await?;
        self.response_cache.clear();
        Ok(removed)
    }

    pub fn clear_cache(&self) {
        self.response_cache.clear();
        self.retrieval.clear_cache();
        tracing::info!("All caches cleared");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
