use thiserror::Error;

use crate::core::errors::ApiError;

#[derive(Debug, Error)]
pub enum InitializationError {
    #[error("Invalid configuration: {0}")]
    Config(#[source] ApiError),

    #[error("Failed to initialize embedding model: {0}")]
    Embedding(#[source] ApiError),

    #[error("Failed to initialize RAG store: {0}")]
    Rag(#[source] ApiError),

    #[error("Failed to initialize LLM provider: {0}")]
    Llm(#[source] ApiError),
}
