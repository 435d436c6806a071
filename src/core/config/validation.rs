use super::types::{AppConfig, EmbeddingBackend};
use crate::core::errors::ApiError;

pub fn validate_config(config: &AppConfig) -> Result<(), ApiError> {
    let llm = &config.llm;
    validate_non_empty("llm.provider", &llm.provider)?;
    validate_non_empty("llm.model", &llm.model)?;
    validate_non_empty("llm.api_key_env", &llm.api_key_env)?;
    validate_f64_range("llm.temperature", llm.temperature, 0.0, 2.0)?;
    validate_u64_range("llm.max_tokens", u64::from(llm.max_tokens), 1, 32_768)?;
    validate_u64_range("llm.request_timeout_secs", llm.request_timeout_secs, 1, 3_600)?;
    validate_u64_range(
        "llm.retry.max_attempts",
        u64::from(llm.retry.max_attempts),
        1,
        10,
    )?;
    validate_u64_range("llm.retry.base_delay_ms", llm.retry.base_delay_ms, 0, 60_000)?;
    validate_f64_range("llm.retry.backoff_factor", llm.retry.backoff_factor, 1.0, 10.0)?;

    let rag = &config.rag;
    validate_non_empty("rag.collection_name", &rag.collection_name)?;
    validate_non_empty("rag.embedding_model", &rag.embedding_model)?;
    validate_u64_range(
        "rag.max_search_results",
        rag.max_search_results as u64,
        1,
        50,
    )?;
    if let Some(threshold) = rag.similarity_threshold {
        validate_f64_range("rag.similarity_threshold", f64::from(threshold), -1.0, 1.0)?;
    }
    validate_u64_range(
        "rag.embedding_dimension",
        rag.embedding_dimension as u64,
        8,
        8_192,
    )?;
    if rag.embedding_provider == EmbeddingBackend::Http {
        let endpoint = rag.embedding_endpoint.as_deref().unwrap_or_default();
        validate_non_empty("rag.embedding_endpoint", endpoint)?;
    }

    validate_u64_range("cache.search_ttl_secs", config.cache.search_ttl_secs, 0, 86_400)?;
    validate_u64_range(
        "cache.response_ttl_secs",
        config.cache.response_ttl_secs,
        0,
        86_400,
    )?;

    validate_non_empty("server.host", &config.server.host)?;

    Ok(())
}

fn validate_non_empty(path: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::config(format!("{} must not be empty", path)));
    }
    Ok(())
}

fn validate_u64_range(path: &str, value: u64, min: u64, max: u64) -> Result<(), ApiError> {
    if value < min || value > max {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn validate_f64_range(path: &str, value: f64, min: f64, max: f64) -> Result<(), ApiError> {
    if !value.is_finite() || value < min || value > max {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn range_error<T: std::fmt::Display>(path: &str, min: T, max: T) -> ApiError {
    ApiError::config(format!("{} must be between {} and {}", path, min, max))
}
