//! Typed application configuration.
//!
//! Every section deserializes with defaults so a partial `config.yml`
//! only needs to name the values it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app_name: String,
    pub version: String,
    pub environment: String,
    pub llm: LlmConfig,
    pub rag: RagConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Home Assistant Chatbot".to_string(),
            version: "1.0.0".to_string(),
            environment: "development".to_string(),
            llm: LlmConfig::default(),
            rag: RagConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Name of the environment variable holding the provider API key.
    pub api_key_env: String,
    pub base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub retry: RetryConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "groq".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            api_key_env: "GROQ_API_KEY".to_string(),
            base_url: None,
            request_timeout_secs: 60,
            retry: RetryConfig::default(),
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            backoff_factor: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    #[serde(alias = "chroma", alias = "chromadb")]
    Local,
    #[serde(alias = "supabase", alias = "postgres")]
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    Hashing,
    Http,
}

impl EmbeddingBackend {
    /// Threshold used when `rag.similarity_threshold` is unset. Hashed
    /// n-gram vectors score well below sentence embeddings for the same match.
    pub fn default_similarity_threshold(self) -> f32 {
        match self {
            EmbeddingBackend::Hashing => 0.25,
            EmbeddingBackend::Http => 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub enabled: bool,
    pub storage_type: StorageType,
    pub embedding_provider: EmbeddingBackend,
    pub embedding_model: String,
    pub embedding_endpoint: Option<String>,
    pub embedding_api_key_env: Option<String>,
    /// Vector size for the hashing embedder; HTTP embedders report their own.
    pub embedding_dimension: usize,
    pub collection_name: String,
    pub max_search_results: usize,
    /// Unset means the embedder's own default.
    pub similarity_threshold: Option<f32>,
    pub chroma_path: Option<String>,
    pub database_url_env: String,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            storage_type: StorageType::Local,
            embedding_provider: EmbeddingBackend::Hashing,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_endpoint: None,
            embedding_api_key_env: None,
            embedding_dimension: 384,
            collection_name: "home_assistant".to_string(),
            max_search_results: 3,
            similarity_threshold: None,
            chroma_path: None,
            database_url_env: "SUPABASE_DB_URL".to_string(),
        }
    }
}

impl RagConfig {
    pub fn effective_similarity_threshold(&self) -> f32 {
        self.similarity_threshold
            .unwrap_or_else(|| self.embedding_provider.default_similarity_threshold())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub search_ttl_secs: u64,
    pub response_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_secs: 300,
            response_ttl_secs: 600,
        }
    }
}

impl CacheConfig {
    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn response_ttl(&self) -> Duration {
        Duration::from_secs(self.response_ttl_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_name: "server.log".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 10000,
        }
    }
}
