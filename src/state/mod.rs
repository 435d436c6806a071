use std::sync::Arc;

use crate::cache::TtlCache;
use crate::core::config::defaults::DEFAULT_KNOWLEDGE;
use crate::core::config::{AppConfig, AppPaths};
use crate::embedding::build_embedder;
use crate::llm::{build_provider, GenerationService, LlmProvider};
use crate::orchestrator::{AppInfo, Orchestrator};
use crate::rag::{build_store, RetrievalSettings, RetrievalSystem};

pub mod error;

use error::InitializationError;

/// Application state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: Arc<AppConfig>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// This process includes:
    /// 1. Building the LLM provider (fails fast on a missing API key)
    /// 2. Loading the embedding model and opening the knowledge store
    /// 3. Seeding an empty knowledge base with the built-in corpus
    /// 4. Wiring caches and services into the orchestrator
    pub async fn initialize(
        paths: Arc<AppPaths>,
        config: AppConfig,
    ) -> Result<Arc<Self>, InitializationError> {
        let provider = build_provider(&config.llm).map_err(InitializationError::Llm)?;
        Self::with_provider(paths, config, provider).await
    }

    /// Same as `initialize`, with an externally supplied LLM provider.
    pub async fn with_provider(
        paths: Arc<AppPaths>,
        config: AppConfig,
        provider: Arc<dyn LlmProvider>,
    ) -> Result<Arc<Self>, InitializationError> {
        let search_cache = TtlCache::new(config.cache.search_ttl());

        let retrieval = if config.rag.enabled {
            let embedder = build_embedder(&config.rag)
                .await
                .map_err(InitializationError::Embedding)?;
            let store = build_store(&config.rag, &paths, embedder.dimension())
                .await
                .map_err(InitializationError::Rag)?;

            let retrieval = RetrievalSystem::new(
                RetrievalSettings::from(&config.rag),
                store,
                embedder,
                search_cache,
            );
            retrieval.bootstrap(DEFAULT_KNOWLEDGE).await;
            tracing::info!("RAG system initialized successfully");
            retrieval
        } else {
            tracing::info!("RAG system disabled");
            RetrievalSystem::disabled(search_cache)
        };

        let generation = GenerationService::new(provider, config.llm.clone());
        let orchestrator = Orchestrator::new(
            AppInfo::from(&config),
            retrieval,
            generation,
            TtlCache::new(config.cache.response_ttl()),
        );
        tracing::info!("Chatbot initialized successfully");

        Ok(Arc::new(Self {
            paths,
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RagConfig;
    use crate::llm::service::tests::ScriptedProvider;

    fn temp_paths() -> Arc<AppPaths> {
        let root = std::env::temp_dir().join(format!("homebot-state-{}", uuid::Uuid::new_v4()));
        Arc::new(AppPaths::with_dirs(root.clone(), root.join("data")))
    }

    #[tokio::test]
    async fn missing_api_key_fails_startup() {
        let mut config = AppConfig::default();
        config.llm.api_key_env = "HOMEBOT_TEST_UNSET_GROQ_KEY".to_string();

        let result = AppState::initialize(temp_paths(), config).await;
        assert!(matches!(result, Err(InitializationError::Llm(_))));
    }

    #[tokio::test]
    async fn startup_seeds_knowledge_once() {
        let paths = temp_paths();

        let first = AppState::with_provider(
            paths.clone(),
            AppConfig::default(),
            Arc::new(ScriptedProvider::default()),
        )
        .await
        .unwrap();
        let stats = first.orchestrator.stats().await;
        assert_eq!(stats.rag.total_documents, Some(DEFAULT_KNOWLEDGE.len()));
        assert_eq!(stats.rag.backend_name.as_deref(), Some("local (sqlite)"));
        drop(first);

        let second = AppState::with_provider(
            paths,
            AppConfig::default(),
            Arc::new(ScriptedProvider::default()),
        )
        .await
        .unwrap();
        let stats = second.orchestrator.stats().await;
        assert_eq!(stats.rag.total_documents, Some(DEFAULT_KNOWLEDGE.len()));
    }

    #[tokio::test]
    async fn default_config_grounds_cleaning_question() {
        let provider = Arc::new(ScriptedProvider::default());
        let state = AppState::with_provider(temp_paths(), AppConfig::default(), provider.clone())
            .await
            .unwrap();

        let results = state.orchestrator.retrieval().search("pulizia forno", None).await;
        assert!(results.iter().any(|r| r.category == "pulizia"));

        state.orchestrator.get_response("pulizia forno", None).await;
        assert!(provider.last_prompt().unwrap().contains("[PULIZIA]"));
    }

    #[tokio::test]
    async fn disabled_rag_skips_store() {
        let paths = temp_paths();
        let config = AppConfig {
            rag: RagConfig {
                enabled: false,
                ..RagConfig::default()
            },
            ..AppConfig::default()
        };

        let state = AppState::with_provider(paths.clone(), config, Arc::new(ScriptedProvider::default()))
            .await
            .unwrap();

        assert!(!state.orchestrator.stats().await.rag.enabled);
        assert!(!paths.user_data_dir.join("chroma_db").exists());
    }
}
