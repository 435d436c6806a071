use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};

use super::store::{KnowledgeItem, KnowledgeStore, SearchQuery, SearchResult, DEFAULT_CATEGORY};
use crate::cache::{cache_key, TtlCache};
use crate::core::config::RagConfig;
use crate::core::errors::ApiError;
use crate::embedding::EmbeddingProvider;

#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalSettings {
    pub enabled: bool,
    pub max_results: usize,
    pub similarity_threshold: f32,
}

impl From<&RagConfig> for RetrievalSettings {
    fn from(config: &RagConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_results: config.max_search_results,
            similarity_threshold: config.effective_similarity_threshold(),
        }
    }
}

/// Normalized stats shape, independent of the backend that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalStats {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_documents: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub by_category: Option<BTreeMap<String, usize>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RetrievalStats {
    fn disabled() -> Self {
        Self {
            enabled: false,
            total_documents: None,
            by_category: None,
            backend_name: None,
            embedding_model: None,
            cache_size: None,
            error: None,
        }
    }
}

struct Backend {
    store: Arc<dyn KnowledgeStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

/// Embeds, stores and searches knowledge, caching filtered search results.
pub struct RetrievalSystem {
    settings: RetrievalSettings,
    cache: TtlCache<Vec<SearchResult>>,
    backend: Option<Backend>,
}

impl RetrievalSystem {
    pub fn new(
        settings: RetrievalSettings,
        store: Arc<dyn KnowledgeStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        cache: TtlCache<Vec<SearchResult>>,
    ) -> Self {
        Self {
            settings,
            cache,
            backend: Some(Backend { store, embedder }),
        }
    }

    /// A system with no store: every search is empty, every add a no-op.
    pub fn disabled(cache: TtlCache<Vec<SearchResult>>) -> Self {
        Self {
            settings: RetrievalSettings {
                enabled: false,
                max_results: 0,
                similarity_threshold: 0.0,
            },
            cache,
            backend: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled && self.backend.is_some()
    }

    fn backend(&self) -> Option<&Backend> {
        if self.settings.enabled {
            self.backend.as_ref()
        } else {
            None
        }
    }

    /// Seeds an empty store with `corpus`. Returns the number of items added.
    pub async fn bootstrap(&self, corpus: &[(&str, &str)]) -> usize {
        let Some(backend) = self.backend() else {
            return 0;
        };

        match backend.store.count().await {
            Ok(0) => {}
            Ok(count) => {
                tracing::info!("Knowledge base already has {} items", count);
                return 0;
            }
            Err(e) => {
                tracing::warn!("Could not count knowledge items, skipping seed: {}", e);
                return 0;
            }
        }

        tracing::info!("Initializing knowledge base with default data...");
        let mut added = 0;
        for &(content, category) in corpus {
            match self.add_knowledge(content, Some(category), None).await {
                Ok(_) => added += 1,
                Err(e) => tracing::error!("Failed to seed knowledge item: {}", e),
            }
        }
        tracing::info!("Added {} default knowledge items", added);
        added
    }

    /// Stores `content`, returning its id (empty when retrieval is disabled).
    /// Invalidates the whole result cache.
    pub async fn add_knowledge(
        &self,
        content: &str,
        category: Option<&str>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<String, ApiError> {
        let Some(backend) = self.backend() else {
            return Ok(String::new());
        };

        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::BadRequest("content must not be empty".to_string()));
        }
        let category = category
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_CATEGORY);

        let embedding = backend.embedder.embed(content).await?;
        let item = KnowledgeItem::new(content, category, embedding, metadata);
        let id = backend.store.add(item).await?;

        self.cache.clear();
        tracing::info!("Added knowledge: {}", id);
        Ok(id)
    }

    pub async fn delete_knowledge(&self, id: &str) -> Result<bool, ApiError> {
        let Some(backend) = self.backend() else {
            return Ok(false);
        };

        let deleted = backend.store.delete(id).await?;
        if deleted {
            self.cache.clear();
        }
        Ok(deleted)
    }

    /// Removes every stored item and invalidates the result cache.
    pub async fn clear_knowledge(&self) -> Result<usize, ApiError> {
        let Some(backend) = self.backend() else {
            return Ok(0);
        };

        let removed = backend.store.clear().await?;
        self.cache.clear();
        Ok(removed)
    }

    pub async fn categories(&self) -> Result<Vec<String>, ApiError> {
        match self.backend() {
            Some(backend) => backend.store.categories().await,
            None => Ok(Vec::new()),
        }
    }

    pub async fn try_search(
        &self,
        query: &str,
        n: Option<usize>,
    ) -> Result<Vec<SearchResult>, ApiError> {
        self.try_search_in(query, n, None).await
    }

    /// Search that reports store failures. Results are cached after
    /// threshold filtering; failures are not cached.
    pub async fn try_search_in(
        &self,
        query: &str,
        n: Option<usize>,
        category: Option<&str>,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let Some(backend) = self.backend() else {
            return Ok(Vec::new());
        };

        let n = n.unwrap_or(self.settings.max_results);
        if n == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let category = category.map(str::trim).filter(|c| !c.is_empty());

        let count = n.to_string();
        let key = cache_key("search", &[query, count.as_str(), category.unwrap_or("")]);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!("Search cache hit for '{}'", query);
            return Ok(cached);
        }

        let embedding = backend.embedder.embed(query).await?;
        let raw = backend
            .store
            .search(&SearchQuery {
                text: query,
                embedding: &embedding,
                limit: n,
                category,
            })
            .await?;

        let threshold = self.settings.similarity_threshold;
        let results: Vec<SearchResult> = raw
            .into_iter()
            .filter(|r| r.similarity >= threshold)
            .take(n)
            .collect();

        tracing::debug!(
            "Found {} relevant results for '{}' (threshold {})",
            results.len(),
            query,
            threshold
        );
        self.cache.set(key, results.clone(), None);
        Ok(results)
    }

    /// Search for request paths: any failure means no relevant knowledge.
    pub async fn search(&self, query: &str, n: Option<usize>) -> Vec<SearchResult> {
        self.search_in(query, n, None).await
    }

    pub async fn search_in(
        &self,
        query: &str,
        n: Option<usize>,
        category: Option<&str>,
    ) -> Vec<SearchResult> {
        match self.try_search_in(query, n, category).await {
            Ok(results) => results,
            Err(e) => {
                tracing::error!("Error searching knowledge: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn stats(&self) -> RetrievalStats {
        let Some(backend) = self.backend() else {
            return RetrievalStats::disabled();
        };

        match backend.store.stats().await {
            Ok(stats) => RetrievalStats {
                enabled: true,
                total_documents: Some(stats.total),
                by_category: Some(stats.by_category),
                backend_name: Some(stats.backend_name),
                embedding_model: Some(backend.embedder.model_id().to_string()),
                cache_size: Some(self.cache.len()),
                error: None,
            },
            Err(e) => {
                tracing::error!("Error getting knowledge stats: {}", e);
                RetrievalStats {
                    enabled: true,
                    total_documents: None,
                    by_category: None,
                    backend_name: Some(backend.store.backend_name().to_string()),
                    embedding_model: Some(backend.embedder.model_id().to_string()),
                    cache_size: Some(self.cache.len()),
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
