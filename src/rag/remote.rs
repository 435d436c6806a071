//! Remote knowledge store over a relational service with vector search.
//!
//! The wire operations live behind `RemoteClient` (implemented for
//! Postgres + pgvector in `postgres.rs`); this module owns the store
//! semantics: upsert by id, similarity procedure with a substring fallback,
//! and client-side category aggregation.

use async_trait::async_trait;

use super::store::{KnowledgeItem, KnowledgeStore, SearchQuery, SearchResult, StoreStats};
use crate::core::errors::ApiError;

pub const REMOTE_BACKEND_NAME: &str = "supabase (postgresql + pgvector)";

/// Fixed score for substring-fallback matches. Not comparable to vector similarity.
pub const FALLBACK_SIMILARITY: f32 = 0.5;

#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn count(&self) -> Result<usize, ApiError>;

    /// Insert or overwrite the row with `item.id`.
    async fn upsert(&self, item: &KnowledgeItem) -> Result<(), ApiError>;

    /// Server-side similarity procedure, closest first.
    async fn match_knowledge(
        &self,
        embedding: &[f32],
        match_count: usize,
        category: Option<&str>,
    ) -> Result<Vec<SearchResult>, ApiError>;

    /// Case-insensitive substring match over raw content. `similarity` is ignored.
    async fn content_contains(
        &self,
        needle: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ApiError>;

    /// Category of every stored row.
    async fn categories(&self) -> Result<Vec<String>, ApiError>;

    async fn delete(&self, id: &str) -> Result<bool, ApiError>;

    /// Deletes every row, returning how many were removed.
    async fn delete_all(&self) -> Result<usize, ApiError>;
}

pub struct RemoteKnowledgeStore<C> {
    client: C,
}

impl<C: RemoteClient> RemoteKnowledgeStore<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    /// Substring search used when the similarity procedure fails. Never errors.
    async fn fallback_search(&self, query: &SearchQuery<'_>) -> Vec<SearchResult> {
        tracing::warn!("Using fallback text search (vector search unavailable)");

        let needle = query.text.trim();
        let limit = query.limit;
        if needle.is_empty() || limit == 0 {
            return Vec::new();
        }

        match self
            .client
            .content_contains(needle, query.category, limit)
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .take(limit)
                .map(|mut row| {
                    row.similarity = FALLBACK_SIMILARITY;
                    row
                })
                .collect(),
            Err(e) => {
                tracing::error!("Fallback search failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl<C: RemoteClient> KnowledgeStore for RemoteKnowledgeStore<C> {
    fn backend_name(&self) -> &str {
        REMOTE_BACKEND_NAME
    }

    async fn count(&self) -> Result<usize, ApiError> {
        self.client.count().await
    }

    async fn add(&self, item: KnowledgeItem) -> Result<String, ApiError> {
        self.client.upsert(&item).await?;
        tracing::debug!("Added knowledge: {} (category: {})", item.id, item.category);
        Ok(item.id)
    }

    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchResult>, ApiError> {
        if query.limit == 0 {
            return Ok(Vec::new());
        }

        match self
            .client
            .match_knowledge(query.embedding, query.limit, query.category)
            .await
        {
            Ok(mut results) => {
                results.truncate(query.limit);
                Ok(results)
            }
            Err(e) => {
                tracing::error!("Error searching knowledge: {}", e);
                Ok(self.fallback_search(query).await)
            }
        }
    }

    async fn stats(&self) -> Result<StoreStats, ApiError> {
        let total = self.client.count().await?;
        let categories = self.client.categories().await?;
        Ok(StoreStats::from_categories(
            total,
            categories,
            REMOTE_BACKEND_NAME,
        ))
    }

    async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let mut categories = self.client.categories().await?;
        categories.sort();
        categories.dedup();
        Ok(categories)
    }

    async fn clear(&self) -> Result<usize, ApiError> {
        let removed = self.client.delete_all().await?;
        tracing::info!("Cleared {} knowledge items", removed);
        Ok(removed)
    }

    async fn delete(&self, id: &str) -> Result<bool, ApiError> {
        let deleted = self.client.delete(id).await?;
        if deleted {
            tracing::info!("Deleted knowledge: {}", id);
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::vector_math::cosine_similarity;

    /// In-memory stand-in for the relational service.
    #[derive(Default)]
    struct FakeRemote {
        rows: Mutex<BTreeMap<String, KnowledgeItem>>,
        pub procedure_fails: AtomicBool,
        pub text_search_fails: AtomicBool,
        pub procedure_calls: AtomicUsize,
    }

    impl FakeRemote {
        fn rows(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, KnowledgeItem>> {
            self.rows.lock().unwrap()
        }

        fn to_result(item: &KnowledgeItem, similarity: f32) -> SearchResult {
            SearchResult {
                id: item.id.clone(),
                content: item.content.clone(),
                category: item.category.clone(),
                similarity,
                metadata: item.metadata.clone(),
            }
        }
    }

    #[async_trait]
    impl RemoteClient for FakeRemote {
        async fn count(&self) -> Result<usize, ApiError> {
            Ok(self.rows().len())
        }

        async fn upsert(&self, item: &KnowledgeItem) -> Result<(), ApiError> {
            self.rows().insert(item.id.clone(), item.clone());
            Ok(())
        }

        async fn match_knowledge(
            &self,
            embedding: &[f32],
            match_count: usize,
            category: Option<&str>,
        ) -> Result<Vec<SearchResult>, ApiError> {
            self.procedure_calls.fetch_add(1, Ordering::SeqCst);
            if self.procedure_fails.load(Ordering::SeqCst) {
                return Err(ApiError::internal(
                    "function match_knowledge(vector, integer) does not exist",
                ));
            }

            let mut results: Vec<SearchResult> = self
                .rows()
                .values()
                .filter(|item| category.map_or(true, |c| item.category == c))
                .map(|item| Self::to_result(item, cosine_similarity(embedding, &item.embedding)))
                .collect();
            results.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
            results.truncate(match_count);
            Ok(results)
        }

        async fn content_contains(
            &self,
            needle: &str,
            category: Option<&str>,
            limit: usize,
        ) -> Result<Vec<SearchResult>, ApiError> {
            if self.text_search_fails.load(Ordering::SeqCst) {
                return Err(ApiError::ServiceUnavailable("connection reset".to_string()));
            }

            let needle = needle.to_lowercase();
            Ok(self
                .rows()
                .values()
                .filter(|item| item.content.to_lowercase().contains(&needle))
                .filter(|item| category.map_or(true, |c| item.category == c))
                .take(limit)
                .map(|item| Self::to_result(item, 0.0))
                .collect())
        }

        async fn categories(&self) -> Result<Vec<String>, ApiError> {
            Ok(self.rows().values().map(|i| i.category.clone()).collect())
        }

        async fn delete(&self, id: &str) -> Result<bool, ApiError> {
            Ok(self.rows().remove(id).is_some())
        }

        async fn delete_all(&self) -> Result<usize, ApiError> {
            let mut rows = self.rows();
            let removed = rows.len();
            rows.clear();
            Ok(removed)
        }
    }

    fn item(content: &str, category: &str, embedding: Vec<f32>) -> KnowledgeItem {
        KnowledgeItem::new(content, category, embedding, None)
    }

    #[tokio::test]
    async fn vector_search_uses_procedure() {
        let store = RemoteKnowledgeStore::new(FakeRemote::default());
        store.add(item("vicino", "casa", vec![1.0, 0.0])).await.unwrap();
        store.add(item("lontano", "casa", vec![0.0, 1.0])).await.unwrap();

        let results = store
            .search(&SearchQuery {
                text: "vicino",
                embedding: &[1.0, 0.0],
                limit: 1,
                category: None,
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "vicino");
        assert!(results[0].similarity > 0.99);
    }

    #[tokio::test]
    async fn failing_procedure_falls_back_to_substring_match() {
        let store = RemoteKnowledgeStore::new(FakeRemote::default());
        store
            .add(item(
                "Per sbloccare scarichi intasati, versa bicarbonato seguito da aceto caldo.",
                "manutenzione",
                vec![1.0, 0.0],
            ))
            .await
            .unwrap();
        store
            .add(item("Pulisci i filtri del condizionatore.", "manutenzione", vec![0.0, 1.0]))
            .await
            .unwrap();
        store.client.procedure_fails.store(true, Ordering::SeqCst);

        let results = store
            .search(&SearchQuery {
                text: "SCARICHI INTASATI",
                embedding: &[0.0, 1.0],
                limit: 3,
                category: None,
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("scarichi intasati"));
        assert_eq!(results[0].similarity, FALLBACK_SIMILARITY);
    }

    #[tokio::test]
    async fn failing_fallback_yields_empty_results() {
        let store = RemoteKnowledgeStore::new(FakeRemote::default());
        store.add(item("aceto", "pulizia", vec![1.0])).await.unwrap();
        store.client.procedure_fails.store(true, Ordering::SeqCst);
        store.client.text_search_fails.store(true, Ordering::SeqCst);

        let results = store
            .search(&SearchQuery {
                text: "aceto",
                embedding: &[1.0],
                limit: 3,
                category: None,
            })
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn upsert_with_same_id_overwrites() {
        let store = RemoteKnowledgeStore::new(FakeRemote::default());
        let mut first = item("versione uno", "casa", vec![1.0]);
        let id = store.add(first.clone()).await.unwrap();

        first.content = "versione due".to_string();
        store.add(first).await.unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.client.rows()[&id].content, "versione due");
    }

    #[tokio::test]
    async fn stats_and_delete() {
        let store = RemoteKnowledgeStore::new(FakeRemote::default());
        let id = store.add(item("a", "utenze", vec![1.0])).await.unwrap();
        store.add(item("b", "utenze", vec![1.0])).await.unwrap();
        store.add(item("c", "casa", vec![1.0])).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category["utenze"], 2);
        assert_eq!(stats.backend_name, REMOTE_BACKEND_NAME);

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert_eq!(store.count().await.unwrap(), 2);
        assert_eq!(store.categories().await.unwrap(), vec!["casa", "utenze"]);

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn category_filter_applies_to_vector_and_fallback_search() {
        let store = RemoteKnowledgeStore::new(FakeRemote::default());
        store.add(item("aceto per il forno", "pulizia", vec![1.0, 0.0])).await.unwrap();
        store.add(item("aceto nel contratto", "utenze", vec![1.0, 0.0])).await.unwrap();

        let query = SearchQuery {
            text: "aceto",
            embedding: &[1.0, 0.0],
            limit: 5,
            category: Some("utenze"),
        };

        let vector = store.search(&query).await.unwrap();
        assert_eq!(vector.len(), 1);
        assert_eq!(vector[0].category, "utenze");

        store.client.procedure_fails.store(true, Ordering::SeqCst);
        let fallback = store.search(&query).await.unwrap();
        assert_eq!(fallback.len(), 1);
        assert_eq!(fallback[0].category, "utenze");
        assert_eq!(fallback[0].similarity, FALLBACK_SIMILARITY);
    }
}
