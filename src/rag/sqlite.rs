//! SQLite-backed knowledge store (the local variant).
//!
//! Items live in `<dir>/knowledge.db`, scoped by collection name, with
//! serialized embeddings for brute-force cosine search.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{
    metadata_category, KnowledgeItem, KnowledgeStore, SearchQuery, SearchResult, StoreStats,
};
use crate::core::errors::ApiError;
use crate::vector_math::cosine_distance;

const BACKEND_NAME: &str = "local (sqlite)";

pub struct SqliteKnowledgeStore {
    pool: SqlitePool,
    collection: String,
    db_path: PathBuf,
}

impl SqliteKnowledgeStore {
    /// Opens (creating if needed) the index under `dir` for `collection`.
    pub async fn open(dir: &Path, collection: &str) -> Result<Self, ApiError> {
        std::fs::create_dir_all(dir).map_err(ApiError::internal)?;
        let db_path = dir.join("knowledge.db");

        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self {
            pool,
            collection: collection.to_string(),
            db_path,
        };
        store.init_schema().await?;
        tracing::info!(
            "Local knowledge store ready at {} (collection '{}')",
            store.db_path.display(),
            store.collection
        );
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS knowledge_items (
                id TEXT PRIMARY KEY,
                collection TEXT NOT NULL,
                content TEXT NOT NULL,
                category TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_knowledge_collection ON knowledge_items(collection)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn parse_metadata(raw: &str) -> Map<String, Value> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

#[async_trait]
impl KnowledgeStore for SqliteKnowledgeStore {
    fn backend_name(&self) -> &str {
        BACKEND_NAME
    }

    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM knowledge_items WHERE collection = ?1")
                .bind(&self.collection)
                .fetch_one(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        Ok(count as usize)
    }

    async fn add(&self, item: KnowledgeItem) -> Result<String, ApiError> {
        let blob = Self::serialize_embedding(&item.embedding);
        let metadata = serde_json::to_string(&item.metadata).map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT INTO knowledge_items (id, collection, content, category, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&item.id)
        .bind(&self.collection)
        .bind(&item.content)
        .bind(&item.category)
        .bind(&metadata)
        .bind(&blob)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        tracing::debug!("Added knowledge: {}", item.id);
        Ok(item.id)
    }

    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchResult>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, content, category, metadata, embedding
             FROM knowledge_items
             WHERE collection = ?1 AND (?2 IS NULL OR category = ?2)",
        )
        .bind(&self.collection)
        .bind(query.category)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        // Never ask for more neighbours than exist.
        let k = query.limit.min(rows.len().max(1));

        let mut scored: Vec<(f32, SearchResult)> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored = Self::deserialize_embedding(&embedding_bytes);
                let distance = cosine_distance(query.embedding, &stored);
                let metadata_raw: String = row.get("metadata");

                Some((
                    distance,
                    SearchResult {
                        id: row.get("id"),
                        content: row.get("content"),
                        category: row.get("category"),
                        similarity: 1.0 - distance,
                        metadata: Self::parse_metadata(&metadata_raw),
                    },
                ))
            })
            .collect();

        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(scored.into_iter().map(|(_, result)| result).collect())
    }

    async fn stats(&self) -> Result<StoreStats, ApiError> {
        let rows = sqlx::query("SELECT metadata FROM knowledge_items WHERE collection = ?1")
            .bind(&self.collection)
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        let categories = rows.iter().map(|row| {
            let raw: String = row.get("metadata");
            metadata_category(&Self::parse_metadata(&raw))
        });

        Ok(StoreStats::from_categories(
            rows.len(),
            categories,
            BACKEND_NAME,
        ))
    }

    async fn clear(&self) -> Result<usize, ApiError> {
        let result = sqlx::query("DELETE FROM knowledge_items WHERE collection = ?1")
            .bind(&self.collection)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;

        tracing::info!(
            "Cleared {} items from collection '{}'",
            result.rows_affected(),
            self.collection
        );
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store(collection: &str) -> SqliteKnowledgeStore {
        let dir = std::env::temp_dir().join(format!(
            "homebot-knowledge-test-{}",
            uuid::Uuid::new_v4()
        ));
        SqliteKnowledgeStore::open(&dir, collection).await.unwrap()
    }

    fn item(content: &str, category: &str, embedding: Vec<f32>) -> KnowledgeItem {
        KnowledgeItem::new(content, category, embedding, None)
    }

    fn query(embedding: &[f32], limit: usize) -> SearchQuery<'_> {
        SearchQuery {
            text: "",
            embedding,
            limit,
            category: None,
        }
    }

    #[tokio::test]
    async fn insert_and_search() {
        let store = test_store("test").await;

        let id = store
            .add(item("Hello world", "casa", vec![1.0, 0.0, 0.0]))
            .await
            .unwrap();
        assert_eq!(store.count().await.unwrap(), 1);

        let results = store.search(&query(&[1.0, 0.0, 0.0], 10)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, id);
        assert_eq!(results[0].category, "casa");
        assert!(results[0].similarity > 0.99);
        assert!(results[0].metadata.contains_key("timestamp"));
    }

    #[tokio::test]
    async fn search_orders_by_distance_and_caps_at_item_count() {
        let store = test_store("test").await;
        store.add(item("far", "casa", vec![0.0, 1.0])).await.unwrap();
        store.add(item("near", "casa", vec![1.0, 0.1])).await.unwrap();
        store.add(item("middle", "casa", vec![0.7, 0.7])).await.unwrap();

        let results = store.search(&query(&[1.0, 0.0], 50)).await.unwrap();
        let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(contents, vec!["near", "middle", "far"]);

        let top = store.search(&query(&[1.0, 0.0], 2)).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].content, "near");
    }

    #[tokio::test]
    async fn empty_store_and_zero_limit_return_nothing() {
        let store = test_store("test").await;
        assert!(store.search(&query(&[1.0], 3)).await.unwrap().is_empty());

        store.add(item("x", "casa", vec![1.0])).await.unwrap();
        assert!(store.search(&query(&[1.0], 0)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn collections_are_isolated() {
        let dir = std::env::temp_dir().join(format!(
            "homebot-knowledge-test-{}",
            uuid::Uuid::new_v4()
        ));
        let first = SqliteKnowledgeStore::open(&dir, "first").await.unwrap();
        let second = SqliteKnowledgeStore::open(&dir, "second").await.unwrap();

        first.add(item("only here", "casa", vec![1.0])).await.unwrap();

        assert_eq!(first.count().await.unwrap(), 1);
        assert_eq!(second.count().await.unwrap(), 0);
        assert!(second.search(&query(&[1.0], 3)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stats_count_categories_from_metadata() {
        let store = test_store("test").await;
        store.add(item("a", "pulizia", vec![1.0])).await.unwrap();
        store.add(item("b", "pulizia", vec![1.0])).await.unwrap();
        store.add(item("c", "utenze", vec![1.0])).await.unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category["pulizia"], 2);
        assert_eq!(stats.by_category["utenze"], 1);
        assert_eq!(stats.backend_name, BACKEND_NAME);
    }

    #[tokio::test]
    async fn category_filter_restricts_matches() {
        let store = test_store("test").await;
        store.add(item("forno", "pulizia", vec![1.0, 0.0])).await.unwrap();
        store.add(item("bolletta", "utenze", vec![0.9, 0.1])).await.unwrap();

        let filtered = store
            .search(&SearchQuery {
                category: Some("utenze"),
                ..query(&[1.0, 0.0], 5)
            })
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].content, "bolletta");

        assert_eq!(store.search(&query(&[1.0, 0.0], 5)).await.unwrap().len(), 2);
        assert_eq!(store.categories().await.unwrap(), vec!["pulizia", "utenze"]);
    }

    #[tokio::test]
    async fn clear_empties_only_own_collection() {
        let dir = std::env::temp_dir().join(format!(
            "homebot-knowledge-test-{}",
            uuid::Uuid::new_v4()
        ));
        let first = SqliteKnowledgeStore::open(&dir, "first").await.unwrap();
        let second = SqliteKnowledgeStore::open(&dir, "second").await.unwrap();
        first.add(item("a", "casa", vec![1.0])).await.unwrap();
        first.add(item("b", "casa", vec![1.0])).await.unwrap();
        second.add(item("c", "casa", vec![1.0])).await.unwrap();

        assert_eq!(first.clear().await.unwrap(), 2);
        assert_eq!(first.count().await.unwrap(), 0);
        assert_eq!(second.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_is_not_supported() {
        let store = test_store("test").await;
        let id = store.add(item("a", "casa", vec![1.0])).await.unwrap();
        assert!(matches!(
            store.delete(&id).await,
            Err(ApiError::NotImplemented(_))
        ));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = std::env::temp_dir().join(format!(
            "homebot-knowledge-test-{}",
            uuid::Uuid::new_v4()
        ));
        {
            let store = SqliteKnowledgeStore::open(&dir, "c").await.unwrap();
            store.add(item("persisted", "casa", vec![1.0])).await.unwrap();
            store.pool.close().await;
        }

        let reopened = SqliteKnowledgeStore::open(&dir, "c").await.unwrap();
        assert_eq!(reopened.count().await.unwrap(), 1);
    }
}
