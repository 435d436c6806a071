//! KnowledgeStore trait: the contract shared by every storage backend.
//!
//! The retrieval layer embeds text and generates ids; stores only persist
//! items and answer nearest-neighbour queries.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::core::errors::ApiError;

pub const DEFAULT_CATEGORY: &str = "generale";

static ID_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// A unit of retrievable information. Never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: String,
    pub content: String,
    pub category: String,
    pub embedding: Vec<f32>,
    /// Always carries `category` and `timestamp`.
    pub metadata: Map<String, Value>,
}

impl KnowledgeItem {
    /// Builds an item with a fresh id and the standard metadata keys.
    pub fn new(
        content: impl Into<String>,
        category: impl Into<String>,
        embedding: Vec<f32>,
        metadata: Option<Map<String, Value>>,
    ) -> Self {
        let content = content.into();
        let category = category.into();
        let now = Local::now();

        let mut metadata = metadata.unwrap_or_default();
        metadata.insert("category".to_string(), Value::String(category.clone()));
        metadata.insert("timestamp".to_string(), Value::String(now.to_rfc3339()));

        Self {
            id: generate_item_id(&content, &category, now),
            content,
            category,
            embedding,
            metadata,
        }
    }
}

/// `<category>_<YYYYmmdd_HHMMSS>_<content hash>_<sequence>`.
///
/// The sequence makes ids unique per process even for identical content
/// written within the same second.
pub fn generate_item_id(content: &str, category: &str, at: DateTime<Local>) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hash = hex::encode(&digest[..4]);
    let seq = ID_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}_{}_{}_{:04}",
        category,
        at.format("%Y%m%d_%H%M%S"),
        hash,
        seq
    )
}

/// A query against a store. `text` is kept for backends with a text fallback.
#[derive(Debug, Clone, Copy)]
pub struct SearchQuery<'a> {
    pub text: &'a str,
    pub embedding: &'a [f32],
    pub limit: usize,
    /// Only items in this category match.
    pub category: Option<&'a str>,
}

/// A stored item matched against a query.
///
/// `similarity` is backend-defined (cosine for vector matches) and is not
/// comparable across backends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub content: String,
    pub category: String,
    pub similarity: f32,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub backend_name: String,
}

impl StoreStats {
    /// Aggregates category counts client-side.
    pub fn from_categories<I, S>(total: usize, categories: I, backend_name: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut by_category = BTreeMap::new();
        for category in categories {
            *by_category
                .entry(category.as_ref().to_string())
                .or_insert(0usize) += 1;
        }

        Self {
            total,
            by_category,
            backend_name: backend_name.to_string(),
        }
    }
}

/// Abstract trait for knowledge storage backends.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Human-readable backend identifier, reported in stats.
    fn backend_name(&self) -> &str;

    async fn count(&self) -> Result<usize, ApiError>;

    /// Persist an item, returning its id.
    async fn add(&self, item: KnowledgeItem) -> Result<String, ApiError>;

    /// Nearest neighbours of `query.embedding`, closest first, at most `query.limit`.
    async fn search(&self, query: &SearchQuery<'_>) -> Result<Vec<SearchResult>, ApiError>;

    async fn stats(&self) -> Result<StoreStats, ApiError>;

    /// Distinct categories, sorted.
    async fn categories(&self) -> Result<Vec<String>, ApiError> {
        Ok(self.stats().await?.by_category.into_keys().collect())
    }

    /// Removes every item, returning how many were dropped.
    async fn clear(&self) -> Result<usize, ApiError>;

    /// Optional capability; backends without it report `NotImplemented`.
    async fn delete(&self, id: &str) -> Result<bool, ApiError> {
        Err(ApiError::NotImplemented(format!(
            "{} does not support deleting {}",
            self.backend_name(),
            id
        )))
    }
}

/// Category of a stored metadata map, defaulting when absent.
pub(crate) fn metadata_category(metadata: &Map<String, Value>) -> String {
    metadata
        .get("category")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_differ_for_repeated_content() {
        let now = Local::now();
        let a = generate_item_id("same text", "pulizia", now);
        let b = generate_item_id("same text", "pulizia", now);

        assert_ne!(a, b);
        assert!(a.starts_with("pulizia_"));
    }

    #[test]
    fn new_item_sets_category_and_timestamp() {
        let mut extra = Map::new();
        extra.insert("source".to_string(), Value::String("manual".to_string()));
        extra.insert("category".to_string(), Value::String("ignored".to_string()));

        let item = KnowledgeItem::new("Aceto e bicarbonato", "pulizia", vec![1.0], Some(extra));

        assert_eq!(item.metadata["category"], "pulizia");
        assert_eq!(item.metadata["source"], "manual");
        let timestamp = item.metadata["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(timestamp).is_ok());
    }

    #[test]
    fn stats_aggregate_categories() {
        let stats = StoreStats::from_categories(3, ["casa", "pulizia", "casa"], "test");
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category["casa"], 2);
        assert_eq!(stats.by_category["pulizia"], 1);
        assert_eq!(stats.backend_name, "test");
    }

    #[test]
    fn metadata_category_defaults() {
        assert_eq!(metadata_category(&Map::new()), DEFAULT_CATEGORY);
    }
}
