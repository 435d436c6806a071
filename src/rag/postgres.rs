//! Postgres + pgvector client for the remote knowledge store.

use std::time::Duration;

use async_trait::async_trait;
use pgvector::Vector;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use super::remote::RemoteClient;
use super::store::{KnowledgeItem, SearchResult, DEFAULT_CATEGORY};
use crate::core::errors::ApiError;

const TABLE: &str = "knowledge_base";

pub struct PgVectorClient {
    pool: PgPool,
}

impl PgVectorClient {
    pub async fn connect(database_url: &str) -> Result<Self, ApiError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await
            .map_err(|e| ApiError::ServiceUnavailable(format!("postgres connect failed: {}", e)))?;

        Ok(Self { pool })
    }

    /// Creates the extension, table, indexes and similarity procedure.
    /// Failures only warn; whatever schema already exists is used as is.
    pub async fn ensure_schema(&self, dimension: usize) {
        let statements = [
            "CREATE EXTENSION IF NOT EXISTS vector".to_string(),
            format!(
                "CREATE TABLE IF NOT EXISTS {TABLE} (
                    id TEXT PRIMARY KEY,
                    content TEXT NOT NULL,
                    category TEXT DEFAULT '{DEFAULT_CATEGORY}',
                    embedding vector({dimension}),
                    metadata JSONB DEFAULT '{{}}',
                    created_at TIMESTAMPTZ DEFAULT NOW()
                )"
            ),
            format!("CREATE INDEX IF NOT EXISTS {TABLE}_category_idx ON {TABLE}(category)"),
            format!(
                "CREATE OR REPLACE FUNCTION match_knowledge(
                    query_embedding vector({dimension}),
                    match_count int,
                    filter_category text DEFAULT NULL
                 )
                 RETURNS TABLE (id text, content text, category text, metadata jsonb, similarity double precision)
                 LANGUAGE sql STABLE AS $$
                    SELECT kb.id, kb.content, kb.category, kb.metadata,
                           1 - (kb.embedding <=> query_embedding) AS similarity
                    FROM {TABLE} kb
                    WHERE filter_category IS NULL OR kb.category = filter_category
                    ORDER BY kb.embedding <=> query_embedding
                    LIMIT match_count
                 $$"
            ),
        ];

        for statement in &statements {
            if let Err(e) = sqlx::query(statement).execute(&self.pool).await {
                tracing::warn!("Schema setup step failed: {}", e);
                tracing::warn!(
                    "Create the {} table and match_knowledge function manually if search fails",
                    TABLE
                );
                return;
            }
        }
        tracing::info!("Table '{}' exists and is accessible", TABLE);
    }
}

fn row_to_result(row: &PgRow, similarity: f32) -> Result<SearchResult, ApiError> {
    let category: Option<String> = row.try_get("category").map_err(ApiError::internal)?;
    let metadata: Option<Json<Value>> = row.try_get("metadata").map_err(ApiError::internal)?;
    let metadata = match metadata.map(|Json(v)| v) {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    Ok(SearchResult {
        id: row.try_get("id").map_err(ApiError::internal)?,
        content: row.try_get("content").map_err(ApiError::internal)?,
        category: category.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        similarity,
        metadata,
    })
}

/// Escapes `%`, `_` and `\` so user text matches literally under `ESCAPE '\'`.
pub(crate) fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl RemoteClient for PgVectorClient {
    async fn count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {TABLE}"))
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(count as usize)
    }

    async fn upsert(&self, item: &KnowledgeItem) -> Result<(), ApiError> {
        sqlx::query(&format!(
            "INSERT INTO {TABLE} (id, content, category, embedding, metadata)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                category = EXCLUDED.category,
                embedding = EXCLUDED.embedding,
                metadata = EXCLUDED.metadata"
        ))
        .bind(&item.id)
        .bind(&item.content)
        .bind(&item.category)
        .bind(Vector::from(item.embedding.clone()))
        .bind(Json(&item.metadata))
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;
        Ok(())
    }

    async fn match_knowledge(
        &self,
        embedding: &[f32],
        match_count: usize,
        category: Option<&str>,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, content, category, metadata, similarity
             FROM match_knowledge($1, $2, $3)",
        )
        .bind(Vector::from(embedding.to_vec()))
        .bind(match_count.min(i32::MAX as usize) as i32)
        .bind(category)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter()
            .map(|row| {
                let similarity: Option<f64> =
                    row.try_get("similarity").map_err(ApiError::internal)?;
                row_to_result(row, similarity.unwrap_or(0.0) as f32)
            })
            .collect()
    }

    async fn content_contains(
        &self,
        needle: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let pattern = format!("%{}%", escape_like(needle));
        let rows = sqlx::query(&format!(
            "SELECT id, content, category, metadata FROM {TABLE}
             WHERE content ILIKE $1 ESCAPE '\\'
               AND ($2::text IS NULL OR category = $2)
             LIMIT $3"
        ))
        .bind(pattern)
        .bind(category)
        .bind(limit.min(i64::MAX as usize) as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        rows.iter().map(|row| row_to_result(row, 0.0)).collect()
    }

    async fn categories(&self) -> Result<Vec<String>, ApiError> {
        let rows: Vec<Option<String>> =
            sqlx::query_scalar(&format!("SELECT category FROM {TABLE}"))
                .fetch_all(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        Ok(rows
            .into_iter()
            .map(|c| c.unwrap_or_else(|| DEFAULT_CATEGORY.to_string()))
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query(&format!("DELETE FROM {TABLE} WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self) -> Result<usize, ApiError> {
        let result = sqlx::query(&format!("DELETE FROM {TABLE}"))
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\temp"), "c:\\\\temp");
        assert_eq!(escape_like("scarichi intasati"), "scarichi intasati");
    }
}
