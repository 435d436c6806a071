use std::sync::Arc;

use super::sqlite::SqliteKnowledgeStore;
use super::store::KnowledgeStore;
use crate::core::config::{AppPaths, RagConfig, StorageType};
use crate::core::errors::ApiError;

const LOCAL_STORE_DIR: &str = "chroma_db";

/// Builds the configured knowledge store.
///
/// A remote store that cannot be reached (feature disabled, missing
/// connection string, failed connect) degrades to the local store.
pub async fn build_store(
    config: &RagConfig,
    paths: &AppPaths,
    dimension: usize,
) -> Result<Arc<dyn KnowledgeStore>, ApiError> {
    if config.storage_type == StorageType::Remote {
        tracing::info!("Using Supabase (PostgreSQL + pgvector) storage");
        match build_remote(config, dimension).await {
            Ok(store) => return Ok(store),
            Err(e) => {
                tracing::error!("Failed to initialize Supabase: {}", e);
                tracing::warn!("Falling back to local storage");
            }
        }
    }

    build_local(config, paths).await
}

async fn build_local(
    config: &RagConfig,
    paths: &AppPaths,
) -> Result<Arc<dyn KnowledgeStore>, ApiError> {
    let dir = paths.resolve_data_path(config.chroma_path.as_deref(), LOCAL_STORE_DIR);
    tracing::info!("Using local storage at {}", dir.display());
    let store = SqliteKnowledgeStore::open(&dir, &config.collection_name).await?;
    Ok(Arc::new(store))
}

#[cfg(feature = "remote-store")]
async fn build_remote(
    config: &RagConfig,
    dimension: usize,
) -> Result<Arc<dyn KnowledgeStore>, ApiError> {
    use super::postgres::PgVectorClient;
    use super::remote::RemoteKnowledgeStore;

    let url = std::env::var(&config.database_url_env).map_err(|_| {
        ApiError::config(format!(
            "Missing {} environment variable",
            config.database_url_env
        ))
    })?;

    let client = PgVectorClient::connect(&url).await?;
    client.ensure_schema(dimension).await;
    Ok(Arc::new(RemoteKnowledgeStore::new(client)))
}

#[cfg(not(feature = "remote-store"))]
async fn build_remote(
    _config: &RagConfig,
    _dimension: usize,
) -> Result<Arc<dyn KnowledgeStore>, ApiError> {
    Err(ApiError::NotImplemented(
        "built without the remote-store feature".to_string(),
    ))
}
