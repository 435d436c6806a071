//! RAG (Retrieval-Augmented Generation) module.
//!
//! This module provides:
//! - `KnowledgeStore`: storage contract with local (SQLite) and remote
//!   (Postgres + pgvector) implementations
//! - `build_store`: configuration-driven store selection with local fallback
//! - `RetrievalSystem`: embeds, stores and searches knowledge with a result cache

mod factory;
#[cfg(feature = "remote-store")]
mod postgres;
mod remote;
mod sqlite;
mod store;
mod system;

pub use factory::build_store;
#[cfg(feature = "remote-store")]
pub use postgres::PgVectorClient;
pub use remote::{RemoteClient, RemoteKnowledgeStore, FALLBACK_SIMILARITY, REMOTE_BACKEND_NAME};
pub use sqlite::SqliteKnowledgeStore;
pub use store::{
    generate_item_id, KnowledgeItem, KnowledgeStore, SearchQuery, SearchResult, StoreStats,
    DEFAULT_CATEGORY,
};
pub use system::{RetrievalSettings, RetrievalStats, RetrievalSystem};
