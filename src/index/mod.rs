//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait covers the four calls the pipeline makes
//! against a vector database: get-all, delete-by-ids, add, and
//! query-by-embedding. Every entry is a denormalized copy of a store
//! document (id, embedding, content).
//!
//! | Config Value | Backend | Module |
//! |-------------|---------|--------|
//! | `"chroma"` | Chroma HTTP API (v2) | [`chroma`] |
//! | `"sqlite"` | `doc_vectors` table, brute-force cosine | [`sqlite`] |
//! | `"memory"` | In-process, brute-force cosine | [`memory`] |
//!
//! Implementations must treat `add` of an existing id as a replacement and
//! `delete` of an unknown id as a no-op.

pub mod chroma;
pub mod memory;
pub mod sqlite;

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::config::IndexConfig;
use crate::models::{IndexedDocument, RetrievedDocument};

pub use chroma::ChromaIndex;
pub use memory::InMemoryIndex;
pub use sqlite::SqliteIndex;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name for logs and status output.
    fn name(&self) -> &str;

    /// Every entry currently in the index.
    async fn get_all(&self) -> Result<Vec<IndexedDocument>>;

    async fn delete(&self, ids: &[String]) -> Result<()>;

    /// Add entries. The three slices are parallel and must have equal length.
    async fn add(&self, ids: &[String], embeddings: &[Vec<f32>], documents: &[String])
        -> Result<()>;

    /// The `k` nearest entries to `embedding`, nearest first.
    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDocument>>;

    async fn count(&self) -> Result<usize>;
}

/// Reject `add` calls whose parallel slices disagree in length.
pub(crate) fn check_add_lengths(
    ids: &[String],
    embeddings: &[Vec<f32>],
    documents: &[String],
) -> Result<()> {
    if ids.len() != embeddings.len() || ids.len() != documents.len() {
        bail!(
            "index add: {} ids, {} embeddings, {} documents (lengths must match)",
            ids.len(),
            embeddings.len(),
            documents.len()
        );
    }
    Ok(())
}

/// Create the [`VectorIndex`] named by `index.provider`.
///
/// The SQLite backend shares the document store's pool.
pub fn create_index(config: &IndexConfig, pool: &SqlitePool) -> Result<Box<dyn VectorIndex>> {
    match config.provider.as_str() {
        "sqlite" => Ok(Box::new(SqliteIndex::new(pool.clone()))),
        "memory" => Ok(Box::new(InMemoryIndex::new())),
        "chroma" => Ok(Box::new(ChromaIndex::new(config)?)),
        other => bail!("Unknown index provider: {}", other),
    }
}
