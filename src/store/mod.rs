//! Document store abstraction.
//!
//! The [`DocumentStore`] trait is the primary source of truth the vector
//! index is synchronized from. Only [`find_all`](DocumentStore::find_all)
//! is needed by a resync; the remaining operations are the mutations that
//! the pipeline mirrors into the index.
//!
//! | Backend | Module |
//! |---------|--------|
//! | SQLite (`documents` table) | [`sqlite`] |
//! | In-memory | [`memory`] |

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Document;

pub use memory::InMemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// All documents, oldest first.
    async fn find_all(&self) -> Result<Vec<Document>>;

    async fn get(&self, id: &str) -> Result<Option<Document>>;

    /// Insert a new document; the store assigns its id.
    async fn insert(&self, content: &str) -> Result<Document>;

    /// Replace a document's content. Returns `None` if the id is unknown.
    async fn update(&self, id: &str, content: &str) -> Result<Option<Document>>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count(&self) -> Result<usize>;
}

pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
