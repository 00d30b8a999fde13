//! Core data models used throughout doc-rag.
//!
//! [`Document`] is owned by the document store. The vector index keeps a
//! denormalized copy of each one as an [`IndexedDocument`] plus its
//! embedding, and hands back [`RetrievedDocument`]s at query time.

use serde::Serialize;

/// A document as persisted in the document store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    /// Store-assigned opaque identifier.
    pub id: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The denormalized copy of a document held by the vector index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexedDocument {
    pub id: String,
    pub content: String,
}

/// A document returned by a nearest-neighbour query.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedDocument {
    pub id: String,
    pub content: String,
    /// Distance reported by the index; lower is closer.
    pub distance: f64,
}

/// A generated answer together with the documents used as its context.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<RetrievedDocument>,
}

/// Outcome of a full index resync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Index entries deleted before re-adding.
    pub removed: usize,
    /// Store documents embedded and added.
    pub indexed: usize,
}

/// Document counts on both sides of the sync boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub documents: usize,
    pub indexed: usize,
    pub in_sync: bool,
}
