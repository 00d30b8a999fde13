//! The RAG pipeline: index synchronization, retrieval, and generation.
//!
//! [`Rag`] wires the four collaborators together and nothing more. Every
//! operation is a straight sequence of awaited calls; errors from any
//! collaborator propagate unchanged.
//!
//! | Operation | Calls |
//! |-----------|-------|
//! | [`sync_all`](Rag::sync_all) | store find-all → index get-all → index delete → embed (concurrent batches) → index add |
//! | [`add_document`](Rag::add_document) | embed → index add |
//! | [`update_document`](Rag::update_document) | index delete → embed → index add |
//! | [`delete_document`](Rag::delete_document) | index delete |
//! | [`retrieve`](Rag::retrieve) | embed query → index query |
//! | [`answer`](Rag::answer) | retrieve → chat |
//!
//! The `create_`/`edit_`/`remove_` variants mutate the document store first
//! and then mirror the change into the index.

use std::sync::Arc;

use anyhow::Result;
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::chat::{self, ChatModel};
use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::error::RagError;
use crate::index::{self, VectorIndex};
use crate::models::{Answer, Document, RetrievedDocument, Status, SyncReport};
use crate::store::{DocumentStore, SqliteDocumentStore};

pub struct Rag {
    store: Arc<dyn DocumentStore>,
    embedder: Box<dyn Embedder>,
    chat: Box<dyn ChatModel>,
    index: Box<dyn VectorIndex>,
    top_k: usize,
    batch_size: usize,
}

impl Rag {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        embedder: Box<dyn Embedder>,
        chat: Box<dyn ChatModel>,
        index: Box<dyn VectorIndex>,
    ) -> Self {
        Self {
            store,
            embedder,
            chat,
            index,
            top_k: 3,
            batch_size: 64,
        }
    }

    /// Default `k` for [`retrieve`](Self::retrieve) callers that don't pass one.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Number of texts per embedding call during a full resync.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Build the pipeline described by `config` on top of an open SQLite pool.
    pub fn from_config(config: &Config, pool: sqlx::SqlitePool) -> Result<Self> {
        let store = Arc::new(SqliteDocumentStore::new(pool.clone()));
        let embedder = embedding::create_embedder(&config.embedding)?;
        let chat = chat::create_chat_model(&config.chat)?;
        let index = index::create_index(&config.index, &pool)?;

        Ok(Self::new(store, embedder, chat, index)
            .with_top_k(config.retrieval.top_k)
            .with_batch_size(config.embedding.batch_size))
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn index(&self) -> &dyn VectorIndex {
        self.index.as_ref()
    }

    /// Rebuild the index from the store.
    ///
    /// Every existing index entry is deleted, then every store document is
    /// embedded and added. Embedding batches are issued concurrently and
    /// joined before the add; the first failure aborts the sync.
    pub async fn sync_all(&self) -> Result<SyncReport> {
        let docs = self.store.find_all().await?;
        let existing = self.index.get_all().await?;

        let stale_ids: Vec<String> = existing.into_iter().map(|e| e.id).collect();
        if !stale_ids.is_empty() {
            debug!(count = stale_ids.len(), "clearing index");
            self.index.delete(&stale_ids).await?;
        }

        if docs.is_empty() {
            info!(removed = stale_ids.len(), "sync complete: store is empty");
            return Ok(SyncReport {
                removed: stale_ids.len(),
                indexed: 0,
            });
        }

        let ids: Vec<String> = docs.iter().map(|d| d.id.clone()).collect();
        let contents: Vec<String> = docs.iter().map(|d| d.content.clone()).collect();

        let batches = contents
            .chunks(self.batch_size)
            .map(|batch| self.embedder.embed(batch));
        let embeddings: Vec<Vec<f32>> = try_join_all(batches).await?.into_iter().flatten().collect();

        self.index.add(&ids, &embeddings, &contents).await?;

        let report = SyncReport {
            removed: stale_ids.len(),
            indexed: ids.len(),
        };
        info!(
            removed = report.removed,
            indexed = report.indexed,
            index = self.index.name(),
            "sync complete"
        );
        Ok(report)
    }

    /// Mirror a newly added store document into the index.
    pub async fn add_document(&self, doc: &Document) -> Result<()> {
        let vector = embedding::embed_one(self.embedder.as_ref(), &doc.content).await?;
        self.index
            .add(&[doc.id.clone()], &[vector], &[doc.content.clone()])
            .await?;
        debug!(id = %doc.id, "indexed document");
        Ok(())
    }

    /// Mirror a changed store document into the index.
    pub async fn update_document(&self, doc: &Document) -> Result<()> {
        self.index.delete(&[doc.id.clone()]).await?;
        self.add_document(doc).await
    }

    /// Mirror a store deletion into the index.
    pub async fn delete_document(&self, id: &str) -> Result<()> {
        self.index.delete(&[id.to_string()]).await?;
        debug!(id, "removed document from index");
        Ok(())
    }

    /// Insert into the store, then index.
    pub async fn create_document(&self, content: &str) -> Result<Document> {
        ensure_content(content)?;
        let doc = self.store.insert(content).await?;
        self.add_document(&doc).await?;
        Ok(doc)
    }

    /// Update the store, then re-index. `None` if the id is unknown.
    pub async fn edit_document(&self, id: &str, content: &str) -> Result<Option<Document>> {
        ensure_content(content)?;
        match self.store.update(id, content).await? {
            Some(doc) => {
                self.update_document(&doc).await?;
                Ok(Some(doc))
            }
            None => Ok(None),
        }
    }

    /// Delete from the store, then from the index. Returns whether it existed.
    pub async fn remove_document(&self, id: &str) -> Result<bool> {
        if !self.store.delete(id).await? {
            return Ok(false);
        }
        self.delete_document(id).await?;
        Ok(true)
    }

    /// The `k` documents nearest to `query`, nearest first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RetrievedDocument>> {
        if k == 0 {
            return Err(RagError::ZeroK.into());
        }
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = embedding::embed_one(self.embedder.as_ref(), query).await?;
        let mut results = self.index.query(&vector, k).await?;
        results.truncate(k);
        Ok(results)
    }

    /// Retrieve context for `query` and ask the chat model.
    pub async fn answer(&self, query: &str, k: usize) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(RagError::Empty("query").into());
        }

        let sources = self.retrieve(query, k).await?;
        let context = build_context(&sources);
        debug!(sources = sources.len(), chat = self.chat.model_name(), "generating answer");
        let answer = self.chat.complete(query, &context).await?;

        Ok(Answer { answer, sources })
    }

    pub async fn status(&self) -> Result<Status> {
        let documents = self.store.count().await?;
        let indexed = self.index.count().await?;
        Ok(Status {
            documents,
            indexed,
            in_sync: documents == indexed,
        })
    }
}

/// Join retrieved contents, separated by blank lines.
pub fn build_context(sources: &[RetrievedDocument]) -> String {
    sources
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn ensure_content(content: &str) -> Result<()> {
    if content.trim().is_empty() {
        return Err(RagError::Empty("content").into());
    }
    Ok(())
}
