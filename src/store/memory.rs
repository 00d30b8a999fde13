//! In-memory [`DocumentStore`] for tests and throwaway runs.
//!
//! Documents are kept in insertion order behind a `std::sync::RwLock`.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{new_document_id, DocumentStore};
use crate::models::Document;

#[derive(Default)]
pub struct InMemoryDocumentStore {
    docs: RwLock<Vec<Document>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with documents that already carry ids.
    pub fn with_documents(docs: Vec<Document>) -> Self {
        Self {
            docs: RwLock::new(docs),
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_all(&self) -> Result<Vec<Document>> {
        Ok(self.docs.read().unwrap().clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        Ok(self
            .docs
            .read()
            .unwrap()
            .iter()
            .find(|d| d.id == id)
            .cloned())
    }

    async fn insert(&self, content: &str) -> Result<Document> {
        let now = chrono::Utc::now().timestamp();
        let doc = Document {
            id: new_document_id(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.docs.write().unwrap().push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, id: &str, content: &str) -> Result<Option<Document>> {
        let mut docs = self.docs.write().unwrap();
        Ok(docs.iter_mut().find(|d| d.id == id).map(|d| {
            d.content = content.to_string();
            d.updated_at = chrono::Utc::now().timestamp();
            d.clone()
        }))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut docs = self.docs.write().unwrap();
        let before = docs.len();
        docs.retain(|d| d.id != id);
        Ok(docs.len() != before)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.docs.read().unwrap().len())
    }
}
