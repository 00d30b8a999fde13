//! In-memory [`VectorIndex`] for tests and ephemeral servers.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Queries are brute-force cosine
//! distance over every stored vector.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use super::{check_add_lengths, VectorIndex};
use crate::embedding::cosine_distance;
use crate::models::{IndexedDocument, RetrievedDocument};

struct StoredVector {
    id: String,
    content: String,
    vector: Vec<f32>,
}

#[derive(Default)]
pub struct InMemoryIndex {
    vectors: RwLock<Vec<StoredVector>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_all(&self) -> Result<Vec<IndexedDocument>> {
        Ok(self
            .vectors
            .read()
            .unwrap()
            .iter()
            .map(|sv| IndexedDocument {
                id: sv.id.clone(),
                content: sv.content.clone(),
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        let mut vectors = self.vectors.write().unwrap();
        vectors.retain(|sv| !ids.contains(&sv.id));
        Ok(())
    }

    async fn add(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        documents: &[String],
    ) -> Result<()> {
        check_add_lengths(ids, embeddings, documents)?;
        let mut vectors = self.vectors.write().unwrap();
        vectors.retain(|sv| !ids.contains(&sv.id));
        for ((id, vector), content) in ids.iter().zip(embeddings).zip(documents) {
            vectors.push(StoredVector {
                id: id.clone(),
                content: content.clone(),
                vector: vector.clone(),
            });
        }
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDocument>> {
        let vectors = self.vectors.read().unwrap();
        let mut results: Vec<RetrievedDocument> = vectors
            .iter()
            .map(|sv| RetrievedDocument {
                id: sv.id.clone(),
                content: sv.content.clone(),
                distance: cosine_distance(embedding, &sv.vector),
            })
            .collect();
        results.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.vectors.read().unwrap().len())
    }
}
