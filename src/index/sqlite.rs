//! SQLite-backed [`VectorIndex`].
//!
//! Vectors live in the `doc_vectors` table as little-endian f32 BLOBs next
//! to a copy of the document content. Queries load every vector and rank
//! by cosine distance in process, which is adequate for the corpus sizes a
//! single SQLite file is meant for.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use super::{check_add_lengths, VectorIndex};
use crate::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use crate::models::{IndexedDocument, RetrievedDocument};

pub struct SqliteIndex {
    pool: SqlitePool,
}

impl SqliteIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorIndex for SqliteIndex {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_all(&self) -> Result<Vec<IndexedDocument>> {
        let rows = sqlx::query("SELECT id, content FROM doc_vectors ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| IndexedDocument {
                id: row.get("id"),
                content: row.get("content"),
            })
            .collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query("DELETE FROM doc_vectors WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn add(
        &self,
        ids: &[String],
        embeddings: &[Vec<f32>],
        documents: &[String],
    ) -> Result<()> {
        check_add_lengths(ids, embeddings, documents)?;
        if ids.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for ((id, vector), content) in ids.iter().zip(embeddings).zip(documents) {
            sqlx::query(
                r#"
                INSERT INTO doc_vectors (id, content, embedding, dims)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    content = excluded.content,
                    embedding = excluded.embedding,
                    dims = excluded.dims
                "#,
            )
            .bind(id)
            .bind(content)
            .bind(vec_to_blob(vector))
            .bind(vector.len() as i64)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDocument>> {
        let rows = sqlx::query("SELECT id, content, embedding FROM doc_vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut results: Vec<RetrievedDocument> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                RetrievedDocument {
                    id: row.get("id"),
                    content: row.get("content"),
                    distance: cosine_distance(embedding, &blob_to_vec(&blob)),
                }
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
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM doc_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}
