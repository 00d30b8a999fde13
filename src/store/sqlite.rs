//! SQLite-backed [`DocumentStore`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::{new_document_id, DocumentStore};
use crate::models::Document;

pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_document(row: &SqliteRow) -> Document {
    Document {
        id: row.get("id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find_all(&self) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, content, created_at, updated_at FROM documents ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT id, content, created_at, updated_at FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_document))
    }

    async fn insert(&self, content: &str) -> Result<Document> {
        let now = chrono::Utc::now().timestamp();
        let doc = Document {
            id: new_document_id(),
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO documents (id, content, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&doc.id)
        .bind(&doc.content)
        .bind(doc.created_at)
        .bind(doc.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(doc)
    }

    async fn update(&self, id: &str, content: &str) -> Result<Option<Document>> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query("UPDATE documents SET content = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n as usize)
    }
}
