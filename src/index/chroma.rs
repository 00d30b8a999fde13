//! Chroma-backed [`VectorIndex`].
//!
//! Speaks the Chroma HTTP API v2. All collection-scoped calls live under
//!
//! ```text
//! {url}/api/v2/tenants/{tenant}/databases/{database}/collections/{collection_id}
//! ```
//!
//! Writes go through `/upsert` so re-adding an id replaces its entry, as the
//! local backends do.
//!
//! The collection id is resolved on first use with a `get_or_create`
//! request (cosine space) and cached for the lifetime of the index.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::{check_add_lengths, VectorIndex};
use crate::config::IndexConfig;
use crate::http::{self, JsonRequest};
use crate::models::{IndexedDocument, RetrievedDocument};

/// Page size for `get_all` so large collections are not fetched in one response.
const GET_PAGE_SIZE: usize = 1000;

pub struct ChromaIndex {
    client: Client,
    base_url: String,
    tenant: String,
    database: String,
    collection: String,
    collection_id: OnceCell<String>,
}

impl ChromaIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let base_url = config
            .url
            .clone()
            .ok_or_else(|| anyhow!("index.url required for Chroma provider"))?;

        Ok(Self {
            client: http::client(config.timeout_secs)?,
            base_url,
            tenant: config.tenant.clone(),
            database: config.database.clone(),
            collection: config.collection.clone(),
            collection_id: OnceCell::new(),
        })
    }

    fn collections_url(&self) -> String {
        http::join_url(
            &self.base_url,
            &format!(
                "api/v2/tenants/{}/databases/{}/collections",
                self.tenant, self.database
            ),
        )
    }

    /// The collection id, creating the collection on first call.
    async fn collection_id(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let body = json!({
                    "name": self.collection,
                    "get_or_create": true,
                    "metadata": { "hnsw:space": "cosine" },
                });
                let json = self
                    .send(Method::POST, self.collections_url(), Some(&body))
                    .await?;
                let id = json
                    .get("id")
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| anyhow!("Invalid Chroma response: collection has no id"))?
                    .to_string();
                info!(collection = %self.collection, id = %id, "resolved Chroma collection");
                Ok::<String, anyhow::Error>(id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn collection_url(&self, op: &str) -> Result<String> {
        let id = self.collection_id().await?;
        Ok(format!("{}/{}/{}", self.collections_url(), id, op))
    }

    async fn send(&self, method: Method, url: String, body: Option<&Value>) -> Result<Value> {
        http::send_json(
            &self.client,
            JsonRequest {
                service: "Chroma",
                method,
                url,
                bearer: None,
                body,
                max_retries: 0,
            },
        )
        .await
    }
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    fn name(&self) -> &str {
        "chroma"
    }

    async fn get_all(&self) -> Result<Vec<IndexedDocument>> {
        let url = self.collection_url("get").await?;
        let mut all = Vec::new();
        let mut offset = 0;

        loop {
            let body = json!({
                "include": ["documents"],
                "limit": GET_PAGE_SIZE,
                "offset": offset,
            });
            let json = self.send(Method::POST, url.clone(), Some(&body)).await?;
            let page = parse_get_response(&json)?;
            let fetched = page.len();
            all.extend(page);

            if fetched < GET_PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        debug!(count = all.len(), "fetched all Chroma entries");
        Ok(all)
    }

    async fn delete(&self, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let url = self.collection_url("delete").await?;
        self.send(Method::POST, url, Some(&json!({ "ids": ids })))
            .await?;
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
        // `/add` silently skips ids that already exist; `/upsert` replaces them.
        let url = self.collection_url("upsert").await?;
        let body = json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": documents,
        });
        self.send(Method::POST, url, Some(&body)).await?;
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<RetrievedDocument>> {
        let url = self.collection_url("query").await?;
        let body = json!({
            "query_embeddings": [embedding],
            "n_results": k,
            "include": ["documents", "distances"],
        });
        let json = self.send(Method::POST, url, Some(&body)).await?;
        let mut results = parse_query_response(&json)?;
        results.truncate(k);
        Ok(results)
    }

    async fn count(&self) -> Result<usize> {
        let url = self.collection_url("count").await?;
        let json = self.send(Method::GET, url, None).await?;
        json.as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| anyhow!("Invalid Chroma response: count is not a number"))
    }
}

fn string_array(value: Option<&Value>) -> Vec<Option<String>> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .map(|item| item.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// `{"ids": [...], "documents": [...]}` → entries. Missing documents become empty.
fn parse_get_response(json: &Value) -> Result<Vec<IndexedDocument>> {
    let ids = json
        .get("ids")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("Invalid Chroma response: missing ids"))?;
    let documents = string_array(json.get("documents"));

    Ok(ids
        .iter()
        .enumerate()
        .filter_map(|(i, id)| {
            id.as_str().map(|id| IndexedDocument {
                id: id.to_string(),
                content: documents.get(i).cloned().flatten().unwrap_or_default(),
            })
        })
        .collect())
}

/// Query responses are nested one level per query embedding; we send one.
fn parse_query_response(json: &Value) -> Result<Vec<RetrievedDocument>> {
    let ids = json
        .pointer("/ids/0")
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("Invalid Chroma response: missing ids"))?;
    let documents = string_array(json.pointer("/documents/0"));
    let distances: Vec<f64> = json
        .pointer("/distances/0")
        .and_then(|v| v.as_array())
        .map(|d| d.iter().map(|x| x.as_f64().unwrap_or(f64::MAX)).collect())
        .unwrap_or_default();

    Ok(ids
        .iter()
        .enumerate()
        .filter_map(|(i, id)| {
            id.as_str().map(|id| RetrievedDocument {
                id: id.to_string(),
                content: documents.get(i).cloned().flatten().unwrap_or_default(),
                distance: distances.get(i).copied().unwrap_or(f64::MAX),
            })
        })
        .collect())
}
