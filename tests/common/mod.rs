//! Shared fixtures: a deterministic fake embedder/chat model and an
//! in-process axum mock of the OpenAI and Chroma HTTP APIs.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use doc_rag::chat::ChatModel;
use doc_rag::embedding::{cosine_distance, Embedder};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Words that get their own embedding dimension.
pub const VOCAB: [&str; 7] = [
    "rust",
    "python",
    "deploy",
    "kubernetes",
    "cargo",
    "docker",
    "learning",
];
pub const DIMS: usize = VOCAB.len() + 1;

/// Bag-of-words vector over [`VOCAB`], plus a constant bias dimension so no
/// vector is all zeros.
pub fn embed_text(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let mut v: Vec<f32> = VOCAB
        .iter()
        .map(|w| lower.matches(w).count() as f32)
        .collect();
    v.push(0.1);
    v
}

/// In-process embedder over [`embed_text`] that counts calls.
#[derive(Default)]
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    pub texts: AtomicUsize,
}

#[async_trait]
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-bow"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// Shares counters with the test after being boxed into a `Rag`.
pub struct SharedEmbedder(pub Arc<FakeEmbedder>);

#[async_trait]
impl Embedder for SharedEmbedder {
    fn model_name(&self) -> &str {
        self.0.model_name()
    }
    fn dims(&self) -> usize {
        self.0.dims()
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.0.embed(texts).await
    }
}

/// Fails every call after the first `ok_calls`.
pub struct FlakyEmbedder {
    pub ok_calls: usize,
    pub calls: AtomicUsize,
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n >= self.ok_calls {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(texts.iter().map(|t| embed_text(t)).collect())
    }
}

/// Chat model that echoes the query and context it was given.
pub struct EchoChat;

#[async_trait]
impl ChatModel for EchoChat {
    fn model_name(&self) -> &str {
        "echo"
    }
    async fn complete(&self, query: &str, context: &str) -> Result<String> {
        Ok(format!("Q: {}\nCONTEXT:\n{}", query, context))
    }
}

// ─── Mock HTTP services ─────────────────────────────────────────────

struct Collection {
    id: String,
    entries: Vec<(String, Vec<f32>, String)>,
}

#[derive(Default)]
pub struct MockState {
    collections: Mutex<HashMap<String, Collection>>,
    pub embedding_requests: AtomicUsize,
    pub chat_requests: AtomicUsize,
    pub collection_creates: AtomicUsize,
    pub last_chat_body: Mutex<Option<Value>>,
    pub last_auth: Mutex<Option<String>>,
}

impl MockState {
    pub fn chroma_count(&self) -> usize {
        self.collections
            .lock()
            .unwrap()
            .values()
            .map(|c| c.entries.len())
            .sum()
    }

    /// Content stored under `id` in any collection.
    pub fn chroma_document(&self, id: &str) -> Option<String> {
        self.collections
            .lock()
            .unwrap()
            .values()
            .flat_map(|c| c.entries.iter())
            .find(|e| e.0 == id)
            .map(|e| e.2.clone())
    }

    /// Seed an entry directly, bypassing the API.
    pub fn chroma_seed(&self, name: &str, id: &str, document: &str) {
        let mut collections = self.collections.lock().unwrap();
        let collection = collections
            .entry(name.to_string())
            .or_insert_with(|| Collection {
                id: format!("col-{}", name),
                entries: Vec::new(),
            });
        collection
            .entries
            .push((id.to_string(), embed_text(document), document.to_string()));
    }
}

pub struct MockServer {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
}

impl MockServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Base URL for OpenAI-compatible clients (`…/v1`).
    pub fn openai_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }
}

type Shared = State<Arc<MockState>>;

fn record_auth(state: &MockState, headers: &axum::http::HeaderMap) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    *state.last_auth.lock().unwrap() = auth;
}

async fn openai_embeddings(
    State(state): Shared,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    record_auth(&state, &headers);
    state.embedding_requests.fetch_add(1, Ordering::SeqCst);
    let inputs = body["input"]
        .as_array()
        .ok_or((StatusCode::BAD_REQUEST, "input must be an array".to_string()))?;

    let data: Vec<Value> = inputs
        .iter()
        .enumerate()
        .map(|(i, text)| {
            json!({
                "object": "embedding",
                "index": i,
                "embedding": embed_text(text.as_str().unwrap_or_default()),
            })
        })
        .collect();

    Ok(Json(json!({ "object": "list", "data": data, "model": body["model"] })))
}

async fn openai_chat(
    State(state): Shared,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_auth(&state, &headers);
    state.chat_requests.fetch_add(1, Ordering::SeqCst);
    let system = body["messages"][0]["content"].as_str().unwrap_or_default();
    let user = body["messages"][1]["content"].as_str().unwrap_or_default();
    let reply = format!("answer to '{}' using: {}", user, system);
    *state.last_chat_body.lock().unwrap() = Some(body.clone());

    Json(json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": reply },
            "finish_reason": "stop"
        }]
    }))
}

async fn chroma_create_collection(
    State(state): Shared,
    Path((_tenant, _database)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.collection_creates.fetch_add(1, Ordering::SeqCst);
    let name = body["name"].as_str().unwrap_or("default").to_string();
    let mut collections = state.collections.lock().unwrap();
    let collection = collections.entry(name.clone()).or_insert_with(|| Collection {
        id: format!("col-{}", name),
        entries: Vec::new(),
    });
    Json(json!({ "id": collection.id, "name": name }))
}

fn with_collection<T>(
    state: &MockState,
    id: &str,
    f: impl FnOnce(&mut Collection) -> T,
) -> Result<T, (StatusCode, String)> {
    let mut collections = state.collections.lock().unwrap();
    collections
        .values_mut()
        .find(|c| c.id == id)
        .map(f)
        .ok_or((StatusCode::NOT_FOUND, format!("collection {} not found", id)))
}

async fn chroma_get(
    State(state): Shared,
    Path((_t, _d, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let limit = body["limit"].as_u64().unwrap_or(u64::MAX) as usize;
    let offset = body["offset"].as_u64().unwrap_or(0) as usize;
    with_collection(&state, &id, |c| {
        let page: Vec<&(String, Vec<f32>, String)> =
            c.entries.iter().skip(offset).take(limit).collect();
        Json(json!({
            "ids": page.iter().map(|e| e.0.clone()).collect::<Vec<_>>(),
            "documents": page.iter().map(|e| e.2.clone()).collect::<Vec<_>>(),
        }))
    })
}

async fn chroma_delete(
    State(state): Shared,
    Path((_t, _d, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let ids: Vec<String> = body["ids"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default();
    with_collection(&state, &id, |c| {
        c.entries.retain(|e| !ids.contains(&e.0));
        Json(json!({}))
    })
}

fn parse_vector(value: &Value) -> Vec<f32> {
    value
        .as_array()
        .map(|a| a.iter().map(|x| x.as_f64().unwrap_or(0.0) as f32).collect())
        .unwrap_or_default()
}

/// Chroma's `/add` and `/upsert`: `/add` skips ids already present,
/// `/upsert` replaces them.
fn write_entries(
    state: &MockState,
    collection_id: &str,
    body: &Value,
    replace: bool,
) -> Result<Json<Value>, (StatusCode, String)> {
    let ids = body["ids"].as_array().cloned().unwrap_or_default();
    let embeddings = body["embeddings"].as_array().cloned().unwrap_or_default();
    let documents = body["documents"].as_array().cloned().unwrap_or_default();
    if ids.len() != embeddings.len() || ids.len() != documents.len() {
        return Err((StatusCode::BAD_REQUEST, "length mismatch".to_string()));
    }
    with_collection(state, collection_id, |c| {
        for ((id, emb), doc) in ids.iter().zip(&embeddings).zip(&documents) {
            let entry = (
                id.as_str().unwrap_or_default().to_string(),
                parse_vector(emb),
                doc.as_str().unwrap_or_default().to_string(),
            );
            match c.entries.iter_mut().find(|e| e.0 == entry.0) {
                Some(existing) if replace => *existing = entry,
                Some(_) => {}
                None => c.entries.push(entry),
            }
        }
        Json(json!({}))
    })
}

async fn chroma_add(
    State(state): Shared,
    Path((_t, _d, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    write_entries(&state, &id, &body, false)
}

async fn chroma_upsert(
    State(state): Shared,
    Path((_t, _d, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    write_entries(&state, &id, &body, true)
}

async fn chroma_query(
    State(state): Shared,
    Path((_t, _d, id)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let query = parse_vector(&body["query_embeddings"][0]);
    let n = body["n_results"].as_u64().unwrap_or(10) as usize;
    with_collection(&state, &id, |c| {
        let mut scored: Vec<(f64, &(String, Vec<f32>, String))> = c
            .entries
            .iter()
            .map(|e| (cosine_distance(&query, &e.1), e))
            .collect();
        scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());
        scored.truncate(n);
        Json(json!({
            "ids": [scored.iter().map(|(_, e)| e.0.clone()).collect::<Vec<_>>()],
            "documents": [scored.iter().map(|(_, e)| e.2.clone()).collect::<Vec<_>>()],
            "distances": [scored.iter().map(|(d, _)| *d).collect::<Vec<_>>()],
        }))
    })
}

async fn chroma_count(
    State(state): Shared,
    Path((_t, _d, id)): Path<(String, String, String)>,
) -> Result<Json<Value>, (StatusCode, String)> {
    with_collection(&state, &id, |c| Json(json!(c.entries.len())))
}

/// Start the mock on an ephemeral port within the current tokio runtime.
pub async fn start_mock() -> MockServer {
    let state = Arc::new(MockState::default());
    let prefix = "/api/v2/tenants/{tenant}/databases/{database}/collections";

    let app = Router::new()
        .route("/v1/embeddings", post(openai_embeddings))
        .route("/v1/chat/completions", post(openai_chat))
        .route(prefix, post(chroma_create_collection))
        .route(&format!("{}/{{id}}/get", prefix), post(chroma_get))
        .route(&format!("{}/{{id}}/delete", prefix), post(chroma_delete))
        .route(&format!("{}/{{id}}/add", prefix), post(chroma_add))
        .route(&format!("{}/{{id}}/upsert", prefix), post(chroma_upsert))
        .route(&format!("{}/{{id}}/query", prefix), post(chroma_query))
        .route(&format!("{}/{{id}}/count", prefix), get(chroma_count))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockServer { addr, state }
}
