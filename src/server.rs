//! HTTP server exposing the pipeline as a JSON API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/status` | Store vs. index document counts |
//! | `GET`  | `/documents` | List store documents |
//! | `POST` | `/documents` | Create a document and index it |
//! | `PUT`  | `/documents/{id}` | Replace a document's content and re-index it |
//! | `DELETE` | `/documents/{id}` | Delete a document and its index entry |
//! | `POST` | `/sync` | Full index resync |
//! | `POST` | `/search` | Nearest documents for a query |
//! | `POST` | `/query` | Retrieval-augmented answer for a query |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream_error` (502).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::error::RagError;
use crate::models::{Answer, Document, RetrievedDocument, Status, SyncReport};
use crate::pipeline::Rag;

#[derive(Clone)]
struct AppState {
    rag: Arc<Rag>,
}

/// Resync the index, then serve on `[server].bind` until the process exits.
pub async fn run_server(config: &Config, rag: Rag) -> anyhow::Result<()> {
    let report = rag.sync_all().await?;
    println!(
        "Index synced: {} removed, {} indexed",
        report.removed, report.indexed
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    println!("RAG server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(Arc::new(rag))).await?;
    Ok(())
}

/// Build the router. Exposed so tests and embedders can serve it themselves.
pub fn router(rag: Arc<Rag>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/status", get(handle_status))
        .route("/documents", get(handle_list).post(handle_create))
        .route("/documents/{id}", put(handle_update).delete(handle_delete))
        .route("/sync", post(handle_sync))
        .route("/search", post(handle_search))
        .route("/query", post(handle_query))
        .layer(cors)
        .with_state(AppState { rag })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

/// Map a pipeline error to a response. [`RagError`]s become 400; everything
/// else is a collaborator failure.
fn classify_error(err: anyhow::Error) -> AppError {
    let msg = format!("{:#}", err);

    if RagError::find(&err).is_some() {
        bad_request(msg)
    } else {
        error!(error = %msg, "request failed");
        AppError {
            status: StatusCode::BAD_GATEWAY,
            code: "upstream_error",
            message: msg,
        }
    }
}

/// Unwrap a JSON body, reporting malformed or incomplete input as `bad_request`.
fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| bad_request(rejection.body_text()))
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_status(State(state): State<AppState>) -> Result<Json<Status>, AppError> {
    let status = state.rag.status().await.map_err(classify_error)?;
    Ok(Json(status))
}

#[derive(Serialize)]
struct DocumentList {
    documents: Vec<Document>,
}

async fn handle_list(State(state): State<AppState>) -> Result<Json<DocumentList>, AppError> {
    let documents = state
        .rag
        .store()
        .find_all()
        .await
        .map_err(classify_error)?;
    Ok(Json(DocumentList { documents }))
}

#[derive(Deserialize)]
struct ContentRequest {
    content: String,
}

async fn handle_create(
    State(state): State<AppState>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let req = json_body(body)?;
    let doc = state
        .rag
        .create_document(&req.content)
        .await
        .map_err(classify_error)?;
    info!(id = %doc.id, "created document");
    Ok((StatusCode::CREATED, Json(doc)))
}

async fn handle_update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<ContentRequest>, JsonRejection>,
) -> Result<Json<Document>, AppError> {
    let req = json_body(body)?;
    state
        .rag
        .edit_document(&id, &req.content)
        .await
        .map_err(classify_error)?
        .map(Json)
        .ok_or_else(|| not_found(format!("document not found: {}", id)))
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state
        .rag
        .remove_document(&id)
        .await
        .map_err(classify_error)?
    {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("document not found: {}", id)))
    }
}

async fn handle_sync(State(state): State<AppState>) -> Result<Json<SyncReport>, AppError> {
    let report = state.rag.sync_all().await.map_err(classify_error)?;
    Ok(Json(report))
}

#[derive(Deserialize)]
struct QueryRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

impl QueryRequest {
    fn k(&self, default_k: usize) -> Result<usize, AppError> {
        match self.k {
            Some(0) => Err(bad_request(RagError::ZeroK.to_string())),
            Some(k) => Ok(k),
            None => Ok(default_k),
        }
    }
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<RetrievedDocument>,
}

async fn handle_search(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, AppError> {
    let req = json_body(body)?;
    // A blank query yields no results rather than an error.
    let k = req.k(state.rag.top_k())?;
    let results = state
        .rag
        .retrieve(&req.query, k)
        .await
        .map_err(classify_error)?;
    Ok(Json(SearchResponse { results }))
}

async fn handle_query(
    State(state): State<AppState>,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<Answer>, AppError> {
    let req = json_body(body)?;
    if req.query.trim().is_empty() {
        return Err(bad_request(RagError::Empty("query").to_string()));
    }
    let k = req.k(state.rag.top_k())?;
    let answer = state
        .rag
        .answer(&req.query, k)
        .await
        .map_err(classify_error)?;
    Ok(Json(answer))
}
