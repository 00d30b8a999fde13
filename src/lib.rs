//! # doc-rag
//!
//! A minimal retrieval-augmented generation pipeline.
//!
//! doc-rag keeps a vector index synchronized with a document store, retrieves
//! the documents nearest to a query, and hands them as context to a
//! chat-completion model. Embedding, nearest-neighbour search, and inference
//! are all delegated to external services; this crate only sequences the calls.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │DocumentStore │──▶│     Rag      │──▶│ VectorIndex  │
//! │   (SQLite)   │   │  (pipeline)  │   │Chroma/SQLite │
//! └──────────────┘   └──┬────────┬──┘   └──────────────┘
//!                       ▼        ▼
//!                ┌──────────┐ ┌──────────┐
//!                │ Embedder │ │ChatModel │
//!                └──────────┘ └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! rag init                         # create database
//! rag import ./docs                # load files as documents
//! rag sync                         # rebuild the vector index from the store
//! rag ask "how do I deploy?"       # retrieve + generate
//! rag serve                        # resync, then start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core data types |
//! | [`db`] | SQLite connection pool with WAL mode |
//! | [`migrate`] | Database schema migrations (idempotent) |
//! | [`store`] | Document store trait, SQLite and in-memory backends |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`chat`] | Chat-completion providers |
//! | [`error`] | Typed caller errors |
//! | [`index`] | Vector index trait, Chroma, SQLite, and in-memory backends |
//! | [`pipeline`] | Sync, mirror, retrieve, and answer |
//! | [`import`] | Directory import into the document store |
//! | [`server`] | JSON HTTP API (Axum) |

pub mod chat;
pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
mod http;
pub mod import;
pub mod index;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod store;

pub use models::{Answer, Document, RetrievedDocument, SyncReport};
pub use pipeline::Rag;
