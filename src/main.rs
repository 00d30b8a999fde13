//! # doc-rag CLI (`rag`)
//!
//! ## Usage
//!
//! ```bash
//! rag --config ./config/rag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rag init` | Create the SQLite database and tables |
//! | `rag sync` | Rebuild the vector index from the document store |
//! | `rag add "<content>"` | Create a document and index it |
//! | `rag update <id> "<content>"` | Replace a document's content and re-index it |
//! | `rag delete <id>` | Delete a document and its index entry |
//! | `rag list` | List stored documents |
//! | `rag import <dir>` | Import matching files as documents |
//! | `rag search "<query>"` | Show the nearest documents |
//! | `rag ask "<query>"` | Answer a question from retrieved context |
//! | `rag status` | Compare store and index document counts |
//! | `rag serve` | Resync, then start the HTTP API |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `warn`).

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use doc_rag::config::{self, Config};
use doc_rag::pipeline::Rag;
use doc_rag::{db, import, migrate, server};

#[derive(Parser)]
#[command(
    name = "rag",
    about = "doc-rag — keep a vector index in sync with a document store and answer questions from it",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/rag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Safe to run repeatedly.
    Init,

    /// Delete every index entry and re-index every stored document.
    Sync,

    /// Create a document and index it.
    Add {
        /// Document text.
        content: String,
    },

    /// Replace a document's content and re-index it.
    Update {
        /// Document id.
        id: String,
        /// New document text.
        content: String,
    },

    /// Delete a document and its index entry.
    Delete {
        /// Document id.
        id: String,
    },

    /// List all stored documents.
    List,

    /// Import files under a directory as documents.
    ///
    /// Files are selected with `[import].include_globs` / `exclude_globs`.
    Import {
        /// Directory to walk.
        dir: PathBuf,
    },

    /// Show the documents nearest to a query.
    Search {
        query: String,

        /// Number of documents to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question using retrieved documents as context.
    Ask {
        query: String,

        /// Number of documents to retrieve (defaults to `[retrieval].top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Compare document counts in the store and the index.
    Status,

    /// Resync the index, then serve the HTTP API on `[server].bind`.
    Serve,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn open_rag(cfg: &Config) -> Result<Rag> {
    let pool = db::connect(cfg).await?;
    migrate::apply(&pool).await?;
    Rag::from_config(cfg, pool)
}

fn resolve_k(k: Option<usize>, rag: &Rag) -> Result<usize> {
    match k {
        Some(0) => bail!("--k must be >= 1"),
        Some(k) => Ok(k),
        None => Ok(rag.top_k()),
    }
}

fn one_line(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() > max_chars {
        format!("{}…", flat.chars().take(max_chars).collect::<String>())
    } else {
        flat.to_string()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Sync => {
            let rag = open_rag(&cfg).await?;
            let report = rag.sync_all().await?;
            println!("sync");
            println!("  removed: {}", report.removed);
            println!("  indexed: {}", report.indexed);
        }
        Commands::Add { content } => {
            let rag = open_rag(&cfg).await?;
            let doc = rag.create_document(&content).await?;
            println!("added {}", doc.id);
        }
        Commands::Update { id, content } => {
            let rag = open_rag(&cfg).await?;
            match rag.edit_document(&id, &content).await? {
                Some(doc) => println!("updated {}", doc.id),
                None => bail!("document not found: {}", id),
            }
        }
        Commands::Delete { id } => {
            let rag = open_rag(&cfg).await?;
            if !rag.remove_document(&id).await? {
                bail!("document not found: {}", id);
            }
            println!("deleted {}", id);
        }
        Commands::List => {
            let rag = open_rag(&cfg).await?;
            let docs = rag.store().find_all().await?;
            if docs.is_empty() {
                println!("No documents.");
            }
            for doc in docs {
                println!("{}  {}", doc.id, one_line(&doc.content, 80));
            }
        }
        Commands::Import { dir } => {
            let rag = open_rag(&cfg).await?;
            let imported = import::import_directory(&rag, &dir, &cfg.import).await?;
            for (file, doc) in &imported {
                println!("  {} → {}", file.relative, doc.id);
            }
            println!("imported documents: {}", imported.len());
        }
        Commands::Search { query, k } => {
            let rag = open_rag(&cfg).await?;
            let k = resolve_k(k, &rag)?;
            let results = rag.retrieve(&query, k).await?;
            if results.is_empty() {
                println!("No results.");
            }
            for (i, result) in results.iter().enumerate() {
                println!("{}. [{:.4}] {}", i + 1, result.distance, result.id);
                println!("    \"{}\"", one_line(&result.content, 200));
            }
        }
        Commands::Ask { query, k } => {
            let rag = open_rag(&cfg).await?;
            let k = resolve_k(k, &rag)?;
            let answer = rag.answer(&query, k).await?;
            println!("{}", answer.answer.trim());
            if !answer.sources.is_empty() {
                println!();
                println!("sources:");
                for source in &answer.sources {
                    println!("  [{:.4}] {}", source.distance, source.id);
                }
            }
        }
        Commands::Status => {
            let rag = open_rag(&cfg).await?;
            let status = rag.status().await?;
            println!("status");
            println!("  index: {}", rag.index().name());
            println!("  documents: {}", status.documents);
            println!("  indexed: {}", status.indexed);
            println!("  in sync: {}", if status.in_sync { "yes" } else { "no" });
        }
        Commands::Serve => {
            let rag = open_rag(&cfg).await?;
            server::run_server(&cfg, rag).await?;
        }
    }

    Ok(())
}
