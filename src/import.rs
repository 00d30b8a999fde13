//! Directory import: load text files into the document store.
//!
//! Walks a directory, keeps files matching `[import].include_globs` (minus
//! `exclude_globs` and the usual build/VCS directories), and creates one
//! document per file through [`Rag::create_document`], so each import is
//! mirrored into the index as it lands.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::ImportConfig;
use crate::models::Document;
use crate::pipeline::Rag;

/// A file selected for import.
#[derive(Debug, Clone)]
pub struct ImportFile {
    pub path: PathBuf,
    /// Path relative to the import root, `/`-separated.
    pub relative: String,
    pub content: String,
}

/// Collect importable files under `root`, sorted by relative path.
///
/// Empty files and files that are not valid UTF-8 are skipped.
pub fn scan_directory(root: &Path, config: &ImportConfig) -> Result<Vec<ImportFile>> {
    if !root.is_dir() {
        bail!("Import root is not a directory: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut excludes = vec![
        "**/.git/**".to_string(),
        "**/target/**".to_string(),
        "**/node_modules/**".to_string(),
    ];
    excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&excludes)?;

    let mut files = Vec::new();

    for entry in WalkDir::new(root).follow_links(config.follow_symlinks) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path
            .strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");

        if exclude_set.is_match(&relative) || !include_set.is_match(&relative) {
            continue;
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable file");
                continue;
            }
        };
        if content.trim().is_empty() {
            debug!(path = %path.display(), "skipping empty file");
            continue;
        }

        files.push(ImportFile {
            path: path.to_path_buf(),
            relative,
            content,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

/// Import every matching file under `root` as a new document.
pub async fn import_directory(
    rag: &Rag,
    root: &Path,
    config: &ImportConfig,
) -> Result<Vec<(ImportFile, Document)>> {
    let files = scan_directory(root, config)?;
    let mut imported = Vec::with_capacity(files.len());

    for file in files {
        let doc = rag.create_document(&file.content).await?;
        imported.push((file, doc));
    }

    Ok(imported)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
