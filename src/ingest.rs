//! Ingestion: directory walks into the document registry, and the embedding
//! pass over documents that still need vectors.

use std::path::Path;

use chrono::{DateTime, Utc};
use globset::GlobBuilder;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::model::{l2_normalize, Embedder};
use crate::store::chunker::chunk_document;
use crate::store::document::DocumentInput;
use crate::store::Store;

#[derive(Debug, Default, Clone)]
pub struct IndexReport {
    pub indexed: usize,
    pub skipped: usize,
}

#[derive(Debug, Default, Clone)]
pub struct EmbedReport {
    pub documents: usize,
    pub chunks: usize,
}

/// Walk a collection root and index every file matching the mask.
///
/// Dot-directories and `node_modules` are skipped entirely. Unreadable files
/// are logged and counted as skipped, not fatal.
pub fn index_directory(
    store: &Store,
    root: &Path,
    collection: &str,
    mask: &str,
) -> Result<IndexReport> {
    if !root.exists() {
        return Err(Error::NotFound(format!("path {}", root.display())));
    }

    let matcher = GlobBuilder::new(mask)
        .literal_separator(true)
        .build()
        .map_err(|e| Error::InvalidInput(format!("bad mask '{mask}': {e}")))?
        .compile_matcher();

    let mut report = IndexReport::default();

    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        let name = entry.file_name().to_string_lossy();
        !name.starts_with('.') && name != "node_modules"
    });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "walk error");
                report.skipped += 1;
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let rel_path = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .into_owned();

        if !matcher.is_match(&rel_path) {
            report.skipped += 1;
            continue;
        }

        let content = match std::fs::read_to_string(entry.path()) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(path = %rel_path, error = %e, "failed to read file");
                report.skipped += 1;
                continue;
            }
        };

        let modified_at = entry
            .metadata()
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Utc>::from(t).to_rfc3339());

        let doc = DocumentInput {
            collection: collection.to_string(),
            path: rel_path.clone(),
            title: extract_title(&content, &rel_path),
            content,
            created_at: modified_at.clone(),
            modified_at,
        };

        if let Err(e) = store.index_document(&doc) {
            tracing::warn!(path = %rel_path, error = %e, "failed to index file");
            report.skipped += 1;
            continue;
        }

        report.indexed += 1;
        if report.indexed % 10 == 0 {
            tracing::info!(indexed = report.indexed, "indexing progress");
        }
    }

    store.touch_collection(collection)?;
    tracing::info!(
        collection,
        indexed = report.indexed,
        skipped = report.skipped,
        "indexing complete"
    );

    Ok(report)
}

/// Re-ingest every registered collection. With `pull`, runs `git pull` in
/// roots that are git repositories first (failures warn and continue).
pub fn update_collections(store: &Store, pull: bool) -> Result<IndexReport> {
    let mut total = IndexReport::default();

    for collection in store.list_collections()? {
        let root = crate::config::expand_tilde(&collection.path);
        if pull {
            git_pull(&root);
        }
        match index_directory(store, &root, &collection.name, &collection.mask) {
            Ok(report) => {
                total.indexed += report.indexed;
                total.skipped += report.skipped;
            }
            Err(e) => {
                tracing::warn!(collection = %collection.name, error = %e, "update failed");
            }
        }
    }

    Ok(total)
}

/// Chunk and embed every document that still lacks vectors.
///
/// Chunks embed with `is_query=false`, are unit-normalized, and land via the
/// transactional dual-table write with `seq` equal to the chunk index.
/// Progress is reported every ten documents and at completion.
pub fn embed_missing(
    store: &mut Store,
    embedder: &dyn Embedder,
    chunk_size: usize,
    chunk_overlap: usize,
    model_name: &str,
) -> Result<EmbedReport> {
    let pending = store.documents_needing_embedding()?;
    let total = pending.len();
    let mut report = EmbedReport::default();

    for (i, doc) in pending.iter().enumerate() {
        let chunks = chunk_document(&doc.content, chunk_size, chunk_overlap);

        for (seq, chunk) in chunks.iter().enumerate() {
            let mut embedding = embedder.embed(&chunk.text, false)?;
            l2_normalize(&mut embedding);
            store.store_embedding(&doc.hash, seq, chunk.pos, &embedding, model_name)?;
            report.chunks += 1;
        }

        report.documents += 1;
        if (i + 1) % 10 == 0 || i + 1 == total {
            tracing::info!(embedded = i + 1, total, "embedding progress");
        }
    }

    Ok(report)
}

/// First `# ` heading, else the file stem.
fn extract_title(content: &str, filename: &str) -> String {
    for line in content.lines() {
        let line = line.trim();
        if let Some(title) = line.strip_prefix("# ") {
            let title = title.trim();
            if !title.is_empty() {
                return title.to_string();
            }
        }
    }

    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

fn git_pull(root: &Path) {
    if !root.join(".git").exists() {
        return;
    }
    match std::process::Command::new("git")
        .arg("pull")
        .arg("--ff-only")
        .current_dir(root)
        .output()
    {
        Ok(output) if output.status.success() => {
            tracing::info!(path = %root.display(), "git pull ok");
        }
        Ok(output) => {
            tracing::warn!(
                path = %root.display(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "git pull failed"
            );
        }
        Err(e) => {
            tracing::warn!(path = %root.display(), error = %e, "git pull failed");
        }
    }
}
