//! Persistent store — content-addressed documents, collections, contexts,
//! chunk embeddings, the LLM cache, and memory rows.
//!
//! [`Store`] owns the single process-wide database handle. Write paths that
//! span multiple tables (embedding writes, collection rename, cleanup) run in
//! transactions and therefore take `&mut self`; read paths take `&self`.

pub mod cache;
pub mod chunker;
pub mod cleanup;
pub mod collection;
pub mod context;
pub mod document;
pub mod embedding;
pub mod memory;
pub mod query;
pub mod search;
pub mod vsearch;

use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// The document URI scheme (`mmq://collection/path`).
pub const URI_SCHEME: &str = "mmq://";
/// Legacy scheme accepted as a synonym.
pub const LEGACY_URI_SCHEME: &str = "qmd://";

/// Single handle over the mmq database.
pub struct Store {
    conn: Connection,
    db_path: Option<PathBuf>,
}

impl Store {
    /// Open (or create) the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = crate::db::open_database(path).map_err(|e| Error::Schema(e.to_string()))?;
        Ok(Self {
            conn,
            db_path: Some(path.to_path_buf()),
        })
    }

    /// Open an in-memory store (tests, throwaway sessions).
    pub fn open_in_memory() -> Result<Self> {
        let conn =
            crate::db::open_memory_database().map_err(|e| Error::Schema(e.to_string()))?;
        Ok(Self {
            conn,
            db_path: None,
        })
    }

    /// The on-disk database path, if any.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Access the underlying connection for advanced queries.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

/// Where a search result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    Fts,
    Vector,
    Hybrid,
    Rerank,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fts => "fts",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
            Self::Rerank => "rerank",
        }
    }
}

impl std::fmt::Display for SourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document as the store sees it.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: i64,
    pub collection: String,
    pub path: String,
    pub title: String,
    pub content: String,
    pub hash: String,
    pub created_at: String,
    pub modified_at: String,
}

/// A single search hit.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub score: f64,
    pub title: String,
    pub content: String,
    pub snippet: String,
    pub source: SourceTag,
    pub collection: String,
    pub path: String,
    pub modified_at: String,
}

/// Index status summary.
#[derive(Debug, Clone, Serialize)]
pub struct Status {
    pub total_documents: i64,
    pub needs_embedding: i64,
    pub collections: Vec<String>,
    pub db_path: String,
}

/// Hex SHA-256 of a document body — the content identity.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short doc-id: `#` plus the first six hex characters of the content hash.
pub fn short_docid(hash: &str) -> String {
    if hash.len() >= 6 {
        format!("#{}", &hash[..6])
    } else {
        format!("#{hash}")
    }
}

/// Serialize an embedding as packed little-endian f32 — the on-disk contract
/// shared by `content_vectors`, `vectors_vec`, and memory embedding blobs.
pub fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for v in embedding {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Deserialize a packed little-endian f32 blob. Returns None if the blob
/// length is not a multiple of four.
pub fn bytes_to_embedding(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}

/// Cosine distance between two vectors. Mismatched or zero vectors are
/// maximally distant.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 1.0;
    }
    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for i in 0..a.len() {
        dot += a[i] as f64 * b[i] as f64;
        norm_a += a[i] as f64 * a[i] as f64;
        norm_b += b[i] as f64 * b[i] as f64;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Split a document reference into `(collection, path)`.
///
/// Accepts `mmq://collection/path`, the legacy `qmd://collection/path`, and
/// bare `collection/path`. A reference without a `/` yields an empty
/// collection.
pub fn parse_doc_uri(reference: &str) -> (String, String) {
    let stripped = reference
        .strip_prefix(URI_SCHEME)
        .or_else(|| reference.strip_prefix(LEGACY_URI_SCHEME))
        .unwrap_or(reference);

    match stripped.split_once('/') {
        Some((collection, path)) => (collection.to_string(), path.to_string()),
        None => (String::new(), stripped.to_string()),
    }
}

/// Current instant formatted the way every table stores timestamps.
pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
