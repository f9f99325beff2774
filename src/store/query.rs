//! Document read paths for the command surface: `ls`, `get`, `multi-get`.
//!
//! References come in three shapes: `mmq://collection/path` URIs (legacy
//! `qmd://` accepted), bare `collection/path`, and short doc-ids (`#abc123`).

use globset::GlobBuilder;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::{parse_doc_uri, short_docid, Store};
use crate::error::{Error, Result};

/// A row in `ls` output (no body).
#[derive(Debug, Clone, Serialize)]
pub struct DocumentListEntry {
    pub id: i64,
    pub docid: String,
    pub collection: String,
    pub path: String,
    pub title: String,
    pub hash: String,
    pub created_at: String,
    pub modified_at: String,
}

/// A full document as returned by `get` / `multi-get`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentDetail {
    pub id: i64,
    pub docid: String,
    pub collection: String,
    pub path: String,
    pub title: String,
    pub content: String,
    pub hash: String,
    pub created_at: String,
    pub modified_at: String,
}

const LIST_COLUMNS: &str =
    "id, collection, path, title, hash, created_at, modified_at";

fn list_entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentListEntry> {
    let hash: String = row.get(4)?;
    Ok(DocumentListEntry {
        id: row.get(0)?,
        docid: short_docid(&hash),
        collection: row.get(1)?,
        path: row.get(2)?,
        title: row.get(3)?,
        hash,
        created_at: row.get(5)?,
        modified_at: row.get(6)?,
    })
}

const DETAIL_COLUMNS: &str = "d.id, d.collection, d.path, d.title, d.hash, c.doc, \
                              d.created_at, d.modified_at";

fn detail_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentDetail> {
    let hash: String = row.get(4)?;
    Ok(DocumentDetail {
        id: row.get(0)?,
        docid: short_docid(&hash),
        collection: row.get(1)?,
        path: row.get(2)?,
        title: row.get(3)?,
        hash,
        content: row.get(5)?,
        created_at: row.get(6)?,
        modified_at: row.get(7)?,
    })
}

impl Store {
    /// List documents for `ls`.
    ///
    /// - no collection: every active document, grouped by collection
    /// - collection only: that collection's documents
    /// - collection + path: documents at or under the path (prefix match at
    ///   a segment boundary)
    pub fn list_documents_by_path(
        &self,
        collection: Option<&str>,
        path: Option<&str>,
    ) -> Result<Vec<DocumentListEntry>> {
        let entries = match (collection, path) {
            (None, _) => {
                let sql = format!(
                    "SELECT {LIST_COLUMNS} FROM documents WHERE active = 1 \
                     ORDER BY collection, path"
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt
                    .query_map([], list_entry_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            (Some(coll), None) => {
                let sql = format!(
                    "SELECT {LIST_COLUMNS} FROM documents \
                     WHERE active = 1 AND collection = ?1 ORDER BY path"
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt
                    .query_map(params![coll], list_entry_from_row)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
            (Some(coll), Some(p)) => {
                let prefix = p.trim_end_matches('/');
                let sql = format!(
                    "SELECT {LIST_COLUMNS} FROM documents \
                     WHERE active = 1 AND collection = ?1 \
                       AND (path = ?2 OR path LIKE ?3) \
                     ORDER BY path"
                );
                let mut stmt = self.conn().prepare(&sql)?;
                let rows = stmt
                    .query_map(
                        params![coll, prefix, format!("{prefix}/%")],
                        list_entry_from_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                rows
            }
        };

        Ok(entries)
    }

    /// Fetch one document by `collection/path` reference (URI forms accepted).
    pub fn get_document_by_path(&self, reference: &str) -> Result<DocumentDetail> {
        let (collection, path) = parse_doc_uri(reference);
        if collection.is_empty() {
            return Err(Error::InvalidInput(format!(
                "document reference needs a collection: {reference}"
            )));
        }

        let sql = format!(
            "SELECT {DETAIL_COLUMNS} FROM documents d \
             JOIN content c ON c.hash = d.hash \
             WHERE d.active = 1 AND d.collection = ?1 AND d.path = ?2"
        );
        let doc = self
            .conn()
            .query_row(&sql, params![collection, path], detail_from_row)
            .optional()?;

        doc.ok_or_else(|| Error::NotFound(format!("document {reference}")))
    }

    /// Fetch one document by short doc-id (`#abc123` or `abc123`, at least
    /// six hex characters). Colliding prefixes resolve to the most recently
    /// modified match.
    pub fn get_document_by_docid(&self, docid: &str) -> Result<DocumentDetail> {
        let prefix = docid.trim_start_matches('#');
        if prefix.len() < 6 {
            return Err(Error::InvalidInput(
                "docid must be at least 6 characters".into(),
            ));
        }

        let sql = format!(
            "SELECT {DETAIL_COLUMNS} FROM documents d \
             JOIN content c ON c.hash = d.hash \
             WHERE d.active = 1 AND d.hash LIKE ?1 \
             ORDER BY d.modified_at DESC, d.id DESC \
             LIMIT 1"
        );
        let doc = self
            .conn()
            .query_row(&sql, params![format!("{prefix}%")], detail_from_row)
            .optional()?;

        doc.ok_or_else(|| Error::NotFound(format!("document #{prefix}")))
    }

    /// Batch fetch for `multi-get`.
    ///
    /// The pattern is either a glob (`docs/**/*.md`), a comma-separated list
    /// of doc-ids/paths, or a single reference. Documents larger than
    /// `max_bytes` (when > 0) are silently skipped, as are list entries that
    /// do not resolve.
    pub fn get_multiple_documents(
        &self,
        pattern: &str,
        max_bytes: usize,
    ) -> Result<Vec<DocumentDetail>> {
        if pattern.contains('*') || pattern.contains('?') {
            self.get_documents_by_glob(pattern, max_bytes)
        } else if pattern.contains(',') {
            let mut docs = Vec::new();
            for item in pattern.split(',') {
                let item = item.trim();
                if item.is_empty() {
                    continue;
                }
                match self.get_single_reference(item, max_bytes) {
                    Ok(Some(doc)) => docs.push(doc),
                    Ok(None) => {} // over max_bytes
                    Err(e) => tracing::debug!(reference = item, error = %e, "multi-get skip"),
                }
            }
            Ok(docs)
        } else {
            match self.get_single_reference(pattern, max_bytes)? {
                Some(doc) => Ok(vec![doc]),
                None => Ok(Vec::new()),
            }
        }
    }

    fn get_documents_by_glob(
        &self,
        pattern: &str,
        max_bytes: usize,
    ) -> Result<Vec<DocumentDetail>> {
        let (collection, path_pattern) = parse_doc_uri(pattern);

        let matcher = GlobBuilder::new(if path_pattern.is_empty() {
            "**"
        } else {
            &path_pattern
        })
        .literal_separator(true)
        .build()
        .map_err(|e| Error::InvalidInput(format!("bad glob pattern: {e}")))?
        .compile_matcher();

        let (sql, coll_filter) = if collection.is_empty() || collection.contains('*') {
            (
                format!(
                    "SELECT {DETAIL_COLUMNS} FROM documents d \
                     JOIN content c ON c.hash = d.hash \
                     WHERE d.active = 1 ORDER BY d.collection, d.path"
                ),
                None,
            )
        } else {
            (
                format!(
                    "SELECT {DETAIL_COLUMNS} FROM documents d \
                     JOIN content c ON c.hash = d.hash \
                     WHERE d.active = 1 AND d.collection = ?1 ORDER BY d.path"
                ),
                Some(collection),
            )
        };

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = match &coll_filter {
            Some(coll) => stmt
                .query_map(params![coll], detail_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], detail_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        let docs = rows
            .into_iter()
            .filter(|d| matcher.is_match(&d.path))
            .filter(|d| max_bytes == 0 || d.content.len() <= max_bytes)
            .collect();

        Ok(docs)
    }

    /// Resolve one reference as a doc-id or a path. `Ok(None)` means the
    /// document exists but exceeds `max_bytes`.
    fn get_single_reference(
        &self,
        reference: &str,
        max_bytes: usize,
    ) -> Result<Option<DocumentDetail>> {
        let doc = if reference.starts_with('#') || !reference.contains('/') {
            self.get_document_by_docid(reference)?
        } else {
            self.get_document_by_path(reference)?
        };

        if max_bytes > 0 && doc.content.len() > max_bytes {
            return Ok(None);
        }
        Ok(Some(doc))
    }
}
