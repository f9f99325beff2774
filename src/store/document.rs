//! Document write path — content-addressed ingest and lifecycle.
//!
//! Bodies are deduplicated in the `content` table by SHA-256; document rows
//! carry metadata and reference content by hash. Deleting a document only
//! flips its `active` flag; physical removal happens in the cleanup pass.

use rusqlite::{params, OptionalExtension};

use super::{compute_hash, now_rfc3339, Document, Status, Store};
use crate::error::{Error, Result};

/// Input for indexing a single document.
#[derive(Debug, Clone)]
pub struct DocumentInput {
    pub collection: String,
    pub path: String,
    pub title: String,
    pub content: String,
    /// RFC 3339; defaults to now when empty.
    pub created_at: Option<String>,
    pub modified_at: Option<String>,
}

impl Store {
    /// Index one document: insert the body into the content store if it is
    /// new, then upsert the document row. Re-indexing an unchanged body is a
    /// no-op at the content level.
    pub fn index_document(&self, doc: &DocumentInput) -> Result<String> {
        let hash = compute_hash(&doc.content);
        let now = now_rfc3339();

        self.conn().execute(
            "INSERT OR IGNORE INTO content (hash, doc, created_at) VALUES (?1, ?2, ?3)",
            params![hash, doc.content, now],
        )?;

        let created_at = doc.created_at.clone().unwrap_or_else(|| now.clone());
        let modified_at = doc.modified_at.clone().unwrap_or_else(|| now.clone());

        self.conn().execute(
            "INSERT INTO documents (collection, path, title, hash, created_at, modified_at, active) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1) \
             ON CONFLICT(collection, path) DO UPDATE SET \
                 title = excluded.title, \
                 hash = excluded.hash, \
                 modified_at = excluded.modified_at, \
                 active = 1",
            params![doc.collection, doc.path, doc.title, hash, created_at, modified_at],
        )?;

        Ok(hash)
    }

    /// Fetch an active document by numeric id, content hash, or exact path.
    pub fn get_document(&self, id: &str) -> Result<Document> {
        let row = self
            .conn()
            .query_row(
                "SELECT d.id, d.collection, d.path, d.title, c.doc, d.hash, d.created_at, d.modified_at \
                 FROM documents d \
                 JOIN content c ON c.hash = d.hash \
                 WHERE (CAST(d.id AS TEXT) = ?1 OR d.hash = ?1 OR d.path = ?1) AND d.active = 1 \
                 LIMIT 1",
                params![id],
                |row| {
                    Ok(Document {
                        id: row.get(0)?,
                        collection: row.get(1)?,
                        path: row.get(2)?,
                        title: row.get(3)?,
                        content: row.get(4)?,
                        hash: row.get(5)?,
                        created_at: row.get(6)?,
                        modified_at: row.get(7)?,
                    })
                },
            )
            .optional()?;

        row.ok_or_else(|| Error::NotFound(format!("document {id}")))
    }

    /// Soft-delete a document by id, hash, or path. The row stays until the
    /// cleanup pass; the FTS trigger removes its projection immediately.
    pub fn delete_document(&self, id: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE documents SET active = 0 \
             WHERE (CAST(id AS TEXT) = ?1 OR hash = ?1 OR path = ?1) AND active = 1",
            params![id],
        )?;

        if affected == 0 {
            return Err(Error::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    /// List active documents, newest first, without bodies.
    pub fn list_documents(
        &self,
        collection: Option<&str>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Document>> {
        let mut sql = String::from(
            "SELECT d.id, d.collection, d.path, d.title, d.hash, d.created_at, d.modified_at \
             FROM documents d WHERE d.active = 1",
        );
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(coll) = collection {
            sql.push_str(" AND d.collection = ?");
            args.push(Box::new(coll.to_string()));
        }
        sql.push_str(" ORDER BY d.modified_at DESC LIMIT ? OFFSET ?");
        args.push(Box::new(limit as i64));
        args.push(Box::new(offset as i64));

        let mut stmt = self.conn().prepare(&sql)?;
        let params: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|b| b.as_ref()).collect();
        let docs = stmt
            .query_map(params.as_slice(), |row| {
                Ok(Document {
                    id: row.get(0)?,
                    collection: row.get(1)?,
                    path: row.get(2)?,
                    title: row.get(3)?,
                    content: String::new(),
                    hash: row.get(4)?,
                    created_at: row.get(5)?,
                    modified_at: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(docs)
    }

    /// Index status: document count, how many still need an embedding, and
    /// the collections seen in the registry.
    pub fn status(&self) -> Result<Status> {
        let total_documents: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM documents WHERE active = 1",
            [],
            |row| row.get(0),
        )?;

        // A document needs embedding when its hash has no seq=0 vector row
        let needs_embedding: i64 = self.conn().query_row(
            "SELECT COUNT(DISTINCT d.hash) \
             FROM documents d \
             LEFT JOIN content_vectors v ON d.hash = v.hash AND v.seq = 0 \
             WHERE d.active = 1 AND v.hash IS NULL",
            [],
            |row| row.get(0),
        )?;

        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT collection FROM documents WHERE active = 1 ORDER BY collection",
        )?;
        let collections = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(Status {
            total_documents,
            needs_embedding,
            collections,
            db_path: self
                .db_path()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| ":memory:".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn doc(collection: &str, path: &str, body: &str) -> DocumentInput {
        DocumentInput {
            collection: collection.into(),
            path: path.into(),
            title: path.trim_end_matches(".md").into(),
            content: body.into(),
            created_at: None,
            modified_at: None,
        }
    }

    #[test]
    fn index_and_get_round_trip() {
        let store = test_store();
        let hash = store
            .index_document(&doc("notes", "a.md", "Alpha body"))
            .unwrap();

        let fetched = store.get_document("a.md").unwrap();
        assert_eq!(fetched.collection, "notes");
        assert_eq!(fetched.content, "Alpha body");
        assert_eq!(fetched.hash, hash);
    }

    #[test]
    fn identical_bodies_share_one_content_row() {
        let store = test_store();
        let h1 = store
            .index_document(&doc("notes", "a.md", "same body"))
            .unwrap();
        let h2 = store
            .index_document(&doc("notes", "b.md", "same body"))
            .unwrap();
        assert_eq!(h1, h2);

        let content_rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM content", [], |r| r.get(0))
            .unwrap();
        assert_eq!(content_rows, 1);

        let doc_rows: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE hash = ?1",
                params![h1],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(doc_rows, 2);
    }

    #[test]
    fn reindex_updates_hash_and_title() {
        let store = test_store();
        store
            .index_document(&doc("notes", "a.md", "first version"))
            .unwrap();
        let h2 = store
            .index_document(&doc("notes", "a.md", "second version"))
            .unwrap();

        let fetched = store.get_document("a.md").unwrap();
        assert_eq!(fetched.hash, h2);
        assert_eq!(fetched.content, "second version");

        // still one document row for the path
        let count: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = 'notes' AND path = 'a.md'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn delete_is_soft_and_hides_document() {
        let store = test_store();
        store
            .index_document(&doc("notes", "a.md", "to be deleted"))
            .unwrap();

        store.delete_document("a.md").unwrap();

        assert!(matches!(
            store.get_document("a.md"),
            Err(Error::NotFound(_))
        ));

        // the row is still physically present
        let active: i64 = store
            .conn()
            .query_row(
                "SELECT active FROM documents WHERE path = 'a.md'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(active, 0);
    }

    #[test]
    fn delete_missing_is_not_found() {
        let store = test_store();
        assert!(matches!(
            store.delete_document("ghost.md"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn reindex_after_delete_reactivates() {
        let store = test_store();
        store.index_document(&doc("notes", "a.md", "body")).unwrap();
        store.delete_document("a.md").unwrap();
        store.index_document(&doc("notes", "a.md", "body")).unwrap();

        assert!(store.get_document("a.md").is_ok());
    }

    #[test]
    fn status_counts_documents_and_needs_embedding() {
        let store = test_store();
        store.index_document(&doc("notes", "a.md", "one")).unwrap();
        store.index_document(&doc("wiki", "b.md", "two")).unwrap();

        let status = store.status().unwrap();
        assert_eq!(status.total_documents, 2);
        assert_eq!(status.needs_embedding, 2);
        assert_eq!(status.collections, vec!["notes", "wiki"]);
    }

    #[test]
    fn list_documents_filters_by_collection() {
        let store = test_store();
        store.index_document(&doc("notes", "a.md", "one")).unwrap();
        store.index_document(&doc("wiki", "b.md", "two")).unwrap();

        let all = store.list_documents(None, 100, 0).unwrap();
        assert_eq!(all.len(), 2);

        let notes = store.list_documents(Some("notes"), 100, 0).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].path, "a.md");
    }
}
