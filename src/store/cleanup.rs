//! Maintenance pass: purge the cache, physically remove soft-deleted
//! documents, collect orphaned content and vectors, and compact the file.
//!
//! Content rows are shared, so a content row is an orphan only when no
//! document (active or not) references its hash. Vector rows orphan once
//! their content row is gone, and must leave both `content_vectors` and the
//! ANN table.

use rusqlite::params;
use serde::Serialize;

use super::Store;
use crate::error::Result;

#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub cache_deleted: usize,
    pub inactive_docs_deleted: usize,
    pub orphaned_content_deleted: usize,
    pub orphaned_vectors_deleted: usize,
    pub expired_memories_deleted: usize,
    pub vacuumed: bool,
}

impl Store {
    /// Run the full cleanup pass.
    pub fn cleanup(&mut self) -> Result<CleanupReport> {
        let cache_deleted = self.clear_cache()?;

        let inactive_docs_deleted = self
            .conn()
            .execute("DELETE FROM documents WHERE active = 0", [])?;

        let orphaned_content_deleted = self.conn().execute(
            "DELETE FROM content WHERE hash NOT IN (SELECT DISTINCT hash FROM documents)",
            [],
        )?;

        let orphaned_vectors_deleted = self.cleanup_orphaned_vectors()?;

        let expired_memories_deleted = self.delete_expired_memories()?;

        self.conn().execute("VACUUM", [])?;

        let report = CleanupReport {
            cache_deleted,
            inactive_docs_deleted,
            orphaned_content_deleted,
            orphaned_vectors_deleted,
            expired_memories_deleted,
            vacuumed: true,
        };
        tracing::info!(
            cache = report.cache_deleted,
            docs = report.inactive_docs_deleted,
            content = report.orphaned_content_deleted,
            vectors = report.orphaned_vectors_deleted,
            memories = report.expired_memories_deleted,
            "cleanup complete"
        );
        Ok(report)
    }

    /// Remove embedding rows whose hash no longer exists in `content`, from
    /// both the metadata table and the ANN table.
    fn cleanup_orphaned_vectors(&mut self) -> Result<usize> {
        let orphan_hashes: Vec<String> = {
            let mut stmt = self.conn().prepare(
                "SELECT DISTINCT hash FROM content_vectors \
                 WHERE hash NOT IN (SELECT hash FROM content)",
            )?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        if orphan_hashes.is_empty() {
            return Ok(0);
        }

        let has_vec_table = self.vector_dimensions()?.is_some();
        let tx = self.conn_mut().transaction()?;
        let mut deleted = 0usize;
        for hash in &orphan_hashes {
            deleted += tx.execute(
                "DELETE FROM content_vectors WHERE hash = ?1",
                params![hash],
            )?;
            if has_vec_table {
                tx.execute(
                    "DELETE FROM vectors_vec WHERE hash_seq LIKE ?1",
                    params![format!("{hash}_%")],
                )?;
            }
        }
        tx.commit()?;

        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::document::DocumentInput;

    fn test_store() -> Store {
        Store::open_in_memory().unwrap()
    }

    fn index(store: &Store, path: &str, body: &str) -> String {
        store
            .index_document(&DocumentInput {
                collection: "notes".into(),
                path: path.into(),
                title: path.into(),
                content: body.into(),
                created_at: None,
                modified_at: None,
            })
            .unwrap()
    }

    fn unit_vec(spike: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; 8];
        v[spike] = 1.0;
        v
    }

    #[test]
    fn cleanup_on_fresh_store_is_empty() {
        let mut store = test_store();
        let report = store.cleanup().unwrap();
        assert_eq!(report.cache_deleted, 0);
        assert_eq!(report.inactive_docs_deleted, 0);
        assert_eq!(report.orphaned_content_deleted, 0);
        assert_eq!(report.orphaned_vectors_deleted, 0);
        assert!(report.vacuumed);
    }

    #[test]
    fn cleanup_removes_inactive_then_orphans() {
        let mut store = test_store();
        let hash = index(&store, "a.md", "doomed body");
        store.store_embedding(&hash, 0, 0, &unit_vec(0), "m").unwrap();
        store.delete_document("a.md").unwrap();

        let report = store.cleanup().unwrap();
        assert_eq!(report.inactive_docs_deleted, 1);
        assert_eq!(report.orphaned_content_deleted, 1);
        assert_eq!(report.orphaned_vectors_deleted, 1);

        let content_rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM content", [], |r| r.get(0))
            .unwrap();
        let vec_rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM vectors_vec", [], |r| r.get(0))
            .unwrap();
        assert_eq!(content_rows, 0);
        assert_eq!(vec_rows, 0);
    }

    #[test]
    fn shared_content_survives_while_referenced() {
        let mut store = test_store();
        index(&store, "a.md", "shared body");
        index(&store, "b.md", "shared body");
        store.delete_document("a.md").unwrap();

        let report = store.cleanup().unwrap();
        assert_eq!(report.inactive_docs_deleted, 1);
        // b.md still references the content row
        assert_eq!(report.orphaned_content_deleted, 0);
        assert!(store.get_document_by_path("notes/b.md").is_ok());
    }

    #[test]
    fn cleanup_clears_cache_and_expired_memories() {
        let mut store = test_store();
        store.set_cached_result("k", "v").unwrap();
        store
            .insert_memory(
                "episodic",
                "expired note",
                &serde_json::json!({}),
                &[],
                chrono::Utc::now() - chrono::Duration::days(2),
                Some(chrono::Utc::now() - chrono::Duration::days(1)),
                0.5,
                &unit_vec(0),
            )
            .unwrap();

        let report = store.cleanup().unwrap();
        assert_eq!(report.cache_deleted, 1);
        assert_eq!(report.expired_memories_deleted, 1);
        assert_eq!(store.cache_stats().unwrap(), 0);
    }
}
