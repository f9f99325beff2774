//! Chunk embedding storage.
//!
//! Embeddings live in two places that must stay in step: `content_vectors`
//! (metadata + blob, keyed `(hash, seq)`) and the `vectors_vec` ANN virtual
//! table (keyed `hash_seq`). Every write and delete touches both inside one
//! transaction, so readers observe both rows or neither.
//!
//! The ANN table is created lazily by the first write and sized to that
//! embedding's dimensionality; later writes with a different dimension fail.

use rusqlite::{params, OptionalExtension};

use super::{bytes_to_embedding, embedding_to_bytes, now_rfc3339, Store};
use crate::error::{Error, Result};

/// A document body awaiting embedding.
#[derive(Debug, Clone)]
pub struct PendingDocument {
    pub hash: String,
    pub content: String,
}

impl Store {
    /// Active documents whose hash has no `seq=0` embedding row yet, newest
    /// first. One entry per distinct hash.
    pub fn documents_needing_embedding(&self) -> Result<Vec<PendingDocument>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT d.hash, c.doc \
             FROM documents d \
             JOIN content c ON c.hash = d.hash \
             LEFT JOIN content_vectors v ON d.hash = v.hash AND v.seq = 0 \
             WHERE d.active = 1 AND v.hash IS NULL \
             ORDER BY d.modified_at DESC",
        )?;

        let docs = stmt
            .query_map([], |row| {
                Ok(PendingDocument {
                    hash: row.get(0)?,
                    content: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(docs)
    }

    /// Dimensionality of the ANN table, if it has been created.
    pub fn vector_dimensions(&self) -> Result<Option<usize>> {
        let dim: Option<String> = self
            .conn()
            .query_row(
                "SELECT value FROM schema_meta WHERE key = 'vector_dimensions'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(dim.and_then(|d| d.parse().ok()))
    }

    /// Create the ANN table on first use, sized to `dimensions` with cosine
    /// distance. A mismatch against an existing table is fatal for the write.
    fn ensure_vector_table(&self, dimensions: usize) -> Result<()> {
        if let Some(existing) = self.vector_dimensions()? {
            if existing != dimensions {
                return Err(Error::DimensionMismatch {
                    expected: existing,
                    actual: dimensions,
                });
            }
            return Ok(());
        }

        self.conn().execute_batch(&format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vectors_vec USING vec0(\
             hash_seq TEXT PRIMARY KEY, embedding float[{dimensions}] distance_metric=cosine)"
        ))?;
        self.conn().execute(
            "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('vector_dimensions', ?1)",
            params![dimensions.to_string()],
        )?;

        tracing::info!(dimensions, "vector table created");
        Ok(())
    }

    /// Store one chunk embedding: upsert the metadata row and the ANN row in
    /// a single transaction.
    pub fn store_embedding(
        &mut self,
        hash: &str,
        seq: usize,
        pos: usize,
        embedding: &[f32],
        model: &str,
    ) -> Result<()> {
        if embedding.is_empty() {
            return Err(Error::InvalidInput("empty embedding".into()));
        }
        self.ensure_vector_table(embedding.len())?;

        let blob = embedding_to_bytes(embedding);
        let hash_seq = format!("{hash}_{seq}");
        let now = now_rfc3339();

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "INSERT OR REPLACE INTO content_vectors (hash, seq, pos, embedding, model, embedded_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![hash, seq as i64, pos as i64, blob, model, now],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO vectors_vec (hash_seq, embedding) VALUES (?1, ?2)",
            params![hash_seq, blob],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Fetch one chunk embedding.
    pub fn get_embedding(&self, hash: &str, seq: usize) -> Result<Vec<f32>> {
        let blob: Option<Vec<u8>> = self
            .conn()
            .query_row(
                "SELECT embedding FROM content_vectors WHERE hash = ?1 AND seq = ?2",
                params![hash, seq as i64],
                |row| row.get(0),
            )
            .optional()?;

        let blob = blob.ok_or_else(|| Error::NotFound(format!("embedding {hash}:{seq}")))?;
        bytes_to_embedding(&blob)
            .ok_or_else(|| Error::Schema(format!("malformed embedding blob for {hash}:{seq}")))
    }

    /// All chunk embeddings for a hash, in sequence order.
    pub fn get_all_embeddings(&self, hash: &str) -> Result<Vec<Vec<f32>>> {
        let mut stmt = self.conn().prepare(
            "SELECT embedding FROM content_vectors WHERE hash = ?1 ORDER BY seq",
        )?;
        let blobs = stmt
            .query_map(params![hash], |row| row.get::<_, Vec<u8>>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        blobs
            .iter()
            .map(|blob| {
                bytes_to_embedding(blob)
                    .ok_or_else(|| Error::Schema(format!("malformed embedding blob for {hash}")))
            })
            .collect()
    }

    /// Delete every embedding for a hash from both tables, atomically.
    pub fn delete_embeddings(&mut self, hash: &str) -> Result<()> {
        let has_vec_table = self.vector_dimensions()?.is_some();

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "DELETE FROM content_vectors WHERE hash = ?1",
            params![hash],
        )?;
        if has_vec_table {
            tx.execute(
                "DELETE FROM vectors_vec WHERE hash_seq LIKE ?1",
                params![format!("{hash}_%")],
            )?;
        }
        tx.commit()?;

        Ok(())
    }

    /// Number of distinct hashes with at least one embedding.
    pub fn count_embedded_documents(&self) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(DISTINCT hash) FROM content_vectors",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
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

    fn unit_vec(dim: usize, spike: usize) -> Vec<f32> {
        let mut v = vec![0.0f32; dim];
        v[spike] = 1.0;
        v
    }

    #[test]
    fn needing_embedding_shrinks_after_store() {
        let mut store = test_store();
        let hash = index(&store, "a.md", "alpha body");
        index(&store, "b.md", "beta body");

        assert_eq!(store.documents_needing_embedding().unwrap().len(), 2);

        store
            .store_embedding(&hash, 0, 0, &unit_vec(8, 0), "test-model")
            .unwrap();

        let pending = store.documents_needing_embedding().unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].hash, hash);
    }

    #[test]
    fn store_writes_both_tables() {
        let mut store = test_store();
        let hash = index(&store, "a.md", "alpha body");

        store
            .store_embedding(&hash, 0, 0, &unit_vec(8, 1), "test-model")
            .unwrap();

        let meta_rows: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM content_vectors WHERE hash = ?1",
                params![hash],
                |r| r.get(0),
            )
            .unwrap();
        let ann_rows: i64 = store
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM vectors_vec WHERE hash_seq = ?1",
                params![format!("{hash}_0")],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(meta_rows, 1);
        assert_eq!(ann_rows, 1);
    }

    #[test]
    fn re_store_replaces_rows() {
        let mut store = test_store();
        let hash = index(&store, "a.md", "alpha body");

        store
            .store_embedding(&hash, 0, 0, &unit_vec(8, 0), "m")
            .unwrap();
        store
            .store_embedding(&hash, 0, 0, &unit_vec(8, 2), "m")
            .unwrap();

        let fetched = store.get_embedding(&hash, 0).unwrap();
        assert_eq!(fetched, unit_vec(8, 2));

        let rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM content_vectors", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn dimension_mismatch_is_fatal() {
        let mut store = test_store();
        let hash = index(&store, "a.md", "alpha body");

        store
            .store_embedding(&hash, 0, 0, &unit_vec(8, 0), "m")
            .unwrap();

        let err = store
            .store_embedding(&hash, 1, 100, &unit_vec(16, 0), "m")
            .unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 8, actual: 16 }));
    }

    #[test]
    fn delete_clears_both_tables() {
        let mut store = test_store();
        let hash = index(&store, "a.md", "alpha body");

        store
            .store_embedding(&hash, 0, 0, &unit_vec(8, 0), "m")
            .unwrap();
        store
            .store_embedding(&hash, 1, 50, &unit_vec(8, 1), "m")
            .unwrap();

        store.delete_embeddings(&hash).unwrap();

        let meta_rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM content_vectors", [], |r| r.get(0))
            .unwrap();
        let ann_rows: i64 = store
            .conn()
            .query_row("SELECT COUNT(*) FROM vectors_vec", [], |r| r.get(0))
            .unwrap();
        assert_eq!(meta_rows, 0);
        assert_eq!(ann_rows, 0);
    }

    #[test]
    fn get_all_embeddings_in_seq_order() {
        let mut store = test_store();
        let hash = index(&store, "a.md", "alpha body");

        store
            .store_embedding(&hash, 1, 50, &unit_vec(8, 1), "m")
            .unwrap();
        store
            .store_embedding(&hash, 0, 0, &unit_vec(8, 0), "m")
            .unwrap();

        let all = store.get_all_embeddings(&hash).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], unit_vec(8, 0));
        assert_eq!(all[1], unit_vec(8, 1));
    }

    #[test]
    fn count_embedded_documents_counts_hashes() {
        let mut store = test_store();
        let h1 = index(&store, "a.md", "alpha body");
        let h2 = index(&store, "b.md", "beta body");

        store.store_embedding(&h1, 0, 0, &unit_vec(8, 0), "m").unwrap();
        store.store_embedding(&h1, 1, 9, &unit_vec(8, 1), "m").unwrap();
        store.store_embedding(&h2, 0, 0, &unit_vec(8, 2), "m").unwrap();

        assert_eq!(store.count_embedded_documents().unwrap(), 2);
    }

    #[test]
    fn missing_embedding_is_not_found() {
        let store = test_store();
        assert!(matches!(
            store.get_embedding("nohash", 0),
            Err(Error::NotFound(_))
        ));
    }
}
