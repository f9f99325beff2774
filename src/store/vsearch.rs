//! Document-level vector search (`vsearch`).
//!
//! Two-step query: the ANN virtual table answers k-nearest `hash_seq` keys,
//! then the referenced documents are hydrated and deduplicated to one row
//! per path. Before any embedding has been stored the ANN table does not
//! exist, which reads as an empty result, not an error.

use std::collections::HashMap;

use rusqlite::params;

use super::search::extract_snippet;
use super::{embedding_to_bytes, SearchResult, SourceTag, Store};
use crate::error::Result;

const SNIPPET_LEN: usize = 300;

impl Store {
    /// Nearest documents to a query vector. Over-fetches `3 * limit`
    /// neighbors to survive the per-document dedup and collection filter.
    pub fn search_documents(
        &self,
        query: &str,
        query_embedding: &[f32],
        limit: usize,
        collection: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        if self.vector_dimensions()?.is_none() {
            return Ok(Vec::new());
        }

        let blob = embedding_to_bytes(query_embedding);
        let k = (limit * 3).max(1);

        // Step 1: ANN neighbors
        let mut distance_map: HashMap<String, f64> = HashMap::new();
        {
            let mut stmt = self.conn().prepare(
                "SELECT hash_seq, distance FROM vectors_vec \
                 WHERE embedding MATCH ?1 AND k = ?2",
            )?;
            let rows = stmt.query_map(params![blob, k as i64], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?;
            for row in rows {
                let (hash_seq, distance) = row?;
                distance_map.insert(hash_seq, distance);
            }
        }

        if distance_map.is_empty() {
            return Ok(Vec::new());
        }

        // Step 2: hydrate the referenced documents
        let placeholders = vec!["?"; distance_map.len()].join(", ");
        let mut sql = format!(
            "SELECT cv.hash || '_' || cv.seq AS hash_seq, cv.hash, \
                    d.collection, d.path, d.title, d.modified_at, c.doc \
             FROM content_vectors cv \
             JOIN documents d ON d.hash = cv.hash AND d.active = 1 \
             JOIN content c ON c.hash = d.hash \
             WHERE cv.hash || '_' || cv.seq IN ({placeholders})"
        );

        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = distance_map
            .keys()
            .map(|key| Box::new(key.clone()) as Box<dyn rusqlite::types::ToSql>)
            .collect();
        if let Some(coll) = collection {
            sql.push_str(" AND d.collection = ?");
            args.push(Box::new(coll.to_string()));
        }

        struct DocHit {
            hash: String,
            collection: String,
            path: String,
            title: String,
            modified_at: String,
            body: String,
            distance: f64,
        }

        let mut stmt = self.conn().prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            args.iter().map(|b| b.as_ref()).collect();

        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Dedup to one entry per document path, keeping the minimum distance
        let mut best: HashMap<String, DocHit> = HashMap::new();
        for (hash_seq, hash, coll, path, title, modified_at, body) in rows {
            let Some(&distance) = distance_map.get(&hash_seq) else {
                continue;
            };
            let filepath = format!("{coll}/{path}");
            match best.get(&filepath) {
                Some(existing) if existing.distance <= distance => {}
                _ => {
                    best.insert(
                        filepath,
                        DocHit {
                            hash,
                            collection: coll,
                            path,
                            title,
                            modified_at,
                            body,
                            distance,
                        },
                    );
                }
            }
        }

        let mut hits: Vec<DocHit> = best.into_values().collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        Ok(hits
            .into_iter()
            .map(|h| SearchResult {
                id: h.hash,
                score: 1.0 - h.distance,
                title: h.title,
                snippet: extract_snippet(&h.body, query, SNIPPET_LEN),
                content: h.body,
                source: SourceTag::Vector,
                collection: h.collection,
                path: h.path,
                modified_at: h.modified_at,
            })
            .collect())
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
    fn empty_before_any_embedding() {
        let store = test_store();
        index(&store, "a.md", "body without vectors");
        let results = store
            .search_documents("q", &unit_vec(0), 5, None)
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn finds_nearest_document() {
        let mut store = test_store();
        let h1 = index(&store, "near.md", "near body");
        let h2 = index(&store, "far.md", "far body");

        store.store_embedding(&h1, 0, 0, &unit_vec(0), "m").unwrap();
        store.store_embedding(&h2, 0, 0, &unit_vec(4), "m").unwrap();

        let results = store
            .search_documents("q", &unit_vec(0), 5, None)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].path, "near.md");
        assert!(results[0].score > results[1].score);
        assert_eq!(results[0].source, SourceTag::Vector);
    }

    #[test]
    fn dedups_multi_chunk_documents() {
        let mut store = test_store();
        let hash = index(&store, "multi.md", "a body long enough for two chunks");

        store.store_embedding(&hash, 0, 0, &unit_vec(0), "m").unwrap();
        store.store_embedding(&hash, 1, 16, &unit_vec(1), "m").unwrap();

        let results = store
            .search_documents("q", &unit_vec(0), 5, None)
            .unwrap();
        assert_eq!(results.len(), 1, "expect one hit per document");
        // best chunk wins: distance 0 -> score 1
        assert!((results[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn respects_collection_filter_and_limit() {
        let mut store = test_store();
        for i in 0..4 {
            let h = index(&store, &format!("d{i}.md"), &format!("body {i}"));
            store.store_embedding(&h, 0, 0, &unit_vec(i), "m").unwrap();
        }

        let results = store
            .search_documents("q", &unit_vec(0), 2, None)
            .unwrap();
        assert_eq!(results.len(), 2);

        let results = store
            .search_documents("q", &unit_vec(0), 5, Some("other"))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn hides_inactive_documents() {
        let mut store = test_store();
        let h = index(&store, "gone.md", "soon deleted");
        store.store_embedding(&h, 0, 0, &unit_vec(0), "m").unwrap();
        store.delete_document("gone.md").unwrap();

        let results = store
            .search_documents("q", &unit_vec(0), 5, None)
            .unwrap();
        assert!(results.is_empty());
    }
}
