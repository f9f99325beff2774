//! Search primitives: BM25 full-text search, chunk-level dense search, and
//! reciprocal rank fusion.
//!
//! BM25 scores come back from FTS5 as non-positive numbers (more negative =
//! more relevant); they are reported normalized into `(0, 1]`. Dense scores
//! are `1 - cosine_distance`. Fusion operates on ranks, so the two scales
//! never need to be reconciled.

use std::collections::HashMap;

use super::{bytes_to_embedding, cosine_distance, SearchResult, SourceTag, Store};
use crate::error::Result;

/// Snippet budget in characters.
const SNIPPET_LEN: usize = 300;

/// Build an FTS5 MATCH expression from a user query: split on whitespace,
/// strip non-alphanumeric rims, quote each token as a prefix match, join with
/// AND. Returns an empty string when nothing survives.
pub fn build_fts5_query(query: &str) -> String {
    let terms: Vec<String> = query
        .split_whitespace()
        .filter_map(|word| {
            let cleaned =
                word.trim_matches(|c: char| !c.is_alphanumeric());
            if cleaned.is_empty() {
                None
            } else {
                Some(format!("\"{cleaned}\"*"))
            }
        })
        .collect();

    terms.join(" AND ")
}

/// Map a raw BM25 score (non-positive) into `(0, 1]`: `1 / (1 + |s|)`.
pub fn normalize_bm25_score(bm25: f64) -> f64 {
    let abs = (-bm25).max(0.0);
    1.0 / (1.0 + abs)
}

/// Extract a snippet of up to `max_len` characters around the first
/// case-insensitive occurrence of the query, with ellipses marking
/// truncation. Falls back to the body prefix when the query is absent.
pub fn extract_snippet(content: &str, query: &str, max_len: usize) -> String {
    if content.len() <= max_len {
        return content.to_string();
    }

    let lower_content = content.to_lowercase();
    let lower_query = query.to_lowercase();

    let idx = match lower_content.find(&lower_query) {
        Some(i) => floor_boundary(content, i.min(content.len())),
        None => {
            let end = floor_boundary(content, max_len);
            return format!("{}...", &content[..end]);
        }
    };

    let start = floor_boundary(content, idx.saturating_sub(max_len / 3));
    let end = floor_boundary(content, (idx + max_len * 2 / 3).min(content.len()));

    let mut snippet = content[start..end].to_string();
    if start > 0 {
        snippet = format!("...{snippet}");
    }
    if end < content.len() {
        snippet.push_str("...");
    }
    snippet
}

fn floor_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

impl Store {
    /// BM25 full-text search over active documents. Field weights are
    /// filepath 10.0, title 1.0, body 1.0.
    pub fn search_fts(
        &self,
        query: &str,
        limit: usize,
        collection: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let fts_query = build_fts5_query(query);
        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = String::from(
            "SELECT d.hash, d.title, d.collection, d.path, c.doc, d.modified_at, \
                    bm25(documents_fts, 10.0, 1.0, 1.0) AS bm25_score \
             FROM documents_fts f \
             JOIN documents d ON d.id = f.rowid \
             JOIN content c ON c.hash = d.hash \
             WHERE documents_fts MATCH ? AND d.active = 1",
        );
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![Box::new(fts_query)];
        if let Some(coll) = collection {
            sql.push_str(" AND d.collection = ?");
            args.push(Box::new(coll.to_string()));
        }
        sql.push_str(" ORDER BY bm25_score ASC LIMIT ?");
        args.push(Box::new(limit as i64));

        let mut stmt = self.conn().prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            args.iter().map(|b| b.as_ref()).collect();

        let results = stmt
            .query_map(params_ref.as_slice(), |row| {
                let body: String = row.get(4)?;
                let bm25: f64 = row.get(6)?;
                Ok(SearchResult {
                    id: row.get(0)?,
                    score: normalize_bm25_score(bm25),
                    title: row.get(1)?,
                    snippet: extract_snippet(&body, query, SNIPPET_LEN),
                    content: body,
                    source: SourceTag::Fts,
                    collection: row.get(2)?,
                    path: row.get(3)?,
                    modified_at: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(results)
    }

    /// Chunk-level dense search: score every stored chunk against the query
    /// vector, keep the best chunk per document hash, report `1 - distance`.
    ///
    /// Loads candidate vectors into memory; sized for single-host corpora.
    pub fn search_chunks(
        &self,
        query: &str,
        query_embedding: &[f32],
        limit: usize,
        collection: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        let mut sql = String::from(
            "SELECT cv.hash, cv.embedding, d.collection, d.path, d.title, c.doc, d.modified_at \
             FROM content_vectors cv \
             JOIN documents d ON d.hash = cv.hash \
             JOIN content c ON c.hash = cv.hash \
             WHERE d.active = 1",
        );
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if let Some(coll) = collection {
            sql.push_str(" AND d.collection = ?");
            args.push(Box::new(coll.to_string()));
        }

        struct Candidate {
            hash: String,
            distance: f64,
            collection: String,
            path: String,
            title: String,
            body: String,
            modified_at: String,
        }

        let mut stmt = self.conn().prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            args.iter().map(|b| b.as_ref()).collect();

        let rows = stmt
            .query_map(params_ref.as_slice(), |row| {
                let blob: Vec<u8> = row.get(1)?;
                Ok((
                    row.get::<_, String>(0)?,
                    blob,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        // Best (minimum-distance) chunk per document hash
        let mut best: HashMap<String, Candidate> = HashMap::new();
        for (hash, blob, coll, path, title, body, modified_at) in rows {
            let Some(chunk_vec) = bytes_to_embedding(&blob) else {
                continue;
            };
            if chunk_vec.len() != query_embedding.len() {
                continue;
            }
            let distance = cosine_distance(query_embedding, &chunk_vec);

            match best.get(&hash) {
                Some(existing) if existing.distance <= distance => {}
                _ => {
                    best.insert(
                        hash.clone(),
                        Candidate {
                            hash,
                            distance,
                            collection: coll,
                            path,
                            title,
                            body,
                            modified_at,
                        },
                    );
                }
            }
        }

        let mut results: Vec<SearchResult> = best
            .into_values()
            .map(|c| SearchResult {
                id: c.hash,
                score: 1.0 - c.distance,
                title: c.title,
                snippet: extract_snippet(&c.body, query, SNIPPET_LEN),
                content: c.body,
                source: SourceTag::Vector,
                collection: c.collection,
                path: c.path,
                modified_at: c.modified_at,
            })
            .collect();

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(limit);

        Ok(results)
    }
}

/// Reciprocal rank fusion over weighted ranked lists.
///
/// Each candidate accumulates `weight / (k + rank + 1)` per appearance, plus
/// a small top-rank bonus (+0.05 for a rank-0 appearance, +0.02 for ranks
/// 1-2). Identity is the result id, falling back to its path. Fused results
/// carry the `hybrid` source tag.
pub fn reciprocal_rank_fusion(
    result_lists: &[Vec<SearchResult>],
    weights: &[f64],
    k: usize,
) -> Vec<SearchResult> {
    let k = if k == 0 { 60 } else { k };

    struct Fused {
        result: SearchResult,
        score: f64,
        top_rank: usize,
    }

    let mut scores: HashMap<String, Fused> = HashMap::new();

    for (list_idx, list) in result_lists.iter().enumerate() {
        let weight = weights.get(list_idx).copied().unwrap_or(1.0);

        for (rank, result) in list.iter().enumerate() {
            let key = if result.id.is_empty() {
                result.path.clone()
            } else {
                result.id.clone()
            };
            let contribution = weight / (k as f64 + rank as f64 + 1.0);

            match scores.get_mut(&key) {
                Some(entry) => {
                    entry.score += contribution;
                    entry.top_rank = entry.top_rank.min(rank);
                }
                None => {
                    scores.insert(
                        key,
                        Fused {
                            result: result.clone(),
                            score: contribution,
                            top_rank: rank,
                        },
                    );
                }
            }
        }
    }

    let mut fused: Vec<SearchResult> = scores
        .into_values()
        .map(|mut entry| {
            if entry.top_rank == 0 {
                entry.score += 0.05;
            } else if entry.top_rank <= 2 {
                entry.score += 0.02;
            }
            entry.result.score = entry.score;
            entry.result.source = SourceTag::Hybrid;
            entry.result
        })
        .collect();

    fused.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    fused
}
