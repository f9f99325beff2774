//! Keyed cache of expensive generative results (query expansions, etc.).
//!
//! Keys are content-derived, writers are last-writer-wins, and at most one
//! row exists per key. Callers treat cache failures as misses — a broken
//! cache must never fail the surrounding computation.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::{now_rfc3339, Store};
use crate::error::Result;

/// Derive the cache key for an operation and its parameters:
/// hex SHA-256 of `operation + ":" + JSON(params)`.
pub fn cache_key<P: Serialize>(operation: &str, params: &P) -> String {
    let encoded = serde_json::to_string(params).unwrap_or_else(|_| format!("{operation}"));
    let mut hasher = Sha256::new();
    hasher.update(operation.as_bytes());
    hasher.update(b":");
    hasher.update(encoded.as_bytes());
    hex::encode(hasher.finalize())
}

impl Store {
    /// Look up a cached result. `None` is a miss.
    pub fn get_cached_result(&self, key: &str) -> Result<Option<String>> {
        let result = self
            .conn()
            .query_row(
                "SELECT result FROM llm_cache WHERE hash = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(result)
    }

    /// Store a result under a key. Last writer wins.
    pub fn set_cached_result(&self, key: &str, result: &str) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO llm_cache (hash, result, created_at) VALUES (?1, ?2, ?3)",
            params![key, result, now_rfc3339()],
        )?;
        Ok(())
    }

    /// Drop every cache entry. Returns the number deleted.
    pub fn clear_cache(&self) -> Result<usize> {
        let deleted = self.conn().execute("DELETE FROM llm_cache", [])?;
        Ok(deleted)
    }

    /// Number of live cache entries.
    pub fn cache_stats(&self) -> Result<i64> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM llm_cache", [], |row| row.get(0))?;
        Ok(count)
    }
}
