//! Memory rows — the SQL layer under the memory manager.
//!
//! Memories carry JSON-encoded metadata and tags, an optional expiry, an
//! importance in `[0, 1]`, and the embedding of their content as a
//! little-endian f32 blob. Similarity scans are brute-force over the
//! (small) memory table; relevance is seeded as `1 - cosine_distance`.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use super::{bytes_to_embedding, cosine_distance, embedding_to_bytes, Store};
use crate::error::{Error, Result};

/// Length of a canonical UUID string; shorter ids are treated as prefixes.
const FULL_ID_LEN: usize = 36;

/// A stored memory with its recall relevance (0 outside recall).
#[derive(Debug, Clone, Serialize)]
pub struct MemoryRow {
    pub id: String,
    pub kind: String,
    pub content: String,
    pub metadata: serde_json::Value,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub importance: f64,
    pub relevance: f64,
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn row_to_memory(row: &Row<'_>) -> rusqlite::Result<MemoryRow> {
    let metadata_raw: Option<String> = row.get(3)?;
    let tags_raw: Option<String> = row.get(4)?;
    let timestamp_raw: String = row.get(5)?;
    let expires_raw: Option<String> = row.get(6)?;

    Ok(MemoryRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        content: row.get(2)?,
        metadata: metadata_raw
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_else(|| serde_json::json!({})),
        tags: tags_raw
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default(),
        timestamp: parse_timestamp(&timestamp_raw),
        expires_at: expires_raw.as_deref().map(parse_timestamp),
        importance: row.get(7)?,
        relevance: 0.0,
    })
}

const MEMORY_COLUMNS: &str =
    "id, type, content, metadata, tags, timestamp, expires_at, importance";

impl Store {
    /// Insert a memory row. Returns the generated UUID.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_memory(
        &self,
        kind: &str,
        content: &str,
        metadata: &serde_json::Value,
        tags: &[String],
        timestamp: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
        importance: f64,
        embedding: &[f32],
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let metadata_json = serde_json::to_string(metadata)?;
        let tags_json = serde_json::to_string(tags)?;
        let blob = embedding_to_bytes(embedding);

        self.conn().execute(
            "INSERT INTO memories (id, type, content, metadata, tags, timestamp, expires_at, importance, embedding) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                kind,
                content,
                metadata_json,
                tags_json,
                timestamp.to_rfc3339(),
                expires_at.map(|t| t.to_rfc3339()),
                importance,
                blob,
            ],
        )?;

        Ok(id)
    }

    /// Brute-force similarity scan. Seeds `relevance = 1 - distance` and
    /// returns the `limit` nearest memories, optionally kind-filtered.
    pub fn search_memories(
        &self,
        query_embedding: &[f32],
        limit: usize,
        kinds: &[String],
    ) -> Result<Vec<MemoryRow>> {
        let mut sql = format!(
            "SELECT {MEMORY_COLUMNS}, embedding FROM memories"
        );
        let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
        if !kinds.is_empty() {
            let placeholders = vec!["?"; kinds.len()].join(", ");
            sql.push_str(&format!(" WHERE type IN ({placeholders})"));
            for kind in kinds {
                args.push(Box::new(kind.clone()));
            }
        }

        let mut stmt = self.conn().prepare(&sql)?;
        let params_ref: Vec<&dyn rusqlite::types::ToSql> =
            args.iter().map(|b| b.as_ref()).collect();

        let mut scored: Vec<(MemoryRow, f64)> = Vec::new();
        let rows = stmt.query_map(params_ref.as_slice(), |row| {
            let memory = row_to_memory(row)?;
            let blob: Option<Vec<u8>> = row.get(8)?;
            Ok((memory, blob))
        })?;

        for row in rows {
            let (mut memory, blob) = row?;
            let Some(embedding) = blob.as_deref().and_then(bytes_to_embedding) else {
                continue;
            };
            if embedding.len() != query_embedding.len() {
                continue;
            }
            let distance = cosine_distance(query_embedding, &embedding);
            memory.relevance = 1.0 - distance;
            scored.push((memory, distance));
        }

        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        Ok(scored.into_iter().map(|(m, _)| m).collect())
    }

    /// Fetch one memory by full id.
    pub fn get_memory(&self, id: &str) -> Result<MemoryRow> {
        let sql = format!("SELECT {MEMORY_COLUMNS} FROM memories WHERE id = ?1");
        let memory = self
            .conn()
            .query_row(&sql, params![id], row_to_memory)
            .optional()?;
        memory.ok_or_else(|| Error::NotFound(format!("memory {id}")))
    }

    /// Fetch one memory by id or unique-enough prefix.
    pub fn get_memory_by_prefix(&self, id: &str) -> Result<MemoryRow> {
        if id.len() >= FULL_ID_LEN {
            return self.get_memory(id);
        }
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE id LIKE ?1 LIMIT 1"
        );
        let memory = self
            .conn()
            .query_row(&sql, params![format!("{id}%")], row_to_memory)
            .optional()?;
        memory.ok_or_else(|| Error::NotFound(format!("memory {id}")))
    }

    /// All memories of a kind, newest first.
    pub fn memories_by_kind(&self, kind: &str) -> Result<Vec<MemoryRow>> {
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE type = ?1 ORDER BY timestamp DESC"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params![kind], row_to_memory)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Most recent memories of a kind.
    pub fn recent_memories_by_kind(&self, kind: &str, limit: usize) -> Result<Vec<MemoryRow>> {
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories WHERE type = ?1 \
             ORDER BY timestamp DESC LIMIT ?2"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params![kind, limit as i64], row_to_memory)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Conversation memories for a session, newest first. Session threading
    /// is an indexed metadata lookup, not a similarity scan.
    pub fn memories_by_session(&self, session_id: &str, limit: usize) -> Result<Vec<MemoryRow>> {
        let sql = format!(
            "SELECT {MEMORY_COLUMNS} FROM memories \
             WHERE type = 'conversation' AND json_extract(metadata, '$.session_id') = ?1 \
             ORDER BY timestamp DESC LIMIT ?2"
        );
        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt
            .query_map(params![session_id, limit as i64], row_to_memory)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Replace a memory's content, metadata, tags, expiry, importance, and
    /// embedding. One statement, so readers never see a half-updated row.
    #[allow(clippy::too_many_arguments)]
    pub fn update_memory(
        &self,
        id: &str,
        content: &str,
        metadata: &serde_json::Value,
        tags: &[String],
        expires_at: Option<DateTime<Utc>>,
        importance: f64,
        embedding: &[f32],
    ) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE memories SET content = ?1, metadata = ?2, tags = ?3, \
             expires_at = ?4, importance = ?5, embedding = ?6 WHERE id = ?7",
            params![
                content,
                serde_json::to_string(metadata)?,
                serde_json::to_string(tags)?,
                expires_at.map(|t| t.to_rfc3339()),
                importance,
                embedding_to_bytes(embedding),
                id,
            ],
        )?;

        if affected == 0 {
            return Err(Error::NotFound(format!("memory {id}")));
        }
        Ok(())
    }

    /// Delete by id, or by prefix when the id is shorter than a full UUID.
    pub fn delete_memory(&self, id: &str) -> Result<usize> {
        let affected = if id.len() < FULL_ID_LEN {
            self.conn().execute(
                "DELETE FROM memories WHERE id LIKE ?1",
                params![format!("{id}%")],
            )?
        } else {
            self.conn()
                .execute("DELETE FROM memories WHERE id = ?1", params![id])?
        };

        if affected == 0 {
            return Err(Error::NotFound(format!("memory {id}")));
        }
        Ok(affected)
    }

    /// Delete a session's conversation memories. Returns the count deleted.
    pub fn delete_memories_by_session(&self, session_id: &str) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM memories \
             WHERE type = 'conversation' AND json_extract(metadata, '$.session_id') = ?1",
            params![session_id],
        )?;
        Ok(affected)
    }

    /// Delete every memory whose expiry has passed. Returns the count.
    pub fn delete_expired_memories(&self) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM memories WHERE expires_at IS NOT NULL AND expires_at < ?1",
            params![Utc::now().to_rfc3339()],
        )?;
        Ok(affected)
    }

    pub fn count_memories(&self) -> Result<i64> {
        let count: i64 =
            self.conn()
                .query_row("SELECT COUNT(*) FROM memories", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn count_memories_by_kind(&self, kind: &str) -> Result<i64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM memories WHERE type = ?1",
            params![kind],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Distinct session ids seen in conversation metadata.
    pub fn session_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn().prepare(
            "SELECT DISTINCT json_extract(metadata, '$.session_id') \
             FROM memories \
             WHERE type = 'conversation' \
               AND json_extract(metadata, '$.session_id') IS NOT NULL",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
