//! Context registry — free-text annotations attached to path prefixes.
//!
//! Paths are `/` (global), `mmq://collection`, or `mmq://collection/sub/path`.
//! A context matches a target iff it is global, equal to the target, or a
//! proper prefix of it ending at a `/` segment boundary — so `mmq://notes`
//! never matches `mmq://notes-archive/...`.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::{now_rfc3339, Store, URI_SCHEME};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct ContextEntry {
    pub path: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

/// True iff `context_path` annotates `target_path`.
fn path_matches(context_path: &str, target_path: &str) -> bool {
    if context_path == "/" {
        return true;
    }
    if context_path == target_path {
        return true;
    }
    // Prefix match only at a path-segment boundary
    target_path
        .strip_prefix(context_path)
        .map(|rest| rest.starts_with('/'))
        .unwrap_or(false)
}

impl Store {
    /// Add or replace the context for a path.
    pub fn add_context(&self, path: &str, content: &str) -> Result<()> {
        let now = now_rfc3339();
        self.conn().execute(
            "INSERT INTO contexts (path, content, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?3) \
             ON CONFLICT(path) DO UPDATE SET content = excluded.content, updated_at = ?3",
            params![path, content, now],
        )?;
        Ok(())
    }

    /// List every context, ordered by path.
    pub fn list_contexts(&self) -> Result<Vec<ContextEntry>> {
        let mut stmt = self.conn().prepare(
            "SELECT path, content, created_at, updated_at FROM contexts ORDER BY path",
        )?;
        let contexts = stmt
            .query_map([], |row| {
                Ok(ContextEntry {
                    path: row.get(0)?,
                    content: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(contexts)
    }

    /// Fetch the context stored at exactly this path.
    pub fn get_context(&self, path: &str) -> Result<ContextEntry> {
        let ctx = self
            .conn()
            .query_row(
                "SELECT path, content, created_at, updated_at FROM contexts WHERE path = ?1",
                params![path],
                |row| {
                    Ok(ContextEntry {
                        path: row.get(0)?,
                        content: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()?;

        ctx.ok_or_else(|| Error::NotFound(format!("context for path {path}")))
    }

    /// Delete the context at a path.
    pub fn remove_context(&self, path: &str) -> Result<()> {
        let affected = self
            .conn()
            .execute("DELETE FROM contexts WHERE path = ?1", params![path])?;
        if affected == 0 {
            return Err(Error::NotFound(format!("context for path {path}")));
        }
        Ok(())
    }

    /// Every context annotating `target_path`, shortest (most general) first.
    pub fn contexts_for_path(&self, target_path: &str) -> Result<Vec<ContextEntry>> {
        let all = {
            let mut stmt = self.conn().prepare(
                "SELECT path, content, created_at, updated_at FROM contexts \
                 ORDER BY LENGTH(path) ASC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(ContextEntry {
                        path: row.get(0)?,
                        content: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        Ok(all
            .into_iter()
            .filter(|ctx| path_matches(&ctx.path, target_path))
            .collect())
    }

    /// Contexts for a document, most specific first: exact path, collection,
    /// then global.
    pub fn contexts_for_document(
        &self,
        collection: &str,
        path: &str,
    ) -> Result<Vec<ContextEntry>> {
        let candidates = [
            format!("{URI_SCHEME}{collection}/{path}"),
            format!("{URI_SCHEME}{collection}"),
            "/".to_string(),
        ];

        let mut contexts = Vec::new();
        for candidate in &candidates {
            if let Ok(ctx) = self.get_context(candidate) {
                contexts.push(ctx);
            }
        }
        Ok(contexts)
    }

    /// Collections (and the global root) that have no context yet.
    pub fn check_missing_contexts(&self) -> Result<Vec<String>> {
        let mut missing = Vec::new();

        if self.get_context("/").is_err() {
            missing.push("/ (global context)".to_string());
        }

        for name in self.collection_names()? {
            let coll_path = format!("{URI_SCHEME}{name}");
            if self.get_context(&coll_path).is_err() {
                missing.push(coll_path);
            }
        }

        Ok(missing)
    }
}
