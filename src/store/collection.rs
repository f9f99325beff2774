//! Collection registry — named filesystem roots with a glob mask.
//!
//! Removing a collection deactivates its documents; renaming moves the
//! registry row and every referencing document in one transaction.

use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use super::{now_rfc3339, Store};
use crate::error::{Error, Result};

/// Default mask applied when a collection is registered without one.
pub const DEFAULT_MASK: &str = "**/*.md";

#[derive(Debug, Clone, Serialize)]
pub struct Collection {
    pub name: String,
    pub path: String,
    pub mask: String,
    pub created_at: String,
    pub updated_at: String,
    pub doc_count: i64,
}

impl Store {
    /// Register a collection root. Duplicate names are rejected.
    pub fn create_collection(&self, name: &str, path: &str, mask: Option<&str>) -> Result<()> {
        if self.collection_exists(name)? {
            return Err(Error::AlreadyExists(format!("collection '{name}'")));
        }

        let now = now_rfc3339();
        self.conn().execute(
            "INSERT INTO collections (name, path, mask, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![name, path, mask.unwrap_or(DEFAULT_MASK), now],
        )?;
        Ok(())
    }

    /// List all collections with their active document counts, newest first.
    pub fn list_collections(&self) -> Result<Vec<Collection>> {
        let mut stmt = self.conn().prepare(
            "SELECT c.name, c.path, c.mask, c.created_at, c.updated_at, \
                    COUNT(DISTINCT d.id) AS doc_count \
             FROM collections c \
             LEFT JOIN documents d ON d.collection = c.name AND d.active = 1 \
             GROUP BY c.name \
             ORDER BY c.created_at DESC",
        )?;

        let collections = stmt
            .query_map([], |row| {
                Ok(Collection {
                    name: row.get(0)?,
                    path: row.get(1)?,
                    mask: row.get(2)?,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                    doc_count: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(collections)
    }

    /// Fetch a single collection by name.
    pub fn get_collection(&self, name: &str) -> Result<Collection> {
        let collection = self
            .conn()
            .query_row(
                "SELECT c.name, c.path, c.mask, c.created_at, c.updated_at, \
                        COUNT(DISTINCT d.id) AS doc_count \
                 FROM collections c \
                 LEFT JOIN documents d ON d.collection = c.name AND d.active = 1 \
                 WHERE c.name = ?1 \
                 GROUP BY c.name",
                params![name],
                |row| {
                    Ok(Collection {
                        name: row.get(0)?,
                        path: row.get(1)?,
                        mask: row.get(2)?,
                        created_at: row.get(3)?,
                        updated_at: row.get(4)?,
                        doc_count: row.get(5)?,
                    })
                },
            )
            .optional()?;

        collection.ok_or_else(|| Error::NotFound(format!("collection '{name}'")))
    }

    /// Remove a collection: deactivate its documents and delete the registry
    /// row, atomically.
    pub fn remove_collection(&mut self, name: &str) -> Result<()> {
        if !self.collection_exists(name)? {
            return Err(Error::NotFound(format!("collection '{name}'")));
        }

        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "UPDATE documents SET active = 0 WHERE collection = ?1",
            params![name],
        )?;
        tx.execute("DELETE FROM collections WHERE name = ?1", params![name])?;
        tx.commit()?;

        Ok(())
    }

    /// Rename a collection. The registry row and every referencing document
    /// change together or not at all.
    pub fn rename_collection(&mut self, old_name: &str, new_name: &str) -> Result<()> {
        if !self.collection_exists(old_name)? {
            return Err(Error::NotFound(format!("collection '{old_name}'")));
        }
        if self.collection_exists(new_name)? {
            return Err(Error::AlreadyExists(format!("collection '{new_name}'")));
        }

        let now = now_rfc3339();
        let tx = self.conn_mut().transaction()?;
        tx.execute(
            "UPDATE collections SET name = ?1, updated_at = ?2 WHERE name = ?3",
            params![new_name, now, old_name],
        )?;
        tx.execute(
            "UPDATE documents SET collection = ?1 WHERE collection = ?2",
            params![new_name, old_name],
        )?;
        tx.commit()?;

        Ok(())
    }

    /// Bump a collection's `updated_at` (after a re-ingest).
    pub fn touch_collection(&self, name: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE collections SET updated_at = ?1 WHERE name = ?2",
            params![now_rfc3339(), name],
        )?;
        Ok(())
    }

    /// All collection names, newest first.
    pub fn collection_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT name FROM collections ORDER BY created_at DESC")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn collection_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM collections WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
