//! SQL DDL for all mmq tables.
//!
//! Defines the content-addressed store (`content`), the document registry
//! (`documents`), chunk embeddings (`content_vectors`), the FTS5 index
//! (`documents_fts`) with its sync triggers, the LLM result cache
//! (`llm_cache`), the memory store (`memories`), and the collection/context
//! registries. All DDL uses `IF NOT EXISTS` for idempotent initialization.
//!
//! The FTS triggers are the single source of truth for `documents_fts`
//! content; nothing else may write to that table.

use rusqlite::Connection;

/// All schema DDL statements for mmq's core tables.
const SCHEMA_SQL: &str = r#"
-- Content-addressed document bodies, shared by documents with identical text
CREATE TABLE IF NOT EXISTS content (
    hash TEXT PRIMARY KEY,
    doc TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Document registry (metadata over content)
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    collection TEXT NOT NULL,
    path TEXT NOT NULL,
    title TEXT NOT NULL,
    hash TEXT NOT NULL,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    FOREIGN KEY (hash) REFERENCES content(hash) ON DELETE CASCADE,
    UNIQUE(collection, path)
);

CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, active);
CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(hash);
CREATE INDEX IF NOT EXISTS idx_documents_path ON documents(path, active);

-- Chunk embeddings, keyed (content hash, chunk index)
CREATE TABLE IF NOT EXISTS content_vectors (
    hash TEXT NOT NULL,
    seq INTEGER NOT NULL DEFAULT 0,
    pos INTEGER NOT NULL DEFAULT 0,
    model TEXT NOT NULL,
    embedding BLOB,
    embedded_at TEXT NOT NULL,
    PRIMARY KEY (hash, seq)
);

-- Full-text search over documents
CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
    filepath, title, body,
    tokenize='porter unicode61'
);

-- Cache of expensive generative results
CREATE TABLE IF NOT EXISTS llm_cache (
    hash TEXT PRIMARY KEY,
    result TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Typed semantic memories
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT,
    tags TEXT,
    timestamp TEXT NOT NULL,
    expires_at TEXT,
    importance REAL NOT NULL DEFAULT 0.5,
    embedding BLOB
);

CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(type);
CREATE INDEX IF NOT EXISTS idx_memories_timestamp ON memories(timestamp DESC);
CREATE INDEX IF NOT EXISTS idx_memories_expires ON memories(expires_at);

-- Named collection roots
CREATE TABLE IF NOT EXISTS collections (
    name TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    mask TEXT NOT NULL DEFAULT '**/*',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_collections_path ON collections(path);

-- Hierarchical prompt annotations keyed by path
CREATE TABLE IF NOT EXISTS contexts (
    path TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- FTS sync: project collection/path, title, and the referenced body on insert
CREATE TRIGGER IF NOT EXISTS documents_ai AFTER INSERT ON documents
BEGIN
    INSERT INTO documents_fts (rowid, filepath, title, body)
    SELECT NEW.id, NEW.collection || '/' || NEW.path, NEW.title, content.doc
    FROM content WHERE content.hash = NEW.hash;
END;

-- FTS sync: drop the old projection, reproject only if still active
CREATE TRIGGER IF NOT EXISTS documents_au AFTER UPDATE ON documents
BEGIN
    DELETE FROM documents_fts WHERE rowid = OLD.id;
    INSERT INTO documents_fts (rowid, filepath, title, body)
    SELECT NEW.id, NEW.collection || '/' || NEW.path, NEW.title, content.doc
    FROM content WHERE content.hash = NEW.hash AND NEW.active = 1;
END;

-- FTS sync: remove the projection on delete
CREATE TRIGGER IF NOT EXISTS documents_ad AFTER DELETE ON documents
BEGIN
    DELETE FROM documents_fts WHERE rowid = OLD.id;
END;

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
///
/// The `vectors_vec` ANN table is NOT created here — it is created lazily by
/// the first embedding write, sized to that embedding's dimensionality.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_conn() -> Connection {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn schema_creates_all_tables() {
        let conn = test_conn();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        for expected in [
            "content",
            "documents",
            "content_vectors",
            "llm_cache",
            "memories",
            "collections",
            "contexts",
            "schema_meta",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing {expected}");
        }

        // sqlite-vec must be loaded even though vectors_vec is lazy
        let version: String = conn
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .unwrap();
        assert!(!version.is_empty());
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = test_conn();
        init_schema(&conn).unwrap(); // second call should not error
    }

    #[test]
    fn insert_trigger_projects_into_fts() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO content (hash, doc, created_at) VALUES ('h1', 'alpha beta body', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO documents (collection, path, title, hash, created_at, modified_at, active) \
             VALUES ('notes', 'a.md', 'Alpha', 'h1', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', 1)",
            [],
        )
        .unwrap();

        let (filepath, title, body): (String, String, String) = conn
            .query_row(
                "SELECT filepath, title, body FROM documents_fts WHERE documents_fts MATCH 'alpha'",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!(filepath, "notes/a.md");
        assert_eq!(title, "Alpha");
        assert_eq!(body, "alpha beta body");
    }

    #[test]
    fn update_trigger_removes_inactive_from_fts() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO content (hash, doc, created_at) VALUES ('h1', 'gamma body', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO documents (collection, path, title, hash, created_at, modified_at, active) \
             VALUES ('notes', 'g.md', 'Gamma', 'h1', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', 1)",
            [],
        )
        .unwrap();

        conn.execute("UPDATE documents SET active = 0 WHERE path = 'g.md'", [])
            .unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents_fts WHERE documents_fts MATCH 'gamma'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 0);
    }

    #[test]
    fn delete_trigger_cleans_fts() {
        let conn = test_conn();
        conn.execute(
            "INSERT INTO content (hash, doc, created_at) VALUES ('h1', 'delta body', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO documents (collection, path, title, hash, created_at, modified_at, active) \
             VALUES ('notes', 'd.md', 'Delta', 'h1', '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z', 1)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM documents WHERE path = 'd.md'", [])
            .unwrap();

        let hits: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM documents_fts WHERE documents_fts MATCH 'delta'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(hits, 0);
    }
}
