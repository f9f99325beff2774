//! Document registry invariants: content dedup, FTS consistency, rename
//! atomicity, and multi-get composition.

mod helpers;

use helpers::{index_doc, test_store};

#[test]
fn content_dedup_across_ingests() {
    let store = test_store();
    let h1 = index_doc(&store, "notes", "a.md", "identical body text");
    let h2 = index_doc(&store, "wiki", "b.md", "identical body text");

    assert_eq!(h1, h2);

    let content_rows: i64 = store
        .conn()
        .query_row("SELECT COUNT(*) FROM content", [], |r| r.get(0))
        .unwrap();
    assert_eq!(content_rows, 1, "identical bodies share one content row");

    let referencing: i64 = store
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM documents WHERE hash = ?1",
            [&h1],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(referencing, 2);
}

#[test]
fn fts_row_exists_for_every_active_document() {
    let store = test_store();
    index_doc(&store, "notes", "a.md", "alpha searchable body");
    index_doc(&store, "notes", "b.md", "beta searchable body");

    let fts_rows: i64 = store
        .conn()
        .query_row("SELECT COUNT(*) FROM documents_fts", [], |r| r.get(0))
        .unwrap();
    assert_eq!(fts_rows, 2);

    // Projection fields match the document projection
    let (filepath, title): (String, String) = store
        .conn()
        .query_row(
            "SELECT filepath, title FROM documents_fts WHERE documents_fts MATCH 'alpha'",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .unwrap();
    assert_eq!(filepath, "notes/a.md");
    assert_eq!(title, "a");
}

#[test]
fn fts_row_gone_for_inactive_and_reindexed_documents() {
    let store = test_store();
    index_doc(&store, "notes", "a.md", "first unique wording");

    // Soft delete drops the projection
    store.delete_document("a.md").unwrap();
    let hits: i64 = store
        .conn()
        .query_row(
            "SELECT COUNT(*) FROM documents_fts WHERE documents_fts MATCH 'wording'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(hits, 0);

    // Re-index reprojects the new body exactly once
    index_doc(&store, "notes", "a.md", "second unique phrasing");
    let total: i64 = store
        .conn()
        .query_row("SELECT COUNT(*) FROM documents_fts", [], |r| r.get(0))
        .unwrap();
    assert_eq!(total, 1);
    assert!(store.search_fts("wording", 10, None).unwrap().is_empty());
    assert_eq!(store.search_fts("phrasing", 10, None).unwrap().len(), 1);
}

#[test]
fn rename_round_trip_restores_references() {
    let mut store = test_store();
    store.create_collection("alpha", "/tmp/alpha", None).unwrap();
    index_doc(&store, "alpha", "doc.md", "movable document");

    store.rename_collection("alpha", "beta").unwrap();
    assert!(store.get_document_by_path("beta/doc.md").is_ok());
    assert!(store.get_document_by_path("alpha/doc.md").is_err());

    store.rename_collection("beta", "alpha").unwrap();
    assert!(store.get_document_by_path("alpha/doc.md").is_ok());

    // FTS filepath projection followed the renames
    let results = store.search_fts("movable", 10, None).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].collection, "alpha");
}

#[test]
fn multi_get_list_equals_individual_gets() {
    let store = test_store();
    index_doc(&store, "notes", "a.md", "alpha content");
    index_doc(&store, "notes", "b.md", "beta content");

    let combined = store
        .get_multiple_documents("notes/a.md, notes/b.md", 0)
        .unwrap();
    let a = store.get_document_by_path("notes/a.md").unwrap();
    let b = store.get_document_by_path("notes/b.md").unwrap();

    let combined_paths: Vec<&str> = combined.iter().map(|d| d.path.as_str()).collect();
    assert_eq!(combined_paths, vec![a.path.as_str(), b.path.as_str()]);
}

#[test]
fn multi_get_drops_oversized_entries() {
    let store = test_store();
    index_doc(&store, "notes", "small.md", "tiny");
    index_doc(&store, "notes", "large.md", &"z".repeat(5000));

    let docs = store
        .get_multiple_documents("notes/small.md, notes/large.md", 1000)
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].path, "small.md");
}

#[test]
fn short_docid_lookup_accepts_hash_prefix() {
    let store = test_store();
    let hash = index_doc(&store, "notes", "a.md", "addressable body");

    let by_bare = store.get_document_by_docid(&hash[..6]).unwrap();
    let by_prefixed = store
        .get_document_by_docid(&format!("#{}", &hash[..6]))
        .unwrap();
    assert_eq!(by_bare.path, "a.md");
    assert_eq!(by_prefixed.hash, hash);
}
