use anyhow::Result;

use crate::config::MmqConfig;
use crate::ingest;
use crate::model::Capabilities;
use crate::store::Store;

/// `update [--pull]` — re-ingest every collection.
pub fn update(store: &Store, pull: bool) -> Result<()> {
    let report = ingest::update_collections(store, pull)?;
    println!(
        "Update complete: {} files indexed, {} skipped",
        report.indexed, report.skipped
    );
    Ok(())
}

/// `embed` — embed all documents missing embeddings.
pub fn embed(store: &mut Store, capabilities: &Capabilities, config: &MmqConfig) -> Result<()> {
    let report = ingest::embed_missing(
        store,
        capabilities.embedder.as_ref(),
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
        &capabilities.embedding_model,
    )?;

    if report.documents == 0 {
        println!("Nothing to embed");
    } else {
        println!(
            "Embedded {} document(s), {} chunk(s)",
            report.documents, report.chunks
        );
    }
    Ok(())
}

/// `cleanup` — cache purge, orphan collection, compaction.
pub fn cleanup(store: &mut Store) -> Result<()> {
    let report = store.cleanup()?;
    println!("Cache entries deleted:    {}", report.cache_deleted);
    println!("Inactive docs deleted:    {}", report.inactive_docs_deleted);
    println!("Orphaned content deleted: {}", report.orphaned_content_deleted);
    println!("Orphaned vectors deleted: {}", report.orphaned_vectors_deleted);
    println!("Expired memories deleted: {}", report.expired_memories_deleted);
    println!("Database compacted");
    Ok(())
}
