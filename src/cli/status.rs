use anyhow::Result;

use super::emit_record;
use crate::format::OutputFormat;
use crate::store::Store;

/// `status` — counts and collection list.
pub fn status(store: &Store, format: OutputFormat) -> Result<()> {
    let status = store.status()?;
    let memories = store.count_memories()?;
    let cache_entries = store.cache_stats()?;
    let embedded = store.count_embedded_documents()?;

    let record = serde_json::json!({
        "db_path": status.db_path,
        "total_documents": status.total_documents,
        "embedded_documents": embedded,
        "needs_embedding": status.needs_embedding,
        "collections": status.collections,
        "memories": memories,
        "cache_entries": cache_entries,
    });

    emit_record(&record, format, |_| {
        println!("Database:         {}", status.db_path);
        println!("Documents:        {}", status.total_documents);
        println!("Embedded:         {embedded}");
        println!("Needs embedding:  {}", status.needs_embedding);
        println!("Memories:         {memories}");
        println!("Cache entries:    {cache_entries}");
        if status.collections.is_empty() {
            println!("Collections:      (none)");
        } else {
            println!("Collections:      {}", status.collections.join(", "));
        }
    });
    Ok(())
}
