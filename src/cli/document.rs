use anyhow::Result;

use super::{emit_record, emit_records};
use crate::format::OutputFormat;
use crate::store::{parse_doc_uri, Store};

/// `ls [coll[/path]]` — list documents, optionally narrowed to a collection
/// or a path prefix inside it.
pub fn ls(store: &Store, target: Option<&str>, format: OutputFormat) -> Result<()> {
    let (collection, path) = match target {
        None => (None, None),
        Some(target) => {
            let (collection, path) = parse_doc_uri(target);
            if collection.is_empty() {
                // bare collection name, no slash
                (Some(path), None)
            } else {
                (Some(collection), Some(path))
            }
        }
    };

    let entries =
        store.list_documents_by_path(collection.as_deref(), path.as_deref())?;
    let records: Vec<serde_json::Value> = entries
        .iter()
        .map(|e| serde_json::to_value(e).unwrap_or_default())
        .collect();

    emit_records(&records, format, |_| {
        if entries.is_empty() {
            println!("No documents found");
            return;
        }
        for entry in &entries {
            println!(
                "{}  {:<40} {}",
                entry.docid,
                format!("{}/{}", entry.collection, entry.path),
                entry.title
            );
        }
    });
    Ok(())
}

/// `get <path-or-#docid>`
pub fn get(store: &Store, reference: &str, format: OutputFormat) -> Result<()> {
    let doc = if reference.starts_with('#') || !reference.contains('/') {
        store.get_document_by_docid(reference)?
    } else {
        store.get_document_by_path(reference)?
    };

    let record = serde_json::to_value(&doc)?;
    emit_record(&record, format, |_| {
        println!("{} {}/{} ({})", doc.docid, doc.collection, doc.path, doc.title);
        println!("modified: {}", doc.modified_at);
        println!();
        println!("{}", doc.content);
    });
    Ok(())
}

/// `multi-get <pattern> [--max-bytes N]`
pub fn multi_get(
    store: &Store,
    pattern: &str,
    max_bytes: usize,
    format: OutputFormat,
) -> Result<()> {
    let docs = store.get_multiple_documents(pattern, max_bytes)?;
    let records: Vec<serde_json::Value> = docs
        .iter()
        .map(|d| serde_json::to_value(d).unwrap_or_default())
        .collect();

    emit_records(&records, format, |_| {
        if docs.is_empty() {
            println!("No documents matched");
            return;
        }
        for doc in &docs {
            println!("=== {} {}/{} ===", doc.docid, doc.collection, doc.path);
            println!("{}", doc.content);
            println!();
        }
    });
    Ok(())
}
