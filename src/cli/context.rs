use anyhow::Result;

use super::emit_records;
use crate::format::OutputFormat;
use crate::store::Store;

/// `context add <path> <content>`
pub fn add(store: &Store, path: &str, content: &str) -> Result<()> {
    store.add_context(path, content)?;
    println!("Context set for {path}");
    Ok(())
}

/// `context list`
pub fn list(store: &Store, format: OutputFormat) -> Result<()> {
    let contexts = store.list_contexts()?;
    let records: Vec<serde_json::Value> = contexts
        .iter()
        .map(|c| serde_json::to_value(c).unwrap_or_default())
        .collect();

    emit_records(&records, format, |_| {
        if contexts.is_empty() {
            println!("No contexts defined");
            return;
        }
        for ctx in &contexts {
            let preview: String = ctx.content.chars().take(60).collect();
            println!("{:<40} {}", ctx.path, preview.replace('\n', " "));
        }
    });
    Ok(())
}

/// `context check` — report collections without a context.
pub fn check(store: &Store) -> Result<()> {
    let missing = store.check_missing_contexts()?;
    if missing.is_empty() {
        println!("All collections have contexts");
    } else {
        println!("Missing contexts:");
        for path in missing {
            println!("  {path}");
        }
    }
    Ok(())
}

/// `context rm <path>`
pub fn rm(store: &Store, path: &str) -> Result<()> {
    store.remove_context(path)?;
    println!("Context removed for {path}");
    Ok(())
}
