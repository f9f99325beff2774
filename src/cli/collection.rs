use anyhow::Result;

use super::emit_records;
use crate::config::expand_tilde;
use crate::format::OutputFormat;
use crate::ingest;
use crate::store::Store;

/// `collection add <path> --name <n> [--mask <glob>]`
pub fn add(
    store: &Store,
    path: &str,
    name: Option<&str>,
    mask: Option<&str>,
) -> Result<()> {
    let root = expand_tilde(path).canonicalize()?;
    let name = match name {
        Some(name) => name.to_string(),
        None => root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "default".to_string()),
    };

    store.create_collection(&name, &root.to_string_lossy(), mask)?;
    let collection = store.get_collection(&name)?;

    let report = ingest::index_directory(store, &root, &name, &collection.mask)?;
    println!(
        "Collection '{name}' added: {} files indexed, {} skipped",
        report.indexed, report.skipped
    );
    Ok(())
}

/// `collection list`
pub fn list(store: &Store, format: OutputFormat) -> Result<()> {
    let collections = store.list_collections()?;
    let records: Vec<serde_json::Value> = collections
        .iter()
        .map(|c| serde_json::to_value(c).unwrap_or_default())
        .collect();

    emit_records(&records, format, |_| {
        if collections.is_empty() {
            println!("No collections. Add one with: mmq collection add <path> --name <n>");
            return;
        }
        for c in &collections {
            println!("{:<20} {:<6} docs  {} ({})", c.name, c.doc_count, c.path, c.mask);
        }
    });
    Ok(())
}

/// `collection remove <name>`
pub fn remove(store: &mut Store, name: &str) -> Result<()> {
    store.remove_collection(name)?;
    println!("Collection '{name}' removed (documents deactivated)");
    Ok(())
}

/// `collection rename <old> <new>`
pub fn rename(store: &mut Store, old_name: &str, new_name: &str) -> Result<()> {
    store.rename_collection(old_name, new_name)?;
    println!("Collection '{old_name}' renamed to '{new_name}'");
    Ok(())
}
