use std::str::FromStr;

use anyhow::Result;
use chrono::{Duration, Utc};

use super::{emit_record, emit_records};
use crate::format::OutputFormat;
use crate::memory::{Manager, Memory, MemoryInput, MemoryKind, RecallOptions};

fn memory_records(memories: &[Memory]) -> Vec<serde_json::Value> {
    memories
        .iter()
        .map(|m| serde_json::to_value(m).unwrap_or_default())
        .collect()
}

fn print_memory_line(memory: &Memory) {
    let preview: String = memory.content.chars().take(70).collect();
    println!(
        "{}  {:<12} [{:.2}] {}",
        &memory.id[..8],
        memory.kind.as_str(),
        memory.importance,
        preview.replace('\n', " ")
    );
}

/// `memory add <content> [--kind fact] [--importance 0.5] [--tags a,b] [--expires-days N]`
#[allow(clippy::too_many_arguments)]
pub fn add(
    manager: &Manager<'_>,
    content: &str,
    kind: &str,
    importance: Option<f64>,
    tags: Option<&str>,
    expires_days: Option<i64>,
) -> Result<()> {
    let kind = MemoryKind::from_str(kind).map_err(anyhow::Error::msg)?;

    let mut input = MemoryInput::new(kind, content);
    input.importance = importance;
    if let Some(tags) = tags {
        input.tags = tags
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
    }
    if let Some(days) = expires_days {
        input.expires_at = Some(Utc::now() + Duration::days(days));
    }

    let id = manager.remember(input)?;
    println!("Memory stored: {id}");
    Ok(())
}

/// `memory list [--kind <k>]`
pub fn list(manager: &Manager<'_>, kind: Option<&str>, format: OutputFormat) -> Result<()> {
    let memories = match kind {
        Some(kind) => {
            let kind = MemoryKind::from_str(kind).map_err(anyhow::Error::msg)?;
            manager.list_by_kind(kind)?
        }
        None => {
            let mut all = Vec::new();
            for kind in [
                MemoryKind::Conversation,
                MemoryKind::Fact,
                MemoryKind::Preference,
                MemoryKind::Episodic,
            ] {
                all.extend(manager.list_by_kind(kind)?);
            }
            all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
            all
        }
    };

    emit_records(&memory_records(&memories), format, |_| {
        if memories.is_empty() {
            println!("No memories");
            return;
        }
        for memory in &memories {
            print_memory_line(memory);
        }
    });
    Ok(())
}

/// `memory recall <query> [--kind <k>] [--limit N] [--min-relevance R]`
pub fn recall(
    manager: &Manager<'_>,
    query: &str,
    kind: Option<&str>,
    limit: usize,
    min_relevance: f64,
    format: OutputFormat,
) -> Result<()> {
    let mut opts = RecallOptions {
        limit,
        min_relevance,
        ..Default::default()
    };
    if let Some(kind) = kind {
        opts.kinds = vec![MemoryKind::from_str(kind).map_err(anyhow::Error::msg)?];
    }

    let memories = manager.recall(query, &opts)?;
    emit_records(&memory_records(&memories), format, |_| {
        if memories.is_empty() {
            println!("Nothing recalled");
            return;
        }
        for memory in &memories {
            println!(
                "{}  [{:.3}] {:<12} {}",
                &memory.id[..8],
                memory.relevance,
                memory.kind.as_str(),
                memory.content.replace('\n', " ")
            );
        }
    });
    Ok(())
}

/// `memory get <id>`
pub fn get(manager: &Manager<'_>, id: &str, format: OutputFormat) -> Result<()> {
    let memory = manager.get(id)?;
    let record = serde_json::to_value(&memory)?;

    emit_record(&record, format, |_| {
        println!("id:         {}", memory.id);
        println!("kind:       {}", memory.kind);
        println!("importance: {}", memory.importance);
        println!("timestamp:  {}", memory.timestamp.to_rfc3339());
        if let Some(expires) = memory.expires_at {
            println!("expires:    {}", expires.to_rfc3339());
        }
        if !memory.tags.is_empty() {
            println!("tags:       {}", memory.tags.join(", "));
        }
        println!();
        println!("{}", memory.content);
    });
    Ok(())
}

/// `memory delete <id>`
pub fn delete(manager: &Manager<'_>, id: &str) -> Result<()> {
    let deleted = manager.delete(id)?;
    println!("Deleted {deleted} memories");
    Ok(())
}

/// `memory stats`
pub fn stats(manager: &Manager<'_>, format: OutputFormat) -> Result<()> {
    let total = manager.count()?;
    let mut by_kind = serde_json::Map::new();
    for kind in [
        MemoryKind::Conversation,
        MemoryKind::Fact,
        MemoryKind::Preference,
        MemoryKind::Episodic,
    ] {
        by_kind.insert(
            kind.as_str().to_string(),
            serde_json::json!(manager.count_by_kind(kind)?),
        );
    }

    let record = serde_json::json!({
        "total": total,
        "by_kind": serde_json::Value::Object(by_kind.clone()),
    });
    emit_record(&record, format, |_| {
        println!("Total memories: {total}");
        for (kind, count) in &by_kind {
            println!("  {kind:<14} {count}");
        }
    });
    Ok(())
}

/// `memory cleanup` — expire due memories.
pub fn cleanup(manager: &Manager<'_>) -> Result<()> {
    let deleted = manager.cleanup_expired()?;
    println!("Deleted {deleted} expired memories");
    Ok(())
}
