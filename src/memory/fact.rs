//! Fact memory — subject/predicate/object triples.
//!
//! The triple is flattened into the content for embedding and kept
//! structured in metadata. Confidence doubles as the importance weight.
//! Facts never decay.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Manager, Memory, MemoryInput, MemoryKind, RecallOptions};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub confidence: f64,
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Fact view over the memory manager.
pub struct FactMemory<'m, 'a> {
    manager: &'m Manager<'a>,
}

impl<'m, 'a> FactMemory<'m, 'a> {
    pub fn new(manager: &'m Manager<'a>) -> Self {
        Self { manager }
    }

    /// Store a fact triple.
    pub fn store_fact(&self, fact: &Fact) -> Result<String> {
        let content = format!("{} {} {}", fact.subject, fact.predicate, fact.object);

        let mut metadata = serde_json::json!({
            "subject": fact.subject,
            "predicate": fact.predicate,
            "object": fact.object,
            "confidence": fact.confidence,
        });
        if let Some(source) = &fact.source {
            metadata["source"] = serde_json::json!(source);
        }

        let mut input = MemoryInput::new(MemoryKind::Fact, content);
        input.metadata = metadata;
        input.timestamp = Some(fact.timestamp);
        input.importance = Some(fact.confidence);

        self.manager.remember(input)
    }

    /// Semantic fact search.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Fact>> {
        let opts = RecallOptions {
            limit,
            kinds: vec![MemoryKind::Fact],
            apply_decay: false,
            weight_by_importance: true,
            min_relevance: 0.3,
            ..Default::default()
        };

        let memories = self.manager.recall(query, &opts)?;
        Ok(memories.iter().map(fact_from_memory).collect())
    }

    /// Facts about a subject+predicate pair.
    pub fn query(&self, subject: &str, predicate: &str) -> Result<Vec<Fact>> {
        self.search(&format!("{subject} {predicate}"), 10)
    }

    /// Every stored fact, newest first.
    pub fn all(&self) -> Result<Vec<Fact>> {
        let memories = self.manager.list_by_kind(MemoryKind::Fact)?;
        Ok(memories.iter().map(fact_from_memory).collect())
    }

    /// Delete the fact matching an exact triple.
    pub fn delete(&self, subject: &str, predicate: &str, object: &str) -> Result<()> {
        for memory in self.manager.list_by_kind(MemoryKind::Fact)? {
            if memory.metadata["subject"] == subject
                && memory.metadata["predicate"] == predicate
                && memory.metadata["object"] == object
            {
                self.manager.delete(&memory.id)?;
                return Ok(());
            }
        }
        Err(Error::NotFound(format!(
            "fact: {subject} {predicate} {object}"
        )))
    }
}

fn fact_from_memory(memory: &Memory) -> Fact {
    Fact {
        subject: meta_str(memory, "subject"),
        predicate: meta_str(memory, "predicate"),
        object: meta_str(memory, "object"),
        confidence: memory.metadata["confidence"].as_f64().unwrap_or(0.5),
        source: memory.metadata["source"].as_str().map(str::to_string),
        timestamp: memory.timestamp,
    }
}

fn meta_str(memory: &Memory, key: &str) -> String {
    memory.metadata[key].as_str().unwrap_or_default().to_string()
}
