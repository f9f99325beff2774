//! The memory manager: embedding on write, similarity recall with time decay
//! and importance weighting on read.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::{Memory, MemoryKind};
use crate::error::Result;
use crate::model::Embedder;
use crate::store::memory::MemoryRow;
use crate::store::Store;

/// Default half-life for time decay: 30 days.
pub const DEFAULT_HALFLIFE_HOURS: f64 = 30.0 * 24.0;

/// Recall parameters.
#[derive(Debug, Clone)]
pub struct RecallOptions {
    pub limit: usize,
    /// Empty means all kinds.
    pub kinds: Vec<MemoryKind>,
    pub apply_decay: bool,
    pub decay_halflife_hours: f64,
    pub weight_by_importance: bool,
    pub min_relevance: f64,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            kinds: Vec::new(),
            apply_decay: true,
            decay_halflife_hours: DEFAULT_HALFLIFE_HOURS,
            weight_by_importance: true,
            min_relevance: 0.0,
        }
    }
}

/// Input for storing a memory.
#[derive(Debug, Clone)]
pub struct MemoryInput {
    pub kind: MemoryKind,
    pub content: String,
    pub metadata: serde_json::Value,
    pub tags: Vec<String>,
    /// Defaults to now.
    pub timestamp: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Defaults to 0.5.
    pub importance: Option<f64>,
}

impl MemoryInput {
    pub fn new(kind: MemoryKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            metadata: serde_json::json!({}),
            tags: Vec::new(),
            timestamp: None,
            expires_at: None,
            importance: None,
        }
    }
}

/// Memory manager over the store and the embedding capability.
pub struct Manager<'a> {
    store: &'a Store,
    embedder: Arc<dyn Embedder>,
}

fn row_to_memory(row: MemoryRow) -> Option<Memory> {
    let kind = match MemoryKind::from_str(&row.kind) {
        Ok(kind) => kind,
        Err(_) => {
            tracing::warn!(id = %row.id, kind = %row.kind, "skipping memory of unknown kind");
            return None;
        }
    };
    Some(Memory {
        id: row.id,
        kind,
        content: row.content,
        metadata: row.metadata,
        tags: row.tags,
        timestamp: row.timestamp,
        expires_at: row.expires_at,
        importance: row.importance,
        relevance: row.relevance,
    })
}

impl<'a> Manager<'a> {
    pub fn new(store: &'a Store, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    pub(crate) fn store(&self) -> &Store {
        self.store
    }

    /// Store a memory with the embedding of its content.
    pub fn remember(&self, input: MemoryInput) -> Result<String> {
        let embedding = self.embedder.embed(&input.content, false)?;

        self.store.insert_memory(
            input.kind.as_str(),
            &input.content,
            &input.metadata,
            &input.tags,
            input.timestamp.unwrap_or_else(Utc::now),
            input.expires_at,
            input.importance.unwrap_or(0.5),
            &embedding,
        )
    }

    /// Recall memories for a query.
    ///
    /// Over-fetches at twice the limit, then applies time decay
    /// (`exp(-age_hours / halflife_hours)`, facts and preferences exempt),
    /// importance weighting (`0.5 + importance`), the relevance floor, and
    /// the final truncation.
    pub fn recall(&self, query: &str, opts: &RecallOptions) -> Result<Vec<Memory>> {
        let query_embedding = self.embedder.embed(query, true)?;

        let kind_names: Vec<String> = opts
            .kinds
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();

        let rows = self
            .store
            .search_memories(&query_embedding, opts.limit * 2, &kind_names)?;

        let now = Utc::now();
        let mut memories: Vec<Memory> = rows.into_iter().filter_map(row_to_memory).collect();

        if opts.apply_decay && opts.decay_halflife_hours > 0.0 {
            for memory in &mut memories {
                if !memory.kind.decays() {
                    continue;
                }
                let age_hours = (now - memory.timestamp).num_seconds() as f64 / 3600.0;
                let decay = (-age_hours.max(0.0) / opts.decay_halflife_hours).exp();
                memory.relevance *= decay;
            }
        }

        if opts.weight_by_importance {
            for memory in &mut memories {
                memory.relevance *= 0.5 + memory.importance;
            }
        }

        memories.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        if opts.min_relevance > 0.0 {
            memories.retain(|m| m.relevance >= opts.min_relevance);
        }

        memories.truncate(opts.limit);
        Ok(memories)
    }

    /// Fetch one memory by id or prefix.
    pub fn get(&self, id: &str) -> Result<Memory> {
        let row = self.store.get_memory_by_prefix(id)?;
        row_to_memory(row)
            .ok_or_else(|| crate::error::Error::NotFound(format!("memory {id}")))
    }

    /// All memories of one kind, newest first.
    pub fn list_by_kind(&self, kind: MemoryKind) -> Result<Vec<Memory>> {
        let rows = self.store.memories_by_kind(kind.as_str())?;
        Ok(rows.into_iter().filter_map(row_to_memory).collect())
    }

    /// Update a memory's content and attributes, re-embedding the content.
    pub fn update(&self, id: &str, input: MemoryInput) -> Result<()> {
        let embedding = self.embedder.embed(&input.content, false)?;
        self.store.update_memory(
            id,
            &input.content,
            &input.metadata,
            &input.tags,
            input.expires_at,
            input.importance.unwrap_or(0.5),
            &embedding,
        )
    }

    /// Delete by id or prefix.
    pub fn delete(&self, id: &str) -> Result<usize> {
        self.store.delete_memory(id)
    }

    /// Delete expired memories; returns the count removed.
    pub fn cleanup_expired(&self) -> Result<usize> {
        self.store.delete_expired_memories()
    }

    pub fn count(&self) -> Result<i64> {
        self.store.count_memories()
    }

    pub fn count_by_kind(&self, kind: MemoryKind) -> Result<i64> {
        self.store.count_memories_by_kind(kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::mock::MockModel;

    fn manager_over(store: &Store) -> Manager<'_> {
        Manager::new(store, Arc::new(MockModel::default()))
    }

    #[test]
    fn remember_and_recall_round_trip() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        let mut input = MemoryInput::new(MemoryKind::Fact, "The sky is blue");
        input.tags = vec!["nature".into()];
        let id = manager.remember(input).unwrap();

        let recalled = manager
            .recall("The sky is blue", &RecallOptions::default())
            .unwrap();
        assert_eq!(recalled[0].id, id);
        assert_eq!(recalled[0].kind, MemoryKind::Fact);
        assert!(recalled[0].relevance > 0.9);
    }

    #[test]
    fn default_importance_is_half() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        let id = manager
            .remember(MemoryInput::new(MemoryKind::Episodic, "an event"))
            .unwrap();
        let memory = manager.get(&id).unwrap();
        assert!((memory.importance - 0.5).abs() < 1e-9);
    }

    #[test]
    fn kind_filter_limits_recall() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        manager
            .remember(MemoryInput::new(MemoryKind::Fact, "shared topic words"))
            .unwrap();
        manager
            .remember(MemoryInput::new(MemoryKind::Episodic, "shared topic words too"))
            .unwrap();

        let opts = RecallOptions {
            kinds: vec![MemoryKind::Fact],
            ..Default::default()
        };
        let recalled = manager.recall("shared topic words", &opts).unwrap();
        assert!(recalled.iter().all(|m| m.kind == MemoryKind::Fact));
    }

    #[test]
    fn newer_memory_wins_under_decay() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        // Same content, so both have identical raw relevance
        let mut old = MemoryInput::new(MemoryKind::Episodic, "decay target text");
        old.timestamp = Some(Utc::now() - chrono::Duration::days(30));
        manager.remember(old).unwrap();

        let mut new = MemoryInput::new(MemoryKind::Episodic, "decay target text");
        new.timestamp = Some(Utc::now());
        let new_id = manager.remember(new).unwrap();

        let opts = RecallOptions {
            apply_decay: true,
            weight_by_importance: false,
            ..Default::default()
        };
        let recalled = manager.recall("decay target text", &opts).unwrap();

        assert_eq!(recalled[0].id, new_id);
        // With a 30-day half-life, the newer one is ~2x the older one
        let ratio = recalled[0].relevance / recalled[1].relevance;
        assert!((ratio - 2.0).abs() < 0.05, "expected ~2x ratio, got {ratio}");
    }

    #[test]
    fn facts_do_not_decay() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        let mut old_fact = MemoryInput::new(MemoryKind::Fact, "permanent knowledge here");
        old_fact.timestamp = Some(Utc::now() - chrono::Duration::days(365));
        manager.remember(old_fact).unwrap();

        let opts = RecallOptions {
            apply_decay: true,
            weight_by_importance: false,
            ..Default::default()
        };
        let recalled = manager.recall("permanent knowledge here", &opts).unwrap();
        assert!(
            recalled[0].relevance > 0.9,
            "a year-old fact must keep full relevance, got {}",
            recalled[0].relevance
        );
    }

    #[test]
    fn importance_multiplies_relevance() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        let mut weak = MemoryInput::new(MemoryKind::Fact, "weighted recall subject");
        weak.importance = Some(0.0);
        manager.remember(weak).unwrap();

        let mut strong = MemoryInput::new(MemoryKind::Fact, "weighted recall subject");
        strong.importance = Some(1.0);
        let strong_id = manager.remember(strong).unwrap();

        let opts = RecallOptions {
            apply_decay: false,
            weight_by_importance: true,
            ..Default::default()
        };
        let recalled = manager.recall("weighted recall subject", &opts).unwrap();

        assert_eq!(recalled[0].id, strong_id);
        // multipliers are 1.5 vs 0.5 on equal raw relevance
        let ratio = recalled[0].relevance / recalled[1].relevance;
        assert!((ratio - 3.0).abs() < 0.05);
    }

    #[test]
    fn importance_never_mutates_stored_rows() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        let mut input = MemoryInput::new(MemoryKind::Episodic, "importance probe");
        input.importance = Some(0.7);
        let id = manager.remember(input).unwrap();

        manager
            .recall("importance probe", &RecallOptions::default())
            .unwrap();

        let stored = manager.get(&id).unwrap();
        assert!((stored.importance - 0.7).abs() < 1e-9);
    }

    #[test]
    fn min_relevance_floor_applies() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        manager
            .remember(MemoryInput::new(MemoryKind::Fact, "completely unrelated"))
            .unwrap();

        let opts = RecallOptions {
            min_relevance: 0.95,
            apply_decay: false,
            weight_by_importance: false,
            ..Default::default()
        };
        let recalled = manager.recall("zzz qqq xxx", &opts).unwrap();
        assert!(recalled.is_empty());
    }

    #[test]
    fn update_re_embeds_content() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        let id = manager
            .remember(MemoryInput::new(MemoryKind::Fact, "original wording"))
            .unwrap();

        manager
            .update(&id, MemoryInput::new(MemoryKind::Fact, "replacement wording"))
            .unwrap();

        let opts = RecallOptions {
            apply_decay: false,
            weight_by_importance: false,
            ..Default::default()
        };
        let recalled = manager.recall("replacement wording", &opts).unwrap();
        assert_eq!(recalled[0].id, id);
        assert!(recalled[0].relevance > 0.99);
    }

    #[test]
    fn counts_and_expiry() {
        let store = Store::open_in_memory().unwrap();
        let manager = manager_over(&store);

        let mut expired = MemoryInput::new(MemoryKind::Episodic, "gone soon");
        expired.expires_at = Some(Utc::now() - chrono::Duration::hours(1));
        manager.remember(expired).unwrap();
        manager
            .remember(MemoryInput::new(MemoryKind::Fact, "stays"))
            .unwrap();

        assert_eq!(manager.count().unwrap(), 2);
        assert_eq!(manager.cleanup_expired().unwrap(), 1);
        assert_eq!(manager.count().unwrap(), 1);
        assert_eq!(manager.count_by_kind(MemoryKind::Fact).unwrap(), 1);
    }
}
