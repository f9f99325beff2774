//! Preference memory — category/key/value settings about the user.
//!
//! Values stay heterogeneous (any JSON), so they live in metadata and are
//! narrowed at read sites. Preferences are always important (1.0) and never
//! decay.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Manager, MemoryInput, MemoryKind, RecallOptions};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize)]
pub struct Preference {
    pub category: String,
    pub key: String,
    pub value: serde_json::Value,
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Preference view over the memory manager.
pub struct PreferenceMemory<'m, 'a> {
    manager: &'m Manager<'a>,
}

impl<'m, 'a> PreferenceMemory<'m, 'a> {
    pub fn new(manager: &'m Manager<'a>) -> Self {
        Self { manager }
    }

    /// Record a preference.
    pub fn record(&self, pref: &Preference) -> Result<String> {
        let value_json = serde_json::to_string(&pref.value)?;
        let content = format!(
            "User preference {}: {} = {}",
            pref.category, pref.key, value_json
        );

        let mut metadata = serde_json::json!({
            "category": pref.category,
            "key": pref.key,
            "value": pref.value,
        });
        if let Some(source) = &pref.source {
            metadata["source"] = serde_json::json!(source);
        }

        let mut input = MemoryInput::new(MemoryKind::Preference, content);
        input.metadata = metadata;
        input.timestamp = Some(pref.timestamp);
        input.importance = Some(1.0);

        self.manager.remember(input)
    }

    /// Look up one preference value, semantic-first with an exact-match
    /// fallback.
    pub fn get(&self, category: &str, key: &str) -> Result<serde_json::Value> {
        let opts = RecallOptions {
            limit: 1,
            kinds: vec![MemoryKind::Preference],
            apply_decay: false,
            weight_by_importance: false,
            min_relevance: 0.0,
            ..Default::default()
        };

        let memories = self.manager.recall(&format!("{category} {key}"), &opts)?;
        if let Some(memory) = memories.first() {
            if memory.metadata["category"] == category && memory.metadata["key"] == key {
                return Ok(memory.metadata["value"].clone());
            }
        }

        self.get_exact(category, key)
    }

    fn get_exact(&self, category: &str, key: &str) -> Result<serde_json::Value> {
        for memory in self.manager.list_by_kind(MemoryKind::Preference)? {
            if memory.metadata["category"] == category && memory.metadata["key"] == key {
                return Ok(memory.metadata["value"].clone());
            }
        }
        Err(Error::NotFound(format!("preference {category}/{key}")))
    }

    /// Every preference, flattened as category -> key -> value.
    pub fn all(&self) -> Result<BTreeMap<String, BTreeMap<String, serde_json::Value>>> {
        let mut prefs: BTreeMap<String, BTreeMap<String, serde_json::Value>> = BTreeMap::new();

        for memory in self.manager.list_by_kind(MemoryKind::Preference)? {
            let (Some(category), Some(key)) = (
                memory.metadata["category"].as_str(),
                memory.metadata["key"].as_str(),
            ) else {
                continue;
            };
            prefs
                .entry(category.to_string())
                .or_default()
                .insert(key.to_string(), memory.metadata["value"].clone());
        }

        Ok(prefs)
    }

    /// Update an existing preference in place, or record a new one.
    pub fn update(&self, category: &str, key: &str, value: serde_json::Value) -> Result<()> {
        for memory in self.manager.list_by_kind(MemoryKind::Preference)? {
            if memory.metadata["category"] == category && memory.metadata["key"] == key {
                let value_json = serde_json::to_string(&value)?;
                let mut metadata = memory.metadata.clone();
                metadata["value"] = value;

                let mut input = MemoryInput::new(
                    MemoryKind::Preference,
                    format!("User preference {category}: {key} = {value_json}"),
                );
                input.metadata = metadata;
                input.importance = Some(1.0);
                return self.manager.update(&memory.id, input);
            }
        }

        self.record(&Preference {
            category: category.into(),
            key: key.into(),
            value,
            source: Some("updated".into()),
            timestamp: Utc::now(),
        })
        .map(|_| ())
    }

    /// Delete one preference.
    pub fn delete(&self, category: &str, key: &str) -> Result<()> {
        for memory in self.manager.list_by_kind(MemoryKind::Preference)? {
            if memory.metadata["category"] == category && memory.metadata["key"] == key {
                self.manager.delete(&memory.id)?;
                return Ok(());
            }
        }
        Err(Error::NotFound(format!("preference {category}/{key}")))
    }

    /// Export every preference as pretty JSON.
    pub fn export(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.all()?)?)
    }

    /// Import preferences from JSON produced by [`export`](Self::export).
    pub fn import(&self, json: &str) -> Result<usize> {
        let prefs: BTreeMap<String, BTreeMap<String, serde_json::Value>> =
            serde_json::from_str(json)?;

        let now = Utc::now();
        let mut imported = 0;
        for (category, entries) in prefs {
            for (key, value) in entries {
                self.record(&Preference {
                    category: category.clone(),
                    key,
                    value,
                    source: Some("imported".into()),
                    timestamp: now,
                })?;
                imported += 1;
            }
        }
        Ok(imported)
    }
}
