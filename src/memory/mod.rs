//! Long-term memory: typed semantic memories with decayed,
//! importance-weighted recall.
//!
//! The [`Manager`] owns embedding and recall; [`conversation`], [`fact`],
//! and [`preference`] layer typed views over it. [`prompt`] assembles the
//! system prompt from recalled memory and retrieved document contexts.

pub mod conversation;
pub mod fact;
pub mod manager;
pub mod preference;
pub mod prompt;

pub use manager::{Manager, MemoryInput, RecallOptions};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four memory kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryKind {
    /// A conversation turn, threaded by session id.
    Conversation,
    /// A declarative fact. Never decays.
    Fact,
    /// A user preference. Never decays.
    Preference,
    /// An episodic note or event.
    Episodic,
}

impl MemoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Fact => "fact",
            Self::Preference => "preference",
            Self::Episodic => "episodic",
        }
    }

    /// Whether recall-time decay applies to this kind.
    pub fn decays(&self) -> bool {
        !matches!(self, Self::Fact | Self::Preference)
    }
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conversation" => Ok(Self::Conversation),
            "fact" => Ok(Self::Fact),
            "preference" => Ok(Self::Preference),
            "episodic" => Ok(Self::Episodic),
            _ => Err(format!("unknown memory kind: {s}")),
        }
    }
}

/// A memory as callers see it.
#[derive(Debug, Clone, Serialize)]
pub struct Memory {
    pub id: String,
    pub kind: MemoryKind,
    pub content: String,
    pub metadata: serde_json::Value,
    pub tags: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    /// Scoring multiplier in `[0, 1]`; never mutated by recall.
    pub importance: f64,
    /// Recall relevance after decay and weighting; 0 outside recall.
    pub relevance: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn kind_string_round_trip() {
        for kind in [
            MemoryKind::Conversation,
            MemoryKind::Fact,
            MemoryKind::Preference,
            MemoryKind::Episodic,
        ] {
            assert_eq!(MemoryKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(MemoryKind::from_str("semantic").is_err());
    }

    #[test]
    fn facts_and_preferences_never_decay() {
        assert!(!MemoryKind::Fact.decays());
        assert!(!MemoryKind::Preference.decays());
        assert!(MemoryKind::Conversation.decays());
        assert!(MemoryKind::Episodic.decays());
    }
}
