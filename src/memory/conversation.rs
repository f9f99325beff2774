//! Conversation memory — turns threaded by session id.
//!
//! Each turn stores the user and assistant messages in metadata alongside a
//! combined content string; session retrieval is a direct indexed lookup,
//! while semantic history search recalls with a short 7-day half-life.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{Manager, MemoryInput, MemoryKind, RecallOptions};
use crate::error::Result;

/// One user/assistant exchange.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub user: String,
    pub assistant: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Conversation view over the memory manager.
pub struct ConversationMemory<'m, 'a> {
    manager: &'m Manager<'a>,
}

impl<'m, 'a> ConversationMemory<'m, 'a> {
    pub fn new(manager: &'m Manager<'a>) -> Self {
        Self { manager }
    }

    /// Store one turn.
    pub fn store_turn(&self, turn: &ConversationTurn) -> Result<String> {
        let content = format!("User: {}\nAssistant: {}", turn.user, turn.assistant);

        let mut input = MemoryInput::new(MemoryKind::Conversation, content);
        input.metadata = serde_json::json!({
            "user_msg": turn.user,
            "assistant_msg": turn.assistant,
            "session_id": turn.session_id,
        });
        input.timestamp = Some(turn.timestamp);

        self.manager.remember(input)
    }

    /// The most recent turns of a session, newest first.
    pub fn history(&self, session_id: &str, max_turns: usize) -> Result<Vec<ConversationTurn>> {
        let rows = self
            .manager
            .store()
            .memories_by_session(session_id, max_turns)?;

        Ok(rows
            .into_iter()
            .map(|row| ConversationTurn {
                user: metadata_str(&row.metadata, "user_msg"),
                assistant: metadata_str(&row.metadata, "assistant_msg"),
                session_id: session_id.to_string(),
                timestamp: row.timestamp,
            })
            .collect())
    }

    /// Semantic search across past turns of every session. Recency matters
    /// for conversations, so decay runs with a 7-day half-life.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<ConversationTurn>> {
        let opts = RecallOptions {
            limit,
            kinds: vec![MemoryKind::Conversation],
            apply_decay: true,
            decay_halflife_hours: 7.0 * 24.0,
            weight_by_importance: false,
            min_relevance: 0.0,
        };

        let memories = self.manager.recall(query, &opts)?;
        Ok(memories
            .into_iter()
            .map(|m| ConversationTurn {
                user: metadata_str(&m.metadata, "user_msg"),
                assistant: metadata_str(&m.metadata, "assistant_msg"),
                session_id: metadata_str(&m.metadata, "session_id"),
                timestamp: m.timestamp,
            })
            .collect())
    }

    /// Delete a session's turns. Returns the count removed.
    pub fn clear_session(&self, session_id: &str) -> Result<usize> {
        self.manager.store().delete_memories_by_session(session_id)
    }

    /// Every session id seen so far.
    pub fn session_ids(&self) -> Result<Vec<String>> {
        self.manager.store().session_ids()
    }
}

fn metadata_str(metadata: &serde_json::Value, key: &str) -> String {
    metadata
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}
