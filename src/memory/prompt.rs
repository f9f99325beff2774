//! System-prompt assembly from recalled memory and retrieved documents.
//!
//! Sections render in a fixed order and disappear when empty: persona,
//! recent conversation turns, relevant facts, preferences, general recalled
//! memories, and retrieved reference documents.

use super::conversation::ConversationMemory;
use super::fact::FactMemory;
use super::preference::PreferenceMemory;
use super::{Manager, RecallOptions};
use crate::rag::Context;

/// Relevance floor below which retrieved documents are considered noise.
const DOC_RELEVANCE_FLOOR: f64 = 0.3;

/// Snippet budget per retrieved document.
const DOC_SNIPPET_LEN: usize = 500;

const PERSONA: &str = "You are a general-purpose assistant. Answer the user's actual question.
Guidelines:
- If the user has not told you their name, you do not know it; say so plainly.
- The memory and document sections below are reference material only; do not infer the user's identity from them.
- Cite the documents only when the question relates to their content; otherwise just converse normally.";

/// Builds memory-aware system prompts.
pub struct PromptBuilder<'m, 'a> {
    manager: &'m Manager<'a>,
    recency_k: usize,
    fact_top_k: usize,
    max_memory_chars: usize,
}

impl<'m, 'a> PromptBuilder<'m, 'a> {
    pub fn new(manager: &'m Manager<'a>) -> Self {
        Self {
            manager,
            recency_k: 5,
            fact_top_k: 10,
            max_memory_chars: 2000,
        }
    }

    /// How many recent conversation turns to include.
    pub fn with_recency_k(mut self, k: usize) -> Self {
        self.recency_k = k;
        self
    }

    /// How many query-relevant facts to include.
    pub fn with_fact_top_k(mut self, k: usize) -> Self {
        self.fact_top_k = k;
        self
    }

    /// Assemble the system prompt for a session, query, and retrieved
    /// contexts. Any of the three may be empty.
    pub fn build_system_prompt(
        &self,
        session_id: Option<&str>,
        user_query: &str,
        contexts: &[Context],
    ) -> String {
        let mut parts = vec![PERSONA.to_string()];

        // 1. Recent conversation turns
        if let Some(session_id) = session_id {
            let conv = ConversationMemory::new(self.manager);
            if let Ok(history) = conv.history(session_id, self.recency_k) {
                if !history.is_empty() {
                    let lines: Vec<String> = history
                        .iter()
                        .map(|t| format!("User: {}\nAssistant: {}", t.user, t.assistant))
                        .collect();
                    let mut text = lines.join("\n---\n");
                    let budget = self.max_memory_chars / 2;
                    if text.len() > budget {
                        text = format!("{}...", truncate_at_boundary(&text, budget));
                    }
                    parts.push(format!(
                        "\n[Conversation memory (last {} turns)]\n{}",
                        history.len(),
                        text
                    ));
                }
            }
        }

        // 2. Query-relevant facts
        if !user_query.is_empty() {
            let facts = FactMemory::new(self.manager);
            if let Ok(found) = facts.search(user_query, self.fact_top_k) {
                if !found.is_empty() {
                    let lines: Vec<String> = found
                        .iter()
                        .map(|f| format!("- {} {} {}", f.subject, f.predicate, f.object))
                        .collect();
                    parts.push(format!("\n[Known facts]\n{}", lines.join("\n")));
                }
            }
        }

        // 3. Preferences, flattened by category
        let prefs = PreferenceMemory::new(self.manager);
        if let Ok(all) = prefs.all() {
            let mut lines = Vec::new();
            for (category, entries) in &all {
                for (key, value) in entries {
                    lines.push(format!("- {category}.{key} = {value}"));
                }
            }
            if !lines.is_empty() {
                parts.push(format!("\n[User preferences]\n{}", lines.join("\n")));
            }
        }

        // 4. General recall beyond facts and preferences
        if !user_query.is_empty() {
            let opts = RecallOptions {
                limit: 5,
                kinds: Vec::new(),
                apply_decay: true,
                weight_by_importance: true,
                min_relevance: 0.3,
                ..Default::default()
            };
            if let Ok(memories) = self.manager.recall(user_query, &opts) {
                if !memories.is_empty() {
                    let lines: Vec<String> = memories
                        .iter()
                        .map(|m| {
                            format!("- [{}] {}", m.kind, preview(&m.content, 100))
                        })
                        .collect();
                    parts.push(format!("\n[Related memories]\n{}", lines.join("\n")));
                }
            }
        }

        // 5. Retrieved documents above the relevance floor
        let mut doc_lines = Vec::new();
        for (i, ctx) in contexts.iter().enumerate() {
            if ctx.relevance < DOC_RELEVANCE_FLOOR {
                continue;
            }
            doc_lines.push(format!(
                "[{}] (source: {}, relevance: {:.2})\n{}",
                i + 1,
                ctx.source,
                ctx.relevance,
                preview(&ctx.text, DOC_SNIPPET_LEN)
            ));
        }
        if !doc_lines.is_empty() {
            parts.push(format!(
                "\n[Reference documents (cite only when relevant)]\n{}",
                doc_lines.join("\n\n")
            ));
        }

        parts.join("\n")
    }
}

/// Single-line preview truncated to `max_chars` characters.
fn preview(text: &str, max_chars: usize) -> String {
    let flattened = text.replace('\n', " ");
    let count = flattened.chars().count();
    if count <= max_chars {
        return flattened;
    }
    let truncated: String = flattened.chars().take(max_chars).collect();
    format!("{truncated}...")
}

fn truncate_at_boundary(s: &str, mut i: usize) -> &str {
    if i >= s.len() {
        return s;
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    &s[..i]
}
