//! Query expansion.
//!
//! Every expansion set carries the original query on both the lexical and
//! dense routes at full weight, generative variants (a paraphrase and a
//! hypothetical answer) when a generator is available, and rule-based
//! keyword/bigram variants. Expensive generative calls are cached in the
//! store, keyed by the query; a hit skips the generator entirely.

use serde::{Deserialize, Serialize};

use crate::model::{GenerateOptions, Generator};
use crate::store::{cache::cache_key, Store};

/// Which retrieval route an expansion feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpansionKind {
    /// Lexical variant — routed to full-text search.
    Lex,
    /// Semantic variant — routed to dense search.
    Vec,
    /// Hypothetical answer — embedded and routed to dense search.
    Hyde,
}

impl ExpansionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Lex => "lex",
            Self::Vec => "vec",
            Self::Hyde => "hyde",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryExpansion {
    #[serde(rename = "type")]
    pub kind: ExpansionKind,
    pub text: String,
    pub weight: f64,
}

/// Expand a query. The generator is optional; without it the expansion set
/// is the original query plus rule-based variants.
pub fn expand_query(query: &str, generator: Option<&dyn Generator>) -> Vec<QueryExpansion> {
    let mut expansions = vec![
        QueryExpansion {
            kind: ExpansionKind::Lex,
            text: query.to_string(),
            weight: 2.0,
        },
        QueryExpansion {
            kind: ExpansionKind::Vec,
            text: query.to_string(),
            weight: 2.0,
        },
    ];

    if let Some(generator) = generator {
        let opts = GenerateOptions {
            temperature: 0.7,
            top_k: 20,
            top_p: 0.8,
            max_tokens: 120,
            stop_words: vec!["\n".into()],
        };

        match generator.generate(
            &format!("Rephrase this search query in different words, keeping its meaning. \
                      Reply with the rephrased query only.\n\nQuery: {query}\nRephrased:"),
            &opts,
        ) {
            Ok(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    expansions.push(QueryExpansion {
                        kind: ExpansionKind::Vec,
                        text,
                        weight: 1.0,
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, "paraphrase expansion failed"),
        }

        match generator.generate(
            &format!("Write one short paragraph that would answer this question.\n\n\
                      Question: {query}\nAnswer:"),
            &opts,
        ) {
            Ok(text) => {
                let text = text.trim().to_string();
                if !text.is_empty() {
                    expansions.push(QueryExpansion {
                        kind: ExpansionKind::Hyde,
                        text,
                        weight: 0.8,
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, "hypothetical-answer expansion failed"),
        }
    }

    expansions.extend(rule_based_expansions(query));
    expansions
}

/// Keyword and bigram variants derived from the query text alone.
fn rule_based_expansions(query: &str) -> Vec<QueryExpansion> {
    let keywords: Vec<String> = query
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.len() > 2)
        .collect();

    let mut expansions: Vec<QueryExpansion> = keywords
        .iter()
        .map(|kw| QueryExpansion {
            kind: ExpansionKind::Lex,
            text: kw.clone(),
            weight: 0.5,
        })
        .collect();

    for pair in keywords.windows(2) {
        expansions.push(QueryExpansion {
            kind: ExpansionKind::Lex,
            text: format!("{} {}", pair[0], pair[1]),
            weight: 0.7,
        });
    }

    expansions
}

/// Cached expansion: look up the store first, fall back to computing and
/// write through. Cache failures are logged and treated as misses — they
/// never fail the retrieval that triggered them.
pub fn expand_query_cached(
    store: &Store,
    query: &str,
    generator: Option<&dyn Generator>,
) -> Vec<QueryExpansion> {
    let key = cache_key("expandQuery", &serde_json::json!({ "query": query }));

    match store.get_cached_result(&key) {
        Ok(Some(cached)) => {
            if let Ok(expansions) = serde_json::from_str::<Vec<QueryExpansion>>(&cached) {
                tracing::debug!(query, "expansion cache hit");
                return expansions;
            }
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(error = %e, "expansion cache read failed"),
    }

    let expansions = expand_query(query, generator);

    if !expansions.is_empty() {
        match serde_json::to_string(&expansions) {
            Ok(encoded) => {
                if let Err(e) = store.set_cached_result(&key, &encoded) {
                    tracing::warn!(error = %e, "expansion cache write failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "expansion encode failed"),
        }
    }

    expansions
}
