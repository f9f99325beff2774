//! Retrieval orchestration: strategy dispatch, hybrid fusion, query
//! expansion, and position-aware rerank blending.
//!
//! Capability failures degrade rather than break: a dense route without an
//! embedder is skipped inside hybrid and expanded retrieval, and a failed
//! expansion route is logged and dropped. Only a single-strategy call that
//! cannot run at all surfaces the error.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use super::expansion::{expand_query_cached, ExpansionKind};
use crate::error::{Error, Result};
use crate::model::{Capabilities, Embedder, Generator, RerankDoc, Reranker};
use crate::store::search::reciprocal_rank_fusion;
use crate::store::{SearchResult, SourceTag, Store};

/// Hard cap on how many candidates are handed to the reranker.
const RERANK_DOC_LIMIT: usize = 40;

/// How to retrieve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrategy {
    /// BM25 full-text only.
    Fts,
    /// Dense chunk vectors only.
    Vector,
    /// Both, fused with RRF.
    Hybrid,
}

impl RetrievalStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fts => "fts",
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }
}

impl std::str::FromStr for RetrievalStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "fts" => Ok(Self::Fts),
            "vector" => Ok(Self::Vector),
            "hybrid" => Ok(Self::Hybrid),
            _ => Err(format!("unknown strategy: {s}")),
        }
    }
}

/// Retrieval parameters.
#[derive(Debug, Clone)]
pub struct RetrieveOptions {
    pub limit: usize,
    pub min_score: f64,
    pub collection: Option<String>,
    pub strategy: RetrievalStrategy,
    pub rerank: bool,
    pub expand_query: bool,
    pub rrf_weights: Vec<f64>,
    pub rrf_k: usize,
}

impl Default for RetrieveOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            min_score: 0.0,
            collection: None,
            strategy: RetrievalStrategy::Hybrid,
            rerank: false,
            expand_query: false,
            rrf_weights: vec![1.0, 1.0],
            rrf_k: 60,
        }
    }
}

/// A retrieved context handed to the prompt builder.
#[derive(Debug, Clone, Serialize)]
pub struct Context {
    pub text: String,
    pub source: String,
    pub relevance: f64,
    pub metadata: serde_json::Value,
}

/// The retrieval pipeline over a store and the model capabilities.
pub struct Retriever<'a> {
    store: &'a Store,
    embedder: Arc<dyn Embedder>,
    reranker: Option<Arc<dyn Reranker>>,
    generator: Option<Arc<dyn Generator>>,
}

impl<'a> Retriever<'a> {
    pub fn new(store: &'a Store, capabilities: &Capabilities) -> Self {
        Self {
            store,
            embedder: capabilities.embedder.clone(),
            reranker: capabilities.reranker.clone(),
            generator: capabilities.generator.clone(),
        }
    }

    /// Run a retrieval and map the hits into prompt contexts.
    pub fn retrieve(&self, query: &str, opts: &RetrieveOptions) -> Result<Vec<Context>> {
        let mut results = if opts.expand_query {
            self.retrieve_with_expansion(query, opts)?
        } else {
            self.retrieve_single(query, opts)?
        };

        if opts.min_score > 0.0 {
            results.retain(|r| r.score >= opts.min_score);
        }

        if opts.rerank && !results.is_empty() {
            results = self.rerank(query, results)?;
        }

        results.truncate(opts.limit);

        Ok(results.into_iter().map(to_context).collect())
    }

    /// Raw search results for one strategy (no expansion, no rerank).
    pub fn retrieve_single(
        &self,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<Vec<SearchResult>> {
        match opts.strategy {
            RetrievalStrategy::Fts => self.retrieve_fts(query, opts),
            RetrievalStrategy::Vector => self.retrieve_vector(query, opts),
            RetrievalStrategy::Hybrid => self.retrieve_hybrid(query, opts),
        }
    }

    fn retrieve_fts(&self, query: &str, opts: &RetrieveOptions) -> Result<Vec<SearchResult>> {
        self.store
            .search_fts(query, opts.limit * 2, opts.collection.as_deref())
    }

    fn retrieve_vector(&self, query: &str, opts: &RetrieveOptions) -> Result<Vec<SearchResult>> {
        let embedding = self.embedder.embed(query, true)?;
        self.store
            .search_chunks(query, &embedding, opts.limit * 2, opts.collection.as_deref())
    }

    fn retrieve_hybrid(&self, query: &str, opts: &RetrieveOptions) -> Result<Vec<SearchResult>> {
        let fts_results = self.retrieve_fts(query, opts)?;

        // A missing embedder degrades hybrid to lexical-only
        let vec_results = match self.retrieve_vector(query, opts) {
            Ok(results) => results,
            Err(e) if e.is_capability() => {
                tracing::warn!(error = %e, "dense route skipped");
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        Ok(reciprocal_rank_fusion(
            &[fts_results, vec_results],
            &opts.rrf_weights,
            opts.rrf_k,
        ))
    }

    /// Expanded retrieval: run each expansion through its route, fuse the
    /// per-expansion rankings with the expansion weights. Failed routes are
    /// dropped; if nothing survives, fall back to the plain strategy.
    fn retrieve_with_expansion(
        &self,
        query: &str,
        opts: &RetrieveOptions,
    ) -> Result<Vec<SearchResult>> {
        let expansions =
            expand_query_cached(self.store, query, self.generator.as_ref().map(|g| g.as_ref()));

        if expansions.is_empty() {
            return self.retrieve_single(query, opts);
        }

        let mut result_lists = Vec::new();
        let mut weights = Vec::new();

        for expansion in &expansions {
            let routed = match expansion.kind {
                ExpansionKind::Lex => self.retrieve_fts(&expansion.text, opts),
                ExpansionKind::Vec | ExpansionKind::Hyde => {
                    self.retrieve_vector(&expansion.text, opts)
                }
            };

            match routed {
                Ok(results) if !results.is_empty() => {
                    result_lists.push(results);
                    weights.push(expansion.weight);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        kind = expansion.kind.as_str(),
                        text = %expansion.text,
                        error = %e,
                        "expansion route failed"
                    );
                }
            }
        }

        if result_lists.is_empty() {
            return self.retrieve_single(query, opts);
        }

        Ok(reciprocal_rank_fusion(&result_lists, &weights, opts.rrf_k))
    }

    /// Position-aware rerank blending.
    ///
    /// The top of the fused ranking is where the lexical and dense signals
    /// already agree, so it keeps most of its RRF position score; the long
    /// tail leans on the reranker instead. Candidates the reranker does not
    /// return are dropped.
    fn rerank(&self, query: &str, results: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
        let reranker = self
            .reranker
            .as_ref()
            .ok_or_else(|| Error::CapabilityUnavailable("rerank model".into()))?;

        let mut candidates = results;
        candidates.truncate(RERANK_DOC_LIMIT);

        // 1-based fused rank per candidate
        let rank_of: HashMap<String, usize> = candidates
            .iter()
            .enumerate()
            .map(|(i, r)| (result_key(r), i + 1))
            .collect();

        let docs: Vec<RerankDoc> = candidates
            .iter()
            .map(|r| RerankDoc {
                id: r.id.clone(),
                content: r.content.clone(),
                title: r.title.clone(),
            })
            .collect();

        let scores = reranker.rerank(query, &docs)?;

        let by_id: HashMap<String, SearchResult> = candidates
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        let mut reranked: Vec<SearchResult> = Vec::with_capacity(scores.len());
        for entry in scores {
            let Some(mut result) = by_id.get(&entry.id).cloned() else {
                continue;
            };

            let rrf_rank = rank_of.get(&result_key(&result)).copied().unwrap_or(30);
            let rrf_weight = match rrf_rank {
                0..=3 => 0.75,
                4..=10 => 0.60,
                _ => 0.40,
            };
            let rrf_score = 1.0 / rrf_rank as f64;

            result.score = rrf_weight * rrf_score + (1.0 - rrf_weight) * entry.score;
            result.source = SourceTag::Rerank;
            reranked.push(result);
        }

        reranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Ok(reranked)
    }
}

fn result_key(result: &SearchResult) -> String {
    if result.id.is_empty() {
        result.path.clone()
    } else {
        result.id.clone()
    }
}

fn to_context(result: SearchResult) -> Context {
    Context {
        source: format!("{}/{}", result.collection, result.path),
        relevance: result.score,
        metadata: serde_json::json!({
            "title": result.title,
            "collection": result.collection,
            "path": result.path,
            "snippet": result.snippet,
            "source": result.source.as_str(),
            "modified_at": result.modified_at,
        }),
        text: result.content,
    }
}
