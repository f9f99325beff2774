//! Deterministic capability provider.
//!
//! The default build ships without a neural runtime; this provider keeps the
//! full pipeline exercisable. Embeddings are hash-seeded pseudo-random unit
//! vectors (identical text always embeds identically), reranking scores by
//! query-token overlap, and generation returns templated text.

use super::{
    l2_normalize, Embedder, GenerateOptions, Generator, RerankDoc, RerankScore, Reranker,
};
use crate::error::{Error, Result};

/// Dimensionality of mock embeddings.
pub const MOCK_DIMENSIONS: usize = 384;

pub struct MockModel {
    dimensions: usize,
}

impl Default for MockModel {
    fn default() -> Self {
        Self {
            dimensions: MOCK_DIMENSIONS,
        }
    }
}

impl MockModel {
    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Embedder for MockModel {
    fn embed(&self, text: &str, _is_query: bool) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(Error::InvalidInput("cannot embed empty text".into()));
        }

        // Seed an LCG from the text so identical inputs embed identically
        let mut seed: u32 = 0;
        for c in text.chars() {
            seed = seed.wrapping_mul(31).wrapping_add(c as u32);
        }

        let mut embedding = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            embedding.push(seed as i32 as f32 / i32::MAX as f32);
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

impl Reranker for MockModel {
    fn rerank(&self, query: &str, docs: &[RerankDoc]) -> Result<Vec<RerankScore>> {
        let query_terms: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .collect();

        let mut scores: Vec<RerankScore> = docs
            .iter()
            .map(|doc| RerankScore {
                id: doc.id.clone(),
                score: token_overlap(&query_terms, &doc.content),
            })
            .collect();

        scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(scores)
    }
}

impl Generator for MockModel {
    fn generate(&self, prompt: &str, _opts: &GenerateOptions) -> Result<String> {
        Ok(format!("Mock generated response for: {prompt}"))
    }
}

/// Fraction of query terms appearing in the document text.
fn token_overlap(query_terms: &[String], doc: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let doc_lower = doc.to_lowercase();
    let doc_terms: Vec<&str> = doc_lower.split_whitespace().collect();

    let matched = query_terms
        .iter()
        .filter(|term| doc_terms.iter().any(|dt| dt == term))
        .count();

    matched as f64 / query_terms.len() as f64
}
