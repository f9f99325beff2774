//! Model capabilities consumed by retrieval and memory.
//!
//! The surface is split into three narrow traits so a component that only
//! embeds never forces a reranker or generator to load. Each implementation
//! owns its model and is internally serialized — callers must not assume
//! reentrancy, and the process holds exactly one instance of each.

pub mod download;
pub mod mock;

use std::sync::Arc;

use crate::config::ModelConfig;
use crate::error::{Error, Result};

/// Text to unit-length vector. `is_query` selects the query-side encoding on
/// asymmetric models; document ingestion passes `false`.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str, is_query: bool) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[&str], is_query: bool) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t, is_query)).collect()
    }

    /// Vector dimensionality, discovered from the first successful call.
    fn dimensions(&self) -> usize;
}

/// A document handed to the reranker.
#[derive(Debug, Clone)]
pub struct RerankDoc {
    pub id: String,
    pub content: String,
    pub title: String,
}

/// One reranked entry, scored in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct RerankScore {
    pub id: String,
    pub score: f64,
}

/// Query-relative document scoring, sorted descending by score.
///
/// Known limitation: cheap rerankers built on the retrieval embeddings score
/// with the same signal the dense route already used, which weakens blending.
/// Implementations should score independently of the embedding space where
/// possible.
pub trait Reranker: Send + Sync {
    fn rerank(&self, query: &str, docs: &[RerankDoc]) -> Result<Vec<RerankScore>>;
}

/// Options for text generation.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub temperature: f32,
    pub top_k: usize,
    pub top_p: f32,
    pub max_tokens: usize,
    pub stop_words: Vec<String>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            top_k: 40,
            top_p: 0.9,
            max_tokens: 512,
            stop_words: Vec::new(),
        }
    }
}

/// Free-form text generation (used for query expansion).
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str, opts: &GenerateOptions) -> Result<String>;
}

/// The capability bundle a process carries.
pub struct Capabilities {
    pub embedder: Arc<dyn Embedder>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub generator: Option<Arc<dyn Generator>>,
    pub embedding_model: String,
}

/// Build the capability bundle for the configured provider.
pub fn create_capabilities(config: &ModelConfig) -> Result<Capabilities> {
    match config.provider.as_str() {
        "mock" => {
            let model = Arc::new(mock::MockModel::default());
            Ok(Capabilities {
                embedder: model.clone(),
                reranker: Some(model.clone()),
                generator: Some(model),
                embedding_model: format!("mock/{}", config.embedding_model),
            })
        }
        other => Err(Error::CapabilityUnavailable(format!(
            "unknown model provider '{other}' (supported: mock); \
             check model files under {}",
            config.cache_dir
        ))),
    }
}

/// L2-normalize a vector in place. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
