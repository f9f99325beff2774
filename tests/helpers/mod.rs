#![allow(dead_code)]

use std::sync::Arc;

use mmq::config::ModelConfig;
use mmq::ingest;
use mmq::model::mock::MockModel;
use mmq::model::{create_capabilities, Capabilities, Embedder};
use mmq::store::document::DocumentInput;
use mmq::store::Store;

/// Fresh in-memory store with schema and migrations applied.
pub fn test_store() -> Store {
    Store::open_in_memory().unwrap()
}

/// The deterministic capability bundle used across integration tests.
pub fn mock_capabilities() -> Capabilities {
    create_capabilities(&ModelConfig::default()).unwrap()
}

/// Index one document; returns its content hash.
pub fn index_doc(store: &Store, collection: &str, path: &str, body: &str) -> String {
    store
        .index_document(&DocumentInput {
            collection: collection.into(),
            path: path.into(),
            title: path.trim_end_matches(".md").into(),
            content: body.into(),
            created_at: None,
            modified_at: None,
        })
        .unwrap()
}

/// Chunk and embed everything pending with the mock model.
pub fn embed_all(store: &mut Store, chunk_size: usize, chunk_overlap: usize) {
    let model = MockModel::default();
    ingest::embed_missing(store, &model, chunk_size, chunk_overlap, "mock").unwrap();
}

/// Embedding of a text under the mock model (document side).
pub fn mock_embedding(text: &str) -> Vec<f32> {
    MockModel::default().embed(text, false).unwrap()
}

/// A deterministic spike vector, for tests that want orthogonal embeddings.
pub fn unit_vec(dim: usize, spike: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dim];
    v[spike % dim] = 1.0;
    v
}

/// Capabilities with the embedder swapped for a shared mock and the rest
/// left intact.
pub fn capabilities_with_embedder(embedder: Arc<dyn Embedder>) -> Capabilities {
    let mut caps = mock_capabilities();
    caps.embedder = embedder;
    caps
}
