//! Retrieval pipeline scenarios: hybrid fusion ordering, expansion caching,
//! and graceful degradation.

mod helpers;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use helpers::{embed_all, index_doc, mock_capabilities, test_store};
use mmq::model::{Capabilities, GenerateOptions, Generator};
use mmq::rag::{RetrievalStrategy, RetrieveOptions, Retriever};

#[test]
fn hybrid_ranks_top_rank_candidates_first() {
    let mut store = test_store();

    // D1 carries the literal query terms; D2 is the semantic twin of the
    // query under the mock embedder (identical text); D3 is background noise
    // that never appears at rank 0 in either list.
    index_doc(
        &store,
        "notes",
        "d1.md",
        "quarterly revenue dashboard numbers and charts",
    );
    index_doc(&store, "notes", "d2.md", "quarterly revenue dashboard");
    index_doc(
        &store,
        "notes",
        "d3.md",
        "unrelated meeting notes mentioning revenue once",
    );
    embed_all(&mut store, 3200, 480);

    let caps = mock_capabilities();
    let retriever = Retriever::new(&store, &caps);

    let opts = RetrieveOptions {
        strategy: RetrievalStrategy::Hybrid,
        limit: 10,
        ..Default::default()
    };
    let contexts = retriever
        .retrieve("quarterly revenue dashboard", &opts)
        .unwrap();

    assert!(contexts.len() >= 3);
    let position = |path: &str| {
        contexts
            .iter()
            .position(|c| c.metadata["path"] == path)
            .unwrap_or(usize::MAX)
    };

    // Whichever of d1/d2 led a list must sit ahead of d3, which led neither
    assert!(position("d1.md") < position("d3.md"));
    assert!(position("d2.md") < position("d3.md"));
    assert_eq!(contexts[0].metadata["source"], "hybrid");
}

struct CountingGenerator {
    calls: Arc<AtomicUsize>,
}

impl Generator for CountingGenerator {
    fn generate(&self, prompt: &str, _opts: &GenerateOptions) -> mmq::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("generated for {}", prompt.len()))
    }
}

#[test]
fn expansion_cache_eliminates_generator_calls() {
    let mut store = test_store();
    index_doc(&store, "notes", "a.md", "expansion caching target body");
    embed_all(&mut store, 3200, 480);

    let calls = Arc::new(AtomicUsize::new(0));
    let mut caps: Capabilities = mock_capabilities();
    caps.generator = Some(Arc::new(CountingGenerator {
        calls: calls.clone(),
    }));
    let retriever = Retriever::new(&store, &caps);

    let opts = RetrieveOptions {
        expand_query: true,
        ..Default::default()
    };

    let first = retriever.retrieve("expansion caching target", &opts).unwrap();
    let calls_after_first = calls.load(Ordering::SeqCst);
    assert!(calls_after_first > 0, "first query must call the generator");

    let second = retriever.retrieve("expansion caching target", &opts).unwrap();
    assert_eq!(
        calls.load(Ordering::SeqCst),
        calls_after_first,
        "second identical query must hit the cache"
    );

    let first_json = serde_json::to_string(&first).unwrap();
    let second_json = serde_json::to_string(&second).unwrap();
    assert_eq!(first_json, second_json, "cached pipeline output is identical");
}

#[test]
fn expansion_without_generator_still_retrieves() {
    let mut store = test_store();
    index_doc(&store, "notes", "a.md", "rule based expansion finds keywords");
    embed_all(&mut store, 3200, 480);

    let mut caps = mock_capabilities();
    caps.generator = None;
    let retriever = Retriever::new(&store, &caps);

    let opts = RetrieveOptions {
        expand_query: true,
        ..Default::default()
    };
    let contexts = retriever
        .retrieve("expansion finds keywords", &opts)
        .unwrap();
    assert!(!contexts.is_empty());
}

#[test]
fn query_pipeline_rerank_tags_results() {
    let mut store = test_store();
    index_doc(&store, "notes", "a.md", "rerank pipeline subject document");
    index_doc(&store, "notes", "b.md", "another document about pipelines");
    embed_all(&mut store, 3200, 480);

    let caps = mock_capabilities();
    let retriever = Retriever::new(&store, &caps);

    let opts = RetrieveOptions {
        rerank: true,
        ..Default::default()
    };
    let contexts = retriever.retrieve("rerank pipeline subject", &opts).unwrap();

    assert!(!contexts.is_empty());
    assert_eq!(contexts[0].metadata["source"], "rerank");
    for ctx in &contexts {
        assert!((0.0..=1.0).contains(&ctx.relevance));
    }
}

#[test]
fn context_metadata_carries_provenance() {
    let mut store = test_store();
    index_doc(&store, "notes", "guides/a.md", "provenance metadata body");
    embed_all(&mut store, 3200, 480);

    let caps = mock_capabilities();
    let retriever = Retriever::new(&store, &caps);

    let opts = RetrieveOptions {
        strategy: RetrievalStrategy::Fts,
        ..Default::default()
    };
    let contexts = retriever.retrieve("provenance metadata", &opts).unwrap();

    assert_eq!(contexts.len(), 1);
    let ctx = &contexts[0];
    assert_eq!(ctx.source, "notes/guides/a.md");
    assert_eq!(ctx.metadata["collection"], "notes");
    assert_eq!(ctx.metadata["path"], "guides/a.md");
    assert!(ctx.metadata["snippet"].as_str().is_some());
    assert_eq!(ctx.metadata["source"], "fts");
}
