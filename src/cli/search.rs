use anyhow::Result;

use super::emit_records;
use crate::format::OutputFormat;
use crate::model::Capabilities;
use crate::rag::{expand_query_cached, RetrievalStrategy, RetrieveOptions, Retriever};
use crate::store::{SearchResult, Store};

fn result_records(results: &[SearchResult]) -> Vec<serde_json::Value> {
    results
        .iter()
        .map(|r| serde_json::to_value(r).unwrap_or_default())
        .collect()
}

fn print_results_text(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results");
        return;
    }
    for (i, r) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {}/{} — {}",
            i + 1,
            r.score,
            r.collection,
            r.path,
            r.title
        );
        if !r.snippet.is_empty() {
            println!("   {}", r.snippet.replace('\n', " "));
        }
    }
}

/// `search <q>` — BM25 only.
pub fn search(
    store: &Store,
    query: &str,
    limit: usize,
    collection: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let results = store.search_fts(query, limit, collection)?;
    emit_records(&result_records(&results), format, |_| {
        print_results_text(&results)
    });
    Ok(())
}

/// `vsearch <q>` — vector only, document-level.
pub fn vsearch(
    store: &Store,
    capabilities: &Capabilities,
    query: &str,
    limit: usize,
    collection: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let embedding = capabilities.embedder.embed(query, true)?;
    let results = store.search_documents(query, &embedding, limit, collection)?;
    emit_records(&result_records(&results), format, |_| {
        print_results_text(&results)
    });
    Ok(())
}

/// `query <q>` — hybrid + expansion + rerank.
pub fn query(
    store: &Store,
    capabilities: &Capabilities,
    query: &str,
    limit: usize,
    collection: Option<&str>,
    min_score: f64,
    format: OutputFormat,
) -> Result<()> {
    let retriever = Retriever::new(store, capabilities);
    let opts = RetrieveOptions {
        limit,
        min_score,
        collection: collection.map(str::to_string),
        strategy: RetrievalStrategy::Hybrid,
        rerank: capabilities.reranker.is_some(),
        expand_query: true,
        ..Default::default()
    };

    let contexts = retriever.retrieve(query, &opts)?;
    let records: Vec<serde_json::Value> = contexts
        .iter()
        .map(|c| serde_json::to_value(c).unwrap_or_default())
        .collect();

    emit_records(&records, format, |_| {
        if contexts.is_empty() {
            println!("No results");
            return;
        }
        for (i, ctx) in contexts.iter().enumerate() {
            println!("{}. [{:.3}] {}", i + 1, ctx.relevance, ctx.source);
            if let Some(snippet) = ctx.metadata["snippet"].as_str() {
                if !snippet.is_empty() {
                    println!("   {}", snippet.replace('\n', " "));
                }
            }
        }
    });
    Ok(())
}

/// `expand <q>` — show the expansion set for a query.
pub fn expand(
    store: &Store,
    capabilities: &Capabilities,
    query: &str,
    format: OutputFormat,
) -> Result<()> {
    let expansions = expand_query_cached(
        store,
        query,
        capabilities.generator.as_ref().map(|g| g.as_ref()),
    );
    let records: Vec<serde_json::Value> = expansions
        .iter()
        .map(|e| serde_json::to_value(e).unwrap_or_default())
        .collect();

    emit_records(&records, format, |_| {
        for e in &expansions {
            println!("{:<5} {:.1}  {}", e.kind.as_str(), e.weight, e.text);
        }
    });
    Ok(())
}
