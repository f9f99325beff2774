//! Retrieval-augmented generation: query expansion and the retrieval
//! pipeline over the lexical and dense indexes.

pub mod expansion;
pub mod retriever;

pub use expansion::{expand_query, expand_query_cached, ExpansionKind, QueryExpansion};
pub use retriever::{Context, RetrievalStrategy, RetrieveOptions, Retriever};
