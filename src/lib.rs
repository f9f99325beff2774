//! mmq — a local-first RAG and long-term memory engine.
//!
//! Documents live in a content-addressed SQLite store with two synchronized
//! retrieval views: an FTS5 index maintained by triggers (BM25) and a
//! sqlite-vec ANN table over chunk embeddings (cosine). Queries combine both
//! views with reciprocal rank fusion, optional query expansion, and
//! position-aware rerank blending. A typed memory store (conversation turns,
//! facts, preferences, episodic notes) recalls by semantic similarity with
//! time decay and importance weighting.
//!
//! # Architecture
//!
//! - **Storage**: SQLite (WAL) with FTS5 for keyword search and
//!   [sqlite-vec](https://github.com/asg017/sqlite-vec) for vector search
//! - **Chunking**: boundary-seeking overlapping windows (~3200 chars)
//! - **Search**: BM25 + chunk vectors merged via weighted Reciprocal Rank
//!   Fusion, optionally reranked with position-aware blending
//! - **Memory**: decayed, importance-weighted semantic recall feeding a
//!   system-prompt builder
//!
//! # Modules
//!
//! - [`config`] — TOML configuration with environment overrides
//! - [`db`] — database initialization, schema, triggers, and migrations
//! - [`store`] — documents, collections, contexts, embeddings, cache, memory rows
//! - [`model`] — embedding/rerank/generation capability traits
//! - [`rag`] — retrieval pipeline and query expansion
//! - [`memory`] — typed memories, recall, and prompt assembly
//! - [`ingest`] — directory-walk ingestion and the embedding pass

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod ingest;
pub mod memory;
pub mod model;
pub mod rag;
pub mod store;

pub use error::{Error, Result};
