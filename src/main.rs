mod cli;
mod config;
mod db;
mod error;
mod format;
mod ingest;
mod memory;
mod model;
mod rag;
mod store;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use config::MmqConfig;
use format::OutputFormat;
use memory::Manager;
use store::Store;

#[derive(Parser)]
#[command(name = "mmq", version, about = "Local-first RAG and memory engine")]
struct Cli {
    /// Database path (env: MMQ_DB)
    #[arg(short = 'd', long, global = true)]
    db: Option<String>,

    /// Collection filter
    #[arg(short = 'c', long, global = true)]
    collection: Option<String>,

    /// Output format (text|json|csv|md|xml)
    #[arg(short = 'f', long, global = true, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage collections
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Re-ingest every collection
    Update {
        /// Run `git pull` in collection roots first
        #[arg(long)]
        pull: bool,
    },
    /// Embed all documents missing embeddings
    Embed,
    /// BM25 full-text search
    Search {
        query: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Vector search (document-level)
    Vsearch {
        query: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Hybrid search with query expansion and reranking
    Query {
        query: String,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        /// Drop results below this score
        #[arg(long, default_value_t = 0.0)]
        min_score: f64,
    },
    /// List documents
    Ls {
        /// `collection` or `collection/path` prefix
        target: Option<String>,
    },
    /// Fetch one document by path or short doc-id
    Get { reference: String },
    /// Fetch documents by comma list or glob
    #[command(name = "multi-get")]
    MultiGet {
        pattern: String,
        /// Skip documents larger than this many bytes (0 = no limit)
        #[arg(long, default_value_t = 0)]
        max_bytes: usize,
    },
    /// Manage contexts
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },
    /// Index status
    Status,
    /// Manage memories
    Memory {
        #[command(subcommand)]
        action: MemoryAction,
    },
    /// Purge cache, prune orphans, compact the database
    Cleanup,
    /// Show the expansion set for a query
    Expand { query: String },
    /// Manage model files
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Register a collection root and index it
    Add {
        path: String,
        #[arg(long)]
        name: Option<String>,
        /// Glob mask (default **/*.md)
        #[arg(long)]
        mask: Option<String>,
    },
    /// List collections
    List,
    /// Remove a collection
    Remove { name: String },
    /// Rename a collection
    Rename { old_name: String, new_name: String },
}

#[derive(Subcommand)]
enum ContextAction {
    /// Set the context for a path
    Add { path: String, content: String },
    /// List contexts
    List,
    /// Report collections without contexts
    Check,
    /// Remove a context
    Rm { path: String },
}

#[derive(Subcommand)]
enum MemoryAction {
    /// Store a memory
    Add {
        content: String,
        /// conversation|fact|preference|episodic
        #[arg(long, default_value = "fact")]
        kind: String,
        #[arg(long)]
        importance: Option<f64>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Expire after this many days
        #[arg(long)]
        expires_days: Option<i64>,
    },
    /// List memories
    List {
        #[arg(long)]
        kind: Option<String>,
    },
    /// Recall memories by semantic similarity
    Recall {
        query: String,
        #[arg(long)]
        kind: Option<String>,
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0.0)]
        min_relevance: f64,
    },
    /// Fetch one memory by id or prefix
    Get { id: String },
    /// Delete a memory by id or prefix
    Delete { id: String },
    /// Memory store statistics
    Stats,
    /// Delete expired memories
    Cleanup,
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download model files to the cache directory
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let mut config = MmqConfig::load()?;
    if let Some(db) = &args.db {
        config.storage.db_path = db.clone();
    }

    // Log to stderr so stdout stays clean for piped output
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from_str(&args.format).map_err(anyhow::Error::msg)?;
    let collection = args.collection.as_deref();

    match args.command {
        Command::Model {
            action: ModelAction::Download,
        } => {
            model::download::download_models(&config.resolved_cache_dir()).await?;
            return Ok(());
        }
        command => run_command(command, &config, collection, format)?,
    }

    Ok(())
}

fn run_command(
    command: Command,
    config: &MmqConfig,
    collection: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let mut store = Store::open(config.resolved_db_path())?;

    match command {
        Command::Collection { action } => match action {
            CollectionAction::Add { path, name, mask } => {
                cli::collection::add(&store, &path, name.as_deref(), mask.as_deref())?
            }
            CollectionAction::List => cli::collection::list(&store, format)?,
            CollectionAction::Remove { name } => cli::collection::remove(&mut store, &name)?,
            CollectionAction::Rename { old_name, new_name } => {
                cli::collection::rename(&mut store, &old_name, &new_name)?
            }
        },
        Command::Update { pull } => cli::maintenance::update(&store, pull)?,
        Command::Embed => {
            let capabilities = model::create_capabilities(&config.model)?;
            cli::maintenance::embed(&mut store, &capabilities, config)?;
        }
        Command::Search { query, limit } => {
            cli::search::search(&store, &query, limit, collection, format)?
        }
        Command::Vsearch { query, limit } => {
            let capabilities = model::create_capabilities(&config.model)?;
            cli::search::vsearch(&store, &capabilities, &query, limit, collection, format)?;
        }
        Command::Query {
            query,
            limit,
            min_score,
        } => {
            let capabilities = model::create_capabilities(&config.model)?;
            cli::search::query(
                &store,
                &capabilities,
                &query,
                limit,
                collection,
                min_score,
                format,
            )?;
        }
        Command::Ls { target } => cli::document::ls(&store, target.as_deref(), format)?,
        Command::Get { reference } => cli::document::get(&store, &reference, format)?,
        Command::MultiGet { pattern, max_bytes } => {
            cli::document::multi_get(&store, &pattern, max_bytes, format)?
        }
        Command::Context { action } => match action {
            ContextAction::Add { path, content } => cli::context::add(&store, &path, &content)?,
            ContextAction::List => cli::context::list(&store, format)?,
            ContextAction::Check => cli::context::check(&store)?,
            ContextAction::Rm { path } => cli::context::rm(&store, &path)?,
        },
        Command::Status => cli::status::status(&store, format)?,
        Command::Memory { action } => {
            let capabilities = model::create_capabilities(&config.model)?;
            let manager = Manager::new(&store, Arc::clone(&capabilities.embedder));
            match action {
                MemoryAction::Add {
                    content,
                    kind,
                    importance,
                    tags,
                    expires_days,
                } => cli::memory::add(
                    &manager,
                    &content,
                    &kind,
                    importance,
                    tags.as_deref(),
                    expires_days,
                )?,
                MemoryAction::List { kind } => {
                    cli::memory::list(&manager, kind.as_deref(), format)?
                }
                MemoryAction::Recall {
                    query,
                    kind,
                    limit,
                    min_relevance,
                } => cli::memory::recall(
                    &manager,
                    &query,
                    kind.as_deref(),
                    limit,
                    min_relevance,
                    format,
                )?,
                MemoryAction::Get { id } => cli::memory::get(&manager, &id, format)?,
                MemoryAction::Delete { id } => cli::memory::delete(&manager, &id)?,
                MemoryAction::Stats => cli::memory::stats(&manager, format)?,
                MemoryAction::Cleanup => cli::memory::cleanup(&manager)?,
            }
        }
        Command::Cleanup => cli::maintenance::cleanup(&mut store)?,
        Command::Expand { query } => {
            let capabilities = model::create_capabilities(&config.model)?;
            cli::search::expand(&store, &capabilities, &query, format)?;
        }
        Command::Model { .. } => unreachable!("handled in main"),
    }

    Ok(())
}
