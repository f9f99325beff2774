use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MmqConfig {
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// Capability provider. `"mock"` is the built-in deterministic provider;
    /// other names require the matching model files under `cache_dir`.
    pub provider: String,
    pub embedding_model: String,
    pub rerank_model: String,
    pub generate_model: String,
    pub cache_dir: String,
    pub lib_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub rrf_k: usize,
    pub rerank_limit: usize,
}

impl Default for MmqConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            model: ModelConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mmq_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        let cache_base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from(".cache"));
        Self {
            provider: "mock".into(),
            embedding_model: "embeddinggemma-300M-Q8_0".into(),
            rerank_model: "qwen3-reranker-0.6b-q8_0".into(),
            generate_model: "Qwen3-0.6B-Q8_0".into(),
            cache_dir: cache_base.join("mmq/models").to_string_lossy().into_owned(),
            lib_dir: cache_base.join("mmq/lib").to_string_lossy().into_owned(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            // ~800 tokens at 4 chars/token, 15% overlap
            chunk_size: 3200,
            chunk_overlap: 480,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            rrf_k: 60,
            rerank_limit: 40,
        }
    }
}

/// Returns `~/.mmq/`
pub fn default_mmq_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".mmq")
}

/// Returns the default config file path: `~/.mmq/config.toml`
pub fn default_config_path() -> PathBuf {
    default_mmq_dir().join("config.toml")
}

impl MmqConfig {
    /// Load config from the default TOML file (if it exists) then apply env
    /// var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MmqConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (MMQ_DB, MMQ_LOG_LEVEL, MMQ_LIB_DIR).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MMQ_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MMQ_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Ok(val) = std::env::var("MMQ_LIB_DIR") {
            self.model.lib_dir = val;
        }
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Resolve the model cache directory, expanding `~` if needed.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        expand_tilde(&self.model.cache_dir)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
