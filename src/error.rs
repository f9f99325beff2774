//! Error types for mmq.
//!
//! Behavior-defined kinds: callers match on the variant, not on message text.
//! Capability failures are recoverable inside the retrieval pipeline; data
//! errors propagate to the caller; schema errors are fatal to the process.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Resource errors
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    // Vector errors
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    // Model capability errors
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    // Store errors
    #[error("schema error: {0}")]
    Schema(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors the retrieval orchestrator may swallow when degrading
    /// (a failed expansion route must not break the whole pipeline).
    pub fn is_capability(&self) -> bool {
        matches!(self, Error::CapabilityUnavailable(_))
    }
}
