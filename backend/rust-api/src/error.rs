use thiserror::Error;

pub type HintResult<T> = std::result::Result<T, HintError>;

/// Errors raised at the collaborator seams of the hint pipeline.
///
/// Only `NotFound` and `Catalog` ever reach an HTTP caller; the rest are
/// recovered inside the orchestrator or the cache.
#[derive(Error, Debug)]
pub enum HintError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Content catalog error: {0}")]
    Catalog(String),

    #[error("Durable store error: {0}")]
    Store(String),

    #[error("Hint generation failed: {0}")]
    Generation(String),

    #[error("Hint generation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl HintError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn store(source: impl std::fmt::Display) -> Self {
        Self::Store(source.to_string())
    }
}
