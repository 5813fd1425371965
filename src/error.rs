use thiserror::Error;

use crate::external::ExternalError;

/// Failures of the ingestion and query pipelines.
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Load error: {0}")]
    Load(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(#[source] ExternalError),

    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Corrupt index: {0}")]
    CorruptIndex(String),

    #[error("Search against an empty index")]
    EmptyIndex,

    #[error("Synthesis error: {0}")]
    Synthesis(#[source] ExternalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Whether the stored index has to be rebuilt before it can be used again.
    pub fn requires_rebuild(&self) -> bool {
        matches!(
            self,
            RagError::CorruptIndex(_) | RagError::DimensionMismatch { .. } | RagError::EmptyIndex
        )
    }
}
