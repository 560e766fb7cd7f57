//! Shared error taxonomy for the pipeline.

use thiserror::Error;

/// Errors surfaced by pipeline stages and their backing oracles.
///
/// No stage retries or suppresses a failure: each variant carries the
/// original message from the failing layer, prefixed with the stage that
/// produced it, and aborts the call that triggered it.
#[derive(Debug, Error)]
pub enum RagError {
    /// A source document could not be read.
    #[error("io error: {0}")]
    Io(String),

    /// A document was readable but structurally unusable.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// The embedding backend failed to produce vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The vector store rejected an insert, search, or maintenance call.
    #[error("storage error: {0}")]
    Storage(String),

    /// The reranking backend failed to score candidate documents.
    #[error("rerank failed: {0}")]
    Rerank(String),

    /// The generation backend failed to produce an answer.
    #[error("generation failed: {0}")]
    Generation(String),

    /// A component was constructed with missing or invalid configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl From<std::io::Error> for RagError {
    fn from(err: std::io::Error) -> Self {
        RagError::Io(err.to_string())
    }
}
