use thiserror::Error;

/// Error taxonomy for the RAG core.
///
/// `ShapeMismatch` marks malformed batch arguments and is always a caller
/// error. `Embedding` propagates from the query path only; the document
/// batch path degrades per item instead. `Retrieval` and `Generation` are
/// swallowed at their call sites and surface as degraded results rather
/// than failures.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("embedding failed: {0}")]
    Embedding(String),
    #[error("retrieval failed: {0}")]
    Retrieval(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RagError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        RagError::Internal(err.to_string())
    }

    pub fn store<E: std::fmt::Display>(err: E) -> Self {
        RagError::Store(err.to_string())
    }

    pub fn embedding<E: std::fmt::Display>(err: E) -> Self {
        RagError::Embedding(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        RagError::Generation(err.to_string())
    }
}
