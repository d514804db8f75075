//! Error types for the campus assistant core.
//!
//! Every collaborator trait ([`EmbeddingProvider`](crate::embedding::EmbeddingProvider),
//! [`VectorIndex`](crate::index::VectorIndex), [`LanguageModel`](crate::llm::LanguageModel),
//! [`ImageStore`](crate::images::ImageStore)) reports failures through [`Error`].
//! The orchestrator decides which of them are fatal for a chat turn and
//! which are absorbed into a documented default.

use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The embedding model failed to load or to produce vectors.
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// The vector index could not be reached or rejected the operation.
    #[error("Index error: {0}")]
    Index(String),

    /// A vector does not have the dimension the index was created with.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The language model call failed.
    #[error("Generation error: {0}")]
    Generation(String),

    /// Image metadata lookup or persistence failed.
    #[error("Image store error: {0}")]
    ImageStore(String),

    /// Caller supplied something the core cannot work with.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// True for failures of the model collaborators (embedding or generation).
    ///
    /// The HTTP layer maps these to `generation_failed`.
    pub fn is_model_failure(&self) -> bool {
        matches!(self, Error::Embedding(_) | Error::Generation(_))
    }
}

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;
