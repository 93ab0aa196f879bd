//! Error types for the `rma-rag` crate.

use thiserror::Error;

/// Errors that can occur while answering a query.
///
/// Every external collaborator has its own variant so callers can tell a
/// retrieval failure from a generation failure and show an honest message.
/// Retrieval returning zero chunks is never an error.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding provider was unreachable, timed out, or rejected the input.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The vector store was unreachable or the query was malformed.
    #[error("Vector store unavailable ({backend}): {message}")]
    StoreUnavailable {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// The answer-generation provider failed or returned unusable output.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The project/document scope could not be resolved.
    #[error("Scope resolution error (project {project_id}): {message}")]
    ScopeResolutionError {
        /// The project whose document scope was requested.
        project_id: i64,
        /// A description of the failure.
        message: String,
    },

    /// The query violated an input constraint.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// The pipeline stage a [`RagError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// Embedding, vector search or scope resolution.
    Retrieval,
    /// Answer generation.
    Generation,
    /// The request itself was rejected before any external call.
    Request,
}

impl RagError {
    /// Return the stage that failed.
    pub fn failure_stage(&self) -> FailureStage {
        match self {
            RagError::EmbeddingError { .. }
            | RagError::StoreUnavailable { .. }
            | RagError::ScopeResolutionError { .. } => FailureStage::Retrieval,
            RagError::GenerationError { .. } => FailureStage::Generation,
            RagError::InvalidQuery(_) | RagError::ConfigError(_) => FailureStage::Request,
        }
    }

    /// Whether a caller may safely retry the failed call.
    ///
    /// Only the read-only retrieval stages are idempotent. Generation calls
    /// carry a cost per attempt and are never reported as retryable.
    pub fn is_retryable(&self) -> bool {
        self.failure_stage() == FailureStage::Retrieval
    }

    /// A degraded-but-honest message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self.failure_stage() {
            FailureStage::Retrieval => {
                "I could not retrieve information from the textbook or your project documents \
                 right now. Please try again in a moment."
            }
            FailureStage::Generation => {
                "I found relevant material but could not generate a response right now. \
                 Please try again in a moment."
            }
            FailureStage::Request => {
                "Your question could not be processed. Please check it and try again."
            }
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
