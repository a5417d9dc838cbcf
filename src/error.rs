//! Error types for the MentatSync storage core.
//!
//! Four kinds are surfaced upward, per the storage contract: a missing
//! entity, an invariant/concurrency conflict, an operational backend
//! failure, and a programming error that should be impossible under a
//! correct client. Callers (the HTTP collaborator, tests) match on these
//! variants rather than on backend-specific error types.

use thiserror::Error;
use tracing::error;

/// Errors returned by the Storage Facade.
#[derive(Error, Debug)]
pub enum MentatError {
    /// A referenced transaction does not exist for this user.
    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    /// A referenced chunk does not exist for this user.
    #[error("chunk not found: {0}")]
    ChunkNotFound(String),

    /// An optimistic-concurrency check or graph invariant failed.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The storage engine failed in a way unrelated to application logic.
    #[error("backend error: {0}")]
    Backend(String),

    /// The caller violated a precondition that a correct client never would.
    #[error("programming error: {0}")]
    Programming(String),
}

impl MentatError {
    /// Wrap an operational backend failure, logging the original cause.
    ///
    /// BACKEND_ERROR paths log with the original stack; other error kinds
    /// are returned silently, per the core's error-handling policy.
    pub fn backend(err: impl std::fmt::Display) -> Self {
        error!("storage backend error: {}", err);
        MentatError::Backend(err.to_string())
    }
}

impl From<sqlx::Error> for MentatError {
    fn from(err: sqlx::Error) -> Self {
        MentatError::backend(err)
    }
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Result alias used throughout the storage core.
pub type Result<T> = std::result::Result<T, MentatError>;
