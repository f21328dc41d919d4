//! Error types for the workspace service
//!
//! Every failure is classified into a small [`ErrorKind`] taxonomy so callers
//! know whether to revert optimistic state, report corruption, or retry.

use crate::config::ConfigError;
use sheetwork_engine::EngineError;
use sheetwork_model::ModelError;
use sheetwork_store::{CommitError, StoreError};
use std::fmt;

/// Main workspace error type
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Engine refused to compute a write set
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Batch did not apply
    #[error(transparent)]
    Commit(#[from] CommitError),

    /// Snapshot could not be read
    #[error("snapshot read failed: {0}")]
    Store(#[from] StoreError),

    /// Stored document did not decode
    #[error("decode failed: {0}")]
    Decode(#[from] ModelError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Coarse classification of a [`CoreError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Source record, sibling or container missing; nothing was written
    NotFound,
    /// Corrupted source data (cycle, over-deep chain)
    Integrity,
    /// Atomic batch did not apply; revert optimistic state
    CommitFailure,
    /// Store could not be read
    Unavailable,
    /// Malformed stored data or configuration
    Invalid,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotFound => "not-found",
            Self::Integrity => "integrity",
            Self::CommitFailure => "commit-failure",
            Self::Unavailable => "unavailable",
            Self::Invalid => "invalid",
        })
    }
}

impl CoreError {
    /// Classification
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Engine(EngineError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Engine(EngineError::Integrity(_)) => ErrorKind::Integrity,
            Self::Engine(EngineError::Model(_)) | Self::Decode(_) | Self::Config(_) => ErrorKind::Invalid,
            Self::Commit(_) => ErrorKind::CommitFailure,
            Self::Store(_) => ErrorKind::Unavailable,
        }
    }

    /// Whether repeating the operation later may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Commit(err) => err.is_retryable(),
            Self::Store(err) => err.is_retryable(),
            Self::Engine(_) | Self::Decode(_) | Self::Config(_) => false,
        }
    }

    /// Check for [`ErrorKind::NotFound`]
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Result alias for workspace operations
pub type Result<T> = std::result::Result<T, CoreError>;
