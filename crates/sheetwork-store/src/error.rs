//! Store and commit errors

use sheetwork_model::DocPath;

/// Errors reported by a document store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store could not be reached or timed out
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Create hit an existing document, or a concurrent writer won
    #[error("conflict at {path}")]
    Conflict {
        /// Contended document
        path: DocPath,
    },

    /// Update targeted a document that does not exist
    #[error("document missing: {path}")]
    Missing {
        /// Missing document
        path: DocPath,
    },

    /// Payload refused by the store
    #[error("write to {path} rejected: {reason}")]
    Rejected {
        /// Target document
        path: DocPath,
        /// Why it was refused
        reason: String,
    },
}

impl StoreError {
    /// Whether resubmitting the same batch later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict { .. })
    }
}

/// Failure of an atomic batch commit
///
/// Whatever the variant, no write of the batch was applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    /// Batch larger than the configured limit; never submitted
    #[error("batch of {writes} writes exceeds limit of {limit}")]
    Oversize {
        /// Writes in the batch
        writes: usize,
        /// Configured limit
        limit: usize,
    },

    /// Store refused or failed the batch
    #[error("commit failed: {0}")]
    Store(#[from] StoreError),

    /// Batch could not be applied to optimistic local state
    #[error("local apply failed: {0}")]
    Local(String),
}

impl CommitError {
    /// Whether resubmitting the same batch later may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::Oversize { .. } | Self::Local(_) => false,
        }
    }
}
