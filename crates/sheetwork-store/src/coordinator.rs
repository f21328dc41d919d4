//! Atomic write-set submission

use crate::document::DocumentStore;
use crate::error::CommitError;
use serde::{Deserialize, Serialize};
use sheetwork_model::WriteSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Commit tunables
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Largest batch submitted; bigger ones are refused, not split
    pub max_batch_writes: usize,
}

impl CommitConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With batch limit
    #[inline]
    #[must_use]
    pub fn with_max_batch_writes(mut self, limit: usize) -> Self {
        self.max_batch_writes = limit;
        self
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            max_batch_writes: 500,
        }
    }
}

/// Acknowledgement of a committed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    /// Writes applied (0 for an empty write set)
    pub applied: usize,
}

/// Submits write sets atomically and classifies failures
///
/// No retries: a failed commit is reported and the caller reverts its
/// optimistic state.
pub struct BatchCommitCoordinator<S: ?Sized> {
    store: Arc<S>,
    config: CommitConfig,
}

impl<S: DocumentStore + ?Sized> BatchCommitCoordinator<S> {
    /// Create coordinator over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<S>, config: CommitConfig) -> Self {
        Self { store, config }
    }

    /// Underlying store
    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Commit tunables
    #[inline]
    #[must_use]
    pub fn config(&self) -> &CommitConfig {
        &self.config
    }

    /// Submit `writes` as one atomic batch
    ///
    /// Empty write sets succeed without touching the store.
    ///
    /// # Errors
    /// - [`CommitError::Oversize`] if the batch exceeds `max_batch_writes`
    /// - [`CommitError::Store`] if the store refused or failed the batch
    pub async fn commit(&self, writes: &WriteSet) -> Result<CommitReceipt, CommitError> {
        if writes.is_empty() {
            debug!("empty write set, nothing to commit");
            return Ok(CommitReceipt { applied: 0 });
        }
        if writes.len() > self.config.max_batch_writes {
            warn!(
                writes = writes.len(),
                limit = self.config.max_batch_writes,
                "write set refused before submission"
            );
            return Err(CommitError::Oversize {
                writes: writes.len(),
                limit: self.config.max_batch_writes,
            });
        }

        match self.store.commit_batch(writes.as_slice()).await {
            Ok(()) => {
                info!(writes = writes.len(), "batch committed");
                Ok(CommitReceipt {
                    applied: writes.len(),
                })
            }
            Err(err) => {
                warn!(%err, retryable = err.is_retryable(), "batch commit failed");
                Err(err.into())
            }
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for BatchCommitCoordinator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCommitCoordinator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
