//! Engine error types

use sheetwork_model::{EntityId, EntityKind, ModelError};

/// Errors raised while computing a write set
///
/// Engines fail before producing any write; nothing is ever partially applied.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Referenced record absent from the snapshot
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind
        kind: EntityKind,
        /// Missing id
        id: EntityId,
    },

    /// Source data is corrupted (cycle, over-deep chain)
    #[error("integrity violation: {0}")]
    Integrity(#[from] IntegrityViolation),

    /// Record failed to (de)serialize
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

impl EngineError {
    /// Create not-found error
    #[inline]
    #[must_use]
    pub fn not_found(kind: EntityKind, id: &EntityId) -> Self {
        Self::NotFound {
            kind,
            id: id.clone(),
        }
    }

    /// Check for [`EngineError::NotFound`]
    #[inline]
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check for [`EngineError::Integrity`]
    #[inline]
    #[must_use]
    pub fn is_integrity(&self) -> bool {
        matches!(self, Self::Integrity(_))
    }
}

/// Corruption detected while traversing source records
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityViolation {
    /// Traversal reached a record twice
    #[error("cycle through {kind} {id}")]
    Cycle {
        /// Record kind
        kind: EntityKind,
        /// First record seen twice
        id: EntityId,
    },

    /// Nesting exceeded the configured cap
    #[error("{kind} {id} nested deeper than {max_depth} levels")]
    DepthExceeded {
        /// Record kind
        kind: EntityKind,
        /// Record at which the cap was hit
        id: EntityId,
        /// Configured cap
        max_depth: u32,
    },

    /// Records whose parent chain never reaches a root, or whose owning
    /// measure is missing
    #[error("{} {kind} record(s) unreachable from any root", .ids.len())]
    Unreachable {
        /// Record kind
        kind: EntityKind,
        /// Unreachable ids
        ids: Vec<EntityId>,
    },
}
