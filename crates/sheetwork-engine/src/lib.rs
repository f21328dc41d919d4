//! Sheetwork Engine: deep copy and reordering over in-memory snapshots
//!
//! Engines are synchronous and pure. Each takes one snapshot, computes a
//! [`WriteSet`](sheetwork_model::WriteSet) and returns it; committing is the
//! store's job.
//!
//! # Example
//!
//! ```rust
//! use sheetwork_engine::{Direction, ReorderEngine};
//! use sheetwork_model::{EntityId, Item};
//!
//! let items = vec![Item::new("a", "s1", 0), Item::new("b", "s1", 1)];
//! let refs: Vec<&Item> = items.iter().collect();
//! let plan = ReorderEngine::move_one_step(&refs, &EntityId::new("b"), Direction::Up).unwrap();
//! assert_eq!(plan.reordered[0].id, EntityId::new("b"));
//! ```

pub mod cascade;
pub mod config;
pub mod copy;
pub mod error;
pub mod ids;
pub mod reorder;
pub mod rewrite;
pub mod snapshot;

pub use config::EngineConfig;
pub use copy::{CopyOutcome, DeepCopyEngine, ItemDestination, MeasureDestination, SheetDestination};
pub use error::{EngineError, IntegrityViolation};
pub use ids::IdentifierMap;
pub use reorder::{order_patch, partition_columns, Direction, MovePlan, ReorderEngine};
pub use rewrite::{drop_keys_patch, ReferenceRewriter, RewriteRefs, Rewritten};
pub use snapshot::{Forest, MeasureArena, SheetSnapshot};

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Index as an order value
pub(crate) fn position(index: usize) -> u32 {
    u32::try_from(index).unwrap_or(u32::MAX)
}
