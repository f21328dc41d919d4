//! Sheetwork Store: the document-store boundary
//!
//! - [`DocumentStore`]: abstract async store (get, query, atomic batch,
//!   subscription)
//! - [`MemoryStore`]: in-memory implementation with atomic batches and change
//!   notification
//! - [`BatchCommitCoordinator`]: all-or-nothing submission of a write set with
//!   classified failures
//! - [`Optimistic`]: local apply, commit, rollback on failure

pub mod coordinator;
pub mod document;
pub mod error;
pub mod memory;
pub mod optimistic;

pub use coordinator::{BatchCommitCoordinator, CommitConfig, CommitReceipt};
pub use document::{DocumentStore, Filter, Query};
pub use error::{CommitError, StoreError};
pub use memory::{Dump, MemoryStore};
pub use optimistic::{LocalCollection, LocalState, Optimistic};

/// Store crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
