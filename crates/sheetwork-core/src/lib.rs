//! Sheetwork Core: project workspace service
//!
//! Wires snapshot loading, the copy/reorder engines and the batch commit
//! coordinator into user-level operations on a project's sheets.
//!
//! # Example
//!
//! ```rust,no_run
//! use sheetwork_core::{Workspace, WorkspaceConfig};
//! use sheetwork_engine::Direction;
//! use sheetwork_model::EntityId;
//! use sheetwork_store::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn example() -> sheetwork_core::Result<()> {
//! let store = Arc::new(MemoryStore::new());
//! let workspace = Workspace::new(store, "p1", WorkspaceConfig::default());
//!
//! let copy = workspace.duplicate_sheet(&EntityId::new("s1")).await?;
//! workspace.move_sheet(&copy.id, Direction::Up).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod loader;
pub mod workspace;

pub use config::{ConfigError, WorkspaceConfig};
pub use error::{CoreError, ErrorKind, Result};
pub use loader::SnapshotLoader;
pub use workspace::{Duplicated, Workspace};

/// Core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
