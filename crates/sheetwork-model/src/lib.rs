//! Sheetwork Model
//!
//! Records, identifiers, store paths and write sets shared by every sheetwork
//! crate.
//!
//! # Core Concepts
//!
//! - [`Entity`]: identity + storage path + document conversion for a record kind
//! - [`Ordered`] / [`Hierarchical`]: sibling ordering and parent/child forests
//! - [`Sheet`], [`Item`], [`Measure`], [`Column`], [`Row`]: the record kinds
//! - [`WriteSet`]: the flat list of writes one operation commits atomically
//! - [`DocPath`] / [`CollectionPath`]: document-store addressing
//!
//! # Example
//!
//! ```rust
//! use sheetwork_model::{Item, WriteSet};
//!
//! let item = Item::new("i1", "s1", 0).with_field("name", "Venue");
//! let mut writes = WriteSet::new();
//! writes.create(&item).unwrap();
//! assert_eq!(writes.len(), 1);
//! assert_eq!(writes.as_slice()[0].path.to_string(), "sheets/s1/items/i1");
//! ```

#![warn(unreachable_pub)]
#![warn(missing_docs)]

mod entity;
mod id;
mod kpi;
mod path;
mod sheet;
mod value;
mod write;

pub use entity::{Entity, EntityKind, Fields, Hierarchical, ModelError, Ordered};
pub use id::{EntityId, IdGenerator, SequentialIds, UlidGenerator};
pub use kpi::{Column, ColumnGroup, ColumnType, Measure, MeasureOwner, Row};
pub use path::{CollectionPath, DocPath, PathError};
pub use sheet::{Item, Sheet, SheetKind};
pub use value::Scalar;
pub use write::{FieldPatch, FieldPath, FieldValue, Write, WriteOp, WriteSet};

/// Stored document: path plus field map
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document path
    pub path: DocPath,
    /// Field map
    pub fields: Fields,
}

impl Document {
    /// Create document
    #[inline]
    #[must_use]
    pub fn new(path: DocPath, fields: Fields) -> Self {
        Self { path, fields }
    }

    /// Decode into a typed record
    ///
    /// # Errors
    /// Returns error if fields do not match `E`'s shape
    pub fn decode<E: Entity>(&self) -> Result<E, ModelError> {
        E::from_fields(self.fields.clone())
    }

    /// Encode a typed record
    ///
    /// # Errors
    /// Returns error if `entity` fails to serialize
    pub fn encode<E: Entity>(entity: &E) -> Result<Self, ModelError> {
        Ok(Self::new(entity.path(), entity.to_fields()?))
    }
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
