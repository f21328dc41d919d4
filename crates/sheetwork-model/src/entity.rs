//! Entity traits
//!
//! Every record kind implements [`Entity`] (identity, storage path, document
//! conversion). Sibling-ordered kinds add [`Ordered`]; tree-shaped kinds add
//! [`Hierarchical`]. The duplication and reordering engines are written once
//! against these traits.

use crate::id::EntityId;
use crate::path::DocPath;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// Field map of a stored document
pub type Fields = serde_json::Map<String, serde_json::Value>;

/// Record kinds known to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Top-level sheet container
    Sheet,
    /// Budget line or schedule task
    Item,
    /// KPI table
    Measure,
    /// Column definition
    Column,
    /// Measure row
    Row,
}

impl EntityKind {
    /// Collection name used in store paths
    #[inline]
    #[must_use]
    pub fn collection(self) -> &'static str {
        match self {
            Self::Sheet => "sheets",
            Self::Item => "items",
            Self::Measure => "measures",
            Self::Column => "columns",
            Self::Row => "rows",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sheet => "sheet",
            Self::Item => "item",
            Self::Measure => "measure",
            Self::Column => "column",
            Self::Row => "row",
        };
        f.write_str(name)
    }
}

/// A record persisted as one document
pub trait Entity: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Record kind
    const KIND: EntityKind;

    /// Record identifier
    fn id(&self) -> &EntityId;

    /// Replace identifier (used when copying)
    fn set_id(&mut self, id: EntityId);

    /// Storage path of this record
    fn path(&self) -> DocPath;

    /// Serialize into a document field map
    ///
    /// # Errors
    /// Returns error if the record does not serialize to a JSON object
    fn to_fields(&self) -> Result<Fields, ModelError> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(ModelError::NotAnObject {
                kind: Self::KIND,
                id: self.id().clone(),
            }),
        }
    }

    /// Deserialize from a document field map
    ///
    /// # Errors
    /// Returns error if required fields are missing or mistyped
    fn from_fields(fields: Fields) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
    }
}

/// A record with a position among its siblings
pub trait Ordered: Entity {
    /// Position among siblings (0-based)
    fn order(&self) -> u32;

    /// Assign position
    fn set_order(&mut self, order: u32);
}

/// A record in a parent/child forest
///
/// `depth` must equal the number of `parent_id` hops to the root.
pub trait Hierarchical: Ordered {
    /// Parent record (`None` for roots)
    fn parent_id(&self) -> Option<&EntityId>;

    /// Re-link to another parent
    fn set_parent_id(&mut self, parent: Option<EntityId>);

    /// Distance from the root
    fn depth(&self) -> u32;

    /// Assign distance from the root
    fn set_depth(&mut self, depth: u32);

    /// Re-target the record at another container (e.g. another sheet)
    fn set_container(&mut self, container: EntityId);
}

/// Model-level errors
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// JSON (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Entity did not serialize to an object
    #[error("{kind} {id} did not serialize to an object")]
    NotAnObject {
        /// Record kind
        kind: EntityKind,
        /// Record id
        id: EntityId,
    },

    /// Invalid store path
    #[error("invalid path: {0}")]
    Path(#[from] crate::path::PathError),

    /// Patch addressed a field that cannot hold nested values
    #[error("field '{field}' is not an object")]
    NotAMap {
        /// Dotted field path
        field: String,
    },
}
