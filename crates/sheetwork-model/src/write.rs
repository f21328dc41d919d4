//! Document writes and write sets
//!
//! Provides [`Write`] and [`WriteSet`]: the flat, self-consistent list of
//! creates/updates/deletes an engine produces for one operation. A write set
//! is applied atomically by the commit coordinator or not at all.

use crate::entity::{Entity, Fields, ModelError};
use crate::id::EntityId;
use crate::path::DocPath;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Dotted path to a (possibly nested) document field
///
/// `["values", "col-1"]` addresses the `col-1` key of the `values` map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// Top-level field
    #[inline]
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self(vec![name.into()])
    }

    /// Key inside a map-valued field
    #[inline]
    #[must_use]
    pub fn key(map: impl Into<String>, key: &EntityId) -> Self {
        Self(vec![map.into(), key.as_str().to_string()])
    }

    /// Path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// New value of a patched field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldValue {
    /// Overwrite with value
    Set(serde_json::Value),
    /// Remove the field (store-level delete sentinel)
    Delete,
}

/// Partial update of a document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldPatch(Vec<(FieldPath, FieldValue)>);

impl FieldPatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field
    #[inline]
    #[must_use]
    pub fn set(mut self, field: FieldPath, value: impl Into<serde_json::Value>) -> Self {
        self.0.push((field, FieldValue::Set(value.into())));
        self
    }

    /// Delete a field
    #[inline]
    #[must_use]
    pub fn delete(mut self, field: FieldPath) -> Self {
        self.0.push((field, FieldValue::Delete));
        self
    }

    /// Patch entries in application order
    #[inline]
    pub fn entries(&self) -> impl Iterator<Item = &(FieldPath, FieldValue)> {
        self.0.iter()
    }

    /// Number of entries
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply onto a document's fields
    ///
    /// Intermediate maps are created on `Set`; deleting a missing key is a
    /// no-op.
    ///
    /// # Errors
    /// Returns error if a path crosses a non-object value
    pub fn apply_to(&self, fields: &mut Fields) -> Result<(), ModelError> {
        for (path, value) in &self.0 {
            let Some((last, parents)) = path.0.split_last() else {
                continue;
            };
            let mut target = &mut *fields;
            let mut missing = false;
            for (depth, segment) in parents.iter().enumerate() {
                if !target.contains_key(segment) {
                    if matches!(value, FieldValue::Delete) {
                        missing = true;
                        break;
                    }
                    target.insert(segment.clone(), serde_json::Value::Object(Fields::new()));
                }
                target = match target.get_mut(segment) {
                    Some(serde_json::Value::Object(map)) => map,
                    _ => {
                        return Err(ModelError::NotAMap {
                            field: path.0[..=depth].join("."),
                        })
                    }
                };
            }
            if missing {
                continue;
            }
            match value {
                FieldValue::Set(v) => {
                    target.insert(last.clone(), v.clone());
                }
                FieldValue::Delete => {
                    target.remove(last);
                }
            }
        }
        Ok(())
    }
}

/// Write operation kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum WriteOp {
    /// Create a new document; fails if one exists
    Create(Fields),
    /// Patch an existing document; fails if missing
    Update(FieldPatch),
    /// Delete a document; deleting a missing document is a no-op
    Delete,
}

/// Single document write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Write {
    /// Target document
    pub path: DocPath,
    /// Operation
    pub op: WriteOp,
}

impl Write {
    /// Create write for a new entity
    ///
    /// # Errors
    /// Returns error if the entity fails to serialize
    pub fn create<E: Entity>(entity: &E) -> Result<Self, ModelError> {
        Ok(Self {
            path: entity.path(),
            op: WriteOp::Create(entity.to_fields()?),
        })
    }

    /// Update write
    #[inline]
    #[must_use]
    pub fn update(path: DocPath, patch: FieldPatch) -> Self {
        Self {
            path,
            op: WriteOp::Update(patch),
        }
    }

    /// Delete write
    #[inline]
    #[must_use]
    pub fn delete(path: DocPath) -> Self {
        Self {
            path,
            op: WriteOp::Delete,
        }
    }

    /// Check if this is a create
    #[inline]
    #[must_use]
    pub fn is_create(&self) -> bool {
        matches!(self.op, WriteOp::Create(_))
    }
}

/// Ordered list of writes committed as one atomic unit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriteSet {
    writes: Vec<Write>,
}

impl WriteSet {
    /// Empty write set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a write
    #[inline]
    pub fn push(&mut self, write: Write) {
        self.writes.push(write);
    }

    /// Append a create for `entity`
    ///
    /// # Errors
    /// Returns error if the entity fails to serialize
    pub fn create<E: Entity>(&mut self, entity: &E) -> Result<(), ModelError> {
        self.writes.push(Write::create(entity)?);
        Ok(())
    }

    /// Append an update
    #[inline]
    pub fn update(&mut self, path: DocPath, patch: FieldPatch) {
        self.writes.push(Write::update(path, patch));
    }

    /// Append a delete
    #[inline]
    pub fn delete(&mut self, path: DocPath) {
        self.writes.push(Write::delete(path));
    }

    /// Append all writes of another set
    #[inline]
    pub fn extend(&mut self, other: WriteSet) {
        self.writes.extend(other.writes);
    }

    /// Number of writes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Check if empty (a no-op operation)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Iterate writes in submission order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Write> {
        self.writes.iter()
    }

    /// Writes as slice
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[Write] {
        &self.writes
    }

    /// Paths of created documents
    #[must_use]
    pub fn created_paths(&self) -> Vec<&DocPath> {
        self.writes
            .iter()
            .filter(|w| w.is_create())
            .map(|w| &w.path)
            .collect()
    }

    /// Decode all creates whose path sits in `E`'s collection kind
    ///
    /// # Errors
    /// Returns error if a matching document fails to deserialize
    pub fn created<E: Entity>(&self) -> Result<Vec<E>, ModelError> {
        self.writes
            .iter()
            .filter_map(|w| match &w.op {
                WriteOp::Create(fields)
                    if w.path.collection().name() == E::KIND.collection() =>
                {
                    Some(E::from_fields(fields.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

impl IntoIterator for WriteSet {
    type Item = Write;
    type IntoIter = std::vec::IntoIter<Write>;

    fn into_iter(self) -> Self::IntoIter {
        self.writes.into_iter()
    }
}

impl FromIterator<Write> for WriteSet {
    fn from_iter<I: IntoIterator<Item = Write>>(iter: I) -> Self {
        Self {
            writes: iter.into_iter().collect(),
        }
    }
}
