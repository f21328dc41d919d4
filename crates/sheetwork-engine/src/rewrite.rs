//! Reference rewriting
//!
//! Rewrites parent links and id-keyed value maps of a copied record through
//! an [`IdentifierMap`]. Pure: no ids are generated here, so everything the
//! record references must be recorded before it is rewritten.
//!
//! Policy:
//! - a resolvable parent is replaced; an unresolvable one becomes `None`
//!   (the record is a new root in the destination)
//! - map keys are column ids and resolve against copied columns only;
//!   unmapped keys are dropped
//! - `order` and `depth` are left to the caller

use crate::ids::IdentifierMap;
use sheetwork_model::{Entity, EntityId, EntityKind, FieldPatch, FieldPath, Hierarchical, Item, Row};
use std::collections::BTreeMap;

/// Rewrites references through one identifier map
#[derive(Debug, Clone, Copy)]
pub struct ReferenceRewriter<'m, 'g> {
    ids: &'m IdentifierMap<'g>,
}

impl<'m, 'g> ReferenceRewriter<'m, 'g> {
    /// Create rewriter over `ids`
    #[inline]
    #[must_use]
    pub fn new(ids: &'m IdentifierMap<'g>) -> Self {
        Self { ids }
    }

    /// Rewrite a parent link to a record of `kind`
    #[inline]
    #[must_use]
    pub fn parent(&self, kind: EntityKind, parent: Option<&EntityId>) -> Option<EntityId> {
        parent.and_then(|p| self.ids.resolve(kind, p)).cloned()
    }

    /// Rewrite the keys of a column-keyed map, dropping unmapped keys
    #[must_use]
    pub fn keyed_map<V: Clone>(&self, map: &BTreeMap<EntityId, V>) -> Rewritten<BTreeMap<EntityId, V>> {
        let mut out = BTreeMap::new();
        let mut dropped = Vec::new();
        for (key, value) in map {
            match self.ids.resolve(EntityKind::Column, key) {
                Some(new_key) => {
                    out.insert(new_key.clone(), value.clone());
                }
                None => dropped.push(key.clone()),
            }
        }
        Rewritten {
            record: out,
            dropped,
        }
    }

    /// Rewrite every reference of `record`
    #[must_use]
    pub fn rewrite<T: RewriteRefs>(&self, record: &T) -> Rewritten<T> {
        let mut copy = record.clone();
        let dropped = copy.rewrite_refs(self);
        Rewritten {
            record: copy,
            dropped,
        }
    }
}

/// Result of a rewrite plus the references that were dropped
#[derive(Debug, Clone, PartialEq)]
pub struct Rewritten<T> {
    /// Rewritten value
    pub record: T,
    /// Source ids of dropped map keys
    pub dropped: Vec<EntityId>,
}

/// Entity-kind-specific reference rewrite hook
pub trait RewriteRefs: Clone {
    /// Rewrite references in place; return the dropped map keys
    fn rewrite_refs(&mut self, rewriter: &ReferenceRewriter<'_, '_>) -> Vec<EntityId>;
}

impl RewriteRefs for Item {
    fn rewrite_refs(&mut self, rewriter: &ReferenceRewriter<'_, '_>) -> Vec<EntityId> {
        let parent = rewriter.parent(Self::KIND, self.parent_id());
        self.set_parent_id(parent);
        let columns = rewriter.keyed_map(&self.custom_columns);
        self.custom_columns = columns.record;
        columns.dropped
    }
}

impl RewriteRefs for Row {
    fn rewrite_refs(&mut self, rewriter: &ReferenceRewriter<'_, '_>) -> Vec<EntityId> {
        let values = rewriter.keyed_map(&self.values);
        self.values = values.record;
        values.dropped
    }
}

/// Partial update removing `keys` from the map field `field`
///
/// The delete-sentinel form of "drop unmapped keys", for stores patched in
/// place rather than rewritten whole.
#[must_use]
pub fn drop_keys_patch<'a>(field: &str, keys: impl IntoIterator<Item = &'a EntityId>) -> FieldPatch {
    keys.into_iter().fold(FieldPatch::new(), |patch, key| {
        patch.delete(FieldPath::key(field, key))
    })
}
