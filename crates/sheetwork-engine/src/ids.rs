//! Old-to-new identifier mapping for one duplication

use sheetwork_model::{EntityId, EntityKind, IdGenerator};
use std::collections::HashMap;
use std::fmt;

type Key = (EntityKind, EntityId);

/// Identifier map scoped to a single copy operation
///
/// Entries are keyed by record kind as well as id: ids are only unique within
/// one collection, so an item and a column may share one. Never persisted;
/// dropped when the operation completes or aborts. An id without a mapping is
/// simply "not part of the copy".
pub struct IdentifierMap<'g> {
    generator: &'g dyn IdGenerator,
    forward: HashMap<Key, EntityId>,
    backward: HashMap<Key, EntityId>,
    generated: usize,
}

impl<'g> IdentifierMap<'g> {
    /// Create empty map drawing fresh ids from `generator`
    #[inline]
    #[must_use]
    pub fn new(generator: &'g dyn IdGenerator) -> Self {
        Self {
            generator,
            forward: HashMap::new(),
            backward: HashMap::new(),
            generated: 0,
        }
    }

    /// New id for the `kind` record `old`, generating one on first sight
    ///
    /// Idempotent: repeated calls with the same key return the same id.
    pub fn record(&mut self, kind: EntityKind, old: &EntityId) -> EntityId {
        let key = (kind, old.clone());
        if let Some(new) = self.forward.get(&key) {
            return new.clone();
        }
        let new = self.generator.next_id();
        self.generated += 1;
        self.backward.insert((kind, new.clone()), old.clone());
        self.forward.insert(key, new.clone());
        new
    }

    /// Map `old` to itself
    ///
    /// For records that stay valid in the destination, e.g. a sheet's columns
    /// when an item is duplicated inside the same sheet.
    pub fn preserve(&mut self, kind: EntityKind, old: &EntityId) {
        let key = (kind, old.clone());
        if !self.forward.contains_key(&key) {
            self.backward.insert(key.clone(), old.clone());
            self.forward.insert(key, old.clone());
        }
    }

    /// Look up without generating
    #[inline]
    #[must_use]
    pub fn resolve(&self, kind: EntityKind, old: &EntityId) -> Option<&EntityId> {
        self.forward.get(&(kind, old.clone()))
    }

    /// Source id a new id was generated for
    #[inline]
    #[must_use]
    pub fn original(&self, kind: EntityKind, new: &EntityId) -> Option<&EntityId> {
        self.backward.get(&(kind, new.clone()))
    }

    /// Number of mapped ids (generated and preserved)
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Number of freshly generated ids
    #[inline]
    #[must_use]
    pub fn generated(&self) -> usize {
        self.generated
    }
}

impl fmt::Debug for IdentifierMap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentifierMap")
            .field("mapped", &self.forward.len())
            .field("generated", &self.generated)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetwork_model::SequentialIds;

    #[test]
    fn record_is_idempotent() {
        let gen = SequentialIds::new("n");
        let mut ids = IdentifierMap::new(&gen);
        let a = EntityId::new("a");
        let first = ids.record(EntityKind::Item, &a);
        assert_eq!(ids.record(EntityKind::Item, &a), first);
        assert_eq!(ids.generated(), 1);
        assert_eq!(ids.resolve(EntityKind::Item, &a), Some(&first));
        assert_eq!(ids.original(EntityKind::Item, &first), Some(&a));
    }

    #[test]
    fn resolve_does_not_generate() {
        let gen = SequentialIds::new("n");
        let ids = IdentifierMap::new(&gen);
        assert_eq!(ids.resolve(EntityKind::Item, &EntityId::new("x")), None);
        assert!(ids.is_empty());
    }

    #[test]
    fn preserve_maps_to_self_without_generating() {
        let gen = SequentialIds::new("n");
        let mut ids = IdentifierMap::new(&gen);
        let col = EntityId::new("col");
        ids.preserve(EntityKind::Column, &col);
        assert_eq!(ids.resolve(EntityKind::Column, &col), Some(&col));
        assert_eq!(ids.record(EntityKind::Column, &col), col);
        assert_eq!(ids.generated(), 0);
    }

    #[test]
    fn same_id_in_different_kinds_maps_separately() {
        let gen = SequentialIds::new("n");
        let mut ids = IdentifierMap::new(&gen);
        let shared = EntityId::new("x");
        ids.preserve(EntityKind::Column, &shared);

        let item = ids.record(EntityKind::Item, &shared);
        assert_ne!(item, shared);
        let measure = ids.record(EntityKind::Measure, &shared);
        assert_ne!(measure, item);

        assert_eq!(ids.resolve(EntityKind::Column, &shared), Some(&shared));
        assert_eq!(ids.resolve(EntityKind::Item, &shared), Some(&item));
        assert_eq!(ids.resolve(EntityKind::Row, &shared), None);
        assert_eq!(ids.generated(), 2);
    }
}
