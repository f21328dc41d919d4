//! Optimistic local state with rollback
//!
//! A write set is applied to local state first so callers can show the result
//! immediately, then committed. If the commit fails, local state reverts to
//! the last confirmed snapshot.

use crate::coordinator::{BatchCommitCoordinator, CommitReceipt};
use crate::document::DocumentStore;
use crate::error::CommitError;
use sheetwork_model::{CollectionPath, Document, ModelError, Ordered, WriteOp, WriteSet};
use tracing::{debug, warn};

/// State that can absorb a write set locally
pub trait LocalState: Clone {
    /// Apply the writes that concern this state, ignoring the rest
    ///
    /// # Errors
    /// Returns error if a relevant write cannot be decoded or applied
    fn apply(&mut self, writes: &WriteSet) -> Result<(), ModelError>;
}

/// Records of one collection, kept sorted by order
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCollection<E> {
    collection: CollectionPath,
    records: Vec<E>,
}

impl<E: Ordered> LocalCollection<E> {
    /// Create from the records of `collection`
    #[must_use]
    pub fn new(collection: CollectionPath, records: Vec<E>) -> Self {
        let mut this = Self {
            collection,
            records,
        };
        this.sort();
        this
    }

    /// Decode a store snapshot of `collection`
    ///
    /// # Errors
    /// Returns error if a document fails to decode
    pub fn from_documents(collection: CollectionPath, docs: &[Document]) -> Result<Self, ModelError> {
        let records = docs
            .iter()
            .map(Document::decode::<E>)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(collection, records))
    }

    /// Records in order
    #[inline]
    #[must_use]
    pub fn records(&self) -> &[E] {
        &self.records
    }

    /// Collection the records live in
    #[inline]
    #[must_use]
    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    fn sort(&mut self) {
        self.records
            .sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id())));
    }
}

impl<E: Ordered> LocalState for LocalCollection<E> {
    fn apply(&mut self, writes: &WriteSet) -> Result<(), ModelError> {
        for write in writes.iter().filter(|w| self.collection.contains(&w.path)) {
            let index = self.records.iter().position(|r| r.path() == write.path);
            match (&write.op, index) {
                (WriteOp::Create(fields), None) => self.records.push(E::from_fields(fields.clone())?),
                (WriteOp::Create(fields), Some(i)) => self.records[i] = E::from_fields(fields.clone())?,
                (WriteOp::Update(patch), Some(i)) => {
                    let mut fields = self.records[i].to_fields()?;
                    patch.apply_to(&mut fields)?;
                    self.records[i] = E::from_fields(fields)?;
                }
                (WriteOp::Update(_), None) => {
                    debug!(path = %write.path, "update for record not held locally");
                }
                (WriteOp::Delete, Some(i)) => {
                    self.records.remove(i);
                }
                (WriteOp::Delete, None) => {}
            }
        }
        self.sort();
        Ok(())
    }
}

/// Confirmed snapshot plus optimistic working copy
#[derive(Debug, Clone)]
pub struct Optimistic<T> {
    confirmed: T,
    current: T,
}

impl<T: LocalState> Optimistic<T> {
    /// Start from a confirmed snapshot
    #[must_use]
    pub fn new(state: T) -> Self {
        Self {
            current: state.clone(),
            confirmed: state,
        }
    }

    /// State as shown to the user
    #[inline]
    #[must_use]
    pub fn current(&self) -> &T {
        &self.current
    }

    /// Last state known to be committed
    #[inline]
    #[must_use]
    pub fn confirmed(&self) -> &T {
        &self.confirmed
    }

    /// Replace both states with a fresh snapshot from the store
    pub fn confirm(&mut self, snapshot: T) {
        self.current = snapshot.clone();
        self.confirmed = snapshot;
    }

    /// Drop optimistic changes
    pub fn rollback(&mut self) {
        self.current = self.confirmed.clone();
    }

    /// Apply `writes` locally, commit them, and roll back on failure
    ///
    /// # Errors
    /// Returns the commit failure after local state has been reverted
    pub async fn run<S: DocumentStore + ?Sized>(
        &mut self,
        coordinator: &BatchCommitCoordinator<S>,
        writes: &WriteSet,
    ) -> Result<CommitReceipt, CommitError> {
        if let Err(err) = self.current.apply(writes) {
            warn!(%err, "optimistic apply failed, reverting");
            self.rollback();
            return Err(CommitError::Local(err.to_string()));
        }
        match coordinator.commit(writes).await {
            Ok(receipt) => {
                self.confirmed = self.current.clone();
                Ok(receipt)
            }
            Err(err) => {
                self.rollback();
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CommitConfig;
    use crate::error::StoreError;
    use crate::memory::MemoryStore;
    use sheetwork_model::{Entity, FieldPatch, FieldPath, Item};
    use std::sync::Arc;

    fn items() -> LocalCollection<Item> {
        let a = Item::new("a", "s1", 0);
        let b = Item::new("b", "s1", 1);
        LocalCollection::new(a.path().collection(), vec![b, a])
    }

    fn swap() -> WriteSet {
        let mut writes = WriteSet::new();
        let order = |o: u32| FieldPatch::new().set(FieldPath::field("order"), o);
        writes.update(Item::new("a", "s1", 0).path(), order(1));
        writes.update(Item::new("b", "s1", 1).path(), order(0));
        writes
    }

    fn ids(state: &LocalCollection<Item>) -> Vec<&str> {
        state.records().iter().map(|i| i.id.as_str()).collect()
    }

    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let writes: Vec<_> = items()
            .records()
            .iter()
            .map(|i| sheetwork_model::Write::create(i).unwrap())
            .collect();
        store.commit_batch(&writes).await.unwrap();
        store
    }

    #[test]
    fn local_apply_ignores_other_collections() {
        let mut state = items();
        let mut writes = swap();
        writes.create(&Item::new("z", "s2", 0)).unwrap();
        state.apply(&writes).unwrap();
        assert_eq!(ids(&state), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn successful_commit_confirms() {
        let store = seeded().await;
        let coordinator = BatchCommitCoordinator::new(store, CommitConfig::default());
        let mut state = Optimistic::new(items());

        state.run(&coordinator, &swap()).await.unwrap();
        assert_eq!(ids(state.confirmed()), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn failed_commit_rolls_back() {
        let store = seeded().await;
        store.fail_next_commit(StoreError::Unavailable("offline".into()));
        let coordinator = BatchCommitCoordinator::new(store, CommitConfig::default());
        let mut state = Optimistic::new(items());

        let err = state.run(&coordinator, &swap()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(state.current(), state.confirmed());
        assert_eq!(ids(state.current()), vec!["a", "b"]);
    }
}
