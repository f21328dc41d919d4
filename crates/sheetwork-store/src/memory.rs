//! In-memory document store
//!
//! Backs tests and the CLI. A batch is validated against a staged overlay
//! before anything is written, so a failing write leaves the store untouched.
//! Subscribers receive a fresh collection snapshot after every batch that
//! touches their collection.

use crate::document::{DocumentStore, Query};
use crate::error::StoreError;
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use parking_lot::{Mutex, RwLock};
use sheetwork_model::{
    CollectionPath, DocPath, Document, EntityId, Fields, IdGenerator, UlidGenerator, Write, WriteOp,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Serializable full contents of a store
pub type Dump = BTreeMap<DocPath, Fields>;

struct Subscriber {
    collection: CollectionPath,
    query: Query,
    tx: mpsc::UnboundedSender<Vec<Document>>,
}

/// In-memory [`DocumentStore`]
pub struct MemoryStore {
    docs: RwLock<BTreeMap<DocPath, Fields>>,
    subscribers: DashMap<u64, Subscriber>,
    next_subscriber: AtomicU64,
    ids: Box<dyn IdGenerator>,
    fail_next: Mutex<Option<StoreError>>,
    commits: AtomicU64,
}

impl MemoryStore {
    /// Empty store generating ULIDs
    #[must_use]
    pub fn new() -> Self {
        Self::with_ids(UlidGenerator)
    }

    /// Empty store drawing ids from `ids`
    #[must_use]
    pub fn with_ids(ids: impl IdGenerator + 'static) -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            subscribers: DashMap::new(),
            next_subscriber: AtomicU64::new(0),
            ids: Box::new(ids),
            fail_next: Mutex::new(None),
            commits: AtomicU64::new(0),
        }
    }

    /// Replace the contents with `dump`
    #[must_use]
    pub fn with_dump(self, dump: Dump) -> Self {
        *self.docs.write() = dump;
        self
    }

    /// Copy of the full contents
    #[must_use]
    pub fn dump(&self) -> Dump {
        self.docs.read().clone()
    }

    /// Make the next `commit_batch` fail with `err` without applying anything
    pub fn fail_next_commit(&self, err: StoreError) {
        *self.fail_next.lock() = Some(err);
    }

    /// Number of batches applied so far
    #[inline]
    #[must_use]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }

    /// Number of stored documents
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    fn snapshot(docs: &BTreeMap<DocPath, Fields>, collection: &CollectionPath, query: &Query) -> Vec<Document> {
        let mut out: Vec<Document> = docs
            .iter()
            .filter(|(path, fields)| collection.contains(path) && query.matches(fields))
            .map(|(path, fields)| Document::new(path.clone(), fields.clone()))
            .collect();
        query.sort(&mut out);
        out
    }

    fn notify(&self, touched: &BTreeSet<CollectionPath>) {
        if self.subscribers.is_empty() {
            return;
        }
        let docs = self.docs.read();
        let mut closed = Vec::new();
        for entry in self.subscribers.iter() {
            let sub = entry.value();
            if !touched.contains(&sub.collection) {
                continue;
            }
            let snapshot = Self::snapshot(&docs, &sub.collection, &sub.query);
            if sub.tx.send(snapshot).is_err() {
                closed.push(*entry.key());
            }
        }
        drop(docs);
        for key in closed {
            trace!(subscriber = key, "dropping closed subscription");
            self.subscribers.remove(&key);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("documents", &self.docs.read().len())
            .field("subscribers", &self.subscribers.len())
            .field("commits", &self.commit_count())
            .finish_non_exhaustive()
    }
}

impl IdGenerator for MemoryStore {
    fn next_id(&self) -> EntityId {
        self.ids.next_id()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        Ok(self
            .docs
            .read()
            .get(path)
            .map(|fields| Document::new(path.clone(), fields.clone())))
    }

    async fn get_all(
        &self,
        collection: &CollectionPath,
        query: &Query,
    ) -> Result<Vec<Document>, StoreError> {
        Ok(Self::snapshot(&self.docs.read(), collection, query))
    }

    fn generate_id(&self, _collection: &CollectionPath) -> EntityId {
        self.ids.next_id()
    }

    async fn commit_batch(&self, writes: &[Write]) -> Result<(), StoreError> {
        if let Some(err) = self.fail_next.lock().take() {
            debug!(%err, "injected commit failure");
            return Err(err);
        }

        let touched = {
            let mut docs = self.docs.write();
            let mut staged: BTreeMap<&DocPath, Option<Fields>> = BTreeMap::new();
            for write in writes {
                let current = match staged.get(&write.path) {
                    Some(state) => state.clone(),
                    None => docs.get(&write.path).cloned(),
                };
                let next = match (&write.op, current) {
                    (WriteOp::Create(_), Some(_)) => {
                        return Err(StoreError::Conflict {
                            path: write.path.clone(),
                        })
                    }
                    (WriteOp::Create(fields), None) => Some(fields.clone()),
                    (WriteOp::Update(_), None) => {
                        return Err(StoreError::Missing {
                            path: write.path.clone(),
                        })
                    }
                    (WriteOp::Update(patch), Some(mut fields)) => {
                        patch
                            .apply_to(&mut fields)
                            .map_err(|e| StoreError::Rejected {
                                path: write.path.clone(),
                                reason: e.to_string(),
                            })?;
                        Some(fields)
                    }
                    (WriteOp::Delete, _) => None,
                };
                staged.insert(&write.path, next);
            }

            let touched: BTreeSet<CollectionPath> =
                staged.keys().map(|path| path.collection()).collect();
            for (path, state) in staged {
                match state {
                    Some(fields) => {
                        docs.insert(path.clone(), fields);
                    }
                    None => {
                        docs.remove(path);
                    }
                }
            }
            touched
        };

        self.commits.fetch_add(1, Ordering::Relaxed);
        debug!(writes = writes.len(), collections = touched.len(), "batch applied");
        self.notify(&touched);
        Ok(())
    }

    fn subscribe(&self, collection: &CollectionPath, query: Query) -> BoxStream<'static, Vec<Document>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let initial = Self::snapshot(&self.docs.read(), collection, &query);
        let _ = tx.send(initial);

        let key = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            key,
            Subscriber {
                collection: collection.clone(),
                query,
                tx,
            },
        );
        stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|docs| (docs, rx)) }).boxed()
    }
}
