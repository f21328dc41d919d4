//! Snapshot loading
//!
//! Reads everything an operation needs in one pass before any engine runs.

use crate::error::Result;
use sheetwork_engine::{EngineError, SheetSnapshot};
use sheetwork_model::{
    CollectionPath, Document, Entity, EntityId, EntityKind, Sheet, SheetKind,
};
use sheetwork_store::{DocumentStore, Query};
use std::sync::Arc;
use tracing::debug;

/// Reads typed snapshots from a store
pub struct SnapshotLoader<S: ?Sized> {
    store: Arc<S>,
}

impl<S: DocumentStore + ?Sized> SnapshotLoader<S> {
    /// Create loader over `store`
    #[inline]
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// One sheet of `project`
    ///
    /// # Errors
    /// Returns not-found if the sheet is absent
    pub async fn sheet(&self, project: &EntityId, id: &EntityId) -> Result<Sheet> {
        let path = Sheet::collection(project).doc(id);
        let doc = self
            .store
            .get(&path)
            .await?
            .ok_or_else(|| EngineError::not_found(EntityKind::Sheet, id))?;
        Ok(doc.decode()?)
    }

    /// Sheets of `project`, optionally of one kind, sorted by order
    ///
    /// # Errors
    /// Returns error if the store read fails or a document does not decode
    pub async fn sheets(&self, project: &EntityId, kind: Option<SheetKind>) -> Result<Vec<Sheet>> {
        let query = match kind {
            Some(kind) => Query::new().where_eq("kind", kind.as_str()),
            None => Query::new(),
        };
        self.all(&Sheet::collection(project), &query.order_by("order")).await
    }

    /// Everything a sheet owns
    ///
    /// # Errors
    /// Returns not-found if the sheet is absent
    pub async fn snapshot(&self, project: &EntityId, id: &EntityId) -> Result<SheetSnapshot> {
        let sheet = self.sheet(project, id).await?;
        let owned = |kind| Sheet::owned_collection(id, kind);
        let query = Query::new().order_by("order");

        let columns = self.all(&owned(EntityKind::Column), &query).await?;
        let items = self.all(&owned(EntityKind::Item), &query).await?;
        let measures = self.all(&owned(EntityKind::Measure), &query).await?;
        let rows = self.all(&owned(EntityKind::Row), &query).await?;
        debug!(
            sheet = %id,
            columns = columns.len(),
            items = items.len(),
            measures = measures.len(),
            rows = rows.len(),
            "snapshot loaded"
        );
        Ok(SheetSnapshot::new(sheet, columns, items, measures, rows))
    }

    async fn all<E: Entity>(&self, collection: &CollectionPath, query: &Query) -> Result<Vec<E>> {
        let docs = self.store.get_all(collection, query).await?;
        Ok(docs
            .iter()
            .map(Document::decode::<E>)
            .collect::<std::result::Result<Vec<_>, _>>()?)
    }
}

impl<S: ?Sized> Clone for SnapshotLoader<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for SnapshotLoader<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotLoader").finish_non_exhaustive()
    }
}
