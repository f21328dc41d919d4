//! Project workspace service
//!
//! Every user-level operation follows the same shape: load one snapshot, ask
//! an engine for a write set, commit it atomically. Engines never see live
//! store state, and nothing is written unless the whole batch applies.

use crate::config::WorkspaceConfig;
use crate::error::Result;
use crate::loader::SnapshotLoader;
use chrono::Utc;
use futures::stream::{BoxStream, StreamExt};
use sheetwork_engine::{
    cascade, DeepCopyEngine, Direction, EngineError, ItemDestination, MeasureDestination,
    ReorderEngine, SheetDestination, SheetSnapshot,
};
use sheetwork_model::{
    CollectionPath, Column, Entity, EntityId, EntityKind, FieldPatch, FieldPath, IdGenerator, Item,
    Sheet, SheetKind, WriteSet,
};
use sheetwork_store::{BatchCommitCoordinator, CommitReceipt, DocumentStore, Query};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of a duplication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicated {
    /// Id of the new root record
    pub id: EntityId,
    /// Records created
    pub records: usize,
    /// Value-map keys dropped because their column was not part of the copy
    pub dropped_references: usize,
}

/// Draws ids from the store for one target collection
struct StoreIds<'a, S: ?Sized> {
    store: &'a S,
    collection: CollectionPath,
}

impl<S: DocumentStore + ?Sized> IdGenerator for StoreIds<'_, S> {
    fn next_id(&self) -> EntityId {
        self.store.generate_id(&self.collection)
    }
}

/// Operations on the sheets of one project
pub struct Workspace<S: ?Sized> {
    project: EntityId,
    loader: SnapshotLoader<S>,
    coordinator: BatchCommitCoordinator<S>,
    config: WorkspaceConfig,
}

impl<S: DocumentStore + ?Sized> Workspace<S> {
    /// Create workspace for `project`
    #[must_use]
    pub fn new(store: Arc<S>, project: impl Into<EntityId>, config: WorkspaceConfig) -> Self {
        Self {
            project: project.into(),
            loader: SnapshotLoader::new(Arc::clone(&store)),
            coordinator: BatchCommitCoordinator::new(store, config.commit.clone()),
            config,
        }
    }

    /// Project id
    #[inline]
    #[must_use]
    pub fn project(&self) -> &EntityId {
        &self.project
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Commit coordinator (shared with optimistic callers)
    #[inline]
    #[must_use]
    pub fn coordinator(&self) -> &BatchCommitCoordinator<S> {
        &self.coordinator
    }

    /// Sheets of the project, optionally of one kind, by order
    ///
    /// # Errors
    /// Returns error if the store read fails
    pub async fn sheets(&self, kind: Option<SheetKind>) -> Result<Vec<Sheet>> {
        self.loader.sheets(&self.project, kind).await
    }

    /// Everything `sheet` owns
    ///
    /// # Errors
    /// Returns not-found if the sheet is absent
    pub async fn snapshot(&self, sheet: &EntityId) -> Result<SheetSnapshot> {
        self.loader.snapshot(&self.project, sheet).await
    }

    /// Item snapshots of `sheet`, re-delivered after every commit touching it
    ///
    /// Documents that fail to decode are skipped.
    #[must_use]
    pub fn watch_items(&self, sheet: &EntityId) -> BoxStream<'static, Vec<Item>> {
        let collection = Sheet::owned_collection(sheet, EntityKind::Item);
        self.coordinator
            .store()
            .subscribe(&collection, Query::new().order_by("order"))
            .map(|docs| {
                docs.iter()
                    .filter_map(|doc| match doc.decode::<Item>() {
                        Ok(item) => Some(item),
                        Err(err) => {
                            warn!(path = %doc.path, %err, "skipping undecodable item");
                            None
                        }
                    })
                    .collect()
            })
            .boxed()
    }

    /// Duplicate a sheet with all its columns, items, measures and rows
    ///
    /// The copy is appended after the project's sheets of the same kind.
    ///
    /// # Errors
    /// - not-found if the sheet is absent
    /// - integrity if its records form a cycle or exceed the depth cap
    /// - commit failure if the batch did not apply
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn duplicate_sheet(&self, sheet: &EntityId) -> Result<Duplicated> {
        let source = self.snapshot(sheet).await?;
        let siblings = self.sheets(Some(source.sheet.kind)).await?;
        let ids = self.ids(Sheet::collection(&self.project));
        let engine = DeepCopyEngine::new(&ids, self.config.engine.clone());

        let dest = SheetDestination {
            project_id: self.project.clone(),
            order: next_order(siblings.iter().map(|s| s.order)),
            created_at: Some(Utc::now()),
        };
        let outcome = engine.copy_sheet(&source, &dest)?;
        self.commit(&outcome.writes).await?;
        info!(copy = %outcome.root_id, records = outcome.copied, "sheet duplicated");
        Ok(Duplicated {
            id: outcome.root_id,
            records: outcome.copied,
            dropped_references: outcome.dropped_references,
        })
    }

    /// Duplicate an item with its descendants inside the same sheet
    ///
    /// The copy becomes a root item appended after the existing roots.
    ///
    /// # Errors
    /// - not-found if the sheet or item is absent
    /// - integrity on a corrupted parent chain
    /// - commit failure if the batch did not apply
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn duplicate_item(&self, sheet: &EntityId, item: &EntityId) -> Result<Duplicated> {
        let source = self.snapshot(sheet).await?;
        let ids = self.ids(Sheet::owned_collection(sheet, EntityKind::Item));
        let engine = DeepCopyEngine::new(&ids, self.config.engine.clone());

        let dest = ItemDestination {
            sheet_id: sheet.clone(),
            order: next_order(source.items.siblings(None).iter().map(|i| i.order)),
            columns: source.columns.iter().map(|c| c.id.clone()).collect(),
        };
        let outcome = engine.copy_item_subtree(&source.items, item, &dest)?;
        self.commit(&outcome.writes).await?;
        info!(copy = %outcome.root_id, records = outcome.copied, "item duplicated");
        Ok(Duplicated {
            id: outcome.root_id,
            records: outcome.copied,
            dropped_references: outcome.dropped_references,
        })
    }

    /// Duplicate a measure with its columns, rows and sub-measures under the
    /// same owner
    ///
    /// # Errors
    /// - not-found if the sheet or measure is absent
    /// - integrity on an ownership cycle
    /// - commit failure if the batch did not apply
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn duplicate_measure(&self, sheet: &EntityId, measure: &EntityId) -> Result<Duplicated> {
        let source = self.snapshot(sheet).await?;
        let original = source
            .kpi
            .measure(measure)
            .ok_or_else(|| EngineError::not_found(EntityKind::Measure, measure))?;
        let ids = self.ids(Sheet::owned_collection(sheet, EntityKind::Measure));
        let engine = DeepCopyEngine::new(&ids, self.config.engine.clone());

        let dest = MeasureDestination {
            sheet_id: sheet.clone(),
            owner: original.owner.clone(),
            order: next_order(source.kpi.measures_of(&original.owner).iter().map(|m| m.order)),
        };
        let outcome = engine.copy_measure(&source.kpi, measure, &dest)?;
        self.commit(&outcome.writes).await?;
        info!(copy = %outcome.root_id, records = outcome.copied, "measure duplicated");
        Ok(Duplicated {
            id: outcome.root_id,
            records: outcome.copied,
            dropped_references: outcome.dropped_references,
        })
    }

    /// Move a sheet among the project's sheets of the same kind
    ///
    /// # Errors
    /// Returns not-found if the sheet is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn move_sheet(&self, sheet: &EntityId, direction: Direction) -> Result<CommitReceipt> {
        let target = self.loader.sheet(&self.project, sheet).await?;
        let siblings = self.sheets(Some(target.kind)).await?;
        let refs: Vec<&Sheet> = siblings.iter().collect();
        let plan = ReorderEngine::move_one_step(&refs, sheet, direction)?;
        self.commit(&plan.writes).await
    }

    /// Move an item among the items sharing its parent
    ///
    /// # Errors
    /// Returns not-found if the sheet or item is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn move_item(
        &self,
        sheet: &EntityId,
        item: &EntityId,
        direction: Direction,
    ) -> Result<CommitReceipt> {
        let source = self.snapshot(sheet).await?;
        let target = source
            .items
            .get(item)
            .ok_or_else(|| EngineError::not_found(EntityKind::Item, item))?;
        let siblings = source.items.siblings(target.parent_id.as_ref());
        let plan = ReorderEngine::move_one_step(&siblings, item, direction)?;
        self.commit(&plan.writes).await
    }

    /// Move a column within its type group
    ///
    /// # Errors
    /// Returns not-found if the sheet or column is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn move_column(
        &self,
        sheet: &EntityId,
        column: &EntityId,
        direction: Direction,
    ) -> Result<CommitReceipt> {
        let source = self.snapshot(sheet).await?;
        let siblings: Vec<&Column> = if source.columns.iter().any(|c| &c.id == column) {
            source.columns.iter().collect()
        } else {
            let owner = source
                .kpi
                .column(column)
                .and_then(|c| c.measure_id.as_ref())
                .ok_or_else(|| EngineError::not_found(EntityKind::Column, column))?;
            source.kpi.columns_of(owner)
        };
        let plan = ReorderEngine::move_column(&siblings, column, direction)?;
        self.commit(&plan.writes).await
    }

    /// Move a KPI row within its measure
    ///
    /// # Errors
    /// Returns not-found if the sheet or row is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn move_row(&self, sheet: &EntityId, row: &EntityId, direction: Direction) -> Result<CommitReceipt> {
        let source = self.snapshot(sheet).await?;
        let target = source
            .kpi
            .row(row)
            .ok_or_else(|| EngineError::not_found(EntityKind::Row, row))?;
        let siblings = source.kpi.rows_of(&target.measure_id);
        let plan = ReorderEngine::move_one_step(&siblings, row, direction)?;
        self.commit(&plan.writes).await
    }

    /// Move a measure among the measures of its owner
    ///
    /// # Errors
    /// Returns not-found if the sheet or measure is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn move_measure(
        &self,
        sheet: &EntityId,
        measure: &EntityId,
        direction: Direction,
    ) -> Result<CommitReceipt> {
        let source = self.snapshot(sheet).await?;
        let target = source
            .kpi
            .measure(measure)
            .ok_or_else(|| EngineError::not_found(EntityKind::Measure, measure))?;
        let siblings = source.kpi.measures_of(&target.owner);
        let plan = ReorderEngine::move_one_step(&siblings, measure, direction)?;
        self.commit(&plan.writes).await
    }

    /// Delete a sheet and everything it owns
    ///
    /// # Errors
    /// Returns not-found if the sheet is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn delete_sheet(&self, sheet: &EntityId) -> Result<CommitReceipt> {
        let source = self.snapshot(sheet).await?;
        let siblings = self.sheets(Some(source.sheet.kind)).await?;
        let refs: Vec<&Sheet> = siblings.iter().collect();
        let writes = cascade::delete_sheet(&source, &refs);
        let receipt = self.commit(&writes).await?;
        info!(records = source.record_count() + 1, "sheet deleted");
        Ok(receipt)
    }

    /// Delete an item and its descendants
    ///
    /// # Errors
    /// Returns not-found if the sheet or item is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn delete_item(&self, sheet: &EntityId, item: &EntityId) -> Result<CommitReceipt> {
        let source = self.snapshot(sheet).await?;
        let writes = cascade::delete_item(&source.items, item)?;
        self.commit(&writes).await
    }

    /// Delete a measure with its columns, rows and sub-measures
    ///
    /// # Errors
    /// Returns not-found if the sheet or measure is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn delete_measure(&self, sheet: &EntityId, measure: &EntityId) -> Result<CommitReceipt> {
        let source = self.snapshot(sheet).await?;
        let writes = cascade::delete_measure(&source.kpi, measure)?;
        self.commit(&writes).await
    }

    /// Remove a column and clear its values everywhere
    ///
    /// # Errors
    /// Returns not-found if the sheet or column is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn remove_column(&self, sheet: &EntityId, column: &EntityId) -> Result<CommitReceipt> {
        let source = self.snapshot(sheet).await?;
        let writes = cascade::remove_column(&source, column)?;
        self.commit(&writes).await
    }

    /// Rename a sheet
    ///
    /// # Errors
    /// Returns not-found if the sheet is absent, or a commit failure
    #[instrument(skip(self), fields(project = %self.project))]
    pub async fn rename_sheet(&self, sheet: &EntityId, name: &str) -> Result<CommitReceipt> {
        let target = self.loader.sheet(&self.project, sheet).await?;
        let mut writes = WriteSet::new();
        writes.update(target.path(), FieldPatch::new().set(FieldPath::field("name"), name));
        self.commit(&writes).await
    }

    async fn commit(&self, writes: &WriteSet) -> Result<CommitReceipt> {
        Ok(self.coordinator.commit(writes).await?)
    }

    fn ids(&self, collection: CollectionPath) -> StoreIds<'_, S> {
        StoreIds {
            store: self.coordinator.store().as_ref(),
            collection,
        }
    }
}

impl<S: ?Sized> std::fmt::Debug for Workspace<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("project", &self.project)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Order that appends after `orders`
fn next_order(orders: impl Iterator<Item = u32>) -> u32 {
    orders.max().map_or(0, |max| max.saturating_add(1))
}
