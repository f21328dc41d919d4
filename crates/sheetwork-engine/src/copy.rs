//! Deep copy engine
//!
//! Clones a sheet, an item subtree or a measure tree into a flat [`WriteSet`]
//! of creates. Every record gets a fresh id; every internal reference is
//! rewritten through one [`IdentifierMap`]. Nothing touches the store here.
//!
//! Traversal is breadth-first by depth, then stored order, then id, so a
//! parent is always recorded before its children are rewritten.

use crate::config::EngineConfig;
use crate::error::{EngineError, IntegrityViolation};
use crate::ids::IdentifierMap;
use crate::position;
use crate::rewrite::{ReferenceRewriter, RewriteRefs};
use crate::snapshot::{Forest, MeasureArena, SheetSnapshot};
use chrono::{DateTime, Utc};
use sheetwork_model::{
    Column, ColumnGroup, Entity, EntityId, EntityKind, Hierarchical, IdGenerator, Item, Measure,
    MeasureOwner, WriteSet,
};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, error, warn};

/// Where a sheet copy lands
#[derive(Debug, Clone, PartialEq)]
pub struct SheetDestination {
    /// Owning project
    pub project_id: EntityId,
    /// Order among the project's sheets of the same kind
    pub order: u32,
    /// Creation timestamp stamped on the copy
    pub created_at: Option<DateTime<Utc>>,
}

/// Where an item subtree copy lands
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDestination {
    /// Destination sheet
    pub sheet_id: EntityId,
    /// Order given to the copied root
    pub order: u32,
    /// Column ids valid in the destination; other `customColumns` keys drop
    pub columns: Vec<EntityId>,
}

/// Where a measure copy lands
#[derive(Debug, Clone, PartialEq)]
pub struct MeasureDestination {
    /// Destination sheet
    pub sheet_id: EntityId,
    /// New owner (sheet or row)
    pub owner: MeasureOwner,
    /// Order among the owner's measures
    pub order: u32,
}

/// Result of one copy
#[derive(Debug, Clone, PartialEq)]
pub struct CopyOutcome {
    /// Creates to commit as one batch
    pub writes: WriteSet,
    /// Id of the copied root record
    pub root_id: EntityId,
    /// Number of records created
    pub copied: usize,
    /// Number of value-map keys dropped because their target was not copied
    pub dropped_references: usize,
}

#[derive(Default)]
struct Accumulator {
    writes: WriteSet,
    dropped: usize,
}

impl Accumulator {
    fn finish(self, root_id: EntityId) -> CopyOutcome {
        CopyOutcome {
            copied: self.writes.len(),
            writes: self.writes,
            root_id,
            dropped_references: self.dropped,
        }
    }

    fn note_dropped<E: Entity>(&mut self, record: &E, dropped: &[EntityId]) {
        if dropped.is_empty() {
            return;
        }
        warn!(
            kind = %E::KIND,
            id = %record.id(),
            dropped = dropped.len(),
            "dropped references to records outside the copy"
        );
        self.dropped += dropped.len();
    }
}

/// Deep copy engine
pub struct DeepCopyEngine<'g> {
    generator: &'g dyn IdGenerator,
    config: EngineConfig,
}

impl<'g> DeepCopyEngine<'g> {
    /// Create engine drawing fresh ids from `generator`
    #[inline]
    #[must_use]
    pub fn new(generator: &'g dyn IdGenerator, config: EngineConfig) -> Self {
        Self { generator, config }
    }

    /// Engine configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Copy a whole sheet with everything it owns
    ///
    /// The copy gets a fresh order space for its items, columns and measures.
    ///
    /// # Errors
    /// Returns [`EngineError::Integrity`] if the source contains a cycle, a
    /// chain deeper than `max_depth`, records unreachable from any root, or
    /// rows and columns whose measure is missing
    pub fn copy_sheet(
        &self,
        source: &SheetSnapshot,
        dest: &SheetDestination,
    ) -> Result<CopyOutcome, EngineError> {
        let (rows, columns) = source.kpi.detached();
        if !rows.is_empty() {
            return Err(integrity(IntegrityViolation::Unreachable {
                kind: EntityKind::Row,
                ids: rows.iter().map(|r| r.id.clone()).collect(),
            }));
        }
        if !columns.is_empty() {
            return Err(integrity(IntegrityViolation::Unreachable {
                kind: EntityKind::Column,
                ids: columns.iter().map(|c| c.id.clone()).collect(),
            }));
        }

        let mut ids = IdentifierMap::new(self.generator);
        let mut acc = Accumulator::default();

        let sheet_id = ids.record(EntityKind::Sheet, &source.sheet.id);
        let mut sheet = source.sheet.clone();
        sheet.id = sheet_id.clone();
        sheet.project_id = dest.project_id.clone();
        sheet.name = self.config.copy_name(&source.sheet.name);
        sheet.order = dest.order;
        sheet.created_at = dest.created_at;
        acc.writes.create(&sheet)?;

        let columns: Vec<&Column> = source.columns.iter().collect();
        self.copy_columns(&columns, &sheet_id, None, &mut ids, &mut acc)?;

        let roots = source.items.roots();
        let visited = self.copy_forest(&source.items, &roots, &sheet_id, 0, &mut ids, &mut acc)?;
        if visited.len() < source.items.len() {
            let unreachable: Vec<EntityId> = source
                .items
                .iter()
                .filter(|i| !visited.contains(&i.id))
                .map(|i| i.id.clone())
                .collect();
            return Err(integrity(IntegrityViolation::Unreachable {
                kind: EntityKind::Item,
                ids: unreachable,
            }));
        }

        let arena = &source.kpi;
        let mut measure_roots = arena.measures_of(&MeasureOwner::Sheet(source.sheet.id.clone()));
        let mut orphans: Vec<&Measure> = arena
            .measures()
            .filter(|m| match &m.owner {
                MeasureOwner::Sheet(owner) => *owner != source.sheet.id,
                MeasureOwner::Row(_) => !arena.owner_exists(&m.owner),
            })
            .collect();
        if !orphans.is_empty() {
            warn!(count = orphans.len(), "measures with a missing owner copied as sheet measures");
            orphans.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
            measure_roots.extend(orphans);
        }

        let mut visiting = HashSet::new();
        let owner = MeasureOwner::Sheet(sheet_id.clone());
        for (index, measure) in measure_roots.into_iter().enumerate() {
            let target = MeasureTarget {
                sheet_id: &sheet_id,
                owner: owner.clone(),
                order: position(index),
                name: None,
            };
            self.copy_measure_tree(arena, measure, target, 0, &mut ids, &mut visiting, &mut acc)?;
        }
        if visiting.len() < arena.len() {
            let unreachable: Vec<EntityId> = arena
                .measures()
                .filter(|m| !visiting.contains(&m.id))
                .map(|m| m.id.clone())
                .collect();
            return Err(integrity(IntegrityViolation::Unreachable {
                kind: EntityKind::Measure,
                ids: unreachable,
            }));
        }

        debug!(
            source = %source.sheet.id,
            copy = %sheet_id,
            writes = acc.writes.len(),
            generated = ids.generated(),
            "sheet copy computed"
        );
        Ok(acc.finish(sheet_id))
    }

    /// Copy one item and its descendants
    ///
    /// The copied root becomes a root item of the destination sheet.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if `root` is not in `forest`, or
    /// [`EngineError::Integrity`] on a cycle or over-deep chain
    pub fn copy_item_subtree(
        &self,
        forest: &Forest<Item>,
        root: &EntityId,
        dest: &ItemDestination,
    ) -> Result<CopyOutcome, EngineError> {
        let source = forest
            .get(root)
            .ok_or_else(|| EngineError::not_found(EntityKind::Item, root))?;

        let mut ids = IdentifierMap::new(self.generator);
        for column in &dest.columns {
            ids.preserve(EntityKind::Column, column);
        }
        let mut acc = Accumulator::default();
        self.copy_forest(forest, &[source], &dest.sheet_id, dest.order, &mut ids, &mut acc)?;

        let root_id = ids
            .resolve(EntityKind::Item, root)
            .cloned()
            .ok_or_else(|| EngineError::not_found(EntityKind::Item, root))?;
        debug!(source = %root, copy = %root_id, writes = acc.writes.len(), "item subtree copy computed");
        Ok(acc.finish(root_id))
    }

    /// Copy one measure with its columns, rows and sub-measures
    ///
    /// The copied measure is renamed with the configured suffix.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if `id` is not in `arena`, or
    /// [`EngineError::Integrity`] on a cycle or over-deep chain
    pub fn copy_measure(
        &self,
        arena: &MeasureArena,
        id: &EntityId,
        dest: &MeasureDestination,
    ) -> Result<CopyOutcome, EngineError> {
        let source = arena
            .measure(id)
            .ok_or_else(|| EngineError::not_found(EntityKind::Measure, id))?;

        let mut ids = IdentifierMap::new(self.generator);
        let mut acc = Accumulator::default();
        let mut visiting = HashSet::new();
        let target = MeasureTarget {
            sheet_id: &dest.sheet_id,
            owner: dest.owner.clone(),
            order: dest.order,
            name: Some(self.config.copy_name(&source.name)),
        };
        let root_id =
            self.copy_measure_tree(arena, source, target, 0, &mut ids, &mut visiting, &mut acc)?;

        debug!(source = %id, copy = %root_id, writes = acc.writes.len(), "measure copy computed");
        Ok(acc.finish(root_id))
    }

    /// Breadth-first copy of the subtrees under `roots`
    ///
    /// Copied roots get orders `first_order..`; every other node keeps its
    /// position among its copied siblings. Returns the source ids visited.
    fn copy_forest<T: Hierarchical + RewriteRefs>(
        &self,
        forest: &Forest<T>,
        roots: &[&T],
        container: &EntityId,
        first_order: u32,
        ids: &mut IdentifierMap<'_>,
        acc: &mut Accumulator,
    ) -> Result<HashSet<EntityId>, EngineError> {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<(&T, u32)> = roots.iter().map(|r| (*r, 0)).collect();
        let mut next_order: HashMap<Option<EntityId>, u32> = HashMap::new();
        next_order.insert(None, first_order);

        while let Some((node, level)) = queue.pop_front() {
            if level > self.config.max_depth {
                return Err(integrity(IntegrityViolation::DepthExceeded {
                    kind: T::KIND,
                    id: node.id().clone(),
                    max_depth: self.config.max_depth,
                }));
            }
            if !visited.insert(node.id().clone()) {
                return Err(integrity(IntegrityViolation::Cycle {
                    kind: T::KIND,
                    id: node.id().clone(),
                }));
            }

            let new_id = ids.record(T::KIND, node.id());
            let rewritten = ReferenceRewriter::new(ids).rewrite(node);
            let mut copy = rewritten.record;
            copy.set_id(new_id);
            copy.set_container(container.clone());
            if level == 0 {
                copy.set_parent_id(None);
            }
            copy.set_depth(level);
            let slot = next_order.entry(copy.parent_id().cloned()).or_insert(0);
            copy.set_order(*slot);
            *slot += 1;

            acc.note_dropped(node, &rewritten.dropped);
            acc.writes.create(&copy)?;

            queue.extend(
                forest
                    .children_of(node.id())
                    .iter()
                    .filter_map(|child| forest.get(child))
                    .map(|child| (child, level + 1)),
            );
        }
        Ok(visited)
    }

    /// Copy `columns` into `sheet_id`, optionally under a measure
    ///
    /// Each type group gets its own dense order space.
    fn copy_columns(
        &self,
        columns: &[&Column],
        sheet_id: &EntityId,
        measure_id: Option<&EntityId>,
        ids: &mut IdentifierMap<'_>,
        acc: &mut Accumulator,
    ) -> Result<(), EngineError> {
        let mut next_order: HashMap<ColumnGroup, u32> = HashMap::new();
        for column in columns {
            let slot = next_order.entry(column.group()).or_insert(0);
            let mut copy = (*column).clone();
            copy.id = ids.record(EntityKind::Column, &column.id);
            copy.sheet_id = sheet_id.clone();
            copy.measure_id = measure_id.cloned();
            copy.order = *slot;
            *slot += 1;
            acc.writes.create(&copy)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn copy_measure_tree(
        &self,
        arena: &MeasureArena,
        measure: &Measure,
        target: MeasureTarget<'_>,
        level: u32,
        ids: &mut IdentifierMap<'_>,
        visiting: &mut HashSet<EntityId>,
        acc: &mut Accumulator,
    ) -> Result<EntityId, EngineError> {
        if level > self.config.max_depth {
            return Err(integrity(IntegrityViolation::DepthExceeded {
                kind: EntityKind::Measure,
                id: measure.id.clone(),
                max_depth: self.config.max_depth,
            }));
        }
        if !visiting.insert(measure.id.clone()) {
            return Err(integrity(IntegrityViolation::Cycle {
                kind: EntityKind::Measure,
                id: measure.id.clone(),
            }));
        }

        let measure_id = ids.record(EntityKind::Measure, &measure.id);
        let mut copy = measure.clone();
        copy.id = measure_id.clone();
        copy.sheet_id = target.sheet_id.clone();
        copy.owner = target.owner;
        copy.order = target.order;
        if let Some(name) = target.name {
            copy.name = name;
        }
        acc.writes.create(&copy)?;

        let columns = arena.columns_of(&measure.id);
        self.copy_columns(&columns, target.sheet_id, Some(&measure_id), ids, acc)?;

        for (index, row) in arena.rows_of(&measure.id).into_iter().enumerate() {
            let row_id = ids.record(EntityKind::Row, &row.id);
            let rewritten = ReferenceRewriter::new(ids).rewrite(row);
            let mut row_copy = rewritten.record;
            row_copy.id = row_id.clone();
            row_copy.sheet_id = target.sheet_id.clone();
            row_copy.measure_id = measure_id.clone();
            row_copy.order = position(index);
            acc.note_dropped(row, &rewritten.dropped);
            acc.writes.create(&row_copy)?;

            let owner = MeasureOwner::Row(row.id.clone());
            for (sub_index, sub) in arena.measures_of(&owner).into_iter().enumerate() {
                let sub_target = MeasureTarget {
                    sheet_id: target.sheet_id,
                    owner: MeasureOwner::Row(row_id.clone()),
                    order: position(sub_index),
                    name: None,
                };
                self.copy_measure_tree(arena, sub, sub_target, level + 1, ids, visiting, acc)?;
            }
        }
        Ok(measure_id)
    }
}

impl std::fmt::Debug for DeepCopyEngine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepCopyEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct MeasureTarget<'a> {
    sheet_id: &'a EntityId,
    owner: MeasureOwner,
    order: u32,
    name: Option<String>,
}

fn integrity(violation: IntegrityViolation) -> EngineError {
    error!(%violation, "source data failed integrity check");
    EngineError::Integrity(violation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetwork_model::{ColumnType, Row, Scalar, SequentialIds, Sheet, SheetKind};

    fn budget() -> SheetSnapshot {
        SheetSnapshot::new(
            Sheet::new("s1", "p1", "Budget", SheetKind::Budget, 0),
            vec![Column::new("c1", "s1", "Vendor", ColumnType::Text, 0)],
            vec![
                Item::new("A", "s1", 0).with_field("name", "Venue"),
                Item::new("B", "s1", 0).under("A", 1).with_custom("c1", "Hall"),
                Item::new("C", "s1", 1).under("A", 1),
            ],
            vec![],
            vec![],
        )
    }

    fn dest() -> SheetDestination {
        SheetDestination {
            project_id: EntityId::new("p1"),
            order: 1,
            created_at: None,
        }
    }

    fn anywhere() -> ItemDestination {
        ItemDestination {
            sheet_id: EntityId::new("s2"),
            order: 0,
            columns: vec![],
        }
    }

    fn item<'a>(items: &'a [Item], name: &str) -> &'a Item {
        items
            .iter()
            .find(|i| i.fields.get("name") == Some(&Scalar::from(name)))
            .unwrap()
    }

    #[test]
    fn two_level_budget_sheet_keeps_shape() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let mut source = budget();
        source.items = Forest::new(vec![
            Item::new("A", "s1", 0).with_field("name", "A"),
            Item::new("B", "s1", 0).under("A", 1).with_field("name", "B"),
            Item::new("C", "s1", 1).under("A", 1).with_field("name", "C"),
        ]);

        let out = engine.copy_sheet(&source, &dest()).unwrap();
        let items: Vec<Item> = out.writes.created().unwrap();
        assert_eq!(items.len(), 3);

        let (a, b, c) = (item(&items, "A"), item(&items, "B"), item(&items, "C"));
        assert_eq!((a.parent_id.as_ref(), a.depth, a.order), (None, 0, 0));
        assert_eq!((b.parent_id.as_ref(), b.depth, b.order), (Some(&a.id), 1, 0));
        assert_eq!((c.parent_id.as_ref(), c.depth, c.order), (Some(&a.id), 1, 1));
        for copy in &items {
            assert!(!["A", "B", "C"].contains(&copy.id.as_str()));
            assert_eq!(copy.sheet_id, out.root_id);
        }
        assert_eq!(source.items.len(), 3, "source untouched");
    }

    #[test]
    fn sheet_copy_is_renamed_and_remaps_custom_columns() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let out = engine.copy_sheet(&budget(), &dest()).unwrap();

        let sheets: Vec<Sheet> = out.writes.created().unwrap();
        assert_eq!(sheets[0].name, "Budget (copy)");
        assert_eq!(sheets[0].order, 1);

        let columns: Vec<Column> = out.writes.created().unwrap();
        let items: Vec<Item> = out.writes.created().unwrap();
        let child = items.iter().find(|i| i.parent_id.is_some() && i.order == 0).unwrap();
        assert_eq!(
            child.custom_columns.keys().collect::<Vec<_>>(),
            vec![&columns[0].id]
        );
        assert_eq!(out.copied, 5);
        assert_eq!(out.dropped_references, 0);
    }

    #[test]
    fn item_subtree_becomes_root_after_existing_roots() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let source = budget();
        let dest = ItemDestination {
            sheet_id: EntityId::new("s1"),
            order: 1,
            columns: vec![EntityId::new("c1")],
        };

        let out = engine.copy_item_subtree(&source.items, &EntityId::new("B"), &dest).unwrap();
        let items: Vec<Item> = out.writes.created().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].parent_id, None);
        assert_eq!(items[0].depth, 0);
        assert_eq!(items[0].order, 1);
        assert_eq!(items[0].custom_columns[&EntityId::new("c1")], Scalar::from("Hall"));
    }

    #[test]
    fn item_sharing_an_id_with_a_column_gets_a_fresh_id() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let forest = Forest::new(vec![
            Item::new("x", "s1", 0).with_custom("x", 7),
            Item::new("y", "s1", 0).under("x", 1),
        ]);
        let dest = ItemDestination {
            sheet_id: EntityId::new("s1"),
            order: 1,
            columns: vec![EntityId::new("x")],
        };

        let out = engine.copy_item_subtree(&forest, &EntityId::new("x"), &dest).unwrap();
        assert_ne!(out.root_id, EntityId::new("x"));
        let paths: Vec<String> = out.writes.created_paths().iter().map(|p| p.to_string()).collect();
        assert!(!paths.contains(&"sheets/s1/items/x".to_string()));

        let items: Vec<Item> = out.writes.created().unwrap();
        let root = items.iter().find(|i| i.id == out.root_id).unwrap();
        assert_eq!(root.custom_columns[&EntityId::new("x")], Scalar::from(7));
        let child = items.iter().find(|i| i.id != out.root_id).unwrap();
        assert_eq!(child.parent_id.as_ref(), Some(&out.root_id));
    }

    #[test]
    fn sheet_copy_keeps_kinds_apart_when_ids_collide() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let source = SheetSnapshot::new(
            Sheet::new("s1", "p1", "Budget", SheetKind::Budget, 0),
            vec![Column::new("x", "s1", "Vendor", ColumnType::Text, 0)],
            vec![Item::new("x", "s1", 0).with_custom("x", "Hall")],
            vec![],
            vec![],
        );

        let out = engine.copy_sheet(&source, &dest()).unwrap();
        let columns: Vec<Column> = out.writes.created().unwrap();
        let items: Vec<Item> = out.writes.created().unwrap();
        assert_ne!(columns[0].id, items[0].id);
        assert_eq!(
            items[0].custom_columns.keys().collect::<Vec<_>>(),
            vec![&columns[0].id]
        );
    }

    #[test]
    fn rows_and_columns_of_a_missing_measure_fail_the_sheet_copy() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let sheet = || Sheet::new("s1", "p1", "KPIs", SheetKind::Kpi, 0);
        let measure = || Measure::new("m1", "s1", MeasureOwner::Sheet("s1".into()), "Reach", 0);

        let source = SheetSnapshot::new(
            sheet(),
            vec![Column::new("ck", "s1", "Target", ColumnType::Kpi, 0).in_measure("gone")],
            vec![],
            vec![measure()],
            vec![Row::new("r-orphan", "s1", "gone", 0)],
        );
        let err = engine.copy_sheet(&source, &dest()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Integrity(IntegrityViolation::Unreachable { kind: EntityKind::Row, ref ids })
                if ids == &vec![EntityId::new("r-orphan")]
        ));

        let source = SheetSnapshot::new(
            sheet(),
            vec![Column::new("ck", "s1", "Target", ColumnType::Kpi, 0).in_measure("gone")],
            vec![],
            vec![measure()],
            vec![],
        );
        let err = engine.copy_sheet(&source, &dest()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Integrity(IntegrityViolation::Unreachable { kind: EntityKind::Column, .. })
        ));
    }

    #[test]
    fn missing_subtree_root_is_not_found() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let err = engine
            .copy_item_subtree(&budget().items, &EntityId::new("Z"), &anywhere())
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn parent_cycle_is_an_integrity_error() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let forest = Forest::new(vec![
            Item::new("X", "s1", 0).under("Y", 1),
            Item::new("Y", "s1", 0).under("X", 1),
        ]);

        let err = engine
            .copy_item_subtree(&forest, &EntityId::new("X"), &anywhere())
            .unwrap_err();
        assert!(err.is_integrity());

        let mut sheet = budget();
        sheet.items = forest;
        let err = engine.copy_sheet(&sheet, &dest()).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Integrity(IntegrityViolation::Unreachable { ids, .. }) if ids.len() == 2
        ));
    }

    #[test]
    fn chains_deeper_than_cap_fail_fast() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default().with_max_depth(1));
        let forest = Forest::new(vec![
            Item::new("a", "s1", 0),
            Item::new("b", "s1", 0).under("a", 1),
            Item::new("c", "s1", 0).under("b", 2),
        ]);
        let err = engine
            .copy_item_subtree(&forest, &EntityId::new("a"), &anywhere())
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Integrity(IntegrityViolation::DepthExceeded { max_depth: 1, .. })
        ));
    }

    #[test]
    fn measure_copy_recurses_into_row_sub_measures() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let arena = MeasureArena::new(
            vec![
                Measure::new("m1", "s1", MeasureOwner::Sheet("s1".into()), "Reach", 0),
                Measure::new("m2", "s1", MeasureOwner::Row("r1".into()), "Channels", 0),
            ],
            vec![
                Column::new("colA", "s1", "Target", ColumnType::Kpi, 0).in_measure("m1"),
                Column::new("colX", "s1", "Notes", ColumnType::Text, 0).in_measure("m2"),
            ],
            vec![
                Row::new("r1", "s1", "m1", 0).with_value("colA", 5).with_value("colB", "x"),
                Row::new("r2", "s1", "m2", 0).with_value("colX", "ok"),
            ],
        );
        let dest = MeasureDestination {
            sheet_id: EntityId::new("s1"),
            owner: MeasureOwner::Sheet("s1".into()),
            order: 1,
        };

        let out = engine.copy_measure(&arena, &EntityId::new("m1"), &dest).unwrap();
        let measures: Vec<Measure> = out.writes.created().unwrap();
        let rows: Vec<Row> = out.writes.created().unwrap();
        let columns: Vec<Column> = out.writes.created().unwrap();

        assert_eq!(measures.len(), 2);
        assert_eq!(measures[0].name, "Reach (copy)");
        assert_eq!(measures[1].name, "Channels");
        assert_eq!(measures[1].owner, MeasureOwner::Row(rows[0].id.clone()));
        assert_eq!(
            rows[0].values,
            std::collections::BTreeMap::from([(columns[0].id.clone(), Scalar::from(5))])
        );
        assert_eq!(rows[1].values.keys().next(), Some(&columns[1].id));
        assert_eq!(out.dropped_references, 1);
        assert_eq!(out.root_id, measures[0].id);
    }

    #[test]
    fn measure_ownership_cycle_is_detected() {
        let gen = SequentialIds::new("n");
        let engine = DeepCopyEngine::new(&gen, EngineConfig::default());
        let arena = MeasureArena::new(
            vec![Measure::new("m1", "s1", MeasureOwner::Row("r1".into()), "Loop", 0)],
            vec![],
            vec![Row::new("r1", "s1", "m1", 0)],
        );
        let dest = MeasureDestination {
            sheet_id: EntityId::new("s1"),
            owner: MeasureOwner::Sheet("s1".into()),
            order: 0,
        };
        let err = engine.copy_measure(&arena, &EntityId::new("m1"), &dest).unwrap_err();
        assert!(matches!(
            err,
            EngineError::Integrity(IntegrityViolation::Cycle { kind: EntityKind::Measure, .. })
        ));
    }
}
