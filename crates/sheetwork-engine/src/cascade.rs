//! Cascading deletes
//!
//! Deleting an owner deletes everything it owns in the same batch, and the
//! surviving siblings are re-densified so orders stay contiguous.

use crate::error::{EngineError, IntegrityViolation};
use crate::reorder::{partition_columns, ReorderEngine};
use crate::rewrite::drop_keys_patch;
use crate::snapshot::{Forest, MeasureArena, SheetSnapshot};
use sheetwork_model::{
    Entity, EntityId, EntityKind, Hierarchical, Item, Measure, MeasureOwner, Sheet, WriteSet,
};
use std::collections::HashSet;
use tracing::debug;

/// Ids of `root` and all its descendants, breadth-first
///
/// # Errors
/// Returns [`EngineError::NotFound`] if `root` is absent, or
/// [`EngineError::Integrity`] if the parent links loop back
pub fn subtree<T: Hierarchical>(forest: &Forest<T>, root: &EntityId) -> Result<Vec<EntityId>, EngineError> {
    if !forest.contains(root) {
        return Err(EngineError::not_found(T::KIND, root));
    }
    let mut seen = HashSet::new();
    let mut out = vec![root.clone()];
    seen.insert(root.clone());
    let mut cursor = 0;
    while let Some(id) = out.get(cursor).cloned() {
        for child in forest.children_of(&id) {
            if !seen.insert(child.clone()) {
                return Err(IntegrityViolation::Cycle {
                    kind: T::KIND,
                    id: child.clone(),
                }
                .into());
            }
            out.push(child.clone());
        }
        cursor += 1;
    }
    Ok(out)
}

/// Delete an item with its descendants; re-densify its former siblings
///
/// # Errors
/// Returns [`EngineError::NotFound`] if `id` is absent
pub fn delete_item(forest: &Forest<Item>, id: &EntityId) -> Result<WriteSet, EngineError> {
    let doomed = subtree(forest, id)?;
    let mut writes = WriteSet::new();
    for item in doomed.iter().filter_map(|d| forest.get(d)) {
        writes.delete(item.path());
    }

    let parent = forest.get(id).and_then(|i| i.parent_id.as_ref());
    let survivors: Vec<&Item> = forest
        .siblings(parent)
        .into_iter()
        .filter(|s| &s.id != id)
        .collect();
    writes.extend(ReorderEngine::normalize(&survivors).writes);
    debug!(%id, deleted = doomed.len(), writes = writes.len(), "item delete computed");
    Ok(writes)
}

/// Delete a measure with its columns, rows and nested sub-measures;
/// re-densify the owner's remaining measures
///
/// # Errors
/// Returns [`EngineError::NotFound`] if `id` is absent, or
/// [`EngineError::Integrity`] on an ownership cycle
pub fn delete_measure(arena: &MeasureArena, id: &EntityId) -> Result<WriteSet, EngineError> {
    let measure = arena
        .measure(id)
        .ok_or_else(|| EngineError::not_found(EntityKind::Measure, id))?;
    let mut writes = WriteSet::new();
    let mut seen = HashSet::new();
    delete_measure_tree(arena, measure, &mut seen, &mut writes)?;

    let survivors: Vec<&Measure> = arena
        .measures_of(&measure.owner)
        .into_iter()
        .filter(|m| &m.id != id)
        .collect();
    writes.extend(ReorderEngine::normalize(&survivors).writes);
    debug!(%id, writes = writes.len(), "measure delete computed");
    Ok(writes)
}

fn delete_measure_tree(
    arena: &MeasureArena,
    measure: &Measure,
    seen: &mut HashSet<EntityId>,
    writes: &mut WriteSet,
) -> Result<(), EngineError> {
    if !seen.insert(measure.id.clone()) {
        return Err(IntegrityViolation::Cycle {
            kind: EntityKind::Measure,
            id: measure.id.clone(),
        }
        .into());
    }
    writes.delete(measure.path());
    for column in arena.columns_of(&measure.id) {
        writes.delete(column.path());
    }
    for row in arena.rows_of(&measure.id) {
        writes.delete(row.path());
        for sub in arena.measures_of(&MeasureOwner::Row(row.id.clone())) {
            delete_measure_tree(arena, sub, seen, writes)?;
        }
    }
    Ok(())
}

/// Delete a sheet and everything it owns; re-densify the remaining sheets
///
/// `siblings` are the project's sheets of the same kind, the deleted one
/// included or not.
#[must_use]
pub fn delete_sheet(snapshot: &SheetSnapshot, siblings: &[&Sheet]) -> WriteSet {
    let mut writes = WriteSet::new();
    for item in snapshot.items.iter() {
        writes.delete(item.path());
    }
    for column in &snapshot.columns {
        writes.delete(column.path());
    }
    // Walk the arena flat so rows and columns of a missing measure go too.
    for measure in snapshot.kpi.measures() {
        writes.delete(measure.path());
    }
    for column in snapshot.kpi.columns() {
        writes.delete(column.path());
    }
    for row in snapshot.kpi.rows() {
        writes.delete(row.path());
    }
    writes.delete(snapshot.sheet.path());

    let survivors: Vec<&Sheet> = siblings
        .iter()
        .copied()
        .filter(|s| s.id != snapshot.sheet.id)
        .collect();
    writes.extend(ReorderEngine::normalize(&survivors).writes);
    debug!(sheet = %snapshot.sheet.id, writes = writes.len(), "sheet delete computed");
    writes
}

/// Remove a column, clear its key from every record referencing it, and
/// re-densify the rest of its type group
///
/// Sheet columns are referenced by item `customColumns`; measure columns by
/// the measure's row `values`. Keys are cleared with the field-delete
/// sentinel.
///
/// # Errors
/// Returns [`EngineError::NotFound`] if the column is absent
pub fn remove_column(snapshot: &SheetSnapshot, id: &EntityId) -> Result<WriteSet, EngineError> {
    let mut writes = WriteSet::new();
    let survivors = if let Some(column) = snapshot.columns.iter().find(|c| &c.id == id) {
        writes.delete(column.path());
        for item in snapshot.items.iter().filter(|i| i.custom_columns.contains_key(id)) {
            writes.update(item.path(), drop_keys_patch("customColumns", [id]));
        }
        let group: Vec<_> = snapshot.columns_in_group(column.group());
        group.into_iter().filter(|c| &c.id != id).collect::<Vec<_>>()
    } else if let Some(column) = snapshot.kpi.column(id) {
        writes.delete(column.path());
        let measure = column.measure_id.as_ref().unwrap_or(&column.sheet_id);
        for row in snapshot.kpi.rows_of(measure).into_iter().filter(|r| r.values.contains_key(id)) {
            writes.update(row.path(), drop_keys_patch("values", [id]));
        }
        let all = snapshot.kpi.columns_of(measure);
        partition_columns(&all, column.group())
            .into_iter()
            .filter(|c| &c.id != id)
            .collect()
    } else {
        return Err(EngineError::not_found(EntityKind::Column, id));
    };

    writes.extend(ReorderEngine::normalize(&survivors).writes);
    debug!(%id, writes = writes.len(), "column removal computed");
    Ok(writes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetwork_model::{Column, ColumnType, Row, SheetKind, WriteOp};

    fn paths(writes: &WriteSet) -> Vec<String> {
        writes.iter().map(|w| w.path.to_string()).collect()
    }

    fn kpi_sheet() -> SheetSnapshot {
        SheetSnapshot::new(
            Sheet::new("s1", "p1", "KPIs", SheetKind::Kpi, 0),
            vec![
                Column::new("k1", "s1", "Target", ColumnType::Kpi, 0).in_measure("m1"),
                Column::new("k2", "s1", "Actual", ColumnType::Kpi, 1).in_measure("m1"),
                Column::new("t1", "s1", "Owner", ColumnType::Text, 0).in_measure("m1"),
            ],
            vec![],
            vec![
                Measure::new("m1", "s1", MeasureOwner::Sheet("s1".into()), "Reach", 0),
                Measure::new("m2", "s1", MeasureOwner::Row("r1".into()), "Sub", 0),
                Measure::new("m3", "s1", MeasureOwner::Sheet("s1".into()), "Spend", 1),
            ],
            vec![
                Row::new("r1", "s1", "m1", 0).with_value("k1", 10).with_value("t1", "Ana"),
                Row::new("r2", "s1", "m1", 1).with_value("t1", "Ben"),
            ],
        )
    }

    #[test]
    fn item_delete_takes_subtree_and_compacts_siblings() {
        let forest = Forest::new(vec![
            Item::new("a", "s1", 0),
            Item::new("b", "s1", 1),
            Item::new("b1", "s1", 0).under("b", 1),
            Item::new("c", "s1", 2),
        ]);
        let writes = delete_item(&forest, &EntityId::new("b")).unwrap();
        assert_eq!(
            paths(&writes),
            vec!["sheets/s1/items/b", "sheets/s1/items/b1", "sheets/s1/items/c"]
        );
        assert!(matches!(writes.as_slice()[2].op, WriteOp::Update(_)));
    }

    #[test]
    fn measure_delete_cascades_into_sub_measures() {
        let snap = kpi_sheet();
        let writes = delete_measure(&snap.kpi, &EntityId::new("m1")).unwrap();
        let p = paths(&writes);
        for expected in [
            "sheets/s1/measures/m1",
            "sheets/s1/columns/k1",
            "sheets/s1/rows/r1",
            "sheets/s1/measures/m2",
            "sheets/s1/rows/r2",
        ] {
            assert!(p.contains(&expected.to_string()), "{expected} missing");
        }
        assert_eq!(p.last().map(String::as_str), Some("sheets/s1/measures/m3"));
    }

    #[test]
    fn removing_a_column_clears_row_values_with_delete_sentinel() {
        let snap = kpi_sheet();
        let writes = remove_column(&snap, &EntityId::new("k1")).unwrap();
        assert_eq!(
            paths(&writes),
            vec!["sheets/s1/columns/k1", "sheets/s1/rows/r1", "sheets/s1/columns/k2"]
        );
        let WriteOp::Update(patch) = &writes.as_slice()[1].op else {
            panic!("expected update");
        };
        assert_eq!(patch.entries().next().unwrap().0.to_string(), "values.k1");
    }

    #[test]
    fn sheet_delete_removes_owned_records_and_compacts_siblings() {
        let snap = kpi_sheet();
        let other = Sheet::new("s2", "p1", "Other", SheetKind::Kpi, 1);
        let writes = delete_sheet(&snap, &[&snap.sheet, &other]);
        let p = paths(&writes);
        assert!(p.contains(&"projects/p1/sheets/s1".to_string()));
        assert!(p.contains(&"sheets/s1/rows/r2".to_string()));
        assert_eq!(p.last().map(String::as_str), Some("projects/p1/sheets/s2"));
        assert_eq!(writes.len(), 3 + 3 + 2 + 1 + 1);
    }

    #[test]
    fn sheet_delete_takes_rows_and_columns_of_a_missing_measure() {
        let snap = SheetSnapshot::new(
            Sheet::new("s1", "p1", "KPIs", SheetKind::Kpi, 0),
            vec![Column::new("ck", "s1", "Target", ColumnType::Kpi, 0).in_measure("gone")],
            vec![],
            vec![Measure::new("m1", "s1", MeasureOwner::Sheet("s1".into()), "Reach", 0)],
            vec![Row::new("r-orphan", "s1", "gone", 0)],
        );
        let p = paths(&delete_sheet(&snap, &[&snap.sheet]));
        assert_eq!(
            p,
            vec![
                "sheets/s1/measures/m1",
                "sheets/s1/columns/ck",
                "sheets/s1/rows/r-orphan",
                "projects/p1/sheets/s1",
            ]
        );
    }

    #[test]
    fn unknown_column_is_not_found() {
        assert!(remove_column(&kpi_sheet(), &EntityId::new("nope"))
            .unwrap_err()
            .is_not_found());
    }
}
