//! In-memory snapshots the engines compute from
//!
//! Records are held arena-style: identifier-indexed maps plus child indices,
//! never nested containers. A snapshot is taken once per operation; engines
//! never read live store state mid-algorithm.

use indexmap::IndexMap;
use sheetwork_model::{
    Column, ColumnGroup, EntityId, Hierarchical, Item, Measure, MeasureOwner, Ordered, Row, Sheet,
};
use std::collections::HashMap;

fn by_position<T: Ordered>(a: &&T, b: &&T) -> std::cmp::Ordering {
    a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id()))
}

/// Forest of hierarchical records scoped to one container
#[derive(Debug, Clone)]
pub struct Forest<T: Hierarchical> {
    nodes: IndexMap<EntityId, T>,
    children: HashMap<EntityId, Vec<EntityId>>,
}

impl<T: Hierarchical> Forest<T> {
    /// Build from records in any order
    #[must_use]
    pub fn new(records: impl IntoIterator<Item = T>) -> Self {
        let nodes: IndexMap<EntityId, T> = records
            .into_iter()
            .map(|r| (r.id().clone(), r))
            .collect();

        let mut grouped: HashMap<EntityId, Vec<&T>> = HashMap::new();
        for node in nodes.values() {
            if let Some(parent) = node.parent_id() {
                grouped.entry(parent.clone()).or_default().push(node);
            }
        }
        let children = grouped
            .into_iter()
            .map(|(parent, mut kids)| {
                kids.sort_by(by_position);
                (parent, kids.into_iter().map(|k| k.id().clone()).collect())
            })
            .collect();

        Self { nodes, children }
    }

    /// Record by id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&T> {
        self.nodes.get(id)
    }

    /// Check membership
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of records
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All records, insertion order
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.nodes.values()
    }

    /// Child ids of `id`, sorted by order
    #[inline]
    #[must_use]
    pub fn children_of(&self, id: &EntityId) -> &[EntityId] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Whether `node`'s parent link points outside the forest
    #[inline]
    #[must_use]
    pub fn is_orphan(&self, node: &T) -> bool {
        node.parent_id().is_some_and(|p| !self.nodes.contains_key(p))
    }

    /// Roots in traversal order
    ///
    /// Records with no parent come first, then orphans whose parent is missing
    /// from the forest; each group is sorted by stored depth, then order, then
    /// id.
    #[must_use]
    pub fn roots(&self) -> Vec<&T> {
        let mut roots: Vec<&T> = self
            .nodes
            .values()
            .filter(|n| n.parent_id().is_none() || self.is_orphan(n))
            .collect();
        roots.sort_by(|a, b| {
            self.is_orphan(a)
                .cmp(&self.is_orphan(b))
                .then_with(|| a.depth().cmp(&b.depth()))
                .then_with(|| by_position(a, b))
        });
        roots
    }

    /// Records sharing `parent`, sorted by order
    #[must_use]
    pub fn siblings(&self, parent: Option<&EntityId>) -> Vec<&T> {
        match parent {
            Some(p) => self
                .children_of(p)
                .iter()
                .filter_map(|id| self.nodes.get(id))
                .collect(),
            None => {
                let mut top: Vec<&T> = self
                    .nodes
                    .values()
                    .filter(|n| n.parent_id().is_none())
                    .collect();
                top.sort_by(by_position);
                top
            }
        }
    }
}

/// KPI records of one sheet, indexed by owner
#[derive(Debug, Clone, Default)]
pub struct MeasureArena {
    measures: IndexMap<EntityId, Measure>,
    columns: IndexMap<EntityId, Column>,
    rows: IndexMap<EntityId, Row>,
    by_owner: HashMap<MeasureOwner, Vec<EntityId>>,
    columns_by_measure: HashMap<EntityId, Vec<EntityId>>,
    rows_by_measure: HashMap<EntityId, Vec<EntityId>>,
}

impl MeasureArena {
    /// Build from flat record lists
    ///
    /// Columns without a measure are ignored here; they belong to the sheet.
    #[must_use]
    pub fn new(
        measures: impl IntoIterator<Item = Measure>,
        columns: impl IntoIterator<Item = Column>,
        rows: impl IntoIterator<Item = Row>,
    ) -> Self {
        let measures: IndexMap<_, _> = measures.into_iter().map(|m| (m.id.clone(), m)).collect();
        let columns: IndexMap<_, _> = columns
            .into_iter()
            .filter(|c| c.measure_id.is_some())
            .map(|c| (c.id.clone(), c))
            .collect();
        let rows: IndexMap<_, _> = rows.into_iter().map(|r| (r.id.clone(), r)).collect();

        let mut by_owner: HashMap<MeasureOwner, Vec<&Measure>> = HashMap::new();
        for m in measures.values() {
            by_owner.entry(m.owner.clone()).or_default().push(m);
        }
        let by_owner = by_owner
            .into_iter()
            .map(|(owner, mut list)| {
                list.sort_by(by_position);
                (owner, list.into_iter().map(|m| m.id.clone()).collect())
            })
            .collect();

        let mut cols: HashMap<EntityId, Vec<&Column>> = HashMap::new();
        for c in columns.values() {
            if let Some(m) = &c.measure_id {
                cols.entry(m.clone()).or_default().push(c);
            }
        }
        let columns_by_measure = cols
            .into_iter()
            .map(|(m, mut list)| {
                list.sort_by(|a, b| a.group().cmp(&b.group()).then_with(|| by_position(a, b)));
                (m, list.into_iter().map(|c| c.id.clone()).collect())
            })
            .collect();

        let mut row_index: HashMap<EntityId, Vec<&Row>> = HashMap::new();
        for r in rows.values() {
            row_index.entry(r.measure_id.clone()).or_default().push(r);
        }
        let rows_by_measure = row_index
            .into_iter()
            .map(|(m, mut list)| {
                list.sort_by(by_position);
                (m, list.into_iter().map(|r| r.id.clone()).collect())
            })
            .collect();

        Self {
            measures,
            columns,
            rows,
            by_owner,
            columns_by_measure,
            rows_by_measure,
        }
    }

    /// Measure by id
    #[inline]
    #[must_use]
    pub fn measure(&self, id: &EntityId) -> Option<&Measure> {
        self.measures.get(id)
    }

    /// Column by id
    #[inline]
    #[must_use]
    pub fn column(&self, id: &EntityId) -> Option<&Column> {
        self.columns.get(id)
    }

    /// Row by id
    #[inline]
    #[must_use]
    pub fn row(&self, id: &EntityId) -> Option<&Row> {
        self.rows.get(id)
    }

    /// All measures
    #[inline]
    pub fn measures(&self) -> impl Iterator<Item = &Measure> {
        self.measures.values()
    }

    /// All measure columns
    #[inline]
    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.values()
    }

    /// All rows
    #[inline]
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    /// Rows and columns whose measure is not in the arena
    #[must_use]
    pub fn detached(&self) -> (Vec<&Row>, Vec<&Column>) {
        let rows = self
            .rows
            .values()
            .filter(|r| !self.measures.contains_key(&r.measure_id))
            .collect();
        let columns = self
            .columns
            .values()
            .filter(|c| c.measure_id.as_ref().is_some_and(|m| !self.measures.contains_key(m)))
            .collect();
        (rows, columns)
    }

    /// Measures of `owner`, sorted by order
    #[must_use]
    pub fn measures_of(&self, owner: &MeasureOwner) -> Vec<&Measure> {
        self.by_owner
            .get(owner)
            .map(|ids| ids.iter().filter_map(|id| self.measures.get(id)).collect())
            .unwrap_or_default()
    }

    /// Columns of a measure, custom group first, each group by order
    #[must_use]
    pub fn columns_of(&self, measure: &EntityId) -> Vec<&Column> {
        self.columns_by_measure
            .get(measure)
            .map(|ids| ids.iter().filter_map(|id| self.columns.get(id)).collect())
            .unwrap_or_default()
    }

    /// Columns of a measure in one group, by order
    #[must_use]
    pub fn columns_in_group(&self, measure: &EntityId, group: ColumnGroup) -> Vec<&Column> {
        self.columns_of(measure)
            .into_iter()
            .filter(|c| c.group() == group)
            .collect()
    }

    /// Rows of a measure, by order
    #[must_use]
    pub fn rows_of(&self, measure: &EntityId) -> Vec<&Row> {
        self.rows_by_measure
            .get(measure)
            .map(|ids| ids.iter().filter_map(|id| self.rows.get(id)).collect())
            .unwrap_or_default()
    }

    /// Whether `owner` exists (sheet owners always do)
    #[inline]
    #[must_use]
    pub fn owner_exists(&self, owner: &MeasureOwner) -> bool {
        match owner {
            MeasureOwner::Sheet(_) => true,
            MeasureOwner::Row(row) => self.rows.contains_key(row),
        }
    }

    /// Number of measures
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.measures.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.measures.is_empty()
    }
}

/// Everything a sheet owns, captured at one point in time
#[derive(Debug, Clone)]
pub struct SheetSnapshot {
    /// The sheet itself
    pub sheet: Sheet,
    /// Sheet-level custom columns, by group then order
    pub columns: Vec<Column>,
    /// Items (budget lines / schedule tasks)
    pub items: Forest<Item>,
    /// KPI measures, their columns and rows
    pub kpi: MeasureArena,
}

impl SheetSnapshot {
    /// Assemble from flat record lists as returned by the store
    #[must_use]
    pub fn new(
        sheet: Sheet,
        columns: Vec<Column>,
        items: Vec<Item>,
        measures: Vec<Measure>,
        rows: Vec<Row>,
    ) -> Self {
        let (mut sheet_columns, measure_columns): (Vec<Column>, Vec<Column>) =
            columns.into_iter().partition(|c| c.measure_id.is_none());
        sheet_columns.sort_by(|a, b| {
            a.group()
                .cmp(&b.group())
                .then_with(|| by_position(&a, &b))
        });
        Self {
            sheet,
            columns: sheet_columns,
            items: Forest::new(items),
            kpi: MeasureArena::new(measures, measure_columns, rows),
        }
    }

    /// Sheet-level columns in one group, by order
    #[must_use]
    pub fn columns_in_group(&self, group: ColumnGroup) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.group() == group).collect()
    }

    /// Total number of owned records
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.columns.len()
            + self.items.len()
            + self.kpi.measures.len()
            + self.kpi.columns.len()
            + self.kpi.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetwork_model::ColumnType;

    fn ids<T: Ordered>(records: &[&T]) -> Vec<String> {
        records.iter().map(|r| r.id().to_string()).collect()
    }

    #[test]
    fn forest_sorts_children_by_order() {
        let forest = Forest::new(vec![
            Item::new("c", "s", 1).under("a", 1),
            Item::new("a", "s", 0),
            Item::new("b", "s", 0).under("a", 1),
        ]);
        assert_eq!(forest.children_of(&EntityId::new("a")), &[EntityId::new("b"), EntityId::new("c")]);
        assert_eq!(ids(&forest.roots()), vec!["a"]);
    }

    #[test]
    fn orphans_are_roots_after_real_roots() {
        let forest = Forest::new(vec![
            Item::new("o", "s", 0).under("gone", 2),
            Item::new("r2", "s", 1),
            Item::new("r1", "s", 0),
        ]);
        assert_eq!(ids(&forest.roots()), vec!["r1", "r2", "o"]);
        assert!(forest.is_orphan(forest.get(&EntityId::new("o")).unwrap()));
    }

    #[test]
    fn siblings_of_root_level_exclude_orphans() {
        let forest = Forest::new(vec![
            Item::new("o", "s", 0).under("gone", 1),
            Item::new("r1", "s", 0),
        ]);
        assert_eq!(ids(&forest.siblings(None)), vec!["r1"]);
    }

    #[test]
    fn arena_indexes_columns_by_group_then_order() {
        let arena = MeasureArena::new(
            vec![Measure::new("m", "s", MeasureOwner::Sheet("s".into()), "M", 0)],
            vec![
                Column::new("k1", "s", "K1", ColumnType::Kpi, 0).in_measure("m"),
                Column::new("c2", "s", "C2", ColumnType::Text, 1).in_measure("m"),
                Column::new("c1", "s", "C1", ColumnType::Number, 0).in_measure("m"),
            ],
            vec![],
        );
        let m = EntityId::new("m");
        assert_eq!(ids(&arena.columns_of(&m)), vec!["c1", "c2", "k1"]);
        assert_eq!(ids(&arena.columns_in_group(&m, ColumnGroup::Kpi)), vec!["k1"]);
    }

    #[test]
    fn detached_finds_rows_and_columns_of_missing_measures() {
        let arena = MeasureArena::new(
            vec![Measure::new("m", "s", MeasureOwner::Sheet("s".into()), "M", 0)],
            vec![
                Column::new("ok", "s", "Ok", ColumnType::Kpi, 0).in_measure("m"),
                Column::new("lost", "s", "Lost", ColumnType::Kpi, 0).in_measure("gone"),
            ],
            vec![Row::new("r1", "s", "m", 0), Row::new("r2", "s", "gone", 0)],
        );
        let (rows, columns) = arena.detached();
        assert_eq!(ids(&rows), vec!["r2"]);
        assert_eq!(ids(&columns), vec!["lost"]);
        assert_eq!(arena.rows().count(), 2);
        assert_eq!(arena.columns().count(), 2);
    }

    #[test]
    fn snapshot_splits_sheet_and_measure_columns() {
        let snap = SheetSnapshot::new(
            Sheet::new("s", "p", "KPIs", sheetwork_model::SheetKind::Kpi, 0),
            vec![
                Column::new("sc", "s", "Owner", ColumnType::Text, 0),
                Column::new("mc", "s", "Target", ColumnType::Kpi, 0).in_measure("m"),
            ],
            vec![],
            vec![Measure::new("m", "s", MeasureOwner::Sheet("s".into()), "M", 0)],
            vec![],
        );
        assert_eq!(snap.columns.len(), 1);
        assert!(snap.kpi.column(&EntityId::new("mc")).is_some());
        assert_eq!(snap.record_count(), 3);
    }
}
