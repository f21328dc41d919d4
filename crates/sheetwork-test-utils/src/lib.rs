//! Testing utilities for the sheetwork workspace
//!
//! Shared fixtures and a store seeding helper.

#![allow(missing_docs)]

use sheetwork_model::{
    Column, ColumnType, Entity, EntityId, Item, Measure, MeasureOwner, ModelError, Row, Sheet,
    SheetKind, WriteSet,
};
use sheetwork_store::{DocumentStore, MemoryStore};
use std::sync::Arc;

pub const PROJECT: &str = "p1";

/// Flat record lists, as a store would hold them
#[derive(Debug, Clone, Default)]
pub struct Fixture {
    pub sheets: Vec<Sheet>,
    pub columns: Vec<Column>,
    pub items: Vec<Item>,
    pub measures: Vec<Measure>,
    pub rows: Vec<Row>,
}

impl Fixture {
    #[must_use]
    pub fn merge(mut self, other: Fixture) -> Self {
        self.sheets.extend(other.sheets);
        self.columns.extend(other.columns);
        self.items.extend(other.items);
        self.measures.extend(other.measures);
        self.rows.extend(other.rows);
        self
    }

    pub fn writes(&self) -> Result<WriteSet, ModelError> {
        let mut writes = WriteSet::new();
        for sheet in &self.sheets {
            writes.create(sheet)?;
        }
        for column in &self.columns {
            writes.create(column)?;
        }
        for item in &self.items {
            writes.create(item)?;
        }
        for measure in &self.measures {
            writes.create(measure)?;
        }
        for row in &self.rows {
            writes.create(row)?;
        }
        Ok(writes)
    }
}

/// Budget sheet `s-budget`: A(0, root), B(0, A), C(1, A), one custom column
pub fn budget_sheet() -> Fixture {
    let s = "s-budget";
    Fixture {
        sheets: vec![Sheet::new(s, PROJECT, "Event budget", SheetKind::Budget, 0)],
        columns: vec![Column::new("c-vendor", s, "Vendor", ColumnType::Text, 0)],
        items: vec![
            Item::new("A", s, 0).with_field("name", "Venue"),
            Item::new("B", s, 0)
                .under("A", 1)
                .with_field("name", "Hall rental")
                .with_field("amount", 1200.0)
                .with_custom("c-vendor", "City Hall"),
            Item::new("C", s, 1)
                .under("A", 1)
                .with_field("name", "Cleaning")
                .with_field("amount", 150.0),
        ],
        ..Fixture::default()
    }
}

/// Second budget sheet `s-budget-2` with a single root item
pub fn second_budget_sheet() -> Fixture {
    let s = "s-budget-2";
    Fixture {
        sheets: vec![Sheet::new(s, PROJECT, "Catering budget", SheetKind::Budget, 1)],
        items: vec![Item::new("D", s, 0).with_field("name", "Menu")],
        ..Fixture::default()
    }
}

/// KPI sheet `s-kpi`
///
/// Measure `m-reach` has a custom and two kpi columns and two rows; row `r-1`
/// owns sub-measure `m-channels` with its own column and row. Measure
/// `m-spend` is a second sheet-level measure.
pub fn kpi_sheet() -> Fixture {
    let s = "s-kpi";
    let sheet_owner = MeasureOwner::Sheet(EntityId::new(s));
    Fixture {
        sheets: vec![Sheet::new(s, PROJECT, "Marketing KPIs", SheetKind::Kpi, 0)],
        columns: vec![
            Column::new("c-owner", s, "Owner", ColumnType::Text, 0).in_measure("m-reach"),
            Column::new("k-target", s, "Target", ColumnType::Kpi, 0).in_measure("m-reach"),
            Column::new("k-actual", s, "Actual", ColumnType::Kpi, 1).in_measure("m-reach"),
            Column::new("c-channel", s, "Channel", ColumnType::Text, 0).in_measure("m-channels"),
        ],
        measures: vec![
            Measure::new("m-reach", s, sheet_owner.clone(), "Reach", 0),
            Measure::new("m-spend", s, sheet_owner, "Spend", 1),
            Measure::new(
                "m-channels",
                s,
                MeasureOwner::Row(EntityId::new("r-1")),
                "Channels",
                0,
            ),
        ],
        rows: vec![
            Row::new("r-1", s, "m-reach", 0)
                .with_value("c-owner", "Ana")
                .with_value("k-target", 1000)
                .with_value("k-actual", 640),
            Row::new("r-2", s, "m-reach", 1).with_value("c-owner", "Ben"),
            Row::new("r-3", s, "m-channels", 0).with_value("c-channel", "Newsletter"),
        ],
        ..Fixture::default()
    }
}

/// Everything above in one project
pub fn project() -> Fixture {
    budget_sheet().merge(second_budget_sheet()).merge(kpi_sheet())
}

/// Store holding `fixture`
pub async fn seed_store(fixture: &Fixture) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    let writes = fixture.writes().unwrap();
    store.commit_batch(writes.as_slice()).await.unwrap();
    store
}

/// Identifier shorthand
pub fn id(raw: &str) -> EntityId {
    EntityId::new(raw)
}

/// Whether `entity` is stored
pub async fn exists<E: Entity>(store: &MemoryStore, entity: &E) -> bool {
    matches!(store.get(&entity.path()).await, Ok(Some(_)))
}
