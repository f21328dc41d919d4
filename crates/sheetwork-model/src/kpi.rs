//! KPI measures, columns and rows
//!
//! A measure owns typed columns and rows; a row owns nested sub-measures.
//! All records of a KPI sheet live in flat per-sheet collections and point at
//! their owner by id, so the recursive tree is addressed arena-style.

use crate::entity::{Entity, EntityKind, Ordered};
use crate::id::EntityId;
use crate::path::DocPath;
use crate::sheet::Sheet;
use crate::value::Scalar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Owner of a measure
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum MeasureOwner {
    /// Top-level measure of a KPI sheet
    Sheet(EntityId),
    /// Sub-measure nested in a row
    Row(EntityId),
}

impl MeasureOwner {
    /// Owner id regardless of kind
    #[inline]
    #[must_use]
    pub fn id(&self) -> &EntityId {
        match self {
            Self::Sheet(id) | Self::Row(id) => id,
        }
    }
}

/// KPI initiative table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// Measure id
    pub id: EntityId,
    /// Sheet holding the measure's records
    pub sheet_id: EntityId,
    /// Owning sheet or row
    pub owner: MeasureOwner,
    /// Display name
    pub name: String,
    /// Position among measures of the same owner
    pub order: u32,
    /// Free-form payload (target, unit, ...)
    #[serde(default)]
    pub fields: BTreeMap<String, Scalar>,
}

impl Measure {
    /// Create a measure
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        sheet_id: impl Into<EntityId>,
        owner: MeasureOwner,
        name: impl Into<String>,
        order: u32,
    ) -> Self {
        Self {
            id: id.into(),
            sheet_id: sheet_id.into(),
            owner,
            name: name.into(),
            order,
            fields: BTreeMap::new(),
        }
    }
}

impl Entity for Measure {
    const KIND: EntityKind = EntityKind::Measure;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn path(&self) -> DocPath {
        Sheet::owned_collection(&self.sheet_id, Self::KIND).doc(&self.id)
    }
}

impl Ordered for Measure {
    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// Column data type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Free text
    Text,
    /// Number
    Number,
    /// ISO date
    Date,
    /// Image reference
    Image,
    /// KPI indicator
    Kpi,
}

impl ColumnType {
    /// Ordering partition of this type
    #[inline]
    #[must_use]
    pub fn group(self) -> ColumnGroup {
        match self {
            Self::Kpi => ColumnGroup::Kpi,
            Self::Text | Self::Number | Self::Date | Self::Image => ColumnGroup::Custom,
        }
    }
}

/// Ordering partition of columns
///
/// Each group has its own contiguous order space; columns never move across
/// groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ColumnGroup {
    /// Non-KPI columns
    Custom,
    /// KPI columns
    Kpi,
}

/// Typed column definition
///
/// Sheet-level columns (`measure_id == None`) back items' custom columns;
/// measure columns back row value maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    /// Column id
    pub id: EntityId,
    /// Sheet holding the column
    pub sheet_id: EntityId,
    /// Owning measure, if any
    #[serde(default)]
    pub measure_id: Option<EntityId>,
    /// Header label
    pub name: String,
    /// Data type
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    /// Position within its group
    pub order: u32,
}

impl Column {
    /// Create a sheet-level column
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        sheet_id: impl Into<EntityId>,
        name: impl Into<String>,
        column_type: ColumnType,
        order: u32,
    ) -> Self {
        Self {
            id: id.into(),
            sheet_id: sheet_id.into(),
            measure_id: None,
            name: name.into(),
            column_type,
            order,
        }
    }

    /// Attach to a measure
    #[inline]
    #[must_use]
    pub fn in_measure(mut self, measure: impl Into<EntityId>) -> Self {
        self.measure_id = Some(measure.into());
        self
    }

    /// Ordering partition
    #[inline]
    #[must_use]
    pub fn group(&self) -> ColumnGroup {
        self.column_type.group()
    }
}

impl Entity for Column {
    const KIND: EntityKind = EntityKind::Column;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn path(&self) -> DocPath {
        Sheet::owned_collection(&self.sheet_id, Self::KIND).doc(&self.id)
    }
}

impl Ordered for Column {
    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// Measure row holding a value per column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    /// Row id
    pub id: EntityId,
    /// Sheet holding the row
    pub sheet_id: EntityId,
    /// Owning measure
    pub measure_id: EntityId,
    /// Position within the measure
    pub order: u32,
    /// Cell values keyed by column id
    #[serde(default)]
    pub values: BTreeMap<EntityId, Scalar>,
}

impl Row {
    /// Create an empty row
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        sheet_id: impl Into<EntityId>,
        measure_id: impl Into<EntityId>,
        order: u32,
    ) -> Self {
        Self {
            id: id.into(),
            sheet_id: sheet_id.into(),
            measure_id: measure_id.into(),
            order,
            values: BTreeMap::new(),
        }
    }

    /// Set a cell value
    #[inline]
    #[must_use]
    pub fn with_value(mut self, column: impl Into<EntityId>, value: impl Into<Scalar>) -> Self {
        self.values.insert(column.into(), value.into());
        self
    }
}

impl Entity for Row {
    const KIND: EntityKind = EntityKind::Row;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn path(&self) -> DocPath {
        Sheet::owned_collection(&self.sheet_id, Self::KIND).doc(&self.id)
    }
}

impl Ordered for Row {
    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}
