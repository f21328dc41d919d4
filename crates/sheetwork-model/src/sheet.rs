//! Sheets and hierarchical items

use crate::entity::{Entity, EntityKind, Hierarchical, Ordered};
use crate::id::EntityId;
use crate::path::{CollectionPath, DocPath};
use crate::value::Scalar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a sheet tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SheetKind {
    /// Income/expense ledger
    Budget,
    /// Gantt/time schedule
    Schedule,
    /// KPI tracker
    Kpi,
}

impl SheetKind {
    /// Wire name, as stored in the `kind` field
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Budget => "budget",
            Self::Schedule => "schedule",
            Self::Kpi => "kpi",
        }
    }
}

/// Named container of one kind of tracked data within a project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sheet {
    /// Sheet id
    pub id: EntityId,
    /// Owning project
    pub project_id: EntityId,
    /// Display name
    pub name: String,
    /// Sheet kind
    pub kind: SheetKind,
    /// Position among the project's sheets of the same kind
    pub order: u32,
    /// Creation timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Sheet {
    /// Create a sheet
    #[must_use]
    pub fn new(
        id: impl Into<EntityId>,
        project_id: impl Into<EntityId>,
        name: impl Into<String>,
        kind: SheetKind,
        order: u32,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            kind,
            order,
            created_at: None,
        }
    }

    /// Collection of a project's sheets
    #[inline]
    #[must_use]
    pub fn collection(project_id: &EntityId) -> CollectionPath {
        CollectionPath::root("projects")
            .doc(project_id)
            .sub_collection(EntityKind::Sheet.collection())
    }

    /// Collection of records of `kind` owned by a sheet
    #[inline]
    #[must_use]
    pub fn owned_collection(sheet_id: &EntityId, kind: EntityKind) -> CollectionPath {
        CollectionPath::root(EntityKind::Sheet.collection())
            .doc(sheet_id)
            .sub_collection(kind.collection())
    }
}

impl Entity for Sheet {
    const KIND: EntityKind = EntityKind::Sheet;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn path(&self) -> DocPath {
        Self::collection(&self.project_id).doc(&self.id)
    }
}

impl Ordered for Sheet {
    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

/// Budget line or schedule task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    /// Item id
    pub id: EntityId,
    /// Owning sheet
    pub sheet_id: EntityId,
    /// Parent item (`None` for roots)
    #[serde(default)]
    pub parent_id: Option<EntityId>,
    /// Distance from the root
    #[serde(default)]
    pub depth: u32,
    /// Position among siblings sharing `parent_id`
    pub order: u32,
    /// Kind-specific payload (name, amount, start/end dates, ...)
    #[serde(default)]
    pub fields: BTreeMap<String, Scalar>,
    /// Values of sheet-level custom columns keyed by column id
    #[serde(default)]
    pub custom_columns: BTreeMap<EntityId, Scalar>,
}

impl Item {
    /// Create a root item
    #[must_use]
    pub fn new(id: impl Into<EntityId>, sheet_id: impl Into<EntityId>, order: u32) -> Self {
        Self {
            id: id.into(),
            sheet_id: sheet_id.into(),
            parent_id: None,
            depth: 0,
            order,
            fields: BTreeMap::new(),
            custom_columns: BTreeMap::new(),
        }
    }

    /// Attach under a parent at the given depth
    #[inline]
    #[must_use]
    pub fn under(mut self, parent: impl Into<EntityId>, depth: u32) -> Self {
        self.parent_id = Some(parent.into());
        self.depth = depth;
        self
    }

    /// Set a payload field
    #[inline]
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set a custom-column value
    #[inline]
    #[must_use]
    pub fn with_custom(mut self, column: impl Into<EntityId>, value: impl Into<Scalar>) -> Self {
        self.custom_columns.insert(column.into(), value.into());
        self
    }
}

impl Entity for Item {
    const KIND: EntityKind = EntityKind::Item;

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

impl Ordered for Item {
    fn order(&self) -> u32 {
        self.order
    }

    fn set_order(&mut self, order: u32) {
        self.order = order;
    }
}

impl Hierarchical for Item {
    fn parent_id(&self) -> Option<&EntityId> {
        self.parent_id.as_ref()
    }

    fn set_parent_id(&mut self, parent: Option<EntityId>) {
        self.parent_id = parent;
    }

    fn depth(&self) -> u32 {
        self.depth
    }

    fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
    }

    fn set_container(&mut self, container: EntityId) {
        self.sheet_id = container;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn sheet_path_nests_under_project() {
        let sheet = Sheet::new("s1", "p1", "Budget", SheetKind::Budget, 0);
        assert_eq!(sheet.path().to_string(), "projects/p1/sheets/s1");
    }

    #[test]
    fn item_serializes_with_camel_case_fields() {
        let item = Item::new("i2", "s1", 1)
            .under("i1", 1)
            .with_field("name", "Catering")
            .with_custom("c1", 120);
        let fields = item.to_fields().unwrap();
        assert_eq!(fields["parentId"], "i1");
        assert_eq!(fields["sheetId"], "s1");
        assert_eq!(fields["customColumns"]["c1"], 120.0);
        assert_eq!(Item::from_fields(fields).unwrap(), item);
    }

    #[test]
    fn item_path_lives_under_sheet() {
        let item = Item::new("i1", "s1", 0);
        assert_eq!(item.path().to_string(), "sheets/s1/items/i1");
    }

    #[test]
    fn missing_optional_fields_default() {
        let fields = serde_json::json!({"id": "i1", "sheetId": "s1", "order": 3});
        let serde_json::Value::Object(map) = fields else { unreachable!() };
        let item = Item::from_fields(map).unwrap();
        assert_eq!(item.parent_id, None);
        assert_eq!(item.depth, 0);
        assert!(item.custom_columns.is_empty());
    }
}
