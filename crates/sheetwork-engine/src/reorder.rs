//! Sibling reordering
//!
//! Orders are dense and 0-based within a sibling list. A move swaps a record
//! with its neighbour and rewrites the order of every sibling, so whatever
//! state the list was in, the committed result is contiguous.

use crate::error::EngineError;
use crate::position;
use serde::{Deserialize, Serialize};
use sheetwork_model::{Column, ColumnGroup, EntityId, EntityKind, FieldPatch, FieldPath, Ordered, WriteSet};
use std::fmt;
use tracing::{debug, warn};

/// Move direction within a sibling list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Towards index 0
    Up,
    /// Towards the end
    Down,
}

impl Direction {
    /// Opposite direction
    #[inline]
    #[must_use]
    pub fn reverse(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Up => "up",
            Self::Down => "down",
        })
    }
}

/// Computed reorder: the writes plus the resulting list
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan<E> {
    /// Order updates to commit
    pub writes: WriteSet,
    /// Siblings in their new order, `order` fields already reassigned
    pub reordered: Vec<E>,
}

impl<E> MovePlan<E> {
    /// Whether nothing needs to be written
    #[inline]
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Reorder engine
#[derive(Debug, Clone, Copy, Default)]
pub struct ReorderEngine;

impl ReorderEngine {
    /// Move `id` one step within `siblings`
    ///
    /// `siblings` may arrive in any order; they are sorted by stored order,
    /// then id. A move past either end is a no-op with an empty write set.
    /// Otherwise every sibling receives an order update, gapped or duplicated
    /// orders included.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if `id` is not among `siblings`
    pub fn move_one_step<E: Ordered>(
        siblings: &[&E],
        id: &EntityId,
        direction: Direction,
    ) -> Result<MovePlan<E>, EngineError> {
        let mut list = sorted(siblings);
        let index = list
            .iter()
            .position(|s| s.id() == id)
            .ok_or_else(|| EngineError::not_found(E::KIND, id))?;

        let neighbour = match direction {
            Direction::Up => index.checked_sub(1),
            Direction::Down => Some(index + 1).filter(|n| *n < list.len()),
        };
        let Some(neighbour) = neighbour else {
            warn!(kind = %E::KIND, %id, %direction, "move past boundary ignored");
            return Ok(MovePlan {
                writes: WriteSet::new(),
                reordered: list,
            });
        };

        list.swap(index, neighbour);
        let mut writes = WriteSet::new();
        for (i, sibling) in list.iter_mut().enumerate() {
            sibling.set_order(position(i));
            writes.update(sibling.path(), order_patch(sibling.order()));
        }
        debug!(kind = %E::KIND, %id, %direction, writes = writes.len(), "move computed");
        Ok(MovePlan {
            writes,
            reordered: list,
        })
    }

    /// Re-densify `siblings` to `0..n`
    ///
    /// Emits updates only for records whose stored order changes.
    #[must_use]
    pub fn normalize<E: Ordered>(siblings: &[&E]) -> MovePlan<E> {
        let mut list = sorted(siblings);
        let mut writes = WriteSet::new();
        for (i, sibling) in list.iter_mut().enumerate() {
            let order = position(i);
            if sibling.order() != order {
                sibling.set_order(order);
                writes.update(sibling.path(), order_patch(order));
            }
        }
        MovePlan {
            writes,
            reordered: list,
        }
    }

    /// Move a column one step within its type group
    ///
    /// `columns` may mix groups; only the moved column's group is touched.
    ///
    /// # Errors
    /// Returns [`EngineError::NotFound`] if `id` is not among `columns`
    pub fn move_column(
        columns: &[&Column],
        id: &EntityId,
        direction: Direction,
    ) -> Result<MovePlan<Column>, EngineError> {
        let group = columns
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.group())
            .ok_or_else(|| EngineError::not_found(EntityKind::Column, id))?;
        Self::move_one_step(&partition_columns(columns, group), id, direction)
    }
}

/// Columns of one type group
#[must_use]
pub fn partition_columns<'a>(columns: &[&'a Column], group: ColumnGroup) -> Vec<&'a Column> {
    columns.iter().copied().filter(|c| c.group() == group).collect()
}

/// Patch setting the `order` field
#[inline]
#[must_use]
pub fn order_patch(order: u32) -> FieldPatch {
    FieldPatch::new().set(FieldPath::field("order"), order)
}

fn sorted<E: Ordered>(siblings: &[&E]) -> Vec<E> {
    let mut list: Vec<E> = siblings.iter().map(|s| (*s).clone()).collect();
    list.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id())));
    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetwork_model::{ColumnType, Item, WriteOp};

    fn items(orders: &[(&str, u32)]) -> Vec<Item> {
        orders.iter().map(|(id, o)| Item::new(*id, "s1", *o)).collect()
    }

    fn ids<E: Ordered>(list: &[E]) -> Vec<&str> {
        list.iter().map(|e| e.id().as_str()).collect()
    }

    #[test]
    fn move_up_rewrites_every_sibling() {
        let list = items(&[("a", 0), ("b", 1), ("c", 2)]);
        let refs: Vec<&Item> = list.iter().collect();
        let plan = ReorderEngine::move_one_step(&refs, &EntityId::new("c"), Direction::Up).unwrap();

        assert_eq!(ids(&plan.reordered), vec!["a", "c", "b"]);
        assert_eq!(plan.writes.len(), 3);
        let orders: Vec<u32> = plan.reordered.iter().map(|i| i.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn move_repairs_gaps_and_duplicates() {
        let list = items(&[("a", 0), ("b", 0), ("c", 7)]);
        let refs: Vec<&Item> = list.iter().collect();
        let plan = ReorderEngine::move_one_step(&refs, &EntityId::new("a"), Direction::Down).unwrap();

        assert_eq!(ids(&plan.reordered), vec!["b", "a", "c"]);
        let last = plan.writes.iter().last().unwrap();
        assert_eq!(last.path.to_string(), "sheets/s1/items/c");
        assert!(matches!(&last.op, WriteOp::Update(p) if p.len() == 1));
    }

    #[test]
    fn boundary_moves_are_noops() {
        let list = items(&[("a", 0), ("b", 1)]);
        let refs: Vec<&Item> = list.iter().collect();
        assert!(ReorderEngine::move_one_step(&refs, &EntityId::new("a"), Direction::Up)
            .unwrap()
            .is_noop());
        assert!(ReorderEngine::move_one_step(&refs, &EntityId::new("b"), Direction::Down)
            .unwrap()
            .is_noop());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let list = items(&[("a", 0)]);
        let refs: Vec<&Item> = list.iter().collect();
        let err = ReorderEngine::move_one_step(&refs, &EntityId::new("zz"), Direction::Up).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn normalize_only_touches_changed_records() {
        let list = items(&[("a", 0), ("c", 5), ("b", 2)]);
        let refs: Vec<&Item> = list.iter().collect();
        let plan = ReorderEngine::normalize(&refs);
        assert_eq!(ids(&plan.reordered), vec!["a", "b", "c"]);
        assert_eq!(plan.writes.len(), 2);
    }

    #[test]
    fn column_move_stays_in_its_group() {
        let columns = vec![
            Column::new("t1", "s1", "Owner", ColumnType::Text, 0),
            Column::new("k1", "s1", "Target", ColumnType::Kpi, 0),
            Column::new("t2", "s1", "Due", ColumnType::Date, 1),
            Column::new("k2", "s1", "Actual", ColumnType::Kpi, 1),
        ];
        let refs: Vec<&Column> = columns.iter().collect();
        let plan = ReorderEngine::move_column(&refs, &EntityId::new("k2"), Direction::Up).unwrap();

        assert_eq!(ids(&plan.reordered), vec!["k2", "k1"]);
        assert!(plan
            .writes
            .iter()
            .all(|w| w.path.id().as_str().starts_with('k')));

        let noop = ReorderEngine::move_column(&refs, &EntityId::new("k1"), Direction::Up).unwrap();
        assert!(noop.is_noop(), "first kpi column cannot move into the custom group");
    }
}
