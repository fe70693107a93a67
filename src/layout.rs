//! Layout Store
//!
//! Immutable column -> ordered items mapping. Every operation returns a new
//! `Layout`; columns and items untouched by an operation are shared with the
//! previous snapshot (same `Arc`), so snapshots are cheap to keep for
//! rollback and renderers can skip unchanged columns.

use std::collections::BTreeMap;
use std::sync::Arc;

use board_dnd::{Direction, SlotGrid};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ColumnId, DomainError, DomainResult, Item, ItemId, Position};

/// A drop slot: an item, or the placeholder standing in for an empty column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SlotId {
    Item(ItemId),
    Placeholder(ColumnId),
}

/// Column and index of a slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLocation {
    pub column: ColumnId,
    pub index: usize,
}

impl SlotLocation {
    pub fn new(column: ColumnId, index: usize) -> Self {
        Self { column, index }
    }
}

/// A named ordered sequence of items plus its pagination cursor
#[derive(Debug, Clone)]
pub struct Column {
    id: ColumnId,
    items: Vec<Arc<Item>>,
    /// Position of the last fetched item
    last_position: Option<Position>,
    has_more: bool,
}

impl Column {
    pub fn new(id: ColumnId) -> Self {
        Self {
            id,
            items: Vec::new(),
            last_position: None,
            has_more: false,
        }
    }

    pub fn id(&self) -> &ColumnId {
        &self.id
    }

    pub fn items(&self) -> &[Arc<Item>] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last_position(&self) -> Option<Position> {
        self.last_position
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn index_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id)
    }

    fn with_items(&self, items: Vec<Arc<Item>>) -> Self {
        Self {
            id: self.id.clone(),
            items,
            last_position: self.last_position,
            has_more: self.has_more,
        }
    }
}

/// Snapshot of the whole board
#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// Display order of the columns
    order: Arc<Vec<ColumnId>>,
    columns: BTreeMap<ColumnId, Arc<Column>>,
}

impl Layout {
    /// Layout with every given column present and empty
    pub fn new<I: IntoIterator<Item = ColumnId>>(columns: I) -> Self {
        let mut layout = Self::default();
        for id in columns {
            layout.insert_column(Column::new(id));
        }
        layout
    }

    /// Build a layout from fetched items.
    ///
    /// Items are grouped by column and sorted by position; equal positions
    /// keep their fetch order. Columns unknown to `columns` are appended.
    pub fn from_items(columns: &[ColumnId], items: Vec<Item>, page_size: usize) -> Self {
        let mut order = columns.to_vec();
        let mut grouped: BTreeMap<ColumnId, Vec<Item>> = BTreeMap::new();
        for item in items {
            if !order.contains(&item.column) {
                order.push(item.column.clone());
            }
            grouped.entry(item.column.clone()).or_default().push(item);
        }

        let mut layout = Self::default();
        for id in order {
            let mut items = grouped.remove(&id).unwrap_or_default();
            items.sort_by_key(|item| item.position);
            layout.insert_column(Column {
                last_position: items.last().map(|item| item.position),
                has_more: page_size > 0 && items.len() >= page_size,
                items: items.into_iter().map(Arc::new).collect(),
                id,
            });
        }
        layout
    }

    fn insert_column(&mut self, column: Column) {
        if !self.order.contains(&column.id) {
            Arc::make_mut(&mut self.order).push(column.id.clone());
        }
        self.columns.insert(column.id.clone(), Arc::new(column));
    }

    fn replace_column(&self, column: Column) -> Self {
        let mut next = self.clone();
        next.insert_column(column);
        next
    }

    // ========================
    // Queries
    // ========================

    pub fn column_ids(&self) -> &[ColumnId] {
        &self.order
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Arc<Column>> {
        self.columns.get(id)
    }

    /// Items of a column in display order (empty for unknown columns)
    pub fn items(&self, id: &ColumnId) -> &[Arc<Item>] {
        self.columns.get(id).map(|column| column.items()).unwrap_or(&[])
    }

    pub fn len(&self, id: &ColumnId) -> usize {
        self.items(id).len()
    }

    pub fn total_items(&self) -> usize {
        self.columns.values().map(|column| column.len()).sum()
    }

    /// Column and index of an item
    pub fn find(&self, id: ItemId) -> Option<SlotLocation> {
        self.order.iter().find_map(|column_id| {
            self.columns
                .get(column_id)
                .and_then(|column| column.index_of(id))
                .map(|index| SlotLocation::new(column_id.clone(), index))
        })
    }

    pub fn get(&self, id: ItemId) -> Option<&Arc<Item>> {
        let location = self.find(id)?;
        self.items(&location.column).get(location.index)
    }

    /// Drop slots of a column. An empty column yields its placeholder.
    pub fn slots(&self, id: &ColumnId) -> Vec<SlotId> {
        let items = self.items(id);
        if items.is_empty() {
            return vec![SlotId::Placeholder(id.clone())];
        }
        items.iter().map(|item| SlotId::Item(item.id)).collect()
    }

    /// Resolve a slot. A placeholder resolves to the end of its column.
    pub fn locate(&self, slot: &SlotId) -> Option<SlotLocation> {
        match slot {
            SlotId::Item(id) => self.find(*id),
            SlotId::Placeholder(column) => self
                .column(column)
                .map(|c| SlotLocation::new(column.clone(), c.len())),
        }
    }

    /// True when both layouts share every column allocation
    pub fn ptr_eq(&self, other: &Layout) -> bool {
        Arc::ptr_eq(&self.order, &other.order)
            && self.columns.len() == other.columns.len()
            && self.columns.iter().all(|(id, column)| {
                other
                    .columns
                    .get(id)
                    .map(|o| Arc::ptr_eq(column, o))
                    .unwrap_or(false)
            })
    }

    /// Same columns, same items in the same order with the same values
    pub fn same_content(&self, other: &Layout) -> bool {
        self.order == other.order
            && self.order.iter().all(|id| {
                let (a, b) = (self.items(id), other.items(id));
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y)
            })
    }

    /// Items strictly increasing by position in every column
    pub fn is_strictly_ordered(&self) -> bool {
        self.columns
            .values()
            .all(|column| column.items.windows(2).all(|w| w[0].position < w[1].position))
    }

    // ========================
    // Moves
    // ========================

    /// Move the item at `from` to `to` inside one column.
    /// Returns a clone sharing everything when `from == to`.
    pub fn move_within_column(&self, column: &ColumnId, from: usize, to: usize) -> DomainResult<Layout> {
        let current = self.require(column)?;
        if from >= current.len() {
            return Err(out_of_range(column, from));
        }
        if from == to {
            return Ok(self.clone());
        }

        let mut items = current.items.clone();
        let item = items.remove(from);
        let to = to.min(items.len());
        items.insert(to, item);
        Ok(self.replace_column(current.with_items(items)))
    }

    /// Move the item at `from_index` of `from` into `to` at `to_index`
    /// (clamped to the destination length). The item value is kept as is.
    pub fn move_across_columns(
        &self,
        from: &ColumnId,
        from_index: usize,
        to: &ColumnId,
        to_index: usize,
    ) -> DomainResult<Layout> {
        if from == to {
            return self.move_within_column(from, from_index, to_index);
        }

        let source = self.require(from)?;
        if from_index >= source.len() {
            return Err(out_of_range(from, from_index));
        }
        let target = self
            .column(to)
            .map(|c| c.as_ref().clone())
            .unwrap_or_else(|| Column::new(to.clone()));

        let mut source_items = source.items.clone();
        let item = source_items.remove(from_index);
        let mut target_items = target.items.clone();
        target_items.insert(to_index.min(target_items.len()), item);

        Ok(self
            .replace_column(source.with_items(source_items))
            .replace_column(target.with_items(target_items)))
    }

    /// Move an item by id
    pub fn move_item(&self, id: ItemId, to: &ColumnId, to_index: usize) -> DomainResult<Layout> {
        let from = self
            .find(id)
            .ok_or_else(|| DomainError::NotFound(format!("Item {} not on board", id)))?;
        self.move_across_columns(&from.column, from.index, to, to_index)
    }

    // ========================
    // Item updates
    // ========================

    /// Remove an item by id. Unknown ids leave the layout unchanged.
    pub fn remove(&self, id: ItemId) -> Layout {
        let Some(location) = self.find(id) else {
            return self.clone();
        };
        let Some(column) = self.column(&location.column) else {
            return self.clone();
        };
        let mut items = column.items.clone();
        items.remove(location.index);
        self.replace_column(column.with_items(items))
    }

    /// Put `item` into its column at `index` (clamped), replacing any
    /// previous copy of the same id
    pub fn place(&self, item: Item, index: usize) -> Layout {
        self.place_shared(Arc::new(item), index)
    }

    fn place_shared(&self, item: Arc<Item>, index: usize) -> Layout {
        let base = self.remove(item.id);
        let column = base
            .column(&item.column)
            .map(|c| c.as_ref().clone())
            .unwrap_or_else(|| Column::new(item.column.clone()));
        let mut items = column.items.clone();
        items.insert(index.min(items.len()), item);
        base.replace_column(column.with_items(items))
    }

    /// Replace an item by id and move it to its sorted slot in its column.
    /// Used to merge server responses, whose position wins.
    pub fn upsert_sorted(&self, item: Item) -> Layout {
        let base = self.remove(item.id);
        let index = base
            .items(&item.column)
            .partition_point(|existing| existing.position <= item.position);
        base.place(item, index)
    }

    /// Merge a fetched page into a column.
    ///
    /// Items already on the board, or stored under another column, are
    /// skipped; new ones go to their sorted
    /// slot so existing entries keep their relative order. The cursor only
    /// moves forward.
    pub fn append_page(&self, column: &ColumnId, page: Vec<Item>, has_more: bool) -> Layout {
        let mut next = self.clone();
        let mut cursor = self.column(column).and_then(|c| c.last_position);

        for item in page {
            cursor = Some(cursor.map_or(item.position, |c| c.max(item.position)));
            if item.column != *column {
                debug!(item_id = item.id, column = %column, page_column = %item.column, "Page item from another column skipped");
                continue;
            }
            if next.find(item.id).is_some() {
                continue;
            }
            next = next.upsert_sorted(item);
        }

        let current = next
            .column(column)
            .map(|c| c.as_ref().clone())
            .unwrap_or_else(|| Column::new(column.clone()));
        next.replace_column(Column {
            last_position: cursor,
            has_more,
            ..current
        })
    }

    /// Assign `positions[i]` to the i-th item of a column. Items whose
    /// position and column already match keep their allocation.
    pub fn renumbered(&self, column: &ColumnId, positions: &[Position]) -> DomainResult<Layout> {
        let current = self.require(column)?;
        if positions.len() != current.len() {
            return Err(DomainError::InvalidInput(format!(
                "{} positions for {} items in column {}",
                positions.len(),
                current.len(),
                column
            )));
        }

        let items = current
            .items
            .iter()
            .zip(positions)
            .map(|(item, &position)| {
                if item.position == position && &item.column == column {
                    Arc::clone(item)
                } else {
                    Arc::new(item.moved_to(column, position))
                }
            })
            .collect();
        Ok(self.replace_column(current.with_items(items)))
    }

    /// Move each listed item back to where it sits in `snapshot`, with the
    /// snapshot's value. Items absent from the snapshot are removed.
    pub fn restore_items(&self, snapshot: &Layout, ids: &[ItemId]) -> Layout {
        let mut next = self.clone();
        // Reinsert in snapshot order so indices line up
        let mut located: Vec<(SlotLocation, Arc<Item>)> = Vec::new();
        for &id in ids {
            next = next.remove(id);
            if let (Some(location), Some(item)) = (snapshot.find(id), snapshot.get(id)) {
                located.push((location, Arc::clone(item)));
            }
        }
        located.sort_by(|a, b| a.0.index.cmp(&b.0.index));
        for (location, item) in located {
            next = next.place_shared(item, location.index);
        }
        next
    }

    fn require(&self, column: &ColumnId) -> DomainResult<&Arc<Column>> {
        self.column(column)
            .ok_or_else(|| DomainError::NotFound(format!("Column {} not on board", column)))
    }
}

fn out_of_range(column: &ColumnId, index: usize) -> DomainError {
    DomainError::InvalidInput(format!("Index {} out of range in column {}", index, column))
}

impl SlotGrid<SlotId> for Layout {
    fn neighbor(&self, from: &SlotId, direction: Direction) -> Option<SlotId> {
        let (column, index) = match from {
            SlotId::Item(id) => {
                let location = self.find(*id)?;
                (location.column, location.index)
            }
            SlotId::Placeholder(column) => (column.clone(), 0),
        };

        match direction {
            Direction::Up => index.checked_sub(1).and_then(|i| self.slots(&column).get(i).cloned()),
            Direction::Down => self.slots(&column).get(index + 1).cloned(),
            Direction::Left | Direction::Right => {
                let at = self.order.iter().position(|id| id == &column)?;
                let target = if direction == Direction::Left {
                    at.checked_sub(1)?
                } else {
                    at + 1
                };
                let slots = self.slots(self.order.get(target)?);
                slots.get(index.min(slots.len().saturating_sub(1))).cloned()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns() -> Vec<ColumnId> {
        ["new", "interview", "hired", "rejected"].into_iter().map(ColumnId::from).collect()
    }

    fn board() -> Layout {
        Layout::from_items(
            &columns(),
            vec![
                Item::new(3, "new", 49152),
                Item::new(1, "new", 16384),
                Item::new(2, "new", 32768),
                Item::new(4, "rejected", 65536),
            ],
            10,
        )
    }

    fn ids(layout: &Layout, column: &str) -> Vec<ItemId> {
        layout.items(&ColumnId::from(column)).iter().map(|item| item.id).collect()
    }

    #[test]
    fn test_from_items_sorts_and_creates_columns() {
        let layout = board();
        assert_eq!(layout.column_ids(), columns().as_slice());
        assert_eq!(ids(&layout, "new"), vec![1, 2, 3]);
        assert!(layout.items(&ColumnId::from("interview")).is_empty());
        assert_eq!(layout.column(&ColumnId::from("new")).unwrap().last_position(), Some(49152));
        assert!(!layout.column(&ColumnId::from("new")).unwrap().has_more());
        assert!(layout.is_strictly_ordered());
    }

    #[test]
    fn test_equal_positions_keep_fetch_order() {
        let layout = Layout::from_items(
            &columns(),
            vec![Item::new(7, "new", 5), Item::new(6, "new", 5)],
            10,
        );
        assert_eq!(ids(&layout, "new"), vec![7, 6]);
        assert!(!layout.is_strictly_ordered());
    }

    #[test]
    fn test_move_within_column() {
        let layout = board();
        let new = ColumnId::from("new");
        let moved = layout.move_within_column(&new, 2, 0).unwrap();
        assert_eq!(ids(&moved, "new"), vec![3, 1, 2]);
        // Original snapshot untouched
        assert_eq!(ids(&layout, "new"), vec![1, 2, 3]);
        // Other columns shared
        let rejected = ColumnId::from("rejected");
        assert!(Arc::ptr_eq(layout.column(&rejected).unwrap(), moved.column(&rejected).unwrap()));
    }

    #[test]
    fn test_move_within_column_same_index_is_noop() {
        let layout = board();
        let same = layout.move_within_column(&ColumnId::from("new"), 1, 1).unwrap();
        assert!(same.ptr_eq(&layout));
    }

    #[test]
    fn test_move_across_columns_is_identity_stable() {
        let layout = board();
        let moved = layout
            .move_across_columns(&ColumnId::from("rejected"), 0, &ColumnId::from("new"), 1)
            .unwrap();
        assert_eq!(ids(&moved, "new"), vec![1, 4, 2, 3]);
        assert!(moved.items(&ColumnId::from("rejected")).is_empty());

        // Every item keeps its allocation, including the moved one
        for id in 1..=4 {
            assert!(Arc::ptr_eq(layout.get(id).unwrap(), moved.get(id).unwrap()));
        }
        let hired = ColumnId::from("hired");
        assert!(Arc::ptr_eq(layout.column(&hired).unwrap(), moved.column(&hired).unwrap()));
    }

    #[test]
    fn test_move_into_empty_column_and_placeholder() {
        let layout = board();
        let interview = ColumnId::from("interview");
        assert_eq!(layout.slots(&interview), vec![SlotId::Placeholder(interview.clone())]);
        assert_eq!(
            layout.locate(&SlotId::Placeholder(interview.clone())),
            Some(SlotLocation::new(interview.clone(), 0))
        );

        let moved = layout.move_item(2, &interview, 5).unwrap();
        assert_eq!(ids(&moved, "interview"), vec![2]);
        assert_eq!(moved.slots(&interview), vec![SlotId::Item(2)]);
    }

    #[test]
    fn test_move_out_of_range() {
        let layout = board();
        assert!(matches!(
            layout.move_within_column(&ColumnId::from("new"), 9, 0),
            Err(DomainError::InvalidInput(_))
        ));
        assert!(matches!(
            layout.move_item(99, &ColumnId::from("new"), 0),
            Err(DomainError::NotFound(_))
        ));
    }

    #[test]
    fn test_upsert_sorted_uses_server_position() {
        let layout = board();
        let merged = layout.upsert_sorted(Item::new(1, "new", 40000));
        assert_eq!(ids(&merged, "new"), vec![2, 1, 3]);
        assert!(merged.is_strictly_ordered());
    }

    #[test]
    fn test_append_page_never_reorders() {
        let layout = board();
        let new = ColumnId::from("new");
        let page = vec![
            Item::new(3, "new", 49152),
            Item::new(5, "new", 81920),
            Item::new(6, "new", 98304),
        ];
        let merged = layout.append_page(&new, page, true);
        assert_eq!(ids(&merged, "new"), vec![1, 2, 3, 5, 6]);
        let column = merged.column(&new).unwrap();
        assert_eq!(column.last_position(), Some(98304));
        assert!(column.has_more());
    }

    #[test]
    fn test_append_page_skips_other_columns() {
        let layout = board();
        let new = ColumnId::from("new");
        let page = vec![Item::new(7, "hired", 65536), Item::new(5, "new", 81920)];

        let merged = layout.append_page(&new, page, false);
        assert_eq!(ids(&merged, "new"), vec![1, 2, 3, 5]);
        assert!(merged.get(7).is_none());
        assert!(ids(&merged, "hired").is_empty());
        assert!(merged.is_strictly_ordered());
    }

    #[test]
    fn test_renumbered() {
        let layout = board();
        let new = ColumnId::from("new");
        let renumbered = layout.renumbered(&new, &[16384, 20000, 49152]).unwrap();
        let positions: Vec<Position> = renumbered.items(&new).iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![16384, 20000, 49152]);
        assert!(Arc::ptr_eq(layout.get(1).unwrap(), renumbered.get(1).unwrap()));
        assert!(!Arc::ptr_eq(layout.get(2).unwrap(), renumbered.get(2).unwrap()));
        assert!(layout.renumbered(&new, &[1]).is_err());
    }

    #[test]
    fn test_restore_items() {
        let layout = board();
        let moved = layout
            .move_item(4, &ColumnId::from("new"), 0)
            .unwrap()
            .place(Item::new(4, "new", 8192), 0)
            .move_item(2, &ColumnId::from("hired"), 0)
            .unwrap();

        let restored = moved.restore_items(&layout, &[4]);
        assert_eq!(ids(&restored, "new"), vec![1, 3]);
        assert_eq!(ids(&restored, "rejected"), vec![4]);
        assert_eq!(restored.get(4).unwrap().position, 65536);
        // Unrelated move survives
        assert_eq!(ids(&restored, "hired"), vec![2]);
    }

    #[test]
    fn test_keyboard_grid() {
        let layout = board();
        assert_eq!(layout.neighbor(&SlotId::Item(1), Direction::Down), Some(SlotId::Item(2)));
        assert_eq!(layout.neighbor(&SlotId::Item(1), Direction::Up), None);
        assert_eq!(
            layout.neighbor(&SlotId::Item(3), Direction::Right),
            Some(SlotId::Placeholder(ColumnId::from("interview")))
        );
        assert_eq!(
            layout.neighbor(&SlotId::Placeholder(ColumnId::from("hired")), Direction::Right),
            Some(SlotId::Item(4))
        );
        assert_eq!(layout.neighbor(&SlotId::Item(4), Direction::Right), None);
    }
}
