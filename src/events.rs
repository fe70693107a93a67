//! Board Events
//!
//! Notifications broadcast to the host UI.

use serde::Serialize;

use crate::domain::{ColumnId, DomainError, Item, ItemId, Position};
use crate::layout::SlotLocation;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    /// A drop was applied locally and sent to the remote store
    Committed {
        item_id: ItemId,
        from: SlotLocation,
        to: SlotLocation,
        position: Position,
    },
    /// A column ran out of room between two keys and was re-keyed
    Renumbered { column: ColumnId, count: usize },
    /// The remote store confirmed an item
    MutationSucceeded { item: Item },
    /// The change was rolled back; the user may retry it
    MutationFailed { error: DomainError },
    /// A superseded response arrived and was ignored
    StaleDropped { item_id: ItemId, generation: u64 },
    /// A page was merged into a column
    PageLoaded {
        column: ColumnId,
        added: usize,
        has_more: bool,
    },
    /// The whole layout was refetched
    Refreshed { items: usize },
}
