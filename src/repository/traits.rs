//! Repository Layer - Remote Store Trait
//!
//! Defines the interface the board needs from its backend.
//! Implementations can use HTTP, SQLite, in-memory, etc.; retries and
//! timeouts are theirs to handle.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{BoardKey, ColumnId, DomainResult, Item, Position};

/// One page of a column, ordered by position
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnPage {
    pub items: Vec<Item>,
    pub has_more: bool,
}

/// Remote storage of a board.
///
/// Reads may be merged idempotently by item id. `mutate_item` receives the
/// item's full new state and must be idempotent for a given item value.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Items of the board (typically the first page of each column)
    async fn fetch_layout(&self, board: &BoardKey) -> DomainResult<Vec<Item>>;

    /// Up to `page_size` items of `column` positioned after `after`
    async fn fetch_column_page(
        &self,
        board: &BoardKey,
        column: &ColumnId,
        after: Option<Position>,
        page_size: usize,
    ) -> DomainResult<ColumnPage>;

    /// Persist the item's new state; returns the stored (authoritative) item
    async fn mutate_item(&self, board: &BoardKey, item: &Item) -> DomainResult<Item>;
}
