//! In-Memory Remote Store
//!
//! Keeps boards in a `tokio::sync::Mutex`. Used by the demo binary and by
//! tests; supports injected mutation failures.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::traits::{ColumnPage, RemoteStore};
use crate::domain::{BoardKey, ColumnId, DomainError, DomainResult, Item, ItemId, Position};

/// In-memory implementation of `RemoteStore`
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    boards: Mutex<HashMap<BoardKey, Vec<Item>>>,
    /// When set, `fetch_layout` only returns this many items per column
    layout_page: Option<usize>,
    fail_next: AtomicUsize,
    mutation_calls: AtomicUsize,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve only the first `page_size` items of each column from `fetch_layout`
    pub fn with_layout_page(mut self, page_size: usize) -> Self {
        self.layout_page = Some(page_size);
        self
    }

    pub async fn seed(&self, board: &BoardKey, items: Vec<Item>) {
        self.boards.lock().await.insert(board.clone(), items);
    }

    /// Make the next `count` mutations fail
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Number of `mutate_item` calls received, failed ones included
    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    pub async fn items(&self, board: &BoardKey) -> Vec<Item> {
        self.boards.lock().await.get(board).cloned().unwrap_or_default()
    }

    pub async fn get(&self, board: &BoardKey, id: ItemId) -> Option<Item> {
        self.boards
            .lock()
            .await
            .get(board)
            .and_then(|items| items.iter().find(|item| item.id == id).cloned())
    }
}

/// Items of one column ordered by position, then id
fn sorted_column(items: &[Item], column: &ColumnId) -> Vec<Item> {
    let mut column_items: Vec<Item> = items.iter().filter(|item| &item.column == column).cloned().collect();
    column_items.sort_by_key(|item| (item.position, item.id));
    column_items
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn fetch_layout(&self, board: &BoardKey) -> DomainResult<Vec<Item>> {
        let boards = self.boards.lock().await;
        let items = boards
            .get(board)
            .ok_or_else(|| DomainError::NotFound(format!("Board {} not found", board)))?;

        let Some(limit) = self.layout_page else {
            return Ok(items.clone());
        };

        let mut columns: Vec<ColumnId> = Vec::new();
        for item in items {
            if !columns.contains(&item.column) {
                columns.push(item.column.clone());
            }
        }
        Ok(columns
            .iter()
            .flat_map(|column| sorted_column(items, column).into_iter().take(limit))
            .collect())
    }

    async fn fetch_column_page(
        &self,
        board: &BoardKey,
        column: &ColumnId,
        after: Option<Position>,
        page_size: usize,
    ) -> DomainResult<ColumnPage> {
        let boards = self.boards.lock().await;
        let items = boards
            .get(board)
            .ok_or_else(|| DomainError::NotFound(format!("Board {} not found", board)))?;

        let remaining: Vec<Item> = sorted_column(items, column)
            .into_iter()
            .filter(|item| after.map_or(true, |after| item.position > after))
            .collect();

        Ok(ColumnPage {
            has_more: remaining.len() > page_size,
            items: remaining.into_iter().take(page_size).collect(),
        })
    }

    async fn mutate_item(&self, board: &BoardKey, item: &Item) -> DomainResult<Item> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(DomainError::Remote(format!("Injected failure for item {}", item.id)));
        }

        let mut boards = self.boards.lock().await;
        let items = boards
            .get_mut(board)
            .ok_or_else(|| DomainError::NotFound(format!("Board {} not found", board)))?;

        match items.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => *existing = item.clone(),
            None => items.push(item.clone()),
        }
        Ok(item.clone())
    }
}
