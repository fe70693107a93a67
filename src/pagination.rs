//! Paged Column Fetcher
//!
//! Loads the next page of a column after its cursor and merges it. Merging
//! only appends, so a page landing in the middle of a drag never reorders
//! what the user is looking at. A fetch whose ticket was invalidated while
//! it was in flight is dropped on arrival.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{BoardKey, ColumnId, DomainError, DomainResult};
use crate::events::BoardEvent;
use crate::repository::RemoteStore;
use crate::store::BoardStore;

/// Result of `load_more`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// A page was merged
    Loaded { added: usize, has_more: bool },
    /// The column has nothing more to load
    Exhausted,
    /// Cancelled or superseded while in flight; nothing applied
    Abandoned,
}

pub struct PagedColumnFetcher<R: RemoteStore> {
    key: BoardKey,
    remote: Arc<R>,
    store: BoardStore,
    page_size: usize,
    events: broadcast::Sender<BoardEvent>,
}

impl<R: RemoteStore> Clone for PagedColumnFetcher<R> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            remote: Arc::clone(&self.remote),
            store: self.store.clone(),
            page_size: self.page_size,
            events: self.events.clone(),
        }
    }
}

impl<R: RemoteStore> PagedColumnFetcher<R> {
    pub fn new(key: BoardKey, remote: Arc<R>, store: BoardStore, page_size: usize, events: broadcast::Sender<BoardEvent>) -> Self {
        Self {
            key,
            remote,
            store,
            page_size,
            events,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Fetch and merge the page after the column's cursor
    pub async fn load_more(&self, column: &ColumnId) -> DomainResult<FetchOutcome> {
        let (ticket, cursor, has_more) = self.store.with(|state| {
            let current = state
                .layout()
                .column(column)
                .ok_or_else(|| DomainError::NotFound(format!("Column {} not on board", column)))?;
            Ok::<_, DomainError>((state.fetch_ticket(Some(column)), current.last_position(), current.has_more()))
        })?;
        if !has_more {
            return Ok(FetchOutcome::Exhausted);
        }

        debug!(column = %column, ?cursor, page_size = self.page_size, "Fetching page");
        let page = self
            .remote
            .fetch_column_page(&self.key, column, cursor, self.page_size)
            .await?;
        // A short page is the last one
        let has_more = page.items.len() >= self.page_size;

        let added = self.store.with(|state| {
            if !state.ticket_valid(&ticket) {
                return None;
            }
            // Items already on the board (pending mutations included) are kept as they are
            let layout = state.layout();
            let before = layout.len(column);
            let merged = layout.append_page(column, page.items, has_more);
            let added = merged.len(column) - before;
            state.set_layout(merged);
            Some(added)
        });

        let Some(added) = added else {
            debug!(column = %column, "Page arrived after cancellation, dropped");
            return Ok(FetchOutcome::Abandoned);
        };

        debug!(column = %column, added, has_more, "Page merged");
        let _ = self.events.send(BoardEvent::PageLoaded {
            column: column.clone(),
            added,
            has_more,
        });
        Ok(FetchOutcome::Loaded { added, has_more })
    }

    /// Abandon outstanding fetches of a column
    pub fn cancel(&self, column: &ColumnId) {
        debug!(column = %column, "Fetches cancelled");
        self.store.cancel_fetches(column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Item, ItemId};
    use crate::layout::Layout;
    use crate::repository::InMemoryRemote;

    fn key() -> BoardKey {
        BoardKey::from("job-1")
    }

    async fn setup(total: u32, page_size: usize) -> (Arc<InMemoryRemote>, BoardStore, PagedColumnFetcher<InMemoryRemote>) {
        let remote = Arc::new(InMemoryRemote::new().with_layout_page(page_size));
        let items: Vec<Item> = (1..=total).map(|i| Item::new(i, "new", i as i64 * 16384)).collect();
        remote.seed(&key(), items).await;

        let first = remote.fetch_layout(&key()).await.unwrap();
        let store = BoardStore::new(Layout::from_items(&[ColumnId::from("new")], first, page_size));
        let (events, _) = broadcast::channel(16);
        let fetcher = PagedColumnFetcher::new(key(), remote.clone(), store.clone(), page_size, events);
        (remote, store, fetcher)
    }

    fn ids(store: &BoardStore) -> Vec<ItemId> {
        store.snapshot().items(&ColumnId::from("new")).iter().map(|i| i.id).collect()
    }

    #[tokio::test]
    async fn test_pages_until_exhausted() {
        let (_remote, store, fetcher) = setup(7, 3).await;
        let new = ColumnId::from("new");
        assert_eq!(ids(&store), vec![1, 2, 3]);

        assert_eq!(fetcher.load_more(&new).await.unwrap(), FetchOutcome::Loaded { added: 3, has_more: true });
        assert_eq!(fetcher.load_more(&new).await.unwrap(), FetchOutcome::Loaded { added: 1, has_more: false });
        assert_eq!(fetcher.load_more(&new).await.unwrap(), FetchOutcome::Exhausted);
        assert_eq!(ids(&store), (1..=7).collect::<Vec<_>>());
        assert!(store.snapshot().is_strictly_ordered());
    }

    #[tokio::test]
    async fn test_full_last_page_needs_one_more_round() {
        let (_remote, _store, fetcher) = setup(6, 3).await;
        let new = ColumnId::from("new");
        assert_eq!(fetcher.load_more(&new).await.unwrap(), FetchOutcome::Loaded { added: 3, has_more: true });
        assert_eq!(fetcher.load_more(&new).await.unwrap(), FetchOutcome::Loaded { added: 0, has_more: false });
    }

    #[tokio::test]
    async fn test_unknown_column() {
        let (_remote, _store, fetcher) = setup(3, 3).await;
        assert!(matches!(
            fetcher.load_more(&ColumnId::from("archived")).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_moved_item_not_overwritten_by_page() {
        let (_remote, store, fetcher) = setup(5, 3).await;
        // Item 4 was moved here locally before its page arrived
        store.replace(store.snapshot().place(Item::new(4, "new", 100), 0));

        fetcher.load_more(&ColumnId::from("new")).await.unwrap();
        assert_eq!(ids(&store), vec![4, 1, 2, 3, 5]);
        assert_eq!(store.snapshot().get(4).unwrap().position, 100);
    }
}
