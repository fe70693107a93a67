//! Board State Store
//!
//! Shared authoritative state of one board: the committed layout, the
//! mutations in flight, and the epochs that invalidate outstanding fetches.
//! Everything sits behind one lock so a check-then-apply (is this response
//! still current? then merge it) is atomic.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ColumnId, Item, ItemId};
use crate::layout::Layout;

/// Lifecycle of a remote mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationStatus {
    InFlight,
    Succeeded,
    Failed,
}

/// A mutation sent to the remote store and not yet settled
#[derive(Debug, Clone)]
pub struct PendingMutation {
    /// Full new state sent to the remote
    pub item: Item,
    /// Layout before the optimistic apply
    pub previous_layout: Layout,
    pub status: MutationStatus,
    /// Board-wide counter value at commit time
    pub generation: u64,
    pub started_at: DateTime<Utc>,
}

/// Handed to a fetch when it starts; its result only applies if the ticket
/// is still valid when it arrives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    board_epoch: u64,
    column: Option<(ColumnId, u64)>,
}

/// State guarded by the store lock
#[derive(Debug, Default)]
pub struct StoreState {
    layout: Layout,
    pending: HashMap<ItemId, PendingMutation>,
    /// Generation of the last commit that touched each item, settled or not
    last_touched: HashMap<ItemId, u64>,
    next_generation: u64,
    board_epoch: u64,
    column_epochs: HashMap<ColumnId, u64>,
    needs_refresh: bool,
}

impl StoreState {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    // ========================
    // Mutations
    // ========================

    /// Register a mutation for `item`, superseding any earlier one for the
    /// same id. Returns its generation.
    pub fn begin_mutation(&mut self, item: Item, previous_layout: Layout) -> u64 {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.last_touched.insert(item.id, generation);
        self.pending.insert(
            item.id,
            PendingMutation {
                item,
                previous_layout,
                status: MutationStatus::InFlight,
                generation,
                started_at: Utc::now(),
            },
        );
        generation
    }

    /// True while no later commit touched the item
    pub fn is_current(&self, id: ItemId, generation: u64) -> bool {
        self.pending
            .get(&id)
            .map(|pending| pending.generation == generation)
            .unwrap_or(false)
    }

    /// True while no later commit touched the item, even after its
    /// mutation settled
    pub fn is_latest(&self, id: ItemId, generation: u64) -> bool {
        self.last_touched.get(&id) == Some(&generation)
    }

    /// Remove the pending entry if `generation` is still current
    pub fn finish_mutation(&mut self, id: ItemId, generation: u64, status: MutationStatus) -> Option<PendingMutation> {
        if !self.is_current(id, generation) {
            return None;
        }
        self.pending.remove(&id).map(|mut pending| {
            pending.status = status;
            pending
        })
    }

    pub fn has_pending(&self, id: ItemId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_ids(&self) -> Vec<ItemId> {
        self.pending.keys().copied().collect()
    }

    // ========================
    // Fetches
    // ========================

    pub fn fetch_ticket(&self, column: Option<&ColumnId>) -> FetchTicket {
        FetchTicket {
            board_epoch: self.board_epoch,
            column: column.map(|c| (c.clone(), self.column_epochs.get(c).copied().unwrap_or(0))),
        }
    }

    pub fn ticket_valid(&self, ticket: &FetchTicket) -> bool {
        if ticket.board_epoch != self.board_epoch {
            return false;
        }
        match &ticket.column {
            Some((column, epoch)) => self.column_epochs.get(column).copied().unwrap_or(0) == *epoch,
            None => true,
        }
    }

    pub fn cancel_fetches(&mut self, column: &ColumnId) {
        *self.column_epochs.entry(column.clone()).or_insert(0) += 1;
    }

    pub fn cancel_all_fetches(&mut self) {
        self.board_epoch += 1;
    }

    pub fn mark_needs_refresh(&mut self) {
        self.needs_refresh = true;
    }

    pub fn clear_needs_refresh(&mut self) {
        self.needs_refresh = false;
    }
}

/// Cloneable handle to one board's state
#[derive(Debug, Clone, Default)]
pub struct BoardStore {
    state: Arc<Mutex<StoreState>>,
}

impl BoardStore {
    pub fn new(layout: Layout) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState {
                layout,
                ..StoreState::default()
            })),
        }
    }

    /// Run `f` with the state locked
    pub fn with<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Current committed layout
    pub fn snapshot(&self) -> Layout {
        self.with(|state| state.layout.clone())
    }

    pub fn replace(&self, layout: Layout) {
        self.with(|state| state.set_layout(layout));
    }

    pub fn pending_mutations(&self) -> Vec<PendingMutation> {
        let mut pending: Vec<PendingMutation> = self.with(|state| state.pending.values().cloned().collect());
        pending.sort_by_key(|p| p.generation);
        pending
    }

    pub fn has_pending(&self, id: ItemId) -> bool {
        self.with(|state| state.has_pending(id))
    }

    pub fn fetch_ticket(&self, column: Option<&ColumnId>) -> FetchTicket {
        self.with(|state| state.fetch_ticket(column))
    }

    pub fn cancel_fetches(&self, column: &ColumnId) {
        self.with(|state| state.cancel_fetches(column));
    }

    pub fn cancel_all_fetches(&self) {
        self.with(|state| state.cancel_all_fetches());
    }

    pub fn needs_refresh(&self) -> bool {
        self.with(|state| state.needs_refresh)
    }
}
