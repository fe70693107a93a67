//! Optimistic Mutation Coordinator
//!
//! Applies a committed drop to the authoritative layout right away, then
//! persists it in a background task:
//! - success merges the stored item (its position wins)
//! - failure restores the pre-commit snapshot, reverts whatever part of a
//!   renumber batch the remote already took, and reports the error
//! - responses superseded by a later commit of the same item are dropped

use std::sync::{Arc, Mutex, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::{BoardKey, ColumnId, DomainError, DomainResult, Item, ItemId, Position};
use crate::drag::{ChangeSink, ColumnUpdate};
use crate::events::BoardEvent;
use crate::layout::{Layout, SlotLocation};
use crate::position::PositionAllocator;
use crate::repository::RemoteStore;
use crate::store::{BoardStore, MutationStatus, StoreState};

/// A commit applied locally and waiting to be persisted
#[derive(Debug)]
struct Prepared {
    item_id: ItemId,
    from: SlotLocation,
    to: SlotLocation,
    position: Position,
    /// Set when the destination column was re-keyed
    renumbered: Option<ColumnId>,
    snapshot: Layout,
    applied: Layout,
    /// Items to persist with their generations, moved item first
    batch: Vec<(Item, u64)>,
}

struct Inner<R> {
    key: BoardKey,
    remote: Arc<R>,
    store: BoardStore,
    allocator: PositionAllocator,
    events: broadcast::Sender<BoardEvent>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<R> Inner<R> {
    fn emit(&self, event: BoardEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

pub struct OptimisticMutationCoordinator<R: RemoteStore + 'static> {
    inner: Arc<Inner<R>>,
}

impl<R: RemoteStore + 'static> Clone for OptimisticMutationCoordinator<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: RemoteStore + 'static> OptimisticMutationCoordinator<R> {
    pub fn new(
        key: BoardKey,
        remote: Arc<R>,
        store: BoardStore,
        allocator: PositionAllocator,
        events: broadcast::Sender<BoardEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                key,
                remote,
                store,
                allocator,
                events,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Apply `update` optimistically and persist it in the background.
    ///
    /// The move is rebased by item id onto the current authoritative layout.
    /// Returns false when nothing was dispatched (already in place, or the
    /// item is gone).
    pub fn commit(&self, update: &ColumnUpdate) -> bool {
        let inner = &self.inner;
        let prepared = inner.store.with(|state| prepare(state, update, &inner.allocator));

        let prepared = match prepared {
            Ok(Some(prepared)) => prepared,
            Ok(None) => {
                debug!(item_id = update.item_id, "Item already at destination, nothing to persist");
                return false;
            }
            Err(e) => {
                warn!(item_id = update.item_id, "Commit rejected: {}", e);
                return false;
            }
        };

        info!(
            item_id = prepared.item_id,
            from = %prepared.from.column,
            to = %prepared.to.column,
            position = prepared.position,
            "Optimistic apply"
        );
        inner.emit(BoardEvent::Committed {
            item_id: prepared.item_id,
            from: prepared.from.clone(),
            to: prepared.to.clone(),
            position: prepared.position,
        });
        if let Some(column) = &prepared.renumbered {
            inner.emit(BoardEvent::Renumbered {
                column: column.clone(),
                count: prepared.batch.len(),
            });
        }

        self.dispatch(prepared);
        true
    }

    fn dispatch(&self, prepared: Prepared) {
        let Ok(handle) = Handle::try_current() else {
            warn!(item_id = prepared.item_id, "No async runtime, mutation cannot be sent");
            let error = DomainError::MutationFailed {
                item_id: prepared.item_id,
                reason: "no async runtime".to_string(),
            };
            // Nothing was sent, so nothing needs reverting
            let _ = settle_failure(&self.inner, &prepared, error);
            return;
        };

        let inner = Arc::clone(&self.inner);
        let task = handle.spawn(persist(inner, prepared));

        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|task| !task.is_finished());
        tasks.push(task);
    }

    /// Wait until every dispatched mutation has settled
    pub async fn flush(&self) {
        loop {
            let tasks = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if tasks.is_empty() {
                return;
            }
            for task in tasks {
                if let Err(e) = task.await {
                    warn!("Mutation task ended abnormally: {}", e);
                }
            }
        }
    }
}

impl<R: RemoteStore + 'static> ChangeSink for OptimisticMutationCoordinator<R> {
    fn on_change(&self, update: &ColumnUpdate) {
        self.commit(update);
    }
}

/// Rebase, allocate and apply under the store lock
fn prepare(state: &mut StoreState, update: &ColumnUpdate, allocator: &PositionAllocator) -> DomainResult<Option<Prepared>> {
    let snapshot = state.layout().clone();
    let id = update.item_id;
    let from = snapshot
        .find(id)
        .ok_or_else(|| DomainError::NotFound(format!("Item {} not on board", id)))?;
    if from == update.to {
        return Ok(None);
    }

    let column = &update.to.column;
    let moved = snapshot.move_item(id, column, update.to.index)?;

    let (applied, renumbered) = match allocator.allocate_in(moved.items(column), id) {
        Ok(position) => {
            let index = moved.find(id).map(|location| location.index).unwrap_or(update.to.index);
            let item = moved
                .get(id)
                .ok_or_else(|| DomainError::NotFound(format!("Item {} not on board", id)))?
                .moved_to(column, position);
            (moved.place(item, index), None)
        }
        Err(DomainError::StalePosition { prev, next }) => {
            warn!(item_id = id, column = %column, ?prev, ?next, "No room between neighbours, renumbering column");
            let positions = allocator.renumber(moved.len(column))?;
            (moved.renumbered(column, &positions)?, Some(column.clone()))
        }
        Err(e) => return Err(e),
    };

    let mut changed: Vec<Item> = applied
        .items(column)
        .iter()
        .filter(|item| {
            snapshot
                .get(item.id)
                .map_or(true, |old| old.position != item.position || old.column != item.column)
        })
        .map(|item| item.as_ref().clone())
        .collect();
    // Moved item goes out first
    changed.sort_by_key(|item| item.id != id);

    let Some(position) = applied.get(id).map(|item| item.position) else {
        return Err(DomainError::Internal(format!("Item {} lost while applying move", id)));
    };
    let to = applied
        .find(id)
        .ok_or_else(|| DomainError::Internal(format!("Item {} lost while applying move", id)))?;

    // Outstanding fetches for this board would overwrite the optimistic state
    state.cancel_all_fetches();
    let batch = changed
        .into_iter()
        .map(|item| {
            let generation = state.begin_mutation(item.clone(), snapshot.clone());
            (item, generation)
        })
        .collect();
    state.set_layout(applied.clone());

    Ok(Some(Prepared {
        item_id: id,
        from,
        to,
        position,
        renumbered,
        snapshot,
        applied,
        batch,
    }))
}

/// Send the batch one item at a time. The batch is one unit: the first
/// failure rolls back all of it, including items the remote already took.
async fn persist<R: RemoteStore + 'static>(inner: Arc<Inner<R>>, prepared: Prepared) {
    for (item, generation) in &prepared.batch {
        if !inner.store.with(|state| state.is_current(item.id, *generation)) {
            debug!(item_id = item.id, generation, "Superseded before sending, skipped");
            continue;
        }

        let error = match inner.remote.mutate_item(&inner.key, item).await {
            Ok(saved) if saved.id == item.id => {
                settle_success(&inner, saved, *generation);
                continue;
            }
            Ok(saved) => DomainError::MutationFailed {
                item_id: item.id,
                reason: format!("remote answered with item {}", saved.id),
            },
            Err(e) => DomainError::MutationFailed {
                item_id: item.id,
                reason: e.to_string(),
            },
        };
        let reverts = settle_failure(&inner, &prepared, error);
        revert_confirmed(&inner, reverts).await;
        return;
    }
}

fn settle_success<R>(inner: &Inner<R>, saved: Item, generation: u64) {
    let id = saved.id;
    let merged = inner.store.with(|state| {
        if state.finish_mutation(id, generation, MutationStatus::Succeeded).is_none() {
            return false;
        }
        let layout = state.layout().upsert_sorted(saved.clone());
        state.set_layout(layout);
        true
    });

    if merged {
        debug!(item_id = id, position = saved.position, "Mutation confirmed");
        inner.emit(BoardEvent::MutationSucceeded { item: saved });
    } else {
        let error = DomainError::StaleResponse { item_id: id, generation };
        debug!("{}", error);
        inner.emit(BoardEvent::StaleDropped { item_id: id, generation });
    }
}

/// Roll back every item of the batch that no later commit has touched.
///
/// Items the remote already confirmed are restored locally too; they come
/// back as new mutations carrying their pre-commit column and position, to
/// be sent by the caller.
fn settle_failure<R>(inner: &Inner<R>, prepared: &Prepared, error: DomainError) -> Vec<(Item, u64)> {
    let settled = inner.store.with(|state| {
        let owned: Vec<ItemId> = prepared
            .batch
            .iter()
            .filter(|(item, generation)| state.is_latest(item.id, *generation))
            .map(|(item, _)| item.id)
            .collect();
        if owned.is_empty() {
            return None;
        }
        let confirmed: Vec<ItemId> = prepared
            .batch
            .iter()
            .filter(|(item, generation)| owned.contains(&item.id) && !state.is_current(item.id, *generation))
            .map(|(item, _)| item.id)
            .collect();
        for (item, generation) in &prepared.batch {
            state.finish_mutation(item.id, *generation, MutationStatus::Failed);
        }

        // Restore exactly unless something else changed the layout meanwhile
        let restored = if state.layout().ptr_eq(&prepared.applied) {
            prepared.snapshot.clone()
        } else {
            state.layout().restore_items(&prepared.snapshot, &owned)
        };
        state.set_layout(restored.clone());
        state.mark_needs_refresh();

        let reverts: Vec<(Item, u64)> = confirmed
            .into_iter()
            .filter_map(|id| prepared.snapshot.get(id))
            .map(|old| {
                let old = old.as_ref().clone();
                let generation = state.begin_mutation(old.clone(), restored.clone());
                (old, generation)
            })
            .collect();
        Some((owned.len(), reverts))
    });

    let Some((rolled_back, reverts)) = settled else {
        debug!(item_id = prepared.item_id, "Failure of a superseded mutation ignored: {}", error);
        return Vec::new();
    };
    warn!(
        item_id = prepared.item_id,
        rolled_back,
        reverting = reverts.len(),
        "Mutation failed, rolled back: {}",
        error
    );
    inner.emit(BoardEvent::MutationFailed { error });
    reverts
}

/// Put items the remote confirmed before the batch failed back where they were
async fn revert_confirmed<R: RemoteStore>(inner: &Inner<R>, reverts: Vec<(Item, u64)>) {
    for (item, generation) in reverts {
        if !inner.store.with(|state| state.is_current(item.id, generation)) {
            debug!(item_id = item.id, generation, "Revert superseded, skipped");
            continue;
        }
        match inner.remote.mutate_item(&inner.key, &item).await {
            Ok(saved) if saved.id == item.id => settle_success(inner, saved, generation),
            Ok(saved) => {
                inner.store.with(|state| state.finish_mutation(item.id, generation, MutationStatus::Failed));
                warn!(item_id = item.id, "Revert answered with item {}", saved.id);
            }
            Err(e) => {
                inner.store.with(|state| {
                    state.finish_mutation(item.id, generation, MutationStatus::Failed);
                    state.mark_needs_refresh();
                });
                warn!(item_id = item.id, "Revert failed, refresh needed: {}", e);
            }
        }
    }
}
