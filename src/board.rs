//! Board Facade
//!
//! Wires the pieces for one board: input sensors feed the drag reconciler,
//! drops go to the mutation coordinator, pages come in through the fetcher,
//! and everything that happens is broadcast as a `BoardEvent`.

use std::sync::Arc;

use board_dnd::{DragEvent, Key, KeyboardSensor, PointerSensor};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::config::BoardConfig;
use crate::domain::{BoardKey, ColumnId, DomainResult, Item};
use crate::drag::{DragOutcome, DragReconciler};
use crate::events::BoardEvent;
use crate::layout::{Layout, SlotId};
use crate::mutation::OptimisticMutationCoordinator;
use crate::pagination::{FetchOutcome, PagedColumnFetcher};
use crate::position::PositionAllocator;
use crate::render::{render_layout, CardRenderer, ColumnView};
use crate::repository::RemoteStore;
use crate::store::{BoardStore, PendingMutation};

pub struct Board<R: RemoteStore + 'static> {
    key: BoardKey,
    config: BoardConfig,
    remote: Arc<R>,
    store: BoardStore,
    reconciler: DragReconciler,
    pointer: PointerSensor<SlotId>,
    keyboard: KeyboardSensor<SlotId>,
    coordinator: OptimisticMutationCoordinator<R>,
    fetcher: PagedColumnFetcher<R>,
    events: broadcast::Sender<BoardEvent>,
}

impl<R: RemoteStore + 'static> Board<R> {
    /// Fetch the board's first pages and build its layout
    pub async fn load(remote: Arc<R>, key: BoardKey, config: BoardConfig) -> DomainResult<Self> {
        config.validate()?;
        let items = remote.fetch_layout(&key).await?;
        let layout = Layout::from_items(&config.columns, items, config.page_size);
        info!(board = %key, items = layout.total_items(), "Board loaded");

        let store = BoardStore::new(layout);
        let (events, _) = broadcast::channel(config.event_capacity);
        let coordinator = OptimisticMutationCoordinator::new(
            key.clone(),
            Arc::clone(&remote),
            store.clone(),
            PositionAllocator::new(config.position_interval),
            events.clone(),
        );
        let fetcher = PagedColumnFetcher::new(key.clone(), Arc::clone(&remote), store.clone(), config.page_size, events.clone());

        Ok(Self {
            key,
            config,
            remote,
            store,
            reconciler: DragReconciler::new(),
            pointer: PointerSensor::new(),
            keyboard: KeyboardSensor::new(),
            coordinator,
            fetcher,
            events,
        })
    }

    pub fn key(&self) -> &BoardKey {
        &self.key
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    // ========================
    // Drag input
    // ========================

    /// Feed one drag event through the reconciler. A drop is committed
    /// before this returns; its persistence continues in the background.
    pub fn handle_drag(&mut self, event: DragEvent<SlotId>) -> DragOutcome {
        let committed = self.store.snapshot();
        self.reconciler.handle(event, &committed, &self.coordinator)
    }

    fn forward(&mut self, event: Option<DragEvent<SlotId>>) -> DragOutcome {
        match event {
            Some(event) => self.handle_drag(event),
            None => DragOutcome::Ignored,
        }
    }

    pub fn pointer_down(&mut self, button: i16, target: SlotId, x: i32, y: i32) {
        self.pointer.press(button, target, x, y);
    }

    pub fn pointer_move(&mut self, x: i32, y: i32) -> DragOutcome {
        let event = self.pointer.motion(x, y);
        self.forward(event)
    }

    pub fn pointer_enter(&mut self, target: SlotId) -> DragOutcome {
        let event = self.pointer.enter(target);
        self.forward(event)
    }

    pub fn pointer_leave(&mut self) -> DragOutcome {
        let event = self.pointer.leave();
        self.forward(event)
    }

    pub fn pointer_up(&mut self) -> DragOutcome {
        let event = self.pointer.release();
        self.forward(event)
    }

    pub fn pointer_cancel(&mut self) -> DragOutcome {
        let event = self.pointer.cancel();
        self.forward(event)
    }

    /// Keyboard drag; arrows walk the slots of the visible layout
    pub fn key_press(&mut self, key: Key, focused: &SlotId) -> DragOutcome {
        let grid = self.visible_layout();
        let event = self.keyboard.key(key, focused, &grid);
        self.forward(event)
    }

    pub fn is_dragging(&self) -> bool {
        !self.reconciler.is_idle()
    }

    /// The board view went away: discard any open drag without committing
    /// and abandon outstanding page fetches. In-flight mutations still settle.
    pub fn unmount(&mut self) {
        if let Some(item_id) = self.reconciler.active_id() {
            debug!(board = %self.key, item_id, "Open drag discarded on unmount");
        }
        self.reconciler.reset();
        self.pointer = PointerSensor::new();
        self.keyboard = KeyboardSensor::new();
        self.store.cancel_all_fetches();
    }

    // ========================
    // State
    // ========================

    /// Authoritative layout (optimistic changes included)
    pub fn layout(&self) -> Layout {
        self.store.snapshot()
    }

    /// Working layout during a drag, the authoritative one otherwise
    pub fn visible_layout(&self) -> Layout {
        match self.reconciler.working_layout() {
            Some(working) => working.clone(),
            None => self.store.snapshot(),
        }
    }

    pub fn pending_mutations(&self) -> Vec<PendingMutation> {
        self.store.pending_mutations()
    }

    /// Set after a rollback; cleared by `refresh`
    pub fn needs_refresh(&self) -> bool {
        self.store.needs_refresh()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BoardEvent> {
        self.events.subscribe()
    }

    pub fn render<C: CardRenderer>(&self, renderer: &C) -> Vec<ColumnView<C::Visual>> {
        render_layout(&self.visible_layout(), renderer)
    }

    // ========================
    // Remote
    // ========================

    pub async fn load_more(&self, column: &ColumnId) -> DomainResult<FetchOutcome> {
        self.fetcher.load_more(column).await
    }

    /// Detached fetcher handle, for loading pages while the board is busy
    pub fn fetcher(&self) -> PagedColumnFetcher<R> {
        self.fetcher.clone()
    }

    pub fn cancel_fetches(&self, column: &ColumnId) {
        self.fetcher.cancel(column);
    }

    /// Wait for every in-flight mutation to settle
    pub async fn flush(&self) {
        self.coordinator.flush().await;
    }

    /// Refetch the whole layout. Items with a pending mutation keep their
    /// optimistic state. Returns false when a commit superseded the fetch.
    pub async fn refresh(&self) -> DomainResult<bool> {
        let ticket = self.store.fetch_ticket(None);
        let items = self.remote.fetch_layout(&self.key).await?;

        let applied = self.store.with(|state| {
            if !state.ticket_valid(&ticket) {
                return None;
            }
            let current = state.layout();
            let pending: Vec<Item> = state
                .pending_ids()
                .into_iter()
                .filter_map(|id| current.get(id))
                .map(|item| item.as_ref().clone())
                .collect();

            let fetched: Vec<Item> = items.into_iter().filter(|item| !state.has_pending(item.id)).collect();
            let mut layout = Layout::from_items(&self.config.columns, fetched, self.config.page_size);
            for item in pending {
                layout = layout.upsert_sorted(item);
            }

            let count = layout.total_items();
            state.cancel_all_fetches();
            state.set_layout(layout);
            state.clear_needs_refresh();
            Some(count)
        });

        let Some(count) = applied else {
            debug!(board = %self.key, "Refresh superseded, dropped");
            return Ok(false);
        };
        info!(board = %self.key, items = count, "Board refreshed");
        let _ = self.events.send(BoardEvent::Refreshed { items: count });
        Ok(true)
    }
}
