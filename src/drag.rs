//! Drag Reconciler
//!
//! State machine for the active drag: `Idle -> Dragging -> (Committing) -> Idle`.
//!
//! While dragging, hovering another column moves the item in a *working*
//! layout so the UI can preview it; the committed layout is left alone.
//! On drop the final move is computed against the committed layout and
//! handed to a `ChangeSink` exactly once. The reconciler does not wait for
//! the sink's network work; it is back to `Idle` when `handle` returns.

use board_dnd::{DragEvent, DragPhase};
use tracing::debug;

use crate::domain::{DomainError, DomainResult, ItemId};
use crate::layout::{Layout, SlotId, SlotLocation};

/// A committed move: where the item was, where it goes, and the committed
/// layout with the move applied
#[derive(Debug, Clone)]
pub struct ColumnUpdate {
    pub item_id: ItemId,
    pub from: SlotLocation,
    pub to: SlotLocation,
    /// Slot the item was dropped on
    pub over: SlotId,
    pub columns: Layout,
}

impl ColumnUpdate {
    pub fn is_cross_column(&self) -> bool {
        self.from.column != self.to.column
    }
}

/// Receives committed moves (the host's `onChange`)
pub trait ChangeSink {
    fn on_change(&self, update: &ColumnUpdate);
}

/// The open drag
#[derive(Debug, Clone)]
pub struct DragSession {
    pub active_id: ItemId,
    pub origin: SlotLocation,
    /// Committed layout when the drag started
    pub source_snapshot: Layout,
    /// Preview layout, diverges from the snapshot on cross-column hovers
    pub working: Layout,
}

#[derive(Debug, Clone, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragSession),
    Committing(DragSession, ColumnUpdate),
}

/// What a drag event did
#[derive(Debug, Clone)]
pub enum DragOutcome {
    /// Not applicable in the current state
    Ignored,
    Started,
    /// The working layout changed
    Previewed,
    /// Hover registered, nothing to preview
    Hovering,
    Committed(ColumnUpdate),
    /// Dropped where it started
    NoOp,
    Cancelled,
}

#[derive(Debug, Default)]
pub struct DragReconciler {
    state: DragState,
}

impl DragReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DragState {
        &self.state
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, DragState::Idle)
    }

    pub fn active_id(&self) -> Option<ItemId> {
        match &self.state {
            DragState::Dragging(session) | DragState::Committing(session, _) => Some(session.active_id),
            DragState::Idle => None,
        }
    }

    /// Preview layout of the open drag
    pub fn working_layout(&self) -> Option<&Layout> {
        match &self.state {
            DragState::Dragging(session) => Some(&session.working),
            _ => None,
        }
    }

    /// Drop any open drag without emitting (the board went away)
    pub fn reset(&mut self) {
        self.state = DragState::Idle;
    }

    pub fn handle(&mut self, event: DragEvent<SlotId>, committed: &Layout, sink: &dyn ChangeSink) -> DragOutcome {
        let DragEvent { phase, active, over } = event;
        let SlotId::Item(active_id) = active else {
            return DragOutcome::Ignored;
        };

        match phase {
            DragPhase::Start => self.start(active_id, committed),
            DragPhase::Over => self.over(active_id, over),
            DragPhase::End => self.end(active_id, over, committed, sink),
            DragPhase::Cancel => self.cancel(active_id),
        }
    }

    fn session_mut(&mut self, active_id: ItemId) -> Option<&mut DragSession> {
        match &mut self.state {
            DragState::Dragging(session) if session.active_id == active_id => Some(session),
            _ => None,
        }
    }

    fn start(&mut self, active_id: ItemId, committed: &Layout) -> DragOutcome {
        if !self.is_idle() {
            debug!(item_id = active_id, "Drag already open, start ignored");
            return DragOutcome::Ignored;
        }
        let Some(origin) = committed.find(active_id) else {
            debug!(item_id = active_id, "Drag start on unknown item");
            return DragOutcome::Ignored;
        };

        debug!(item_id = active_id, column = %origin.column, index = origin.index, "Drag started");
        self.state = DragState::Dragging(DragSession {
            active_id,
            origin,
            source_snapshot: committed.clone(),
            working: committed.clone(),
        });
        DragOutcome::Started
    }

    fn over(&mut self, active_id: ItemId, over: Option<SlotId>) -> DragOutcome {
        let Some(session) = self.session_mut(active_id) else {
            return DragOutcome::Ignored;
        };
        let Some(over) = over else {
            return DragOutcome::Hovering;
        };
        let (Some(target), Some(current)) = (session.working.locate(&over), session.working.find(active_id)) else {
            return DragOutcome::Hovering;
        };

        // Same-column reorders are previewed by the renderer, not here
        if target.column == current.column {
            return DragOutcome::Hovering;
        }

        match session
            .working
            .move_across_columns(&current.column, current.index, &target.column, target.index)
        {
            Ok(working) => {
                session.working = working;
                DragOutcome::Previewed
            }
            Err(e) => {
                debug!(item_id = active_id, "Preview failed: {}", e);
                DragOutcome::Hovering
            }
        }
    }

    fn end(&mut self, active_id: ItemId, over: Option<SlotId>, committed: &Layout, sink: &dyn ChangeSink) -> DragOutcome {
        if self.session_mut(active_id).is_none() {
            return DragOutcome::Ignored;
        }
        let DragState::Dragging(session) = std::mem::take(&mut self.state) else {
            return DragOutcome::Ignored;
        };

        let update = match resolve_drop(&session, over, committed) {
            Ok(update) => update,
            Err(e) => {
                debug!(item_id = active_id, "{}, working layout discarded", e);
                return DragOutcome::Cancelled;
            }
        };

        if update.from == update.to {
            debug!(item_id = active_id, "Dropped at origin");
            return DragOutcome::NoOp;
        }

        debug!(
            item_id = active_id,
            from = %update.from.column,
            to = %update.to.column,
            index = update.to.index,
            "Drop committed"
        );
        self.state = DragState::Committing(session, update.clone());
        sink.on_change(&update);
        self.state = DragState::Idle;
        DragOutcome::Committed(update)
    }

    fn cancel(&mut self, active_id: ItemId) -> DragOutcome {
        if self.session_mut(active_id).is_none() {
            return DragOutcome::Ignored;
        }
        debug!(item_id = active_id, "Drag cancelled");
        self.state = DragState::Idle;
        DragOutcome::Cancelled
    }
}

/// Destination of a drop, applied to the committed layout.
///
/// The index comes from the working layout (where the user sees the item);
/// the move itself is applied to `committed` so neighbours are real.
fn resolve_drop(session: &DragSession, over: Option<SlotId>, committed: &Layout) -> DomainResult<ColumnUpdate> {
    let over = over.ok_or(DomainError::InvalidDrop)?;
    let target = session.working.locate(&over).ok_or(DomainError::InvalidDrop)?;
    let from = committed.find(session.active_id).ok_or(DomainError::InvalidDrop)?;

    let others = committed
        .items(&target.column)
        .iter()
        .filter(|item| item.id != session.active_id)
        .count();
    let index = match over {
        SlotId::Placeholder(_) => others,
        SlotId::Item(_) => target.index.min(others),
    };
    let to = SlotLocation::new(target.column, index);

    let columns = if from == to {
        committed.clone()
    } else {
        committed.move_item(session.active_id, &to.column, to.index)?
    };

    Ok(ColumnUpdate {
        item_id: session.active_id,
        from,
        to,
        over,
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnId, Item};
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder(RefCell<Vec<ColumnUpdate>>);

    impl ChangeSink for Recorder {
        fn on_change(&self, update: &ColumnUpdate) {
            self.0.borrow_mut().push(update.clone());
        }
    }

    fn board() -> Layout {
        let columns: Vec<ColumnId> = ["new", "interview", "hired", "rejected"].into_iter().map(ColumnId::from).collect();
        Layout::from_items(
            &columns,
            vec![
                Item::new(1, "new", 16384),
                Item::new(2, "new", 32768),
                Item::new(3, "new", 49152),
                Item::new(4, "rejected", 65536),
            ],
            10,
        )
    }

    fn item(id: ItemId) -> SlotId {
        SlotId::Item(id)
    }

    fn placeholder(column: &str) -> SlotId {
        SlotId::Placeholder(ColumnId::from(column))
    }

    fn ids(layout: &Layout, column: &str) -> Vec<ItemId> {
        layout.items(&ColumnId::from(column)).iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_preview_leaves_committed_layout_alone() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();

        assert!(matches!(reconciler.handle(DragEvent::start(item(4)), &committed, &sink), DragOutcome::Started));
        assert!(matches!(
            reconciler.handle(DragEvent::over(item(4), Some(item(2))), &committed, &sink),
            DragOutcome::Previewed
        ));

        let working = reconciler.working_layout().unwrap();
        assert_eq!(ids(working, "new"), vec![1, 4, 2, 3]);
        assert_eq!(ids(&committed, "new"), vec![1, 2, 3]);
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn test_cross_column_drop_emits_single_update() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();

        reconciler.handle(DragEvent::start(item(4)), &committed, &sink);
        reconciler.handle(DragEvent::over(item(4), Some(item(2))), &committed, &sink);
        let outcome = reconciler.handle(DragEvent::end(item(4), Some(item(4))), &committed, &sink);

        let DragOutcome::Committed(update) = outcome else {
            panic!("expected commit, got {:?}", outcome);
        };
        assert_eq!(update.from, SlotLocation::new(ColumnId::from("rejected"), 0));
        assert_eq!(update.to, SlotLocation::new(ColumnId::from("new"), 1));
        assert!(update.is_cross_column());
        assert_eq!(ids(&update.columns, "new"), vec![1, 4, 2, 3]);
        assert_eq!(sink.0.borrow().len(), 1);
        assert!(reconciler.is_idle());
    }

    #[test]
    fn test_drop_on_empty_column_placeholder() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();

        reconciler.handle(DragEvent::start(item(2)), &committed, &sink);
        reconciler.handle(DragEvent::over(item(2), Some(placeholder("interview"))), &committed, &sink);
        let outcome = reconciler.handle(DragEvent::end(item(2), Some(placeholder("interview"))), &committed, &sink);

        let DragOutcome::Committed(update) = outcome else {
            panic!("expected commit");
        };
        assert_eq!(update.to, SlotLocation::new(ColumnId::from("interview"), 0));
        assert_eq!(ids(&update.columns, "interview"), vec![2]);
    }

    #[test]
    fn test_within_column_drop() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();

        reconciler.handle(DragEvent::start(item(3)), &committed, &sink);
        assert!(matches!(
            reconciler.handle(DragEvent::over(item(3), Some(item(1))), &committed, &sink),
            DragOutcome::Hovering
        ));
        let DragOutcome::Committed(update) = reconciler.handle(DragEvent::end(item(3), Some(item(1))), &committed, &sink) else {
            panic!("expected commit");
        };
        assert_eq!(update.to, SlotLocation::new(ColumnId::from("new"), 0));
        assert_eq!(ids(&update.columns, "new"), vec![3, 1, 2]);
    }

    #[test]
    fn test_drop_on_itself_is_noop() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();

        reconciler.handle(DragEvent::start(item(2)), &committed, &sink);
        assert!(matches!(
            reconciler.handle(DragEvent::end(item(2), Some(item(2))), &committed, &sink),
            DragOutcome::NoOp
        ));
        assert!(sink.0.borrow().is_empty());
        assert!(reconciler.is_idle());
    }

    #[test]
    fn test_return_to_origin_through_other_column_is_noop() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();

        reconciler.handle(DragEvent::start(item(2)), &committed, &sink);
        reconciler.handle(DragEvent::over(item(2), Some(placeholder("interview"))), &committed, &sink);
        reconciler.handle(DragEvent::over(item(2), Some(item(3))), &committed, &sink);
        assert_eq!(ids(reconciler.working_layout().unwrap(), "new"), vec![1, 2, 3]);

        assert!(matches!(
            reconciler.handle(DragEvent::end(item(2), Some(item(2))), &committed, &sink),
            DragOutcome::NoOp
        ));
        assert!(sink.0.borrow().is_empty());
    }

    #[test]
    fn test_second_start_rejected_while_dragging() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();

        reconciler.handle(DragEvent::start(item(1)), &committed, &sink);
        assert!(matches!(reconciler.handle(DragEvent::start(item(2)), &committed, &sink), DragOutcome::Ignored));
        assert_eq!(reconciler.active_id(), Some(1));
        // Events for another item are ignored too
        assert!(matches!(reconciler.handle(DragEvent::cancel(item(2)), &committed, &sink), DragOutcome::Ignored));
    }

    #[test]
    fn test_cancel_and_drop_without_target() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();

        reconciler.handle(DragEvent::start(item(1)), &committed, &sink);
        reconciler.handle(DragEvent::over(item(1), Some(placeholder("hired"))), &committed, &sink);
        assert!(matches!(reconciler.handle(DragEvent::cancel(item(1)), &committed, &sink), DragOutcome::Cancelled));
        assert!(reconciler.working_layout().is_none());

        reconciler.handle(DragEvent::start(item(1)), &committed, &sink);
        assert!(matches!(reconciler.handle(DragEvent::end(item(1), None), &committed, &sink), DragOutcome::Cancelled));
        assert!(sink.0.borrow().is_empty());
        assert!(reconciler.is_idle());
    }

    #[test]
    fn test_unresolved_drop_is_invalid() {
        let committed = board();
        let session = DragSession {
            active_id: 1,
            origin: SlotLocation::new(ColumnId::from("new"), 0),
            source_snapshot: committed.clone(),
            working: committed.clone(),
        };

        assert!(matches!(resolve_drop(&session, None, &committed), Err(DomainError::InvalidDrop)));
        assert!(matches!(
            resolve_drop(&session, Some(placeholder("archived")), &committed),
            Err(DomainError::InvalidDrop)
        ));
        // The dragged item vanished from the committed layout
        let gone = committed.remove(1);
        assert!(matches!(
            resolve_drop(&session, Some(item(2)), &gone),
            Err(DomainError::InvalidDrop)
        ));

        let update = resolve_drop(&session, Some(placeholder("hired")), &committed).unwrap();
        assert_eq!(update.to, SlotLocation::new(ColumnId::from("hired"), 0));
    }

    #[test]
    fn test_placeholder_cannot_be_dragged() {
        let committed = board();
        let sink = Recorder::default();
        let mut reconciler = DragReconciler::new();
        assert!(matches!(
            reconciler.handle(DragEvent::start(placeholder("hired")), &committed, &sink),
            DragOutcome::Ignored
        ));
    }
}
