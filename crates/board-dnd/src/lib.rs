//! Board DragDrop Utilities
//!
//! Pointer and keyboard sensors for sortable card boards.
//! Both sensors emit the same `DragEvent` stream so whatever consumes it
//! does not care which device produced the gesture.
//! The pointer sensor uses a movement threshold to distinguish click from drag.

use serde::{Deserialize, Serialize};

/// Movement threshold in pixels to start dragging
pub const DRAG_THRESHOLD_PX: i32 = 5;

/// Phase of a drag gesture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragPhase {
    Start,
    Over,
    End,
    Cancel,
}

/// One step of a drag gesture, independent of the input device.
///
/// `active` is the slot being dragged, `over` the slot currently under it
/// (None when hovering nothing droppable).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragEvent<T> {
    pub phase: DragPhase,
    pub active: T,
    pub over: Option<T>,
}

impl<T> DragEvent<T> {
    pub fn start(active: T) -> Self {
        Self { phase: DragPhase::Start, active, over: None }
    }

    pub fn over(active: T, over: Option<T>) -> Self {
        Self { phase: DragPhase::Over, active, over }
    }

    pub fn end(active: T, over: Option<T>) -> Self {
        Self { phase: DragPhase::End, active, over }
    }

    pub fn cancel(active: T) -> Self {
        Self { phase: DragPhase::Cancel, active, over: None }
    }
}

/// Keyboard navigation direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Grid of drop slots the keyboard sensor walks through
pub trait SlotGrid<T> {
    /// Slot next to `from` in `direction`, if any
    fn neighbor(&self, from: &T, direction: Direction) -> Option<T>;
}

// ========================
// Pointer
// ========================

/// Pointer (mouse / touch) drag state
#[derive(Clone, Debug)]
pub struct PointerSensor<T> {
    /// Pending slot (pressed but not yet dragging)
    pending: Option<T>,
    dragging: Option<T>,
    over: Option<T>,
    /// Start position for movement detection
    start_x: i32,
    start_y: i32,
    threshold_px: i32,
}

impl<T> Default for PointerSensor<T> {
    fn default() -> Self {
        Self::with_threshold(DRAG_THRESHOLD_PX)
    }
}

impl<T> PointerSensor<T> {
    pub fn with_threshold(threshold_px: i32) -> Self {
        Self {
            pending: None,
            dragging: None,
            over: None,
            start_x: 0,
            start_y: 0,
            threshold_px,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.is_some()
    }
}

impl<T: Clone + PartialEq> PointerSensor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record pending drag with start position.
    /// Only the primary button (0) arms a drag.
    pub fn press(&mut self, button: i16, target: T, x: i32, y: i32) {
        if button != 0 || self.dragging.is_some() {
            return;
        }
        self.pending = Some(target);
        self.start_x = x;
        self.start_y = y;
    }

    /// Starts the drag once the pointer moved beyond the threshold
    pub fn motion(&mut self, x: i32, y: i32) -> Option<DragEvent<T>> {
        if self.dragging.is_some() {
            return None;
        }
        let pending = self.pending.clone()?;
        let dx = (x - self.start_x).abs();
        let dy = (y - self.start_y).abs();

        if dx > self.threshold_px || dy > self.threshold_px {
            self.dragging = Some(pending.clone());
            self.over = Some(pending.clone());
            return Some(DragEvent::start(pending));
        }
        None
    }

    /// Pointer entered a slot while dragging
    pub fn enter(&mut self, target: T) -> Option<DragEvent<T>> {
        let dragging = self.dragging.clone()?;
        if self.over.as_ref() == Some(&target) {
            return None;
        }
        self.over = Some(target.clone());
        Some(DragEvent::over(dragging, Some(target)))
    }

    /// Pointer left the hovered slot
    pub fn leave(&mut self) -> Option<DragEvent<T>> {
        let dragging = self.dragging.clone()?;
        self.over.take()?;
        Some(DragEvent::over(dragging, None))
    }

    /// Pointer released. Ends the drag, or does nothing for a plain click.
    pub fn release(&mut self) -> Option<DragEvent<T>> {
        self.pending = None;
        let dragged = self.dragging.take()?;
        let over = self.over.take();
        Some(DragEvent::end(dragged, over))
    }

    pub fn cancel(&mut self) -> Option<DragEvent<T>> {
        self.pending = None;
        self.over = None;
        let dragged = self.dragging.take()?;
        Some(DragEvent::cancel(dragged))
    }
}

// ========================
// Keyboard
// ========================

/// Keys the keyboard sensor reacts to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Space,
    Enter,
    Escape,
    Up,
    Down,
    Left,
    Right,
}

impl Key {
    pub fn direction(self) -> Option<Direction> {
        match self {
            Key::Up => Some(Direction::Up),
            Key::Down => Some(Direction::Down),
            Key::Left => Some(Direction::Left),
            Key::Right => Some(Direction::Right),
            _ => None,
        }
    }
}

/// Keyboard drag state: pick up with Space/Enter, move with arrows,
/// drop with Space/Enter, cancel with Escape.
#[derive(Clone, Debug)]
pub struct KeyboardSensor<T> {
    active: Option<T>,
    over: Option<T>,
}

impl<T> Default for KeyboardSensor<T> {
    fn default() -> Self {
        Self { active: None, over: None }
    }
}

impl<T: Clone + PartialEq> KeyboardSensor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.active.is_some()
    }

    pub fn key<G: SlotGrid<T>>(&mut self, key: Key, focused: &T, grid: &G) -> Option<DragEvent<T>> {
        let Some(active) = self.active.clone() else {
            if matches!(key, Key::Space | Key::Enter) {
                self.active = Some(focused.clone());
                self.over = Some(focused.clone());
                return Some(DragEvent::start(focused.clone()));
            }
            return None;
        };

        match key {
            Key::Space | Key::Enter => {
                self.active = None;
                let over = self.over.take();
                Some(DragEvent::end(active, over))
            }
            Key::Escape => {
                self.active = None;
                self.over = None;
                Some(DragEvent::cancel(active))
            }
            arrow => {
                let direction = arrow.direction()?;
                let from = self.over.clone().unwrap_or_else(|| active.clone());
                let next = grid.neighbor(&from, direction)?;
                self.over = Some(next.clone());
                Some(DragEvent::over(active, Some(next)))
            }
        }
    }
}
