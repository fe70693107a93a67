//! Position Allocation
//!
//! Items are ordered inside a column by an integer key. New keys are picked
//! halfway between the neighbours so that a move rewrites one item only.
//! When two neighbours are adjacent integers there is no key left between
//! them; the allocator reports `StalePosition` and the caller renumbers the
//! column with `renumber`.

use crate::domain::{DomainError, DomainResult, Item, ItemId, Position};

/// Default spacing between consecutive items (2^14)
pub const DEFAULT_POSITION_INTERVAL: Position = 16384;

/// Computes sortable positions from neighbour positions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionAllocator {
    interval: Position,
}

impl Default for PositionAllocator {
    fn default() -> Self {
        Self::new(DEFAULT_POSITION_INTERVAL)
    }
}

impl PositionAllocator {
    pub fn new(interval: Position) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Position {
        self.interval
    }

    /// Position of an item dropped into an empty column
    pub fn seed(&self) -> Position {
        self.interval
    }

    /// Position strictly between `prev` and `next`.
    ///
    /// - no neighbours: `seed()`
    /// - only `next`: `ceil(next / 2)`
    /// - only `prev`: `prev + interval`
    /// - both: `prev + ceil((next - prev) / 2)`
    pub fn allocate(&self, prev: Option<Position>, next: Option<Position>) -> DomainResult<Position> {
        let stale = || DomainError::StalePosition { prev, next };

        match (prev, next) {
            (None, None) => Ok(self.seed()),
            (None, Some(next)) => {
                // Keys stay positive, so the first slot needs next >= 2
                if next < 2 {
                    return Err(stale());
                }
                Ok(half_up(next))
            }
            (Some(prev), None) => prev.checked_add(self.interval).ok_or_else(stale),
            (Some(prev), Some(next)) => {
                let gap = next.checked_sub(prev).ok_or_else(stale)?;
                if gap <= 1 {
                    return Err(stale());
                }
                Ok(prev + half_up(gap))
            }
        }
    }

    /// Position for moving an item to `target_index` of `ordered`, a column
    /// that still contains the moved item at its original slot.
    ///
    /// Moving upward the item lands before the current occupant of
    /// `target_index`; moving downward it lands after it.
    pub fn allocate_by_index(&self, ordered: &[Position], target_index: usize, moving_upward: bool) -> DomainResult<Position> {
        let (prev, next) = if moving_upward {
            let prev = target_index.checked_sub(1).and_then(|i| ordered.get(i)).copied();
            (prev, ordered.get(target_index).copied())
        } else {
            (ordered.get(target_index).copied(), ordered.get(target_index + 1).copied())
        };
        self.allocate(prev, next)
    }

    /// Position for `moved` inside `items`, a column already rearranged so
    /// that `moved` sits at its destination slot
    pub fn allocate_in<T: AsRef<Item>>(&self, items: &[T], moved: ItemId) -> DomainResult<Position> {
        let index = items
            .iter()
            .position(|item| item.as_ref().id == moved)
            .ok_or_else(|| DomainError::NotFound(format!("Item {} not in column", moved)))?;

        let prev = index
            .checked_sub(1)
            .and_then(|i| items.get(i))
            .map(|item| item.as_ref().position);
        let next = items.get(index + 1).map(|item| item.as_ref().position);
        self.allocate(prev, next)
    }

    /// Evenly spaced keys for a column of `len` items: interval, 2*interval, ...
    pub fn renumber(&self, len: usize) -> DomainResult<Vec<Position>> {
        (1..=len)
            .map(|k| {
                Position::try_from(k)
                    .ok()
                    .and_then(|k| k.checked_mul(self.interval))
                    .ok_or_else(|| DomainError::Internal(format!("Column of {} items overflows positions", len)))
            })
            .collect()
    }
}

/// ceil(value / 2) for non-negative values, without overflow
fn half_up(value: Position) -> Position {
    value / 2 + value % 2
}
