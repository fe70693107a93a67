//! Card Organizer
//!
//! Kanban board core: cards are dragged between columns with pointer or
//! keyboard, ordered by sparse integer positions, and persisted
//! optimistically to a remote store.
//!
//! Layered architecture:
//! - domain: Core entities and errors
//! - position / layout: Position allocation and immutable board snapshots
//! - drag: Drag reconciliation state machine
//! - mutation / pagination: Remote writes and reads against the shared store
//! - repository: Remote store abstraction and an in-memory implementation
//! - board: Facade tying the above together for one board

pub mod board;
pub mod config;
pub mod domain;
pub mod drag;
pub mod events;
pub mod layout;
pub mod mutation;
pub mod pagination;
pub mod position;
pub mod render;
pub mod repository;
pub mod store;

pub use board::Board;
pub use config::BoardConfig;
pub use domain::{BoardKey, ColumnId, DomainError, DomainResult, Entity, Item, ItemId, Position};
pub use drag::{ChangeSink, ColumnUpdate, DragOutcome, DragReconciler, DragState};
pub use events::BoardEvent;
pub use layout::{Column, Layout, SlotId, SlotLocation};
pub use mutation::OptimisticMutationCoordinator;
pub use pagination::{FetchOutcome, PagedColumnFetcher};
pub use position::{PositionAllocator, DEFAULT_POSITION_INTERVAL};
pub use render::{CardRenderer, ColumnView};
pub use repository::{ColumnPage, InMemoryRemote, RemoteStore};
pub use store::{BoardStore, MutationStatus, PendingMutation};

pub use board_dnd::{DragEvent, DragPhase, Key};
