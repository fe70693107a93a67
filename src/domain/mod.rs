//! Domain Layer
//!
//! Contains the board entities and core abstractions.
//! This layer has NO dependencies on the async runtime.

mod entity;
mod item;

pub use entity::{Entity, DomainError, DomainResult};
pub use item::{BoardKey, ColumnId, Item, ItemId, Position};
