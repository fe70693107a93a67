//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all domain entities.
//! All entities must have a unique ID and be thread-safe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::item::{ItemId, Position};

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the entity's unique identifier
    type Id: Copy + Eq + std::hash::Hash + Send + Sync;

    /// Returns the entity's unique identifier
    fn id(&self) -> Self::Id;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors.
///
/// Every variant is recoverable; none ends the board session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Drop target or dragged item could not be found
    #[error("Invalid drop")]
    InvalidDrop,

    /// No integer key fits strictly between the neighbours
    #[error("No room between positions {prev:?} and {next:?}")]
    StalePosition {
        prev: Option<Position>,
        next: Option<Position>,
    },

    /// Remote mutation rejected or failed in transit
    #[error("Could not update item {item_id}: {reason}")]
    MutationFailed { item_id: ItemId, reason: String },

    /// Result arrived after being superseded
    #[error("Stale response for item {item_id} (generation {generation})")]
    StaleResponse { item_id: ItemId, generation: u64 },

    /// Transport-level failure reported by the remote store
    #[error("Remote error: {0}")]
    Remote(String),
}
