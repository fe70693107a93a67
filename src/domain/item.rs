//! Item Entity
//!
//! A card on the board: an identity, the column it sits in and a sortable
//! position within that column. Everything else is payload the board
//! carries around untouched.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::entity::Entity;

/// Board-wide unique item identifier
pub type ItemId = u32;

/// Sortable key of an item within its column
pub type Position = i64;

/// Column identifier (a pipeline stage such as "new" or "hired")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnId(String);

impl ColumnId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ColumnId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one board (the remote resource every fetch and mutation targets)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardKey(String);

impl BoardKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BoardKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl fmt::Display for BoardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A card on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier, never changes
    pub id: ItemId,
    /// Column the item belongs to
    #[serde(alias = "status")]
    pub column: ColumnId,
    /// Sort key within the column
    pub position: Position,
    /// Opaque fields (email, title, ...)
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Item {
    pub fn new(id: ItemId, column: impl Into<ColumnId>, position: Position) -> Self {
        Self {
            id,
            column: column.into(),
            position,
            payload: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    /// Copy of this item placed in `column` at `position`, payload unchanged
    pub fn moved_to(&self, column: &ColumnId, position: Position) -> Self {
        Self {
            id: self.id,
            column: column.clone(),
            position,
            payload: self.payload.clone(),
        }
    }
}

impl From<String> for ColumnId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl Entity for Item {
    type Id = ItemId;

    fn id(&self) -> Self::Id {
        self.id
    }
}
