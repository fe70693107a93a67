//! Board Configuration
//!
//! Loaded from a JSON file; every field falls back to its default.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{ColumnId, DomainError, DomainResult, Position};
use crate::position::DEFAULT_POSITION_INTERVAL;

/// Items per fetched page
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Buffered board events per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Board settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Spacing between consecutive positions (also the seed of an empty column)
    pub position_interval: Position,
    /// Page size cap for column pagination
    pub page_size: usize,
    /// Columns in display order
    pub columns: Vec<ColumnId>,
    /// Capacity of the board event channel
    pub event_capacity: usize,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            position_interval: DEFAULT_POSITION_INTERVAL,
            page_size: DEFAULT_PAGE_SIZE,
            columns: ["new", "interview", "hired", "rejected"]
                .into_iter()
                .map(ColumnId::from)
                .collect(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl BoardConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> DomainResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| DomainError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: BoardConfig = serde_json::from_str(&content)
            .map_err(|e| DomainError::InvalidInput(format!("Failed to parse {}: {}", path.display(), e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Checks:
    /// - the interval leaves room for at least one midpoint
    /// - pages hold at least one item
    /// - columns are non-empty and unique
    pub fn validate(&self) -> DomainResult<()> {
        if self.position_interval < 2 {
            return Err(DomainError::InvalidInput(format!(
                "position_interval must be at least 2, got {}",
                self.position_interval
            )));
        }
        if self.page_size == 0 {
            return Err(DomainError::InvalidInput("page_size must be at least 1".to_string()));
        }
        if self.columns.is_empty() {
            return Err(DomainError::InvalidInput("At least one column must be configured".to_string()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.columns.iter().find(|c| !seen.insert(*c)) {
            return Err(DomainError::InvalidInput(format!("Duplicate column {}", dup)));
        }
        if self.event_capacity == 0 {
            return Err(DomainError::InvalidInput("event_capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}
