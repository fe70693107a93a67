//! Repository Layer
//!
//! The remote store seam and an in-memory implementation.

mod memory;
mod traits;

pub use memory::InMemoryRemote;
pub use traits::{ColumnPage, RemoteStore};
