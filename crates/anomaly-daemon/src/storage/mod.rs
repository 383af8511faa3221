//! Storage layer for anomaly-daemon
//!
//! Holds declared detector specs and their last published status.

mod memory;
mod traits;

pub use memory::InMemoryStorage;
pub use traits::{DetectorStorage, StorageResult, StoredDetector};
