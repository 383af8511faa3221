//! Anomaly daemon library
//!
//! Reference trigger layer around the reconciliation controller:
//! - REST API for declaring, inspecting and deleting detectors
//! - Scheduler with per-resource supersession and periodic resync
//! - Resume of manifest-declared detectors on startup
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod error;
pub mod manifest;
pub mod scheduler;
pub mod server;
pub mod storage;

pub use config::DaemonConfig;
pub use error::{ApiError, DaemonError, SchedulerError, StorageError};
pub use scheduler::Scheduler;
pub use server::Server;
pub use storage::{DetectorStorage, InMemoryStorage};
