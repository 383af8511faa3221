//! Trigger scheduling and reconciliation

mod reconciler;

pub use reconciler::{Scheduler, Trigger};
