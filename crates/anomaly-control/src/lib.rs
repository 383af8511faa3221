//! # Anomaly Control - Reconciliation core
//!
//! - [`PipelineExecutor`]: one metric's fetch then detect pipeline. Never
//!   fails; every error is folded into a `Failure` [`MetricResult`](anomaly_types::MetricResult).
//! - [`ReconciliationController`]: runs every declared metric concurrently
//!   and aggregates the results in declaration order.
//! - [`ResumeAdapter`]: re-enters the controller on process resume.
//!
//! The controller holds no state between passes: every trigger kind
//! re-evaluates the full spec and produces a status that replaces the
//! previous one.

pub mod controller;
pub mod pipeline;
pub mod resume;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use controller::{ReconciliationController, DEFAULT_MAX_CONCURRENCY};
pub use pipeline::{PipelineConfig, PipelineExecutor};
pub use resume::ResumeAdapter;
