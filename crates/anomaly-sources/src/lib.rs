//! # Anomaly Sources - Metric backend clients
//!
//! Fetches raw time-series data from metric backends and hands it to the
//! detector in a backend-agnostic shape.
//!
//! ## Key Components
//!
//! - [`MetricSourceClient`]: Capability used by the pipeline to fetch metrics
//! - [`HttpMetricSourceClient`]: reqwest-backed client dispatching on the registry
//! - [`BackendRegistry`]: Identifier → [`MetricBackend`] strategy map
//! - [`RawMetricData`]: Labelled series of raw `(timestamp, value)` pairs
//!
//! ## Adding a backend
//!
//! Implement [`MetricBackend`] (request shape + response extraction) and
//! register it on the [`BackendRegistry`]. Existing backends are untouched.

pub mod backends;
pub mod client;
pub mod raw;
pub mod registry;

pub use backends::{InfluxDbBackend, PrometheusBackend};
pub use client::{HttpMetricSourceClient, MetricSourceClient, SourceConfig};
pub use raw::{RawMetricData, RawPoint, RawSeries};
pub use registry::{BackendRegistry, MetricBackend};
