//! Anomaly Types - Core types for the AnomalyDetector reconciler
//!
//! An `AnomalyDetector` resource declares a list of metric pipelines. Each
//! reconciliation pass fetches every metric, runs anomaly detection on it and
//! publishes one result per metric, in declaration order.
//!
//! ## Key Concepts
//!
//! - **DetectorSpec**: Desired state of one resource (name, namespace, metrics)
//! - **MetricSpec**: One metric pipeline (backend, URL, query, credentials)
//! - **MetricResult**: Outcome of one pipeline, success payload or error message
//! - **ReconciliationStatus**: Ordered results written back to the resource
//! - **TriggerEvent**: Create, update or resume event handed to the controller

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod result;
pub mod spec;
pub mod trigger;

// Re-export main types
pub use error::{
    ConfigurationError, DetectionError, EngineError, FetchError, NormalizationError,
    PipelineError, ReconcileError, ReconcileResult, SpecValidationError,
};
pub use result::{
    AnomalyPoint, AnomalyResult, MetricOutcome, MetricResult, ReconciliationStatus,
    SeriesAnomalies,
};
pub use spec::{Credentials, DetectorSpec, MetricAuth, MetricSpec, ResourceKey};
pub use trigger::{TriggerEvent, TriggerKind};
