//! # Anomaly Detect - Normalization and detection engines
//!
//! Turns backend-agnostic [`RawMetricData`](anomaly_sources::RawMetricData)
//! into a canonical [`TimeSeries`] and runs a [`DetectionEngine`] over it.
//!
//! ## Normalization contract
//!
//! See [`normalize`]: timestamp parsing, missing values, ordering and
//! duplicate handling are fixed regardless of the engine in use.
//!
//! ## Engines
//!
//! The engine is a black box behind [`DetectionEngine`]. [`ZScoreEngine`] is
//! the built-in baseline; any other engine can be plugged into
//! [`NormalizingDetector`] without touching the controller.

pub mod detector;
pub mod engine;
pub mod series;

pub use detector::{AnomalyDetector, NormalizingDetector};
pub use engine::{DetectionEngine, ZScoreEngine};
pub use series::{normalize, Point, Series, TimeSeries};
