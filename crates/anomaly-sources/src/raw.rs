//! Backend-agnostic raw metric data.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Data returned by a successful fetch.
///
/// Timestamps and values are kept exactly as the backend sent them; turning
/// them into a canonical series is the detector's job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMetricData {
    /// Backend that produced the data
    pub source: String,

    pub series: Vec<RawSeries>,
}

impl RawMetricData {
    pub fn new(source: impl Into<String>, series: Vec<RawSeries>) -> Self {
        Self {
            source: source.into(),
            series,
        }
    }

    pub fn point_count(&self) -> usize {
        self.series.iter().map(|s| s.points.len()).sum()
    }
}

/// One labelled series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSeries {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub points: Vec<RawPoint>,
}

impl RawSeries {
    pub fn new(labels: BTreeMap<String, String>, points: Vec<RawPoint>) -> Self {
        Self { labels, points }
    }
}

/// One point as sent by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPoint {
    pub timestamp: Value,
    pub value: Value,
}

impl RawPoint {
    pub fn new(timestamp: impl Into<Value>, value: impl Into<Value>) -> Self {
        Self {
            timestamp: timestamp.into(),
            value: value.into(),
        }
    }
}
