//! Pipeline results and the aggregate status written back to the resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PipelineError;

/// Output of the detection engine for one metric.
///
/// Opaque to the controller; it is only stored, compared and serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyResult {
    /// Engine that produced the result
    pub engine: String,

    /// One entry per normalized series
    pub series: Vec<SeriesAnomalies>,
}

impl AnomalyResult {
    /// Total number of flagged points across all series
    pub fn anomaly_count(&self) -> usize {
        self.series.iter().map(|s| s.anomalies.len()).sum()
    }
}

/// Anomalies found in one labelled series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesAnomalies {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub points_evaluated: usize,
    pub anomalies: Vec<AnomalyPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub score: f64,
}

/// Payload of a pipeline run. Exactly one of the two is ever present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum MetricOutcome {
    Success {
        #[serde(rename = "anomalyResult")]
        anomaly_result: AnomalyResult,
    },
    Failure {
        #[serde(rename = "errorMessage")]
        error_message: String,
    },
}

/// Outcome of one metric pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Echo of the metric query, for correlation with the declared metric
    #[serde(rename = "metricQuery")]
    pub metric_query: String,

    #[serde(flatten)]
    pub outcome: MetricOutcome,
}

impl MetricResult {
    pub fn success(metric_query: impl Into<String>, anomaly_result: AnomalyResult) -> Self {
        Self {
            metric_query: metric_query.into(),
            outcome: MetricOutcome::Success { anomaly_result },
        }
    }

    pub fn failure(metric_query: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            metric_query: metric_query.into(),
            outcome: MetricOutcome::Failure {
                error_message: error_message.into(),
            },
        }
    }

    /// Failed result carrying the classified message of `error`
    pub fn from_error(metric_query: impl Into<String>, error: &PipelineError) -> Self {
        Self::failure(metric_query, error.to_string())
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, MetricOutcome::Success { .. })
    }

    pub fn anomaly_result(&self) -> Option<&AnomalyResult> {
        match &self.outcome {
            MetricOutcome::Success { anomaly_result } => Some(anomaly_result),
            MetricOutcome::Failure { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            MetricOutcome::Success { .. } => None,
            MetricOutcome::Failure { error_message } => Some(error_message),
        }
    }
}

/// Aggregate status of one reconciliation pass.
///
/// Holds exactly one result per declared metric, in declaration order, and
/// fully replaces the previous status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationStatus {
    pub anomaly_results: Vec<MetricResult>,
}

impl ReconciliationStatus {
    pub fn new(anomaly_results: Vec<MetricResult>) -> Self {
        Self { anomaly_results }
    }

    pub fn len(&self) -> usize {
        self.anomaly_results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anomaly_results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.anomaly_results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.len() - self.succeeded()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_result() -> AnomalyResult {
        AnomalyResult {
            engine: "zscore".into(),
            series: vec![SeriesAnomalies {
                labels: BTreeMap::from([("job".to_string(), "api".to_string())]),
                points_evaluated: 12,
                anomalies: vec![AnomalyPoint {
                    timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                    value: 42.0,
                    score: 3.5,
                }],
            }],
        }
    }

    #[test]
    fn test_status_output_schema() {
        let status = ReconciliationStatus::new(vec![
            MetricResult::success("up", sample_result()),
            MetricResult::failure("down", "fetch error: boom"),
        ]);

        let value = serde_json::to_value(&status).unwrap();
        let results = value["anomalyResults"].as_array().unwrap();

        assert_eq!(results[0]["metricQuery"], "up");
        assert_eq!(results[0]["status"], "Success");
        assert_eq!(results[0]["anomalyResult"]["engine"], "zscore");
        assert!(results[0].get("errorMessage").is_none());

        assert_eq!(results[1]["metricQuery"], "down");
        assert_eq!(results[1]["status"], "Failure");
        assert_eq!(results[1]["errorMessage"], "fetch error: boom");
        assert!(results[1].get("anomalyResult").is_none());

        let back: ReconciliationStatus = serde_json::from_value(value).unwrap();
        assert_eq!(back, status);
    }

    #[test]
    fn test_empty_status() {
        let status = ReconciliationStatus::default();
        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            json!({ "anomalyResults": [] })
        );
        assert_eq!(status.succeeded(), 0);
        assert_eq!(status.failed(), 0);
    }

    #[test]
    fn test_counts() {
        let status = ReconciliationStatus::new(vec![
            MetricResult::success("a", sample_result()),
            MetricResult::failure("b", "x"),
            MetricResult::failure("c", "y"),
        ]);
        assert_eq!(status.succeeded(), 1);
        assert_eq!(status.failed(), 2);
        assert_eq!(status.anomaly_results[0].anomaly_result().unwrap().anomaly_count(), 1);
        assert_eq!(status.anomaly_results[1].error_message(), Some("x"));
    }
}
