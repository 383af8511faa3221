//! Prometheus HTTP API backend.
//!
//! Request: `GET <metricURL>?query=<query>`. The URL normally points at
//! `/api/v1/query` or `/api/v1/query_range`; it is used as given.

use anomaly_types::FetchError;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::parse_base_url;
use crate::raw::{RawPoint, RawSeries};
use crate::registry::MetricBackend;

#[derive(Debug, Deserialize)]
struct PrometheusResponse {
    status: String,
    #[serde(default)]
    data: Option<PrometheusData>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default, rename = "errorType")]
    error_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "resultType", content = "result", rename_all = "lowercase")]
enum PrometheusData {
    Matrix(Vec<RangeSeries>),
    Vector(Vec<InstantSample>),
    Scalar((Value, Value)),
    String((Value, Value)),
}

#[derive(Debug, Deserialize)]
struct RangeSeries {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    #[serde(default)]
    values: Vec<(Value, Value)>,
}

#[derive(Debug, Deserialize)]
struct InstantSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (Value, Value),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusBackend;

impl MetricBackend for PrometheusBackend {
    fn id(&self) -> &'static str {
        "prometheus"
    }

    fn request_url(&self, metric_url: &str, query: &str) -> Result<Url, FetchError> {
        let mut url = parse_base_url(self.id(), metric_url)?;
        url.query_pairs_mut().append_pair("query", query);
        Ok(url)
    }

    fn extract(&self, body: Value) -> Result<Vec<RawSeries>, String> {
        let response: PrometheusResponse =
            serde_json::from_value(body).map_err(|e| e.to_string())?;

        if response.status != "success" {
            return Err(format!(
                "query {} ({}): {}",
                response.status,
                response.error_type.as_deref().unwrap_or("unknown"),
                response.error.as_deref().unwrap_or("no error message")
            ));
        }

        let data = response
            .data
            .ok_or_else(|| "response did not include data".to_string())?;

        let series = match data {
            PrometheusData::Matrix(series) => series
                .into_iter()
                .map(|s| {
                    let points = s
                        .values
                        .into_iter()
                        .map(|(ts, value)| RawPoint::new(ts, value))
                        .collect();
                    RawSeries::new(s.metric, points)
                })
                .collect(),
            PrometheusData::Vector(samples) => samples
                .into_iter()
                .map(|s| RawSeries::new(s.metric, vec![RawPoint::new(s.value.0, s.value.1)]))
                .collect(),
            PrometheusData::Scalar((ts, value)) | PrometheusData::String((ts, value)) => {
                vec![RawSeries::new(BTreeMap::new(), vec![RawPoint::new(ts, value)])]
            }
        };

        Ok(series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_url() {
        let url = PrometheusBackend
            .request_url("http://prom:9090/api/v1/query", "sum(rate(x[5m])) by (job)")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://prom:9090/api/v1/query?query=sum%28rate%28x%5B5m%5D%29%29+by+%28job%29"
        );
    }

    #[test]
    fn test_invalid_url() {
        let err = PrometheusBackend.request_url("not a url", "up").unwrap_err();
        assert!(matches!(err, FetchError::InvalidUrl { .. }));

        let err = PrometheusBackend
            .request_url("http://admin:hunter2@[prom", "up")
            .unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
    }

    #[test]
    fn test_extract_matrix() {
        let series = PrometheusBackend
            .extract(json!({
                "status": "success",
                "data": {
                    "resultType": "matrix",
                    "result": [
                        {
                            "metric": { "job": "api" },
                            "values": [[1700000000.0, "1"], [1700000015.0, "2"]]
                        }
                    ]
                }
            }))
            .unwrap();

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].labels["job"], "api");
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[0].points[1].value, json!("2"));
    }

    #[test]
    fn test_extract_vector_and_scalar() {
        let series = PrometheusBackend
            .extract(json!({
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [
                        { "metric": { "instance": "a" }, "value": [1700000000, "3"] },
                        { "metric": { "instance": "b" }, "value": [1700000000, "4"] }
                    ]
                }
            }))
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[1].points[0].value, json!("4"));

        let series = PrometheusBackend
            .extract(json!({
                "status": "success",
                "data": { "resultType": "scalar", "result": [1700000000, "7"] }
            }))
            .unwrap();
        assert_eq!(series.len(), 1);
        assert!(series[0].labels.is_empty());
    }

    #[test]
    fn test_extract_error_payload() {
        let err = PrometheusBackend
            .extract(json!({
                "status": "error",
                "errorType": "bad_data",
                "error": "parse error at char 4"
            }))
            .unwrap_err();
        assert!(err.contains("bad_data"));
        assert!(err.contains("parse error"));
    }
}
