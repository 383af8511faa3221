//! InfluxDB 1.x query API backend.
//!
//! Request: `GET <metricURL>/query?q=<query>`.

use anomaly_types::FetchError;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::{invalid_url, parse_base_url};
use crate::raw::{RawPoint, RawSeries};
use crate::registry::MetricBackend;

const TIME_COLUMN: &str = "time";
const MEASUREMENT_LABEL: &str = "measurement";

#[derive(Debug, Deserialize)]
struct InfluxResponse {
    #[serde(default)]
    results: Vec<InfluxStatement>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxStatement {
    #[serde(default)]
    series: Vec<InfluxSeries>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InfluxSeries {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InfluxDbBackend;

impl MetricBackend for InfluxDbBackend {
    fn id(&self) -> &'static str {
        "influxdb"
    }

    fn request_url(&self, metric_url: &str, query: &str) -> Result<Url, FetchError> {
        let mut url = parse_base_url(self.id(), metric_url)?;
        url.path_segments_mut()
            .map_err(|_| invalid_url(self.id(), metric_url, "URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push("query");
        url.query_pairs_mut().append_pair("q", query);
        Ok(url)
    }

    fn extract(&self, body: Value) -> Result<Vec<RawSeries>, String> {
        let response: InfluxResponse = serde_json::from_value(body).map_err(|e| e.to_string())?;

        if let Some(error) = response.error {
            return Err(error);
        }

        let mut out = Vec::new();
        for statement in response.results {
            if let Some(error) = statement.error {
                return Err(error);
            }

            for series in statement.series {
                out.push(convert_series(series)?);
            }
        }

        Ok(out)
    }
}

fn convert_series(series: InfluxSeries) -> Result<RawSeries, String> {
    let time_idx = series
        .columns
        .iter()
        .position(|c| c == TIME_COLUMN)
        .ok_or_else(|| format!("series has no '{}' column", TIME_COLUMN))?;
    let value_idx = series
        .columns
        .iter()
        .position(|c| c != TIME_COLUMN)
        .ok_or_else(|| "series has no value column".to_string())?;

    let mut labels = series.tags;
    if let Some(name) = series.name {
        labels.insert(MEASUREMENT_LABEL.to_string(), name);
    }

    let mut points = Vec::with_capacity(series.values.len());
    for row in series.values {
        let (Some(ts), Some(value)) = (row.get(time_idx), row.get(value_idx)) else {
            return Err(format!(
                "row has {} columns, expected {}",
                row.len(),
                series.columns.len()
            ));
        };
        points.push(RawPoint::new(ts.clone(), value.clone()));
    }

    Ok(RawSeries::new(labels, points))
}
