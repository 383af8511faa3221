//! Canonical time-series representation and normalization.

use anomaly_sources::RawMetricData;
use anomaly_types::NormalizationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// A single normalized sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Labelled series, strictly ascending in time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub labels: BTreeMap<String, String>,
    pub points: Vec<Point>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }
}

/// Canonical input of a detection engine. Never empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub series: Vec<Series>,
}

impl TimeSeries {
    /// Number of points in the longest series
    pub fn longest(&self) -> usize {
        self.series.iter().map(Series::len).max().unwrap_or(0)
    }

    pub fn point_count(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }
}

/// Normalize raw backend data.
///
/// 1. Timestamps: JSON numbers are Unix seconds (fractions allowed). Strings
///    are read as Unix seconds first, then as RFC 3339. Anything else fails
///    with [`NormalizationError::MalformedTimestamp`].
/// 2. Values: numbers or numeric strings. `null`, `NaN`, infinities and
///    non-numeric values are missing and the point is dropped.
/// 3. Points are sorted ascending by timestamp.
/// 4. Among points sharing a timestamp, the last one in input order wins.
///    Missing-value points are dropped before this step.
/// 5. Series left without points are dropped. If none remain the data is
///    rejected with [`NormalizationError::EmptySeries`].
pub fn normalize(raw: &RawMetricData) -> Result<TimeSeries, NormalizationError> {
    let mut series = Vec::with_capacity(raw.series.len());

    for raw_series in &raw.series {
        let mut by_time: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();

        for point in &raw_series.points {
            let timestamp = parse_timestamp(&point.timestamp)?;
            if let Some(value) = parse_value(&point.value) {
                by_time.insert(timestamp, value);
            }
        }

        if by_time.is_empty() {
            continue;
        }

        series.push(Series {
            labels: raw_series.labels.clone(),
            points: by_time
                .into_iter()
                .map(|(timestamp, value)| Point { timestamp, value })
                .collect(),
        });
    }

    if series.is_empty() {
        return Err(NormalizationError::EmptySeries);
    }

    Ok(TimeSeries { series })
}

fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, NormalizationError> {
    let malformed = || NormalizationError::MalformedTimestamp(value.to_string());

    match value {
        Value::Number(n) => n.as_f64().and_then(from_unix_seconds).ok_or_else(malformed),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<f64>() {
                return from_unix_seconds(secs).ok_or_else(malformed);
            }
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| malformed())
        }
        _ => Err(malformed()),
    }
}

fn from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }

    let whole = secs.floor();
    let nanos = ((secs - whole) * NANOS_PER_SEC).round() as u32;
    // rounding can carry into the next second
    let (whole, nanos) = if nanos >= 1_000_000_000 {
        (whole + 1.0, 0)
    } else {
        (whole, nanos)
    };

    if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
        return None;
    }

    DateTime::from_timestamp(whole as i64, nanos)
}

fn parse_value(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed.filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anomaly_sources::{RawPoint, RawSeries};
    use serde_json::json;

    fn raw(points: Vec<RawPoint>) -> RawMetricData {
        RawMetricData::new("test", vec![RawSeries::new(BTreeMap::new(), points)])
    }

    #[test]
    fn test_sorts_ascending() {
        let ts = normalize(&raw(vec![
            RawPoint::new(30, 3.0),
            RawPoint::new(10, 1.0),
            RawPoint::new(20, 2.0),
        ]))
        .unwrap();

        let values: Vec<f64> = ts.series[0].values().collect();
        assert_eq!(values, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_duplicate_timestamps_last_wins() {
        let ts = normalize(&raw(vec![
            RawPoint::new(10, 1.0),
            RawPoint::new("10", 5.0),
            RawPoint::new(20, 2.0),
            RawPoint::new(10.0, 7.0),
        ]))
        .unwrap();

        assert_eq!(ts.series[0].len(), 2);
        assert_eq!(ts.series[0].points[0].value, 7.0);
    }

    #[test]
    fn test_missing_values_dropped() {
        let ts = normalize(&raw(vec![
            RawPoint::new(10, Value::Null),
            RawPoint::new(20, "NaN"),
            RawPoint::new(30, "+Inf"),
            RawPoint::new(40, "n/a"),
            RawPoint::new(50, "4.5"),
            RawPoint::new(60, true),
        ]))
        .unwrap();

        assert_eq!(ts.point_count(), 1);
        assert_eq!(ts.series[0].points[0].value, 4.5);
    }

    #[test]
    fn test_missing_value_does_not_override_earlier_duplicate() {
        let ts = normalize(&raw(vec![
            RawPoint::new(10, 1.0),
            RawPoint::new(10, Value::Null),
        ]))
        .unwrap();
        assert_eq!(ts.series[0].points[0].value, 1.0);
    }

    #[test]
    fn test_timestamp_formats() {
        let ts = normalize(&raw(vec![
            RawPoint::new(1_700_000_000.5, 1.0),
            RawPoint::new("2023-11-14T22:13:21Z", 2.0),
            RawPoint::new("1700000002", 3.0),
        ]))
        .unwrap();

        let points = &ts.series[0].points;
        assert_eq!(points[0].timestamp.timestamp(), 1_700_000_000);
        assert_eq!(points[0].timestamp.timestamp_subsec_millis(), 500);
        assert_eq!(points[1].timestamp.timestamp(), 1_700_000_001);
        assert_eq!(points[2].timestamp.timestamp(), 1_700_000_002);
    }

    #[test]
    fn test_malformed_timestamp() {
        let err = normalize(&raw(vec![RawPoint::new("yesterday", 1.0)])).unwrap_err();
        assert_eq!(
            err,
            NormalizationError::MalformedTimestamp("\"yesterday\"".into())
        );

        let err = normalize(&raw(vec![RawPoint::new(json!({}), 1.0)])).unwrap_err();
        assert!(matches!(err, NormalizationError::MalformedTimestamp(_)));
    }

    #[test]
    fn test_empty_series() {
        assert_eq!(
            normalize(&RawMetricData::new("test", vec![])).unwrap_err(),
            NormalizationError::EmptySeries
        );
        assert_eq!(
            normalize(&raw(vec![RawPoint::new(10, Value::Null)])).unwrap_err(),
            NormalizationError::EmptySeries
        );
    }

    #[test]
    fn test_empty_series_dropped_others_kept() {
        let data = RawMetricData::new(
            "test",
            vec![
                RawSeries::new(
                    BTreeMap::from([("host".to_string(), "a".to_string())]),
                    vec![],
                ),
                RawSeries::new(
                    BTreeMap::from([("host".to_string(), "b".to_string())]),
                    vec![RawPoint::new(1, 1.0)],
                ),
            ],
        );

        let ts = normalize(&data).unwrap();
        assert_eq!(ts.series.len(), 1);
        assert_eq!(ts.series[0].labels["host"], "b");
    }
}
