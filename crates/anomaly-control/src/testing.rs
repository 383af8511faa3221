//! In-memory test doubles for the pipeline collaborators.

use anomaly_detect::AnomalyDetector;
use anomaly_sources::{MetricSourceClient, RawMetricData, RawPoint, RawSeries};
use anomaly_types::{
    AnomalyResult, ConfigurationError, Credentials, DetectionError, FetchError,
    NormalizationError, SeriesAnomalies,
};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

const KNOWN_SOURCES: [&str; 2] = ["prometheus", "influxdb"];

/// One series with a point per value, a minute apart
pub fn series(values: &[f64]) -> RawMetricData {
    let points = values
        .iter()
        .enumerate()
        .map(|(i, v)| RawPoint::new(1_700_000_000 + i as i64 * 60, *v))
        .collect();
    RawMetricData::new("prometheus", vec![RawSeries::new(BTreeMap::new(), points)])
}

#[derive(Clone)]
struct Scripted {
    delay: Duration,
    result: Result<RawMetricData, FetchError>,
}

/// Metric client answering from a per-query script.
///
/// Knows the `prometheus` and `influxdb` sources. Unscripted queries fail
/// with a transport error.
#[derive(Default)]
pub struct StubClient {
    script: HashMap<String, Scripted>,
    calls: AtomicUsize,
    seen_credentials: Mutex<Vec<Option<Credentials>>>,
}

impl StubClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, query: &str, result: Result<RawMetricData, FetchError>) -> Self {
        self.respond_after(query, Duration::ZERO, result)
    }

    pub fn respond_after(
        mut self,
        query: &str,
        delay: Duration,
        result: Result<RawMetricData, FetchError>,
    ) -> Self {
        self.script
            .insert(query.to_string(), Scripted { delay, result });
        self
    }

    /// Number of fetches issued
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_credentials(&self) -> Vec<Option<Credentials>> {
        self.seen_credentials
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl MetricSourceClient for StubClient {
    fn check_source(&self, source: &str) -> Result<(), ConfigurationError> {
        let id = source.trim().to_ascii_lowercase();
        if KNOWN_SOURCES.contains(&id.as_str()) {
            Ok(())
        } else {
            Err(ConfigurationError::UnknownSource(source.to_string()))
        }
    }

    async fn fetch(
        &self,
        source: &str,
        _url: &str,
        query: &str,
        credentials: Option<&Credentials>,
    ) -> Result<RawMetricData, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen_credentials.lock() {
            seen.push(credentials.cloned());
        }

        let Some(scripted) = self.script.get(query).cloned() else {
            return Err(FetchError::Transport {
                backend: source.to_string(),
                message: format!("no scripted response for '{}'", query),
            });
        };

        if !scripted.delay.is_zero() {
            tokio::time::sleep(scripted.delay).await;
        }

        scripted.result
    }
}

/// Detector reporting the number of points it saw, with no anomalies.
///
/// Fails on data without points, like the normalizing detector.
#[derive(Default)]
pub struct StubDetector {
    delay: Duration,
    calls: AtomicUsize,
}

impl StubDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnomalyDetector for StubDetector {
    async fn detect(&self, data: &RawMetricData) -> Result<AnomalyResult, DetectionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if data.point_count() == 0 {
            return Err(NormalizationError::EmptySeries.into());
        }

        Ok(AnomalyResult {
            engine: "stub".to_string(),
            series: data
                .series
                .iter()
                .map(|s| SeriesAnomalies {
                    labels: s.labels.clone(),
                    points_evaluated: s.points.len(),
                    anomalies: Vec::new(),
                })
                .collect(),
        })
    }
}
