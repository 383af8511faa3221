//! Detection engines.

use anomaly_types::{AnomalyPoint, AnomalyResult, EngineError, SeriesAnomalies};

use crate::series::{Series, TimeSeries};

pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;
pub const DEFAULT_MIN_POINTS: usize = 3;

/// Pluggable anomaly detection algorithm.
///
/// Engines are synchronous and CPU-bound; callers run them off the async
/// executor. Input is always a normalized, non-empty [`TimeSeries`].
pub trait DetectionEngine: Send + Sync {
    /// Engine identifier, recorded in every result it produces
    fn name(&self) -> &str;

    fn detect(&self, series: &TimeSeries) -> Result<AnomalyResult, EngineError>;
}

/// Flags points whose absolute z-score exceeds a threshold.
///
/// Each series is scored against its own mean and population standard
/// deviation. Series shorter than `min_points` or with zero variance are
/// reported with no anomalies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZScoreEngine {
    threshold: f64,
    min_points: usize,
}

impl ZScoreEngine {
    pub fn new(threshold: f64, min_points: usize) -> Self {
        Self {
            threshold,
            min_points: min_points.max(2),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn min_points(&self) -> usize {
        self.min_points
    }

    fn score(&self, series: &Series) -> SeriesAnomalies {
        let mut out = SeriesAnomalies {
            labels: series.labels.clone(),
            points_evaluated: series.len(),
            anomalies: Vec::new(),
        };

        if series.len() < self.min_points {
            return out;
        }

        let n = series.len() as f64;
        let mean = series.values().sum::<f64>() / n;
        let variance = series.values().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std_dev = variance.sqrt();

        if !std_dev.is_finite() || std_dev <= f64::EPSILON {
            return out;
        }

        out.anomalies = series
            .points
            .iter()
            .filter_map(|p| {
                let score = (p.value - mean) / std_dev;
                (score.abs() > self.threshold).then_some(AnomalyPoint {
                    timestamp: p.timestamp,
                    value: p.value,
                    score,
                })
            })
            .collect();

        out
    }
}

impl Default for ZScoreEngine {
    fn default() -> Self {
        Self::new(DEFAULT_Z_THRESHOLD, DEFAULT_MIN_POINTS)
    }
}

impl DetectionEngine for ZScoreEngine {
    fn name(&self) -> &str {
        "zscore"
    }

    fn detect(&self, series: &TimeSeries) -> Result<AnomalyResult, EngineError> {
        let longest = series.longest();
        if longest < self.min_points {
            return Err(EngineError::InsufficientData {
                required: self.min_points,
                actual: longest,
            });
        }

        Ok(AnomalyResult {
            engine: self.name().to_string(),
            series: series.series.iter().map(|s| self.score(s)).collect(),
        })
    }
}
