//! Async detection capability used by the pipeline.

use anomaly_sources::RawMetricData;
use anomaly_types::{AnomalyResult, DetectionError, EngineError};
use async_trait::async_trait;
use std::sync::Arc;

use crate::engine::{DetectionEngine, ZScoreEngine};
use crate::series::normalize;

/// Produces an [`AnomalyResult`] from raw metric data.
///
/// Must be deterministic for identical input; the controller relies on it
/// for idempotent reconciliation.
#[async_trait]
pub trait AnomalyDetector: Send + Sync {
    async fn detect(&self, data: &RawMetricData) -> Result<AnomalyResult, DetectionError>;
}

/// Normalizes raw data, then hands it to a [`DetectionEngine`] on the
/// blocking thread pool.
#[derive(Clone)]
pub struct NormalizingDetector {
    engine: Arc<dyn DetectionEngine>,
}

impl NormalizingDetector {
    pub fn new(engine: Arc<dyn DetectionEngine>) -> Self {
        Self { engine }
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }
}

impl Default for NormalizingDetector {
    fn default() -> Self {
        Self::new(Arc::new(ZScoreEngine::default()))
    }
}

impl std::fmt::Debug for NormalizingDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NormalizingDetector")
            .field("engine", &self.engine.name())
            .finish()
    }
}

#[async_trait]
impl AnomalyDetector for NormalizingDetector {
    async fn detect(&self, data: &RawMetricData) -> Result<AnomalyResult, DetectionError> {
        let series = normalize(data)?;

        tracing::debug!(
            engine = self.engine.name(),
            series = series.series.len(),
            points = series.point_count(),
            "Running detection engine"
        );

        let engine = Arc::clone(&self.engine);
        let result = tokio::task::spawn_blocking(move || engine.detect(&series))
            .await
            .map_err(|e| EngineError::Failed(format!("engine task aborted: {}", e)))??;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anomaly_sources::{RawPoint, RawSeries};
    use anomaly_types::NormalizationError;
    use std::collections::BTreeMap;

    struct PanickingEngine;

    impl DetectionEngine for PanickingEngine {
        fn name(&self) -> &str {
            "panics"
        }

        fn detect(&self, _series: &crate::TimeSeries) -> Result<AnomalyResult, EngineError> {
            panic!("engine bug")
        }
    }

    fn data(values: &[f64]) -> RawMetricData {
        let points = values
            .iter()
            .enumerate()
            .map(|(i, v)| RawPoint::new(1_700_000_000 + i as i64 * 60, *v))
            .collect();
        RawMetricData::new("prometheus", vec![RawSeries::new(BTreeMap::new(), points)])
    }

    #[tokio::test]
    async fn test_detects_through_engine() {
        let mut values = vec![1.0; 29];
        values.push(50.0);

        let result = NormalizingDetector::default()
            .detect(&data(&values))
            .await
            .unwrap();
        assert_eq!(result.engine, "zscore");
        assert_eq!(result.anomaly_count(), 1);
    }

    #[tokio::test]
    async fn test_normalization_error_surfaces() {
        let err = NormalizingDetector::default()
            .detect(&RawMetricData::new("prometheus", vec![]))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DetectionError::Normalization(NormalizationError::EmptySeries)
        );
    }

    #[tokio::test]
    async fn test_engine_error_surfaces() {
        let err = NormalizingDetector::default()
            .detect(&data(&[1.0]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DetectionError::Engine(EngineError::InsufficientData { .. })
        ));
    }

    #[tokio::test]
    async fn test_engine_panic_is_contained() {
        let detector = NormalizingDetector::new(Arc::new(PanickingEngine));
        let err = detector.detect(&data(&[1.0, 2.0])).await.unwrap_err();
        assert!(matches!(err, DetectionError::Engine(EngineError::Failed(_))));
    }
}
