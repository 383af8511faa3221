//! Single-metric pipeline.

use anomaly_detect::AnomalyDetector;
use anomaly_sources::MetricSourceClient;
use anomaly_types::{
    AnomalyResult, DetectionError, FetchError, MetricResult, MetricSpec, PipelineError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_DETECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Deadlines applied to each stage of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch_timeout: Duration,
    pub detect_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            detect_timeout: DEFAULT_DETECT_TIMEOUT,
        }
    }
}

/// Runs validate, fetch and detect for one metric.
#[derive(Clone)]
pub struct PipelineExecutor {
    client: Arc<dyn MetricSourceClient>,
    detector: Arc<dyn AnomalyDetector>,
    config: PipelineConfig,
}

impl PipelineExecutor {
    pub fn new(
        client: Arc<dyn MetricSourceClient>,
        detector: Arc<dyn AnomalyDetector>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            detector,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline. Failures never propagate; they become a `Failure`
    /// result carrying the classified message.
    pub async fn run(&self, metric: &MetricSpec) -> MetricResult {
        match self.execute(metric).await {
            Ok(anomaly_result) => {
                debug!(
                    metric_query = %metric.metric_query,
                    metric_source = %metric.metric_source,
                    anomalies = anomaly_result.anomaly_count(),
                    "Metric pipeline succeeded"
                );
                MetricResult::success(&metric.metric_query, anomaly_result)
            }
            Err(e) => {
                warn!(
                    metric_query = %metric.metric_query,
                    metric_source = %metric.metric_source,
                    kind = e.kind(),
                    error = %e,
                    "Metric pipeline failed"
                );
                MetricResult::from_error(&metric.metric_query, &e)
            }
        }
    }

    async fn execute(&self, metric: &MetricSpec) -> Result<AnomalyResult, PipelineError> {
        metric.validate()?;
        self.client.check_source(&metric.metric_source)?;

        // never cached between passes
        let credentials = metric.credentials();

        let data = tokio::time::timeout(
            self.config.fetch_timeout,
            self.client.fetch(
                &metric.metric_source,
                &metric.metric_url,
                &metric.metric_query,
                credentials.as_ref(),
            ),
        )
        .await
        .map_err(|_| FetchError::Timeout {
            backend: metric.metric_source.clone(),
            timeout_ms: as_millis(self.config.fetch_timeout),
        })??;

        let anomaly_result =
            tokio::time::timeout(self.config.detect_timeout, self.detector.detect(&data))
                .await
                .map_err(|_| DetectionError::Timeout {
                    timeout_ms: as_millis(self.config.detect_timeout),
                })??;

        Ok(anomaly_result)
    }
}

fn as_millis(duration: Duration) -> u64 {
    duration.as_millis().min(u64::MAX as u128) as u64
}
