//! Reconciliation controller.

use anomaly_types::{
    DetectorSpec, MetricResult, ReconcileError, ReconcileResult, ReconciliationStatus,
    TriggerEvent,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, instrument};

use crate::pipeline::PipelineExecutor;

/// Upper bound on pipelines running at once within a pass
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Turns a [`DetectorSpec`] into a fresh [`ReconciliationStatus`].
///
/// Stateless between passes. Create, update and resume triggers all go
/// through [`reconcile`](Self::reconcile) unchanged, so replaying a trigger
/// yields the same status.
#[derive(Clone)]
pub struct ReconciliationController {
    executor: Arc<PipelineExecutor>,
    max_concurrency: usize,
}

impl ReconciliationController {
    pub fn new(executor: Arc<PipelineExecutor>) -> Self {
        Self {
            executor,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Bound concurrent pipelines; values below 1 are treated as 1
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Run one pass.
    ///
    /// Only a structurally invalid spec fails the pass. Metric failures are
    /// recorded in the status, one entry per declared metric, in order.
    #[instrument(skip(self, spec), fields(resource = %spec.key(), metrics = spec.metrics.len()))]
    pub async fn reconcile(&self, spec: &DetectorSpec) -> ReconcileResult<ReconciliationStatus> {
        spec.validate()?;

        let results: Vec<MetricResult> = stream::iter(spec.metrics.iter().cloned())
            .map(|metric| {
                let executor = Arc::clone(&self.executor);
                async move { executor.run(&metric).await }
            })
            .buffered(self.max_concurrency)
            .collect()
            .await;

        let status = ReconciliationStatus::new(results);

        info!(
            succeeded = status.succeeded(),
            failed = status.failed(),
            "Reconciliation pass complete"
        );

        Ok(status)
    }

    /// Run one pass, abandoning it as soon as `cancel` turns `true`.
    ///
    /// In-flight pipelines are dropped and nothing is returned for
    /// publication.
    pub async fn reconcile_until(
        &self,
        spec: &DetectorSpec,
        mut cancel: watch::Receiver<bool>,
    ) -> ReconcileResult<ReconciliationStatus> {
        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => {
                info!(resource = %spec.key(), "Reconciliation pass cancelled");
                Err(ReconcileError::Cancelled)
            }
            status = self.reconcile(spec) => status,
        }
    }

    /// Entry point for every trigger kind
    pub async fn handle(&self, event: TriggerEvent) -> ReconcileResult<ReconciliationStatus> {
        info!(resource = %event.key(), trigger = %event.kind, "Handling trigger");
        self.reconcile(&event.spec).await
    }

    /// [`handle`](Self::handle) with cooperative cancellation
    pub async fn handle_until(
        &self,
        event: TriggerEvent,
        cancel: watch::Receiver<bool>,
    ) -> ReconcileResult<ReconciliationStatus> {
        info!(resource = %event.key(), trigger = %event.kind, "Handling trigger");
        self.reconcile_until(&event.spec, cancel).await
    }
}

/// Resolves once the flag is `true`. Never resolves if the sender is gone
/// without having cancelled.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use crate::testing::{series, StubClient, StubDetector};
    use anomaly_types::{FetchError, MetricSpec, SpecValidationError};
    use std::time::Duration;
    use tokio::time::Instant;

    const PROM: &str = "http://prom:9090/api/v1/query";

    fn controller(client: Arc<StubClient>) -> ReconciliationController {
        let executor = PipelineExecutor::new(
            client,
            Arc::new(StubDetector::new()),
            PipelineConfig::default(),
        );
        ReconciliationController::new(Arc::new(executor))
    }

    fn spec(queries: &[&str]) -> DetectorSpec {
        queries.iter().fold(DetectorSpec::new("web", "prod"), |spec, q| {
            spec.with_metric(MetricSpec::new("prometheus", PROM, *q))
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_declaration_order() {
        // first-declared finishes last
        let client = StubClient::new()
            .respond_after("q0", Duration::from_millis(400), Ok(series(&[1.0])))
            .respond_after("q1", Duration::from_millis(300), Ok(series(&[1.0, 2.0])))
            .respond_after("q2", Duration::from_millis(200), Ok(series(&[1.0])))
            .respond_after("q3", Duration::from_millis(100), Ok(series(&[1.0])));

        let status = controller(Arc::new(client))
            .reconcile(&spec(&["q0", "q1", "q2", "q3"]))
            .await
            .unwrap();

        let queries: Vec<&str> = status
            .anomaly_results
            .iter()
            .map(|r| r.metric_query.as_str())
            .collect();
        assert_eq!(queries, vec!["q0", "q1", "q2", "q3"]);
        assert_eq!(
            status.anomaly_results[1]
                .anomaly_result()
                .unwrap()
                .series[0]
                .points_evaluated,
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pipelines_run_concurrently_up_to_bound() {
        let script = || {
            ["a", "b", "c", "d"].iter().fold(StubClient::new(), |c, q| {
                c.respond_after(q, Duration::from_secs(1), Ok(series(&[1.0])))
            })
        };
        let spec = spec(&["a", "b", "c", "d"]);

        let start = Instant::now();
        controller(Arc::new(script())).reconcile(&spec).await.unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));

        let start = Instant::now();
        controller(Arc::new(script()))
            .with_max_concurrency(1)
            .reconcile(&spec)
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let client = StubClient::new()
            .respond(
                "broken",
                Err(FetchError::Status {
                    backend: "prometheus".into(),
                    status: 500,
                    body: "oops".into(),
                }),
            )
            .respond("healthy", Ok(series(&[1.0, 2.0, 3.0])));

        let status = controller(Arc::new(client))
            .reconcile(&spec(&["broken", "healthy"]))
            .await
            .unwrap();

        assert_eq!(status.len(), 2);
        assert!(!status.anomaly_results[0].is_success());
        assert!(status.anomaly_results[1].is_success());
        assert_eq!(status.succeeded(), 1);
        assert_eq!(status.failed(), 1);
    }

    #[tokio::test]
    async fn test_repeated_passes_are_equal() {
        let client = Arc::new(
            StubClient::new()
                .respond("a", Ok(series(&[1.0, 2.0])))
                .respond("b", Err(FetchError::UnknownBackend("x".into()))),
        );
        let controller = controller(client);
        let spec = spec(&["a", "b"]);

        let first = controller.reconcile(&spec).await.unwrap();
        let second = controller.reconcile(&spec).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_spec() {
        let client = Arc::new(StubClient::new());
        let status = controller(client.clone())
            .reconcile(&DetectorSpec::new("web", "prod"))
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&status).unwrap(),
            serde_json::json!({ "anomalyResults": [] })
        );
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_source_recorded_as_failure() {
        let client = Arc::new(StubClient::new().respond("up", Ok(series(&[1.0]))));
        let spec = DetectorSpec::new("web", "prod")
            .with_metric(MetricSpec::new("graphite", "http://graphite", "a.b"))
            .with_metric(MetricSpec::new("prometheus", PROM, "up"));

        let status = controller(client.clone()).reconcile(&spec).await.unwrap();

        assert_eq!(
            status.anomaly_results[0].error_message(),
            Some("configuration error: unknown metric source 'graphite'")
        );
        assert!(status.anomaly_results[1].is_success());
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_invalid_spec_fails_pass() {
        let err = controller(Arc::new(StubClient::new()))
            .reconcile(&DetectorSpec::new("", "prod"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ReconcileError::InvalidSpec(SpecValidationError::EmptyName)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_pass() {
        let client = StubClient::new().respond_after("slow", Duration::from_secs(5), Ok(series(&[1.0])));
        let (tx, rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            let _ = tx.send(true);
        });

        let err = controller(Arc::new(client))
            .reconcile_until(&spec(&["slow"]), rx)
            .await
            .unwrap_err();
        assert_eq!(err, ReconcileError::Cancelled);
    }

    #[tokio::test]
    async fn test_already_cancelled() {
        let client = Arc::new(StubClient::new().respond("up", Ok(series(&[1.0]))));
        let (_tx, rx) = watch::channel(true);

        let err = controller(client.clone())
            .reconcile_until(&spec(&["up"]), rx)
            .await
            .unwrap_err();
        assert_eq!(err, ReconcileError::Cancelled);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_cancel() {
        let client = Arc::new(StubClient::new().respond("up", Ok(series(&[1.0]))));
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let status = controller(client)
            .reconcile_until(&spec(&["up"]), rx)
            .await
            .unwrap();
        assert_eq!(status.succeeded(), 1);
    }

    #[tokio::test]
    async fn test_pass_runs_on_spawned_task() {
        let client = Arc::new(
            StubClient::new()
                .respond("a", Ok(series(&[1.0, 2.0])))
                .respond("b", Ok(series(&[3.0]))),
        );
        let controller = controller(client);
        let spec = spec(&["a", "b"]);

        let (_tx, rx) = watch::channel(false);
        let status = tokio::spawn(async move {
            let first = controller.reconcile(&spec).await?;
            let second = controller
                .handle_until(TriggerEvent::update(spec, Some(first.clone())), rx)
                .await?;
            Ok::<_, ReconcileError>((first, second))
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(status.0, status.1);
        assert_eq!(status.0.succeeded(), 2);
    }

    #[tokio::test]
    async fn test_every_trigger_kind_yields_same_status() {
        let client = Arc::new(StubClient::new().respond("up", Ok(series(&[1.0, 2.0]))));
        let controller = controller(client);
        let spec = spec(&["up"]);

        let created = controller
            .handle(TriggerEvent::create(spec.clone()))
            .await
            .unwrap();
        let updated = controller
            .handle(TriggerEvent::update(spec.clone(), Some(created.clone())))
            .await
            .unwrap();
        let resumed = controller
            .handle(TriggerEvent::resume(spec))
            .await
            .unwrap();

        assert_eq!(created, updated);
        assert_eq!(created, resumed);
    }
}
