//! Re-entry after a process restart.

use anomaly_types::{ReconcileResult, ReconciliationStatus, TriggerEvent};
use tokio::sync::watch;
use tracing::info;

use crate::controller::ReconciliationController;

/// Hands resume events to the controller exactly like create or update.
#[derive(Clone)]
pub struct ResumeAdapter {
    controller: ReconciliationController,
}

impl ResumeAdapter {
    pub fn new(controller: ReconciliationController) -> Self {
        Self { controller }
    }

    pub async fn on_resume(&self, event: TriggerEvent) -> ReconcileResult<ReconciliationStatus> {
        info!(resource = %event.key(), "Resuming reconciliation");
        self.controller.handle(event).await
    }

    pub async fn on_resume_until(
        &self,
        event: TriggerEvent,
        cancel: watch::Receiver<bool>,
    ) -> ReconcileResult<ReconciliationStatus> {
        info!(resource = %event.key(), "Resuming reconciliation");
        self.controller.handle_until(event, cancel).await
    }
}
