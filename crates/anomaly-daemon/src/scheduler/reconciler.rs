//! Trigger loop, per-resource supersession and periodic resync

use crate::config::SchedulerConfig;
use crate::error::{SchedulerError, StorageError};
use crate::storage::{DetectorStorage, StoredDetector};
use anomaly_control::{ReconciliationController, ResumeAdapter};
use anomaly_types::{DetectorSpec, ReconcileError, ResourceKey, TriggerEvent, TriggerKind};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};

/// A trigger tagged with the generation it was issued for
#[derive(Debug, Clone)]
pub struct Trigger {
    pub event: TriggerEvent,
    pub generation: u64,
}

struct InFlight {
    generation: u64,
    // distinguishes passes of a deleted and recreated resource
    pass: u64,
    cancel: watch::Sender<bool>,
}

/// Feeds triggers to the controller, one pass per resource at a time.
///
/// A newer trigger for a resource cancels its in-flight pass. A pass only
/// publishes if its generation is still the latest when it finishes.
pub struct Scheduler {
    config: SchedulerConfig,
    storage: Arc<dyn DetectorStorage>,
    controller: ReconciliationController,
    resume: ResumeAdapter,
    trigger_tx: mpsc::Sender<Trigger>,
    in_flight: DashMap<ResourceKey, InFlight>,
    next_pass: AtomicU64,
}

impl Scheduler {
    /// Create a new scheduler and the receiving end of its trigger queue
    pub fn new(
        config: SchedulerConfig,
        storage: Arc<dyn DetectorStorage>,
        controller: ReconciliationController,
    ) -> (Arc<Self>, mpsc::Receiver<Trigger>) {
        let (trigger_tx, trigger_rx) = mpsc::channel(config.trigger_queue_size.max(1));
        let resume = ResumeAdapter::new(controller.clone());

        let scheduler = Arc::new(Self {
            config,
            storage,
            controller,
            resume,
            trigger_tx,
            in_flight: DashMap::new(),
            next_pass: AtomicU64::new(0),
        });

        (scheduler, trigger_rx)
    }

    /// Store a spec and trigger a create or update pass
    pub async fn apply(&self, spec: DetectorSpec) -> Result<(StoredDetector, bool), SchedulerError> {
        let (stored, created) = self.storage.upsert_spec(spec).await?;

        let event = if created {
            TriggerEvent::create(stored.spec.clone())
        } else {
            TriggerEvent::update(stored.spec.clone(), stored.status.clone())
        };
        self.submit(event, stored.generation).await?;

        Ok((stored, created))
    }

    /// Re-run a stored resource as an update
    pub async fn retrigger(&self, key: &ResourceKey) -> Result<StoredDetector, SchedulerError> {
        let stored = self.storage.bump_generation(key).await?;
        self.submit(
            TriggerEvent::update(stored.spec.clone(), stored.status.clone()),
            stored.generation,
        )
        .await?;
        Ok(stored)
    }

    /// Store a spec known before the process started and resume it
    pub async fn resume(&self, spec: DetectorSpec) -> Result<StoredDetector, SchedulerError> {
        let (stored, _) = self.storage.upsert_spec(spec).await?;
        self.submit(TriggerEvent::resume(stored.spec.clone()), stored.generation)
            .await?;
        Ok(stored)
    }

    /// Delete a resource and cancel its in-flight pass
    pub async fn remove(&self, key: &ResourceKey) -> Result<bool, SchedulerError> {
        self.cancel(key);
        Ok(self.storage.delete_detector(key).await?)
    }

    /// Number of passes currently running
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    async fn submit(&self, event: TriggerEvent, generation: u64) -> Result<(), SchedulerError> {
        self.trigger_tx
            .send(Trigger { event, generation })
            .await
            .map_err(|_| SchedulerError::QueueClosed)
    }

    fn cancel(&self, key: &ResourceKey) {
        if let Some((_, in_flight)) = self.in_flight.remove(key) {
            tracing::debug!(resource = %key, generation = in_flight.generation, "Cancelling in-flight pass");
            let _ = in_flight.cancel.send(true);
        }
    }

    /// Run the trigger loop until `shutdown` turns `true`
    pub async fn start(
        self: Arc<Self>,
        mut trigger_rx: mpsc::Receiver<Trigger>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        tracing::info!(
            resync_interval_secs = self.config.resync_interval_secs,
            "Scheduler started"
        );

        let mut resync = interval(Duration::from_secs(self.config.resync_interval_secs.max(1)));
        resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        resync.tick().await;

        loop {
            tokio::select! {
                Some(trigger) = trigger_rx.recv() => {
                    self.dispatch(trigger);
                }
                _ = resync.tick() => {
                    if let Err(e) = self.resync().await {
                        tracing::error!(error = %e, "Resync failed");
                    }
                }
                _ = shutdown.changed() => break,
                else => break,
            }
        }

        let keys: Vec<ResourceKey> = self.in_flight.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.cancel(&key);
        }

        tracing::info!("Scheduler stopped");
    }

    /// Level-triggered re-evaluation of every stored resource.
    ///
    /// Resources with a pass already running are left alone.
    async fn resync(self: &Arc<Self>) -> Result<(), SchedulerError> {
        let detectors = self.storage.list_detectors().await?;
        tracing::debug!(count = detectors.len(), "Resyncing detectors");

        for detector in detectors {
            let key = detector.key();
            if self.in_flight.contains_key(&key) {
                continue;
            }

            let stored = match self.storage.bump_generation(&key).await {
                Ok(stored) => stored,
                // deleted since listing
                Err(StorageError::NotFound(_)) => continue,
            };

            self.dispatch(Trigger {
                event: TriggerEvent::update(stored.spec.clone(), stored.status.clone()),
                generation: stored.generation,
            });
        }

        Ok(())
    }

    fn dispatch(self: &Arc<Self>, trigger: Trigger) {
        let key = trigger.event.key();
        let generation = trigger.generation;
        let pass = self.next_pass.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let in_flight = InFlight {
            generation,
            pass,
            cancel: cancel_tx,
        };

        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                if entry.get().generation > generation {
                    tracing::debug!(resource = %key, generation, "Dropping stale trigger");
                    return;
                }
                let previous = entry.insert(in_flight);
                tracing::debug!(
                    resource = %key,
                    superseded = previous.generation,
                    generation,
                    "Superseding in-flight pass"
                );
                let _ = previous.cancel.send(true);
            }
            Entry::Vacant(entry) => {
                entry.insert(in_flight);
            }
        }

        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler.run_pass(key, pass, trigger, cancel_rx).await;
        });
    }

    async fn run_pass(
        &self,
        key: ResourceKey,
        pass: u64,
        trigger: Trigger,
        cancel: watch::Receiver<bool>,
    ) {
        let Trigger { event, generation } = trigger;

        let outcome = match event.kind {
            TriggerKind::Resume => self.resume.on_resume_until(event, cancel).await,
            TriggerKind::Create | TriggerKind::Update => {
                self.controller.handle_until(event, cancel).await
            }
        };

        match outcome {
            Ok(status) => match self.storage.publish_status(&key, generation, status).await {
                Ok(true) => tracing::debug!(resource = %key, generation, "Published status"),
                Ok(false) => tracing::debug!(resource = %key, generation, "Discarded stale status"),
                Err(e) => tracing::error!(resource = %key, error = %e, "Failed to publish status"),
            },
            Err(ReconcileError::Cancelled) => {
                tracing::debug!(resource = %key, generation, "Pass cancelled");
            }
            Err(e) => {
                tracing::warn!(resource = %key, generation, error = %e, "Reconciliation failed");
            }
        }

        self.in_flight
            .remove_if(&key, |_, in_flight| in_flight.pass == pass);
    }
}
