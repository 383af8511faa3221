//! Storage trait definitions

use crate::error::StorageError;
use anomaly_types::{DetectorSpec, ReconciliationStatus, ResourceKey};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// A declared detector and what was last published for it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDetector {
    pub spec: DetectorSpec,

    /// Last published status; `None` until the first pass completes
    pub status: Option<ReconciliationStatus>,

    /// Bumped on every trigger
    pub generation: u64,

    /// Generation the current status was computed for
    pub observed_generation: Option<u64>,

    pub updated_at: DateTime<Utc>,
}

impl StoredDetector {
    pub fn key(&self) -> ResourceKey {
        self.spec.key()
    }

    /// Copy safe to return from the API, with credential values masked
    pub fn redacted(&self) -> Self {
        Self {
            spec: self.spec.redacted(),
            ..self.clone()
        }
    }
}

/// Storage for detector resources
#[async_trait]
pub trait DetectorStorage: Send + Sync {
    /// Get a detector by key
    async fn get_detector(&self, key: &ResourceKey) -> StorageResult<Option<StoredDetector>>;

    /// List all detectors, ordered by key
    async fn list_detectors(&self) -> StorageResult<Vec<StoredDetector>>;

    /// Create or replace the spec and bump the generation.
    ///
    /// Returns the stored record and whether it was newly created. The
    /// previous status is kept until a newer pass publishes.
    async fn upsert_spec(&self, spec: DetectorSpec) -> StorageResult<(StoredDetector, bool)>;

    /// Bump the generation of an existing detector
    async fn bump_generation(&self, key: &ResourceKey) -> StorageResult<StoredDetector>;

    /// Replace the status if `generation` is still the latest.
    ///
    /// Returns `false` when the pass was superseded or the detector deleted.
    async fn publish_status(
        &self,
        key: &ResourceKey,
        generation: u64,
        status: ReconciliationStatus,
    ) -> StorageResult<bool>;

    /// Delete a detector
    async fn delete_detector(&self, key: &ResourceKey) -> StorageResult<bool>;
}
