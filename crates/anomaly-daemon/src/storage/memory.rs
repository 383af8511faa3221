//! In-memory storage implementation

use super::traits::*;
use crate::error::StorageError;
use anomaly_types::{DetectorSpec, ReconciliationStatus, ResourceKey};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory storage for development and testing
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    detectors: Arc<RwLock<BTreeMap<ResourceKey, StoredDetector>>>,
}

impl InMemoryStorage {
    /// Create a new in-memory storage
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DetectorStorage for InMemoryStorage {
    async fn get_detector(&self, key: &ResourceKey) -> StorageResult<Option<StoredDetector>> {
        let detectors = self.detectors.read().await;
        Ok(detectors.get(key).cloned())
    }

    async fn list_detectors(&self) -> StorageResult<Vec<StoredDetector>> {
        let detectors = self.detectors.read().await;
        Ok(detectors.values().cloned().collect())
    }

    async fn upsert_spec(&self, spec: DetectorSpec) -> StorageResult<(StoredDetector, bool)> {
        let mut detectors = self.detectors.write().await;
        let key = spec.key();
        let now = chrono::Utc::now();

        match detectors.get_mut(&key) {
            Some(existing) => {
                existing.spec = spec;
                existing.generation += 1;
                existing.updated_at = now;
                Ok((existing.clone(), false))
            }
            None => {
                let stored = StoredDetector {
                    spec,
                    status: None,
                    generation: 1,
                    observed_generation: None,
                    updated_at: now,
                };
                detectors.insert(key, stored.clone());
                Ok((stored, true))
            }
        }
    }

    async fn bump_generation(&self, key: &ResourceKey) -> StorageResult<StoredDetector> {
        let mut detectors = self.detectors.write().await;
        let existing = detectors
            .get_mut(key)
            .ok_or_else(|| StorageError::NotFound(format!("Detector {} not found", key)))?;

        existing.generation += 1;
        existing.updated_at = chrono::Utc::now();
        Ok(existing.clone())
    }

    async fn publish_status(
        &self,
        key: &ResourceKey,
        generation: u64,
        status: ReconciliationStatus,
    ) -> StorageResult<bool> {
        let mut detectors = self.detectors.write().await;
        let Some(existing) = detectors.get_mut(key) else {
            return Ok(false);
        };

        if existing.generation != generation {
            return Ok(false);
        }

        existing.status = Some(status);
        existing.observed_generation = Some(generation);
        existing.updated_at = chrono::Utc::now();
        Ok(true)
    }

    async fn delete_detector(&self, key: &ResourceKey) -> StorageResult<bool> {
        let mut detectors = self.detectors.write().await;
        Ok(detectors.remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anomaly_types::{MetricResult, MetricSpec};

    fn spec() -> DetectorSpec {
        DetectorSpec::new("web", "prod").with_metric(MetricSpec::new(
            "prometheus",
            "http://prom",
            "up",
        ))
    }

    fn status() -> ReconciliationStatus {
        ReconciliationStatus::new(vec![MetricResult::failure("up", "fetch error: boom")])
    }

    #[tokio::test]
    async fn test_upsert_bumps_generation() {
        let storage = InMemoryStorage::new();

        let (first, created) = storage.upsert_spec(spec()).await.unwrap();
        assert!(created);
        assert_eq!(first.generation, 1);

        let (second, created) = storage.upsert_spec(spec()).await.unwrap();
        assert!(!created);
        assert_eq!(second.generation, 2);
    }

    #[tokio::test]
    async fn test_publish_requires_latest_generation() {
        let storage = InMemoryStorage::new();
        let key = spec().key();
        storage.upsert_spec(spec()).await.unwrap();
        storage.bump_generation(&key).await.unwrap();

        assert!(!storage.publish_status(&key, 1, status()).await.unwrap());
        assert!(storage.publish_status(&key, 2, status()).await.unwrap());

        let stored = storage.get_detector(&key).await.unwrap().unwrap();
        assert_eq!(stored.status, Some(status()));
        assert_eq!(stored.observed_generation, Some(2));
    }

    #[tokio::test]
    async fn test_update_keeps_previous_status() {
        let storage = InMemoryStorage::new();
        let key = spec().key();
        storage.upsert_spec(spec()).await.unwrap();
        storage.publish_status(&key, 1, status()).await.unwrap();

        let (stored, _) = storage.upsert_spec(spec()).await.unwrap();
        assert_eq!(stored.status, Some(status()));
        assert_eq!(stored.observed_generation, Some(1));
    }

    #[tokio::test]
    async fn test_publish_after_delete_is_dropped() {
        let storage = InMemoryStorage::new();
        let key = spec().key();
        storage.upsert_spec(spec()).await.unwrap();
        assert!(storage.delete_detector(&key).await.unwrap());

        assert!(!storage.publish_status(&key, 1, status()).await.unwrap());
        assert!(storage.get_detector(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bump_missing_is_not_found() {
        let storage = InMemoryStorage::new();
        let err = storage
            .bump_generation(&ResourceKey::new("prod", "missing"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
