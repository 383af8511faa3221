//! Detector resource handlers

use crate::api::rest::state::AppState;
use crate::error::{ApiError, ApiResult};
use crate::storage::StoredDetector;
use anomaly_types::{DetectorSpec, ReconciliationStatus, ResourceKey};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

/// Apply detector response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApplyDetectorResponse {
    pub namespace: String,
    pub name: String,
    pub generation: u64,
    pub created: bool,
}

/// Reconcile trigger response
#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub namespace: String,
    pub name: String,
    pub generation: u64,
}

/// Delete response
#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// List all detectors. Credential values are masked.
pub async fn list_detectors(State(state): State<AppState>) -> ApiResult<Json<Vec<StoredDetector>>> {
    let detectors = state.storage.list_detectors().await?;
    Ok(Json(detectors.iter().map(StoredDetector::redacted).collect()))
}

/// Get a detector with its last published status. Credential values are
/// masked.
pub async fn get_detector(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<StoredDetector>> {
    let key = ResourceKey::new(namespace, name);
    let detector = state
        .storage
        .get_detector(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Detector {} not found", key)))?;

    Ok(Json(detector.redacted()))
}

/// Get the last published status of a detector
pub async fn get_detector_status(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<ReconciliationStatus>> {
    let key = ResourceKey::new(namespace, name);
    let detector = state
        .storage
        .get_detector(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Detector {} not found", key)))?;

    let status = detector
        .status
        .ok_or_else(|| ApiError::NotFound(format!("No status published yet for {}", key)))?;

    Ok(Json(status))
}

/// Create or replace a detector spec
pub async fn apply_detector(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(spec): Json<DetectorSpec>,
) -> ApiResult<(StatusCode, Json<ApplyDetectorResponse>)> {
    if spec.namespace != namespace || spec.name != name {
        return Err(ApiError::BadRequest(
            "Detector name and namespace in body do not match path".to_string(),
        ));
    }

    spec.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let (stored, created) = state.scheduler.apply(spec).await?;

    tracing::info!(
        resource = %stored.key(),
        generation = stored.generation,
        created,
        "Applied detector"
    );

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ApplyDetectorResponse {
            namespace,
            name,
            generation: stored.generation,
            created,
        }),
    ))
}

/// Trigger a new pass for a stored detector
pub async fn reconcile_detector(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<(StatusCode, Json<ReconcileResponse>)> {
    let key = ResourceKey::new(namespace, name);
    let stored = state.scheduler.retrigger(&key).await?;

    tracing::info!(resource = %key, generation = stored.generation, "Reconcile requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(ReconcileResponse {
            namespace: key.namespace,
            name: key.name,
            generation: stored.generation,
        }),
    ))
}

/// Delete a detector
pub async fn delete_detector(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> ApiResult<Json<DeleteResponse>> {
    let key = ResourceKey::new(namespace, name);

    if !state.scheduler.remove(&key).await? {
        return Err(ApiError::NotFound(format!("Detector {} not found", key)));
    }

    tracing::info!(resource = %key, "Deleted detector");

    Ok(Json(DeleteResponse { deleted: true }))
}
