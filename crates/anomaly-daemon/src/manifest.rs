//! Detector manifests loaded at startup

use crate::error::{DaemonError, DaemonResult};
use anomaly_types::{DetectorSpec, MetricSpec};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_NAMESPACE: &str = "default";

const RESOURCE_KIND: &str = "AnomalyDetector";

/// Kubernetes-style `AnomalyDetector` resource
#[derive(Debug, Deserialize)]
struct ResourceManifest {
    metadata: Metadata,
    #[serde(default)]
    spec: ResourceSpec,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ResourceSpec {
    #[serde(default)]
    metrics: Vec<MetricSpec>,
}

/// Parse a manifest document. JSON is accepted as YAML.
///
/// A document with a top-level `kind` is a resource; anything else is a
/// bare spec.
pub fn parse_manifest(source: &str) -> Result<DetectorSpec, String> {
    let document: serde_yaml::Value = serde_yaml::from_str(source).map_err(|e| e.to_string())?;

    let kind = match document.get("kind") {
        None => return serde_yaml::from_value(document).map_err(|e| e.to_string()),
        Some(kind) => kind
            .as_str()
            .ok_or_else(|| "kind must be a string".to_string())?,
    };
    if kind != RESOURCE_KIND {
        return Err(format!(
            "unsupported kind '{}', expected '{}'",
            kind, RESOURCE_KIND
        ));
    }

    let resource: ResourceManifest =
        serde_yaml::from_value(document).map_err(|e| format!("invalid {}: {}", RESOURCE_KIND, e))?;

    Ok(DetectorSpec {
        name: resource.metadata.name,
        namespace: resource
            .metadata
            .namespace
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        metrics: resource.spec.metrics,
    })
}

/// Read and validate a manifest file
pub async fn load_manifest(path: &Path) -> DaemonResult<DetectorSpec> {
    let invalid = |message: String| DaemonError::Manifest {
        path: path.display().to_string(),
        message,
    };

    let source = tokio::fs::read_to_string(path).await?;
    let spec = parse_manifest(&source).map_err(invalid)?;
    spec.validate().map_err(|e| invalid(e.to_string()))?;
    Ok(spec)
}
