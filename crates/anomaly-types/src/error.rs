//! Error taxonomy for reconciliation.
//!
//! Per-metric errors (`ConfigurationError`, `FetchError`, `DetectionError`)
//! never leave a pipeline; they are folded into a failed `MetricResult`.
//! Only `ReconcileError` fails a whole pass.

use thiserror::Error;

/// Structural problems that fail the whole pass before any pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecValidationError {
    #[error("detector name cannot be empty")]
    EmptyName,

    #[error("detector namespace cannot be empty")]
    EmptyNamespace,
}

/// Invalid configuration of a single metric.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The metric names a backend that is not registered.
    #[error("unknown metric source '{0}'")]
    UnknownSource(String),

    #[error("metricURL is required")]
    MissingUrl,

    #[error("metricQuery is required")]
    MissingQuery,
}

/// Failure to fetch raw metric data from a backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Backend answered with a non-success status.
    #[error("{backend} returned HTTP {status}: {body}")]
    Status {
        backend: String,
        status: u16,
        body: String,
    },

    /// Connection, TLS or protocol failure.
    #[error("{backend} request failed: {message}")]
    Transport { backend: String, message: String },

    /// No response within the fetch deadline.
    #[error("{backend} request timed out after {timeout_ms}ms")]
    Timeout { backend: String, timeout_ms: u64 },

    /// Response could not be decoded into metric data.
    #[error("invalid {backend} response: {message}")]
    MalformedResponse { backend: String, message: String },

    #[error("invalid {backend} URL '{url}': {message}")]
    InvalidUrl {
        backend: String,
        url: String,
        message: String,
    },

    #[error("no backend registered for '{0}'")]
    UnknownBackend(String),
}

/// Raw data could not be turned into a canonical time series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizationError {
    #[error("metric data contains no usable points")]
    EmptySeries,

    #[error("malformed timestamp {0}")]
    MalformedTimestamp(String),
}

/// The detection engine itself failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("insufficient data: need at least {required} points in one series, longest has {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("engine failed: {0}")]
    Failed(String),
}

/// Failure to produce an anomaly result from fetched data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetectionError {
    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("detection timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

/// Classified failure of one metric pipeline.
///
/// The display prefix is the classification shown in `errorMessage`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("detection error: {0}")]
    Detection(#[from] DetectionError),
}

impl PipelineError {
    /// Short classification label, safe for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Configuration(_) => "configuration",
            PipelineError::Fetch(_) => "fetch",
            PipelineError::Detection(_) => "detection",
        }
    }
}

/// Pass-level failure surfaced to the trigger layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("invalid detector spec: {0}")]
    InvalidSpec(#[from] SpecValidationError),

    /// The pass was superseded or shut down; nothing was published.
    #[error("reconciliation cancelled")]
    Cancelled,
}

/// Result type for reconciliation passes
pub type ReconcileResult<T> = Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classified_messages() {
        let err = PipelineError::from(ConfigurationError::UnknownSource("graphite".into()));
        assert_eq!(
            err.to_string(),
            "configuration error: unknown metric source 'graphite'"
        );
        assert_eq!(err.kind(), "configuration");

        let err = PipelineError::from(FetchError::Status {
            backend: "prometheus".into(),
            status: 500,
            body: "boom".into(),
        });
        assert_eq!(
            err.to_string(),
            "fetch error: prometheus returned HTTP 500: boom"
        );

        let err = PipelineError::from(DetectionError::from(NormalizationError::EmptySeries));
        assert_eq!(
            err.to_string(),
            "detection error: normalization failed: metric data contains no usable points"
        );
    }
}
