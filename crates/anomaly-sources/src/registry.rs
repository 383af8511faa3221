//! Registry of metric backend strategies keyed by identifier.

use anomaly_types::{ConfigurationError, FetchError};
use reqwest::Url;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::backends::{InfluxDbBackend, PrometheusBackend};
use crate::raw::RawSeries;

/// Request-shaping and response-extraction policy of one backend.
pub trait MetricBackend: Send + Sync {
    /// Identifier used in `metricSource`
    fn id(&self) -> &'static str;

    /// Full request URL for `query` against `metric_url`.
    fn request_url(&self, metric_url: &str, query: &str) -> Result<Url, FetchError>;

    /// Extract labelled raw series from a decoded response body.
    ///
    /// An `Err` carries a message describing why the body is unusable.
    fn extract(&self, body: Value) -> Result<Vec<RawSeries>, String>;
}

/// Identifier → backend map. Lookups ignore case and surrounding whitespace.
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn MetricBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in backend
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PrometheusBackend));
        registry.register(Arc::new(InfluxDbBackend));
        registry
    }

    /// Register a backend, replacing any previous one with the same id.
    pub fn register(&mut self, backend: Arc<dyn MetricBackend>) {
        self.backends.insert(normalize_id(backend.id()), backend);
    }

    pub fn get(&self, source: &str) -> Option<Arc<dyn MetricBackend>> {
        self.backends.get(&normalize_id(source)).cloned()
    }

    /// Resolve `source`, or fail with a configuration error.
    pub fn resolve(&self, source: &str) -> Result<Arc<dyn MetricBackend>, ConfigurationError> {
        self.get(source)
            .ok_or_else(|| ConfigurationError::UnknownSource(source.to_string()))
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> Vec<&str> {
        self.backends.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("backends", &self.ids())
            .finish()
    }
}

fn normalize_id(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}
