//! AnomalyDetector resource specification
//!
//! The spec is the read-only input of a reconciliation pass. It is supplied
//! fresh by the trigger layer on every create, update and resume event.

use crate::error::{ConfigurationError, SpecValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

const REDACTED: &str = "<redacted>";

/// Desired state of one AnomalyDetector resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectorSpec {
    /// Resource name
    pub name: String,

    /// Resource namespace
    pub namespace: String,

    /// Metric pipelines, in declaration order
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

impl DetectorSpec {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            metrics: Vec::new(),
        }
    }

    pub fn with_metric(mut self, metric: MetricSpec) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Copy with every credential value masked, for display
    pub fn redacted(&self) -> Self {
        Self {
            metrics: self.metrics.iter().map(MetricSpec::redacted).collect(),
            ..self.clone()
        }
    }

    /// Key identifying this resource in the trigger layer
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(&self.namespace, &self.name)
    }

    /// Structural validation run before any pipeline starts.
    ///
    /// Per-metric problems are not checked here; they become failure results
    /// for the metric concerned.
    pub fn validate(&self) -> Result<(), SpecValidationError> {
        if self.name.trim().is_empty() {
            return Err(SpecValidationError::EmptyName);
        }

        if self.namespace.trim().is_empty() {
            return Err(SpecValidationError::EmptyNamespace);
        }

        Ok(())
    }
}

/// Configuration of one metric pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Backend identifier (`prometheus`, `influxdb`, ...)
    #[serde(rename = "metricSource", default)]
    pub metric_source: String,

    /// Backend base URL
    #[serde(rename = "metricURL", default)]
    pub metric_url: String,

    /// Backend-specific query string
    #[serde(rename = "metricQuery", default)]
    pub metric_query: String,

    /// Optional credentials
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<MetricAuth>,
}

impl MetricSpec {
    pub fn new(
        metric_source: impl Into<String>,
        metric_url: impl Into<String>,
        metric_query: impl Into<String>,
    ) -> Self {
        Self {
            metric_source: metric_source.into(),
            metric_url: metric_url.into(),
            metric_query: metric_query.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, auth: MetricAuth) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Per-metric structural checks. The backend identifier is checked
    /// against the registry by the pipeline, not here.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.metric_url.trim().is_empty() {
            return Err(ConfigurationError::MissingUrl);
        }

        if self.metric_query.trim().is_empty() {
            return Err(ConfigurationError::MissingQuery);
        }

        Ok(())
    }

    /// Credentials to present to the backend, if any
    pub fn credentials(&self) -> Option<Credentials> {
        self.auth.as_ref().and_then(MetricAuth::credentials)
    }

    pub fn redacted(&self) -> Self {
        Self {
            auth: self.auth.as_ref().map(MetricAuth::redacted),
            ..self.clone()
        }
    }
}

/// Credential material declared on a metric
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAuth {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bearer_token: Option<String>,
}

impl MetricAuth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            password: Some(password.into()),
            bearer_token: None,
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(token.into()),
            ..Default::default()
        }
    }

    /// Copy with secrets replaced by a fixed marker. The username is kept.
    pub fn redacted(&self) -> Self {
        let mask = |secret: &Option<String>| secret.as_ref().map(|_| REDACTED.to_string());
        Self {
            username: self.username.clone(),
            password: mask(&self.password),
            bearer_token: mask(&self.bearer_token),
        }
    }

    /// Resolve the credentials to use. A bearer token wins over a
    /// username/password pair; basic auth needs at least a username.
    pub fn credentials(&self) -> Option<Credentials> {
        if let Some(token) = non_empty(self.bearer_token.as_deref()) {
            return Some(Credentials::Bearer(token.to_string()));
        }

        non_empty(self.username.as_deref()).map(|username| Credentials::Basic {
            username: username.to_string(),
            password: self.password.clone(),
        })
    }
}

impl fmt::Debug for MetricAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| REDACTED),
            )
            .finish()
    }
}

/// Resolved credentials, exactly one scheme
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Basic {
        username: String,
        password: Option<String>,
    },
}

impl Credentials {
    /// Scheme name, safe to log
    pub fn scheme(&self) -> &'static str {
        match self {
            Credentials::Bearer(_) => "bearer",
            Credentials::Basic { .. } => "basic",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Bearer(_) => write!(f, "Bearer({})", REDACTED),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &REDACTED)
                .finish(),
        }
    }
}

/// `namespace/name` key of a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_takes_precedence() {
        let auth = MetricAuth {
            username: Some("admin".into()),
            password: Some("secret".into()),
            bearer_token: Some("tok".into()),
        };

        assert_eq!(auth.credentials(), Some(Credentials::Bearer("tok".into())));
    }

    #[test]
    fn test_basic_requires_username() {
        let auth = MetricAuth {
            username: None,
            password: Some("secret".into()),
            bearer_token: Some("  ".into()),
        };
        assert_eq!(auth.credentials(), None);

        let auth = MetricAuth {
            username: Some("admin".into()),
            password: None,
            bearer_token: None,
        };
        assert_eq!(
            auth.credentials(),
            Some(Credentials::Basic {
                username: "admin".into(),
                password: None,
            })
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let auth = MetricAuth {
            username: Some("admin".into()),
            password: Some("hunter2".into()),
            bearer_token: Some("abc.def".into()),
        };

        let rendered = format!("{:?} {:?}", auth, auth.credentials().unwrap());
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("abc.def"));
        assert!(rendered.contains("admin"));
    }

    #[test]
    fn test_redacted_spec_masks_secrets() {
        let spec = DetectorSpec::new("d", "ns").with_metric(
            MetricSpec::new("prometheus", "http://prom", "up").with_auth(MetricAuth {
                username: Some("admin".into()),
                password: Some("hunter2".into()),
                bearer_token: Some("abc.def".into()),
            }),
        );

        let redacted = spec.redacted();
        let auth = redacted.metrics[0].auth.as_ref().unwrap();
        assert_eq!(auth.username.as_deref(), Some("admin"));
        assert_eq!(auth.password.as_deref(), Some("<redacted>"));
        assert_eq!(auth.bearer_token.as_deref(), Some("<redacted>"));
        assert_eq!(redacted.metrics[0].metric_query, "up");

        // the original is untouched
        assert_eq!(
            spec.metrics[0].credentials(),
            Some(Credentials::Bearer("abc.def".into()))
        );
    }

    #[test]
    fn test_spec_deserializes_resource_fields() {
        let spec: DetectorSpec = serde_json::from_value(serde_json::json!({
            "name": "checkout",
            "namespace": "shop",
            "metrics": [
                {
                    "metricSource": "prometheus",
                    "metricURL": "http://prom:9090/api/v1/query",
                    "metricQuery": "rate(http_requests_total[5m])",
                    "auth": { "bearerToken": "tok" }
                },
                { "metricSource": "influxdb" }
            ]
        }))
        .unwrap();

        assert_eq!(spec.metrics.len(), 2);
        assert_eq!(spec.metrics[0].metric_url, "http://prom:9090/api/v1/query");
        assert_eq!(
            spec.metrics[0].credentials(),
            Some(Credentials::Bearer("tok".into()))
        );
        assert_eq!(
            spec.metrics[1].validate(),
            Err(ConfigurationError::MissingUrl)
        );
    }

    #[test]
    fn test_spec_validation() {
        assert!(DetectorSpec::new("d", "ns").validate().is_ok());
        assert_eq!(
            DetectorSpec::new("", "ns").validate(),
            Err(SpecValidationError::EmptyName)
        );
        assert_eq!(
            DetectorSpec::new("d", " ").validate(),
            Err(SpecValidationError::EmptyNamespace)
        );
    }

    #[test]
    fn test_metrics_default_to_empty() {
        let spec: DetectorSpec =
            serde_json::from_str(r#"{"name":"d","namespace":"ns"}"#).unwrap();
        assert!(spec.metrics.is_empty());
        assert_eq!(spec.key().to_string(), "ns/d");
    }
}
