//! Built-in metric backends.

mod influxdb;
mod prometheus;

pub use influxdb::InfluxDbBackend;
pub use prometheus::PrometheusBackend;

use anomaly_types::FetchError;
use reqwest::Url;

use crate::client::display_url;

fn parse_base_url(backend: &str, metric_url: &str) -> Result<Url, FetchError> {
    Url::parse(metric_url.trim()).map_err(|e| invalid_url(backend, metric_url, e.to_string()))
}

fn invalid_url(backend: &str, metric_url: &str, message: String) -> FetchError {
    FetchError::InvalidUrl {
        backend: backend.to_string(),
        url: display_url(metric_url),
        message,
    }
}
