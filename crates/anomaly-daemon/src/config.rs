//! Configuration for anomaly-daemon

use anomaly_control::PipelineConfig;
use anomaly_detect::ZScoreEngine;
use anomaly_sources::SourceConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Per-metric pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Baseline detection engine
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address
    pub listen_addr: SocketAddr,

    /// Allow cross-origin requests from any origin
    #[serde(default)]
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            enable_cors: false,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Level-triggered resync of every stored resource, in seconds
    #[serde(default = "default_resync_interval")]
    pub resync_interval_secs: u64,

    /// Capacity of the trigger queue
    #[serde(default = "default_trigger_queue")]
    pub trigger_queue_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: default_resync_interval(),
            trigger_queue_size: default_trigger_queue(),
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_detect_timeout")]
    pub detect_timeout_secs: u64,

    /// Pipelines running at once within one pass
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Honor HTTP(S)_PROXY for backend requests
    #[serde(default)]
    pub use_system_proxy: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_fetch_timeout(),
            detect_timeout_secs: default_detect_timeout(),
            max_concurrency: default_max_concurrency(),
            use_system_proxy: false,
        }
    }
}

impl PipelineSettings {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            detect_timeout: Duration::from_secs(self.detect_timeout_secs),
        }
    }

    pub fn source_config(&self) -> SourceConfig {
        SourceConfig {
            request_timeout: Duration::from_secs(self.fetch_timeout_secs),
            use_system_proxy: self.use_system_proxy,
        }
    }
}

/// Z-score engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    #[serde(default = "default_z_threshold")]
    pub z_threshold: f64,

    #[serde(default = "default_min_points")]
    pub min_points: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            z_threshold: default_z_threshold(),
            min_points: default_min_points(),
        }
    }
}

impl DetectionConfig {
    pub fn engine(&self) -> ZScoreEngine {
        ZScoreEngine::new(self.z_threshold, self.min_points)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_resync_interval() -> u64 {
    60
}

fn default_trigger_queue() -> usize {
    256
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_detect_timeout() -> u64 {
    10
}

fn default_max_concurrency() -> usize {
    anomaly_control::DEFAULT_MAX_CONCURRENCY
}

fn default_z_threshold() -> f64 {
    3.0
}

fn default_min_points() -> usize {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DaemonConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `ANOMALY_`-prefixed environment variables (`__` between sections,
    /// e.g. `ANOMALY_PIPELINE__FETCH_TIMEOUT_SECS`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default configuration
        builder = builder.add_source(config::Config::try_from(&DaemonConfig::default())?);

        // Add file configuration if provided
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ANOMALY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the daemon cannot run with
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        let invalid = |msg: &str| Err(config::ConfigError::Message(msg.to_string()));

        if self.scheduler.resync_interval_secs == 0 {
            return invalid("scheduler.resync_interval_secs must be greater than 0");
        }
        if self.scheduler.trigger_queue_size == 0 {
            return invalid("scheduler.trigger_queue_size must be greater than 0");
        }
        if self.pipeline.fetch_timeout_secs == 0 || self.pipeline.detect_timeout_secs == 0 {
            return invalid("pipeline timeouts must be greater than 0");
        }
        if self.pipeline.max_concurrency == 0 {
            return invalid("pipeline.max_concurrency must be greater than 0");
        }
        if !(self.detection.z_threshold.is_finite() && self.detection.z_threshold > 0.0) {
            return invalid("detection.z_threshold must be a positive number");
        }

        Ok(())
    }
}
