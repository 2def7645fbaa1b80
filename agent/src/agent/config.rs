//! Agent configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::controls::AssessmentPlan;
use crate::error::{ComplianceError, ComplianceResult};

/// Pending evidence records held before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// How long `stop` waits for the worker and backends to finish.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 7;

/// Metrics export period when a telemetry endpoint is configured.
pub const DEFAULT_METRICS_INTERVAL_SECS: u64 = 5;

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    /// Capacity of the ingestion queue.
    pub queue_capacity: usize,
    /// Upper bound on how long `stop` blocks the caller.
    pub shutdown_timeout_secs: u64,
    /// OTLP/gRPC collector endpoint. Metrics are not wired when absent.
    pub otel_endpoint: Option<String>,
    /// Period of the metrics push to the collector.
    pub metrics_interval_secs: u64,
    /// `service.name` resource attribute reported with metrics.
    pub service_name: String,
    /// Catalog placement of every claim.
    pub plan: AssessmentPlan,
}

impl AgentConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> ComplianceResult<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            ComplianceError::io_error(format!("cannot read config '{}': {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|e| {
            ComplianceError::serialization_error(format!(
                "invalid config '{}': {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }

    pub fn validate(&self) -> ComplianceResult<()> {
        if self.queue_capacity == 0 {
            return Err(ComplianceError::lifecycle_error(
                "queue_capacity must be at least 1",
            ));
        }
        if self.otel_endpoint.is_some() && self.metrics_interval_secs == 0 {
            return Err(ComplianceError::telemetry_error(
                "metrics_interval_secs must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            otel_endpoint: None,
            metrics_interval_secs: DEFAULT_METRICS_INTERVAL_SECS,
            service_name: "comply-agent".to_string(),
            plan: AssessmentPlan::default(),
        }
    }
}

/// Whether a run ingests its evidence once or on a fixed interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    OneShot,
    Continuous { interval: Duration },
}

impl RunMode {
    /// `Continuous` when an interval is given, `OneShot` otherwise.
    pub fn from_interval_secs(interval_secs: Option<u64>) -> Self {
        match interval_secs {
            Some(secs) if secs > 0 => Self::Continuous {
                interval: Duration::from_secs(secs),
            },
            _ => Self::OneShot,
        }
    }
}
