//! OpenTelemetry metrics for the ingestion pipeline.
//!
//! Two instruments are registered per agent:
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `evidence_processed` | Counter | `evidence_source`, `evidence_resource` |
//! | `compliance_assessment_status` | Observable gauge | `resource`, `requirement_id`, `attestation_id`, `method_id`, `baseline_id`, `assessment_status_raw` |
//!
//! The gauge has no internal timer; its callback runs whenever the SDK
//! reader collects.

pub mod observer;

use std::time::Duration;

use opentelemetry::metrics::{Counter, Meter, MeterProvider as _, ObservableGauge};
use opentelemetry::KeyValue;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::{runtime, Resource};
use tonic::transport::{Channel, Endpoint};

use crate::claims::ClaimStore;
use crate::error::{ComplianceError, ComplianceResult};
use crate::evidence::RawEvidence;

pub use observer::{ComplianceObserver, GaugeSample};

/// Instrumentation scope name for the agent's meter.
pub const METER_NAME: &str = "comply-agent";

/// Instrument handles owned by one agent.
pub struct ComplianceMetrics {
    evidence_processed: Counter<u64>,
    _assessment_status: ObservableGauge<f64>,
}

impl ComplianceMetrics {
    /// Register the counter and the store-backed gauge on `meter`.
    pub fn register(meter: &Meter, store: ClaimStore) -> Self {
        let evidence_processed = meter
            .u64_counter("evidence_processed")
            .with_description("The number of evidence artifacts processed.")
            .with_unit("1")
            .init();

        let observer = ComplianceObserver::new(store);
        let assessment_status = meter
            .f64_observable_gauge("compliance_assessment_status")
            .with_description(
                "Current compliance assessment status (1=COMPLIANT, 0=NOT_COMPLIANT, -1=NOT_APPLICABLE)",
            )
            .with_callback(move |instrument| {
                for sample in observer.observe() {
                    instrument.observe(sample.value, &sample.attributes());
                }
            })
            .init();

        Self {
            evidence_processed,
            _assessment_status: assessment_status,
        }
    }

    /// Count one successfully processed evidence record.
    pub fn record_processed(&self, evidence: &RawEvidence) {
        self.evidence_processed.add(
            1,
            &[
                KeyValue::new("evidence_source", evidence.source.to_string()),
                KeyValue::new("evidence_resource", evidence.resource.name.clone()),
            ],
        );
    }
}

/// Upper bound on the initial connection to the metrics collector.
pub const COLLECTOR_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to the collector at `endpoint`, waiting at most `timeout`.
///
/// An unreachable collector is a configuration error, so this fails
/// instead of leaving the exporter to retry in the background.
pub async fn connect_collector(endpoint: &str, timeout: Duration) -> ComplianceResult<Channel> {
    let target = Endpoint::from_shared(endpoint.to_string()).map_err(|e| {
        ComplianceError::telemetry_error(format!("invalid collector endpoint '{}': {}", endpoint, e))
    })?;

    match tokio::time::timeout(timeout, target.connect_timeout(timeout).connect()).await {
        Ok(Ok(channel)) => Ok(channel),
        Ok(Err(e)) => Err(ComplianceError::telemetry_error(format!(
            "collector at '{}' is unreachable: {}",
            endpoint, e
        ))),
        Err(_) => Err(ComplianceError::telemetry_error(format!(
            "connecting to collector at '{}' timed out after {:?}",
            endpoint, timeout
        ))),
    }
}

/// Build an OTLP/gRPC meter provider exporting every `interval`.
///
/// Connects to the collector first and fails if it cannot be reached.
/// Must be called from within a Tokio runtime.
pub async fn init_meter_provider(
    endpoint: &str,
    service_name: &str,
    interval: Duration,
) -> ComplianceResult<SdkMeterProvider> {
    let channel = connect_collector(endpoint, COLLECTOR_CONNECT_TIMEOUT).await?;

    opentelemetry_otlp::new_pipeline()
        .metrics(runtime::Tokio)
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(endpoint.to_string())
                .with_channel(channel),
        )
        .with_period(interval)
        .with_resource(Resource::new(vec![KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]))
        .build()
        .map_err(|e| {
            ComplianceError::telemetry_error(format!(
                "metrics pipeline setup for '{}' failed: {}",
                endpoint, e
            ))
        })
}

/// The agent's meter from `provider`.
pub fn agent_meter(provider: &SdkMeterProvider) -> Meter {
    provider.meter(METER_NAME)
}

/// Flush and shut down `provider` without blocking the async runtime.
pub async fn shutdown_meter_provider(provider: SdkMeterProvider) -> ComplianceResult<()> {
    tokio::task::spawn_blocking(move || provider.shutdown())
        .await
        .map_err(|e| ComplianceError::telemetry_error(format!("shutdown task failed: {}", e)))?
        .map_err(|e| ComplianceError::telemetry_error(format!("meter provider shutdown: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReasonCode;
    use crate::evidence::Resource;

    #[test]
    fn test_register_on_noop_meter() {
        let meter = opentelemetry::global::meter("comply-agent-test");
        let metrics = ComplianceMetrics::register(&meter, ClaimStore::new());
        metrics.record_processed(&RawEvidence::new(
            "OPA",
            "rbac",
            "allow",
            Resource::new("api-request-001"),
        ));
    }

    #[tokio::test]
    async fn test_register_on_sdk_provider() {
        let provider = SdkMeterProvider::builder().build();
        let metrics = ComplianceMetrics::register(&agent_meter(&provider), ClaimStore::new());
        metrics.record_processed(&RawEvidence::new(
            "Kyverno",
            "psp",
            "mutate",
            Resource::new("pod"),
        ));
        shutdown_meter_provider(provider).await.ok();
    }

    #[tokio::test]
    async fn test_unreachable_collector_is_rejected() {
        let err = connect_collector("http://127.0.0.1:1", Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_eq!(err.reason(), ReasonCode::TelemetryFailed as u32);
    }

    #[tokio::test]
    async fn test_malformed_collector_endpoint_is_rejected() {
        let err = init_meter_provider("not a uri", "comply-agent", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, ComplianceError::TelemetryError { .. }));
    }
}
