//! Pull-based compliance status observation.

use opentelemetry::KeyValue;

use crate::claims::{ClaimStore, ConformanceClaim};

/// One gauge reading for a (resource, requirement, method) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeSample {
    pub value: f64,
    pub resource: String,
    pub requirement_id: String,
    /// The claim id.
    pub attestation_id: String,
    pub method_id: String,
    /// The catalog id.
    pub baseline_id: String,
    pub raw_status: String,
}

impl GaugeSample {
    pub fn attributes(&self) -> Vec<KeyValue> {
        vec![
            KeyValue::new("resource", self.resource.clone()),
            KeyValue::new("requirement_id", self.requirement_id.clone()),
            KeyValue::new("attestation_id", self.attestation_id.clone()),
            KeyValue::new("method_id", self.method_id.clone()),
            KeyValue::new("baseline_id", self.baseline_id.clone()),
            KeyValue::new("assessment_status_raw", self.raw_status.clone()),
        ]
    }
}

/// Reads the claim store on demand and turns it into gauge samples.
///
/// Only holds the store's read lock while the snapshot is copied, so an
/// observation never stalls ingestion beyond that.
#[derive(Debug, Clone)]
pub struct ComplianceObserver {
    store: ClaimStore,
}

impl ComplianceObserver {
    pub fn new(store: ClaimStore) -> Self {
        Self { store }
    }

    /// One sample per assessment method of every stored claim.
    pub fn observe(&self) -> Vec<GaugeSample> {
        self.store.snapshot().iter().flat_map(samples_for).collect()
    }
}

fn samples_for(claim: &ConformanceClaim) -> Vec<GaugeSample> {
    claim
        .assessment
        .methods
        .iter()
        .map(|method| GaugeSample {
            value: method.status().gauge_value(),
            resource: claim.resource_ref.clone(),
            requirement_id: claim.assessment.requirement_id.clone(),
            attestation_id: claim.claim_id.clone(),
            method_id: method.name.clone(),
            baseline_id: claim.catalog_id.clone(),
            raw_status: method.status().as_str().to_string(),
        })
        .collect()
}
