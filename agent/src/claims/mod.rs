//! Conformance claims derived from raw evidence.

pub mod factory;
pub mod store;

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::evidence::DigestSet;

pub use factory::ClaimFactory;
pub use store::ClaimStore;

/// Outcome of one assessment method.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssessmentStatus {
    Compliant,
    NotCompliant,
    NotApplicable,
    /// The source reported a decision its rule does not recognize.
    Indeterminate,
}

impl AssessmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "COMPLIANT",
            Self::NotCompliant => "NOT_COMPLIANT",
            Self::NotApplicable => "NOT_APPLICABLE",
            Self::Indeterminate => "INDETERMINATE",
        }
    }

    /// Gauge value: 1 compliant, 0 not compliant, -1 not applicable, 0 otherwise.
    pub fn gauge_value(&self) -> f64 {
        match self {
            Self::Compliant => 1.0,
            Self::NotCompliant => 0.0,
            Self::NotApplicable => -1.0,
            Self::Indeterminate => 0.0,
        }
    }
}

impl fmt::Display for AssessmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssessmentResult {
    pub status: AssessmentStatus,
}

/// One named check contributing to a requirement's status.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AssessmentMethod {
    /// Method name; the evidence source tag for engine-derived methods.
    pub name: String,
    /// Human-readable account of the decision.
    pub description: String,
    /// Whether the method was executed.
    pub run: bool,
    pub result: AssessmentResult,
}

impl AssessmentMethod {
    pub fn status(&self) -> AssessmentStatus {
        self.result.status
    }
}

/// A requirement and the methods that assessed it, in evaluation order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub requirement_id: String,
    pub methods: Vec<AssessmentMethod>,
}

/// A normalized conformance assertion derived from one evidence record.
///
/// Claims are immutable once built; the store only ever holds complete
/// values.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceClaim {
    /// Globally unique claim identifier (UUID v4).
    pub claim_id: String,
    /// Claim creation time (not evidence time).
    pub timestamp: DateTime<Utc>,
    /// Name of the assessed resource.
    pub resource_ref: String,
    /// Digests of the assessed resource, used as attestation subjects.
    #[serde(default, skip_serializing_if = "DigestSet::is_empty")]
    pub resource_digest: DigestSet,
    /// Content reference of the raw evidence in the durable sink.
    pub raw_evidence_ref: String,
    /// One-line description of the decision and its context.
    pub summary: String,
    pub catalog_id: String,
    pub control_id: String,
    pub assessment: Assessment,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&AssessmentStatus::NotCompliant).unwrap();
        assert_eq!(json, "\"NOT_COMPLIANT\"");
        let parsed: AssessmentStatus = serde_json::from_str("\"NOT_APPLICABLE\"").unwrap();
        assert_eq!(parsed, AssessmentStatus::NotApplicable);
        assert_eq!(AssessmentStatus::Indeterminate.to_string(), "INDETERMINATE");
    }

    #[test]
    fn test_gauge_values() {
        assert_eq!(AssessmentStatus::Compliant.gauge_value(), 1.0);
        assert_eq!(AssessmentStatus::NotCompliant.gauge_value(), 0.0);
        assert_eq!(AssessmentStatus::NotApplicable.gauge_value(), -1.0);
        assert_eq!(AssessmentStatus::Indeterminate.gauge_value(), 0.0);
    }

    #[test]
    fn test_claim_json_field_names() {
        let claim = ConformanceClaim {
            claim_id: "c-1".to_string(),
            timestamp: Utc::now(),
            resource_ref: "db-server-001".to_string(),
            resource_digest: DigestSet::new(),
            raw_evidence_ref: "ab".repeat(32),
            summary: "s".to_string(),
            catalog_id: "cat".to_string(),
            control_id: "CTRL-1".to_string(),
            assessment: Assessment {
                requirement_id: "CTRL-1.1".to_string(),
                methods: vec![AssessmentMethod {
                    name: "OpenSCAP".to_string(),
                    description: "d".to_string(),
                    run: true,
                    result: AssessmentResult {
                        status: AssessmentStatus::Compliant,
                    },
                }],
            },
        };
        let value = serde_json::to_value(&claim).unwrap();
        assert_eq!(value["claimId"], "c-1");
        assert_eq!(value["rawEvidenceRef"], "ab".repeat(32));
        assert_eq!(value["assessment"]["requirement_id"], "CTRL-1.1");
        assert_eq!(value["assessment"]["methods"][0]["result"]["status"], "COMPLIANT");
        assert!(value.get("resourceDigest").is_none());
    }
}
