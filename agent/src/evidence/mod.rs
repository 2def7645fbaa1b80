//! Raw evidence records emitted by policy engines.

pub mod canonical;

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use canonical::{canonical_bytes, content_reference};

/// Algorithm name to hex digest, e.g. `{"sha256": "e3b0..."}`.
///
/// Ordered so that canonical serialization is stable.
pub type DigestSet = BTreeMap<String, String>;

/// The policy engine that produced a piece of evidence.
///
/// Serialized as its string tag ("OPA", "Kyverno", "OpenSCAP"). Tags that do
/// not name a known engine are kept verbatim in `Other` so they can be
/// reported instead of silently remapped.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(from = "String", into = "String")]
pub enum EvidenceSource {
    /// Open Policy Agent access decisions.
    Opa,
    /// Kyverno admission-control decisions.
    Kyverno,
    /// OpenSCAP configuration scan results.
    OpenScap,
    /// Any source tag without a dedicated variant.
    Other(String),
}

impl EvidenceSource {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Opa => "OPA",
            Self::Kyverno => "Kyverno",
            Self::OpenScap => "OpenSCAP",
            Self::Other(tag) => tag.as_str(),
        }
    }
}

impl From<String> for EvidenceSource {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "OPA" => Self::Opa,
            "Kyverno" => Self::Kyverno,
            "OpenSCAP" => Self::OpenScap,
            _ => Self::Other(tag),
        }
    }
}

impl From<&str> for EvidenceSource {
    fn from(tag: &str) -> Self {
        Self::from(tag.to_string())
    }
}

impl From<EvidenceSource> for String {
    fn from(source: EvidenceSource) -> Self {
        match source {
            EvidenceSource::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The entity a decision was made about.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Name of the assessed entity (pod, host, request id, ...).
    pub name: String,
    /// Content digests identifying the entity.
    #[serde(default)]
    pub digest: DigestSet,
}

impl Resource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            digest: DigestSet::new(),
        }
    }

    /// Add a digest entry, replacing any previous value for `algorithm`.
    pub fn with_digest(mut self, algorithm: impl Into<String>, hex_digest: impl Into<String>) -> Self {
        self.digest.insert(algorithm.into(), hex_digest.into());
        self
    }
}

/// One externally-made policy decision.
///
/// Field order is the canonical serialization order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RawEvidence {
    /// Producer-assigned identifier, used upstream for retry deduplication.
    pub id: String,
    /// When the decision was made at the source.
    pub timestamp: DateTime<Utc>,
    /// The engine that made the decision.
    pub source: EvidenceSource,
    /// Policy or profile that was evaluated.
    pub policy_id: String,
    /// Source-specific outcome token ("deny", "allow", "mutate", ...).
    pub decision: String,
    /// The assessed entity.
    pub resource: Resource,
    /// Source-specific context, passed through untouched.
    #[serde(default)]
    pub details: serde_json::Value,
}

impl RawEvidence {
    /// Create a record with a generated id and the current time.
    pub fn new(
        source: impl Into<EvidenceSource>,
        policy_id: impl Into<String>,
        decision: impl Into<String>,
        resource: Resource,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source: source.into(),
            policy_id: policy_id.into(),
            decision: decision.into(),
            resource,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Compact JSON rendering of `details`, empty when there are none.
    pub fn details_text(&self) -> String {
        match &self.details {
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_tags_round_trip() {
        for tag in ["OPA", "Kyverno", "OpenSCAP", "Falco"] {
            let source = EvidenceSource::from(tag);
            assert_eq!(source.as_str(), tag);
            assert_eq!(String::from(source), tag);
        }
        assert_eq!(EvidenceSource::from("OPA"), EvidenceSource::Opa);
        assert_eq!(
            EvidenceSource::from("opa"),
            EvidenceSource::Other("opa".to_string())
        );
    }

    #[test]
    fn test_evidence_deserializes_from_engine_json() {
        let json = r#"{
            "id": "ev-1",
            "timestamp": "2026-02-17T00:00:00Z",
            "source": "Kyverno",
            "policyId": "psp-baseline",
            "decision": "mutate",
            "resource": {"name": "pod-frontend-xyz", "digest": {"sha256": "abcd"}},
            "details": {"field": "securityContext"}
        }"#;
        let ev: RawEvidence = serde_json::from_str(json).unwrap();
        assert_eq!(ev.source, EvidenceSource::Kyverno);
        assert_eq!(ev.policy_id, "psp-baseline");
        assert_eq!(ev.resource.digest.get("sha256").unwrap(), "abcd");
        assert_eq!(ev.details_text(), r#"{"field":"securityContext"}"#);
    }

    #[test]
    fn test_missing_details_is_null() {
        let json = r#"{
            "id": "ev-2",
            "timestamp": "2026-02-17T00:00:00Z",
            "source": "OPA",
            "policyId": "rbac",
            "decision": "allow",
            "resource": {"name": "api-request-001"}
        }"#;
        let ev: RawEvidence = serde_json::from_str(json).unwrap();
        assert!(ev.details.is_null());
        assert!(ev.resource.digest.is_empty());
        assert_eq!(ev.details_text(), "");
    }

    #[test]
    fn test_new_generates_unique_ids() {
        let a = RawEvidence::new("OPA", "p", "allow", Resource::new("r"));
        let b = RawEvidence::new("OPA", "p", "allow", Resource::new("r"));
        assert_ne!(a.id, b.id);
    }
}
