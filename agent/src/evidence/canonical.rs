//! Canonical byte form and content references for raw evidence.

use sha2::{Digest, Sha256};

use super::RawEvidence;
use crate::error::{ComplianceError, ComplianceResult};

/// Serialize evidence to its canonical byte form.
///
/// Pretty-printed JSON with two-space indentation. Struct fields follow
/// declaration order and every map is ordered, so equal records always
/// produce identical bytes.
pub fn canonical_bytes(evidence: &RawEvidence) -> ComplianceResult<Vec<u8>> {
    serde_json::to_vec_pretty(evidence).map_err(|e| {
        ComplianceError::serialization_error(format!(
            "Canonical serialization of evidence '{}' failed: {}",
            evidence.id, e
        ))
    })
}

/// Lowercase hex SHA-256 of `payload`, used as its address in the sink.
pub fn content_reference(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Whether `reference` looks like a SHA-256 content reference.
pub fn is_content_reference(reference: &str) -> bool {
    reference.len() == 64 && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Resource;
    use chrono::TimeZone;

    fn fixed_evidence() -> RawEvidence {
        RawEvidence {
            id: "ev-fixed".to_string(),
            timestamp: chrono::Utc.with_ymd_and_hms(2026, 2, 17, 0, 0, 0).unwrap(),
            source: "OPA".into(),
            policy_id: "rbac-policy-001".to_string(),
            decision: "deny".to_string(),
            resource: Resource::new("api-request-001").with_digest("sha256", "e3b0"),
            details: serde_json::json!({"user": "bob", "action": "delete"}),
        }
    }

    #[test]
    fn test_hash_is_sha256() {
        let expected = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
        assert_eq!(content_reference(b"hello world"), expected);
    }

    #[test]
    fn test_canonical_bytes_are_stable() {
        let a = canonical_bytes(&fixed_evidence()).unwrap();
        let b = canonical_bytes(&fixed_evidence().clone()).unwrap();
        assert_eq!(a, b);
        assert_eq!(content_reference(&a), content_reference(&b));
    }

    #[test]
    fn test_canonical_form_is_indented_json() {
        let bytes = canonical_bytes(&fixed_evidence()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\n  \"id\": \"ev-fixed\""));
        assert!(text.contains("\"policyId\": \"rbac-policy-001\""));
    }

    #[test]
    fn test_reference_changes_with_decision() {
        let mut other = fixed_evidence();
        other.decision = "allow".to_string();
        let a = content_reference(&canonical_bytes(&fixed_evidence()).unwrap());
        let b = content_reference(&canonical_bytes(&other).unwrap());
        assert_ne!(a, b);
    }

    #[test]
    fn test_is_content_reference() {
        assert!(is_content_reference(&content_reference(b"x")));
        assert!(!is_content_reference("../etc/passwd"));
        assert!(!is_content_reference("abcd"));
    }
}
