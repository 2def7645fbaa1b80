//! Per-source assessment rules.
//!
//! Each rule maps a source's decision vocabulary onto an assessment status
//! and description. Rules take only the evidence so they can be unit-tested
//! in isolation.

use super::AssessmentRule;
use crate::claims::{AssessmentMethod, AssessmentResult, AssessmentStatus};
use crate::evidence::RawEvidence;

fn method(evidence: &RawEvidence, status: AssessmentStatus, description: String) -> AssessmentMethod {
    AssessmentMethod {
        name: evidence.source.to_string(),
        description,
        run: true,
        result: AssessmentResult { status },
    }
}

fn unrecognized(evidence: &RawEvidence) -> AssessmentMethod {
    method(
        evidence,
        AssessmentStatus::Indeterminate,
        format!(
            "{} returned unrecognized decision '{}' for resource '{}' under policy '{}'.",
            evidence.source, evidence.decision, evidence.resource.name, evidence.policy_id
        ),
    )
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

/// OPA: `deny` is a violation, `allow` is adherence.
pub struct OpaRule;

impl AssessmentRule for OpaRule {
    fn derive(&self, evidence: &RawEvidence) -> AssessmentMethod {
        match evidence.decision.as_str() {
            "deny" => method(
                evidence,
                AssessmentStatus::NotCompliant,
                format!(
                    "OPA denied access to resource '{}' due to policy '{}' violation. {}",
                    evidence.resource.name,
                    evidence.policy_id,
                    evidence.details_text()
                ),
            ),
            "allow" => method(
                evidence,
                AssessmentStatus::Compliant,
                format!(
                    "OPA allowed access to resource '{}' adhering to policy '{}'.",
                    evidence.resource.name, evidence.policy_id
                ),
            ),
            _ => unrecognized(evidence),
        }
    }
}

// ---------------------------------------------------------------------------
// Admission control
// ---------------------------------------------------------------------------

/// Kyverno: a `mutate` enforced the policy, so the admitted resource complies.
pub struct KyvernoRule;

impl AssessmentRule for KyvernoRule {
    fn derive(&self, evidence: &RawEvidence) -> AssessmentMethod {
        match evidence.decision.as_str() {
            "mutate" => method(
                evidence,
                AssessmentStatus::Compliant,
                format!(
                    "Kyverno mutated resource '{}' to enforce policy '{}'.",
                    evidence.resource.name, evidence.policy_id
                ),
            ),
            "deny" => method(
                evidence,
                AssessmentStatus::NotCompliant,
                format!(
                    "Kyverno denied resource '{}' due to policy '{}' violation.",
                    evidence.resource.name, evidence.policy_id
                ),
            ),
            _ => unrecognized(evidence),
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration scanning
// ---------------------------------------------------------------------------

/// OpenSCAP: scan verdicts against a profile.
pub struct OpenScapRule;

impl AssessmentRule for OpenScapRule {
    fn derive(&self, evidence: &RawEvidence) -> AssessmentMethod {
        match evidence.decision.as_str() {
            "compliant" => method(
                evidence,
                AssessmentStatus::Compliant,
                format!(
                    "OpenSCAP scan for '{}' reported compliant against profile '{}'.",
                    evidence.resource.name, evidence.policy_id
                ),
            ),
            "non_compliant" => method(
                evidence,
                AssessmentStatus::NotCompliant,
                format!(
                    "OpenSCAP scan for '{}' reported non-compliant against profile '{}'. Details: {}",
                    evidence.resource.name,
                    evidence.policy_id,
                    evidence.details_text()
                ),
            ),
            _ => unrecognized(evidence),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::Resource;

    fn evidence(source: &str, decision: &str, resource: &str) -> RawEvidence {
        RawEvidence::new(source, "policy-x", decision, Resource::new(resource))
    }

    #[test]
    fn test_opa_deny_not_compliant() {
        let ev = evidence("OPA", "deny", "api-request-001")
            .with_details(serde_json::json!({"user": "bob"}));
        let m = OpaRule.derive(&ev);
        assert_eq!(m.name, "OPA");
        assert!(m.run);
        assert_eq!(m.status(), AssessmentStatus::NotCompliant);
        assert!(m.description.contains("api-request-001"));
        assert!(m.description.contains(r#"{"user":"bob"}"#));
    }

    #[test]
    fn test_opa_allow_compliant() {
        let m = OpaRule.derive(&evidence("OPA", "allow", "network-flow-abc"));
        assert_eq!(m.status(), AssessmentStatus::Compliant);
        assert!(m.description.starts_with("OPA allowed access"));
    }

    #[test]
    fn test_opa_unknown_decision_indeterminate() {
        let m = OpaRule.derive(&evidence("OPA", "audit", "r"));
        assert_eq!(m.status(), AssessmentStatus::Indeterminate);
        assert!(m.description.contains("'audit'"));
    }

    #[test]
    fn test_kyverno_mutate_compliant() {
        let m = KyvernoRule.derive(&evidence("Kyverno", "mutate", "pod-frontend-xyz"));
        assert_eq!(m.name, "Kyverno");
        assert_eq!(m.status(), AssessmentStatus::Compliant);
        assert!(m.description.contains("mutated"));
        assert!(m.description.contains("pod-frontend-xyz"));
    }

    #[test]
    fn test_kyverno_deny_not_compliant() {
        let m = KyvernoRule.derive(&evidence("Kyverno", "deny", "pod-privileged-test"));
        assert_eq!(m.status(), AssessmentStatus::NotCompliant);
    }

    #[test]
    fn test_kyverno_allow_is_not_recognized() {
        let m = KyvernoRule.derive(&evidence("Kyverno", "allow", "pod"));
        assert_eq!(m.status(), AssessmentStatus::Indeterminate);
    }

    #[test]
    fn test_openscap_compliant() {
        let m = OpenScapRule.derive(&evidence("OpenSCAP", "compliant", "db-server-001"));
        assert_eq!(m.name, "OpenSCAP");
        assert_eq!(m.status(), AssessmentStatus::Compliant);
    }

    #[test]
    fn test_openscap_non_compliant_includes_details() {
        let ev = evidence("OpenSCAP", "non_compliant", "web-server-007")
            .with_details(serde_json::json!({"remediation": "Set X11Forwarding to no"}));
        let m = OpenScapRule.derive(&ev);
        assert_eq!(m.status(), AssessmentStatus::NotCompliant);
        assert!(m.description.contains("Details: {\"remediation\""));
    }

    #[test]
    fn test_decisions_are_case_sensitive() {
        let m = OpenScapRule.derive(&evidence("OpenSCAP", "COMPLIANT", "h"));
        assert_eq!(m.status(), AssessmentStatus::Indeterminate);
    }
}
