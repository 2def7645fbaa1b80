//! Builds conformance claims from evidence.

use chrono::Utc;
use uuid::Uuid;

use super::ConformanceClaim;
use crate::assessment::AssessmentEngine;
use crate::controls::AssessmentPlan;
use crate::error::ComplianceResult;
use crate::evidence::RawEvidence;

/// Turns evidence plus its content reference into a `ConformanceClaim`.
///
/// Apart from generating the claim id and timestamp this does no I/O.
#[derive(Debug, Clone, Default)]
pub struct ClaimFactory {
    engine: AssessmentEngine,
}

impl ClaimFactory {
    pub fn new(engine: AssessmentEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &AssessmentEngine {
        &self.engine
    }

    /// Build a claim for `evidence`, stored in the sink under `evidence_ref`.
    ///
    /// Fails only when the assessment engine has no rule for the source, in
    /// which case no claim is produced.
    pub fn build(
        &self,
        evidence: &RawEvidence,
        evidence_ref: &str,
        plan: &AssessmentPlan,
    ) -> ComplianceResult<ConformanceClaim> {
        let assessment = self.engine.assess(evidence, &plan.requirement_id)?;

        Ok(ConformanceClaim {
            claim_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            resource_ref: evidence.resource.name.clone(),
            resource_digest: evidence.resource.digest.clone(),
            raw_evidence_ref: evidence_ref.to_string(),
            summary: summarize(evidence),
            catalog_id: plan.catalog_id.clone(),
            control_id: plan.control_id.clone(),
            assessment,
        })
    }
}

/// One-line description of a decision.
pub fn summarize(evidence: &RawEvidence) -> String {
    format!(
        "Resource '{}' from {} is {} against policy '{}'.",
        evidence.resource.name, evidence.source, evidence.decision, evidence.policy_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::AssessmentStatus;
    use crate::error::ComplianceError;
    use crate::evidence::Resource;

    fn evidence(source: &str, decision: &str) -> RawEvidence {
        RawEvidence::new(
            source,
            "cis-ubuntu-20.04-profile",
            decision,
            Resource::new("web-server-007").with_digest("sha256", "e3b0c442"),
        )
    }

    #[test]
    fn test_build_populates_claim() {
        let factory = ClaimFactory::default();
        let plan = AssessmentPlan::for_catalog("cis");
        let claim = factory
            .build(&evidence("OpenSCAP", "non_compliant"), "ref-123", &plan)
            .unwrap();

        assert_eq!(claim.resource_ref, "web-server-007");
        assert_eq!(claim.resource_digest.get("sha256").unwrap(), "e3b0c442");
        assert_eq!(claim.raw_evidence_ref, "ref-123");
        assert_eq!(claim.catalog_id, "cis");
        assert_eq!(claim.control_id, "CTRL-1");
        assert_eq!(claim.assessment.requirement_id, "CTRL-1.1");
        assert_eq!(claim.assessment.methods.len(), 1);
        assert_eq!(
            claim.assessment.methods[0].status(),
            AssessmentStatus::NotCompliant
        );
        assert!(Uuid::parse_str(&claim.claim_id).is_ok());
    }

    #[test]
    fn test_summary_template() {
        let ev = evidence("OpenSCAP", "compliant");
        assert_eq!(
            summarize(&ev),
            "Resource 'web-server-007' from OpenSCAP is compliant against policy 'cis-ubuntu-20.04-profile'."
        );
    }

    #[test]
    fn test_claim_ids_are_unique() {
        let factory = ClaimFactory::default();
        let plan = AssessmentPlan::default();
        let ev = evidence("OPA", "allow");
        let a = factory.build(&ev, "r", &plan).unwrap();
        let b = factory.build(&ev, "r", &plan).unwrap();
        assert_ne!(a.claim_id, b.claim_id);
        assert_eq!(a.assessment, b.assessment);
    }

    #[test]
    fn test_unknown_source_produces_no_claim() {
        let factory = ClaimFactory::default();
        let err = factory
            .build(&evidence("Trivy", "fail"), "r", &AssessmentPlan::default())
            .unwrap_err();
        assert!(matches!(err, ComplianceError::UnknownSource { .. }));
    }
}
