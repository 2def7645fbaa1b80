//! Assessment engine: maps evidence to assessment methods per source.

pub mod rules;

use std::collections::HashMap;
use std::sync::Arc;

use crate::claims::{Assessment, AssessmentMethod};
use crate::error::{ComplianceError, ComplianceResult};
use crate::evidence::{EvidenceSource, RawEvidence};

/// Derives one assessment method from a piece of evidence.
///
/// Implementations must be pure: the same evidence always yields the same
/// method, with no I/O.
pub trait AssessmentRule: Send + Sync {
    fn derive(&self, evidence: &RawEvidence) -> AssessmentMethod;
}

impl<F> AssessmentRule for F
where
    F: Fn(&RawEvidence) -> AssessmentMethod + Send + Sync,
{
    fn derive(&self, evidence: &RawEvidence) -> AssessmentMethod {
        self(evidence)
    }
}

/// Registry of assessment rules keyed by evidence source.
///
/// Built once at startup and shared read-only with the ingestion worker.
#[derive(Clone)]
pub struct AssessmentEngine {
    rules: HashMap<EvidenceSource, Arc<dyn AssessmentRule>>,
}

impl AssessmentEngine {
    /// An engine with no rules. Every source is unknown until registered.
    pub fn empty() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// An engine with the OPA, Kyverno and OpenSCAP rules registered.
    pub fn with_default_rules() -> Self {
        let mut engine = Self::empty();
        engine.register(EvidenceSource::Opa, rules::OpaRule);
        engine.register(EvidenceSource::Kyverno, rules::KyvernoRule);
        engine.register(EvidenceSource::OpenScap, rules::OpenScapRule);
        engine
    }

    /// Register `rule` for `source`, replacing any existing rule.
    pub fn register(&mut self, source: EvidenceSource, rule: impl AssessmentRule + 'static) {
        self.rules.insert(source, Arc::new(rule));
    }

    pub fn supports(&self, source: &EvidenceSource) -> bool {
        self.rules.contains_key(source)
    }

    /// Derive the assessment method for `evidence`.
    ///
    /// Fails with `UnknownSource` when no rule is registered for the
    /// evidence source; no default status is ever invented.
    pub fn derive(&self, evidence: &RawEvidence) -> ComplianceResult<AssessmentMethod> {
        let rule = self.rules.get(&evidence.source).ok_or_else(|| {
            ComplianceError::unknown_source(format!(
                "No assessment rule registered for source '{}' (evidence '{}')",
                evidence.source, evidence.id
            ))
        })?;
        Ok(rule.derive(evidence))
    }

    /// Build the full assessment of `requirement_id` for `evidence`.
    pub fn assess(
        &self,
        evidence: &RawEvidence,
        requirement_id: &str,
    ) -> ComplianceResult<Assessment> {
        let method = self.derive(evidence)?;
        Ok(Assessment {
            requirement_id: requirement_id.to_string(),
            methods: vec![method],
        })
    }
}

impl Default for AssessmentEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

impl std::fmt::Debug for AssessmentEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut sources: Vec<&str> = self.rules.keys().map(|s| s.as_str()).collect();
        sources.sort_unstable();
        f.debug_struct("AssessmentEngine")
            .field("sources", &sources)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::{AssessmentResult, AssessmentStatus};
    use crate::evidence::Resource;

    fn evidence(source: &str, decision: &str) -> RawEvidence {
        RawEvidence::new(source, "policy-1", decision, Resource::new("res-1"))
    }

    #[test]
    fn test_default_rules_registered() {
        let engine = AssessmentEngine::with_default_rules();
        assert!(engine.supports(&EvidenceSource::Opa));
        assert!(engine.supports(&EvidenceSource::Kyverno));
        assert!(engine.supports(&EvidenceSource::OpenScap));
        assert!(!engine.supports(&EvidenceSource::from("Falco")));
    }

    #[test]
    fn test_unknown_source_fails() {
        let engine = AssessmentEngine::with_default_rules();
        let err = engine.derive(&evidence("Falco", "alert")).unwrap_err();
        assert!(matches!(err, ComplianceError::UnknownSource { .. }));
        assert!(err.to_string().contains("Falco"));
    }

    #[test]
    fn test_empty_engine_knows_nothing() {
        let engine = AssessmentEngine::empty();
        assert!(engine.derive(&evidence("OPA", "allow")).is_err());
    }

    #[test]
    fn test_register_custom_rule() {
        let mut engine = AssessmentEngine::with_default_rules();
        engine.register(EvidenceSource::from("Falco"), |ev: &RawEvidence| {
            AssessmentMethod {
                name: "Falco".to_string(),
                description: format!("Falco reported '{}'", ev.decision),
                run: true,
                result: AssessmentResult {
                    status: AssessmentStatus::NotApplicable,
                },
            }
        });
        let method = engine.derive(&evidence("Falco", "alert")).unwrap();
        assert_eq!(method.status(), AssessmentStatus::NotApplicable);
    }

    #[test]
    fn test_assess_wraps_single_method() {
        let engine = AssessmentEngine::with_default_rules();
        let assessment = engine.assess(&evidence("OPA", "deny"), "CTRL-1.1").unwrap();
        assert_eq!(assessment.requirement_id, "CTRL-1.1");
        assert_eq!(assessment.methods.len(), 1);
        assert_eq!(assessment.methods[0].name, "OPA");
    }

    #[test]
    fn test_derive_is_deterministic() {
        let engine = AssessmentEngine::with_default_rules();
        let ev = evidence("OpenSCAP", "non_compliant")
            .with_details(serde_json::json!({"rule_id": "sshd_disable_x11"}));
        assert_eq!(engine.derive(&ev).unwrap(), engine.derive(&ev).unwrap());
    }
}
