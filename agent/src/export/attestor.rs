//! Claim attestor backends.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::SigningKey;

use super::signing::sign_envelope;
use super::{json_export, ClaimAttestor, ClaimEnvelope, EvidenceSink};
use crate::claims::ConformanceClaim;
use crate::error::{ComplianceError, ComplianceResult};
use crate::evidence::content_reference;

/// Log target for claim audit records.
pub const AUDIT_TARGET: &str = "comply_agent::audit";

/// Wraps each claim in a `ClaimEnvelope`, signs it when a key is configured,
/// and stores the envelope in a sink under its own content reference.
///
/// Without a signing key the attestor runs in explicit insecure mode: the
/// envelope is marked `insecure` and carries no signature.
pub struct EnvelopeAttestor {
    sink: Arc<dyn EvidenceSink>,
    signing_key: Option<SigningKey>,
}

impl EnvelopeAttestor {
    pub fn new(sink: Arc<dyn EvidenceSink>, signing_key: Option<SigningKey>) -> Self {
        if signing_key.is_none() {
            tracing::warn!(
                message = "no signing identity configured, claim envelopes will be unsigned",
                event = "attestor_insecure"
            );
        }
        Self { sink, signing_key }
    }

    pub fn is_signed(&self) -> bool {
        self.signing_key.is_some()
    }

    /// Build the (possibly signed) envelope for `claim` without exporting it.
    pub fn envelope(&self, claim: &ConformanceClaim) -> ComplianceResult<ClaimEnvelope> {
        let mut envelope = ClaimEnvelope::new(claim.clone());
        if let Some(key) = &self.signing_key {
            sign_envelope(&mut envelope, key).map_err(|e| {
                ComplianceError::attestation_error(format!(
                    "signing claim {} failed: {}",
                    claim.claim_id, e
                ))
            })?;
        }
        Ok(envelope)
    }
}

#[async_trait]
impl ClaimAttestor for EnvelopeAttestor {
    async fn attest(&self, claim: &ConformanceClaim) -> ComplianceResult<String> {
        let envelope = self.envelope(claim)?;
        let json = json_export::to_json(&envelope)?;
        let reference = content_reference(json.as_bytes());

        self.sink
            .export(&reference, json.as_bytes())
            .await
            .map_err(|e| {
                ComplianceError::attestation_error(format!(
                    "storing envelope for claim {} failed: {}",
                    claim.claim_id, e
                ))
            })?;

        tracing::info!(
            message = "claim attested",
            event = "claim_attested",
            claim_id = %claim.claim_id,
            envelope_ref = %reference,
            mode = ?envelope.mode
        );
        Ok(reference)
    }
}

/// Records each claim as a structured audit log event instead of exporting
/// an envelope. Returns the claim id as the reference.
///
/// Events go to the installed `tracing` subscriber under [`AUDIT_TARGET`];
/// they are not sent to the metrics collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct AuditLogAttestor;

#[async_trait]
impl ClaimAttestor for AuditLogAttestor {
    async fn attest(&self, claim: &ConformanceClaim) -> ComplianceResult<String> {
        let body = serde_json::to_string(claim).map_err(|e| {
            ComplianceError::attestation_error(format!(
                "encoding claim {} for audit log failed: {}",
                claim.claim_id, e
            ))
        })?;

        tracing::info!(
            target: AUDIT_TARGET,
            claim_id = %claim.claim_id,
            resource = %claim.resource_ref,
            observed_at = %chrono::Utc::now().to_rfc3339(),
            claim = %body,
            "{}",
            claim.summary
        );
        Ok(claim.claim_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::ClaimFactory;
    use crate::controls::AssessmentPlan;
    use crate::evidence::{RawEvidence, Resource};
    use crate::export::signing::verify_envelope_signature;
    use crate::export::{MemorySink, SigningMode};
    use rand::rngs::OsRng;

    fn claim() -> ConformanceClaim {
        let ev = RawEvidence::new(
            "OpenSCAP",
            "pci-dss-profile",
            "compliant",
            Resource::new("db-server-001").with_digest("sha256", "e3b0"),
        );
        ClaimFactory::default()
            .build(&ev, "ref", &AssessmentPlan::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_insecure_envelope_stored_unsigned() {
        let sink = Arc::new(MemorySink::new());
        let attestor = EnvelopeAttestor::new(sink.clone(), None);
        assert!(!attestor.is_signed());

        let reference = attestor.attest(&claim()).await.unwrap();

        let stored = sink.get(&reference).unwrap();
        assert_eq!(content_reference(&stored), reference);
        let envelope = json_export::from_json(std::str::from_utf8(&stored).unwrap()).unwrap();
        assert_eq!(envelope.mode, SigningMode::Insecure);
        assert!(envelope.signature.is_none());
        assert!(envelope.public_key.is_none());
        assert!(envelope.subjects.contains_key("resource:db-server-001"));
    }

    #[tokio::test]
    async fn test_signed_envelope_verifies() {
        let key = SigningKey::generate(&mut OsRng);
        let sink = Arc::new(MemorySink::new());
        let attestor = EnvelopeAttestor::new(sink.clone(), Some(key.clone()));

        let reference = attestor.attest(&claim()).await.unwrap();

        let stored = sink.get(&reference).unwrap();
        let envelope = json_export::from_json(std::str::from_utf8(&stored).unwrap()).unwrap();
        assert_eq!(envelope.mode, SigningMode::Signed);
        assert!(verify_envelope_signature(&envelope, &key.verifying_key()).unwrap());
    }

    #[tokio::test]
    async fn test_audit_log_returns_claim_id() {
        let c = claim();
        let reference = AuditLogAttestor.attest(&c).await.unwrap();
        assert_eq!(reference, c.claim_id);
    }
}
