//! Export seams: the durable sink for blobs and the claim attestor.

pub mod attestor;
pub mod json_export;
pub mod signing;
pub mod sink;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::claims::ConformanceClaim;
use crate::error::ComplianceResult;
use crate::evidence::DigestSet;

pub use attestor::{AuditLogAttestor, EnvelopeAttestor};
pub use sink::{DirectorySink, MemorySink};

/// Predicate type carried by every claim envelope.
pub const CLAIM_PAYLOAD_TYPE: &str = "https://example.com/conformance-claim/v1";

/// Attestor name recorded in envelopes.
pub const CLAIM_PREDICATE_NAME: &str = "conformance-claim";

/// Content-addressed blob store.
///
/// `reference` is the hex SHA-256 of `payload`; implementations may rely on
/// that to deduplicate.
#[async_trait]
pub trait EvidenceSink: Send + Sync {
    async fn export(&self, reference: &str, payload: &[u8]) -> ComplianceResult<()>;
}

/// Turns a claim into an attested, exported artifact.
#[async_trait]
pub trait ClaimAttestor: Send + Sync {
    /// Attest and export `claim`, returning a reference to the stored result.
    async fn attest(&self, claim: &ConformanceClaim) -> ComplianceResult<String>;

    /// Flush and release backend resources. Called once when the agent stops.
    async fn shutdown(&self) -> ComplianceResult<()> {
        Ok(())
    }
}

/// How an envelope was produced.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// Ed25519 signature over the unsigned envelope JSON.
    Signed,
    /// No signing identity was configured; the envelope carries no signature.
    Insecure,
}

/// A portable, optionally signed wrapper around one claim.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ClaimEnvelope {
    pub payload_type: String,
    pub predicate_name: String,
    /// `resource:<name>` to the resource digests.
    pub subjects: BTreeMap<String, DigestSet>,
    pub claim: ConformanceClaim,
    /// RFC 3339 timestamp of when the envelope was created.
    pub exported_at: String,
    pub mode: SigningMode,
    /// Hex-encoded Ed25519 verifying key, present when signed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub public_key: Option<String>,
    /// Ed25519 signature over SHA-256 of the JSON-serialized envelope.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub signature: Option<Vec<u8>>,
}

impl ClaimEnvelope {
    /// An unsigned envelope for `claim`.
    pub fn new(claim: ConformanceClaim) -> Self {
        let mut subjects = BTreeMap::new();
        subjects.insert(
            format!("resource:{}", claim.resource_ref),
            claim.resource_digest.clone(),
        );
        Self {
            payload_type: CLAIM_PAYLOAD_TYPE.to_string(),
            predicate_name: CLAIM_PREDICATE_NAME.to_string(),
            subjects,
            claim,
            exported_at: chrono::Utc::now().to_rfc3339(),
            mode: SigningMode::Insecure,
            public_key: None,
            signature: None,
        }
    }
}
