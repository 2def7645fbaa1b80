//! JSON serialization for claim envelopes.

use super::ClaimEnvelope;
use crate::error::{ComplianceError, ComplianceResult};

/// Serialize a `ClaimEnvelope` to pretty-printed JSON.
pub fn to_json(envelope: &ClaimEnvelope) -> ComplianceResult<String> {
    serde_json::to_string_pretty(envelope).map_err(|e| {
        ComplianceError::serialization_error(format!("JSON serialization failed: {}", e))
    })
}

/// Deserialize a `ClaimEnvelope` from JSON.
pub fn from_json(json: &str) -> ComplianceResult<ClaimEnvelope> {
    serde_json::from_str(json).map_err(|e| {
        ComplianceError::serialization_error(format!("JSON deserialization failed: {}", e))
    })
}
