//! Ed25519 signing for claim envelopes.

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use super::json_export;
use super::{ClaimEnvelope, SigningMode};
use crate::error::{ComplianceError, ComplianceResult};

/// Sign a `ClaimEnvelope` by:
/// 1. Recording the verifying key and `signed` mode
/// 2. Serializing the envelope to JSON (with no signature)
/// 3. Computing SHA-256 of the JSON
/// 4. Signing the hash with Ed25519
pub fn sign_envelope(envelope: &mut ClaimEnvelope, signing_key: &SigningKey) -> ComplianceResult<()> {
    envelope.signature = None;
    envelope.mode = SigningMode::Signed;
    envelope.public_key = Some(hex::encode(signing_key.verifying_key().as_bytes()));

    let hash = unsigned_digest(envelope)?;
    let signature = signing_key.sign(&hash);
    envelope.signature = Some(signature.to_bytes().to_vec());

    Ok(())
}

/// Verify the Ed25519 signature on a `ClaimEnvelope`.
pub fn verify_envelope_signature(
    envelope: &ClaimEnvelope,
    public_key: &VerifyingKey,
) -> ComplianceResult<bool> {
    let signature_bytes = envelope
        .signature
        .as_ref()
        .ok_or_else(|| ComplianceError::attestation_error("Envelope has no signature"))?;

    if signature_bytes.len() != 64 {
        return Err(ComplianceError::attestation_error(format!(
            "Invalid signature length: {} (expected 64)",
            signature_bytes.len()
        )));
    }

    let mut unsigned = envelope.clone();
    unsigned.signature = None;
    let hash = unsigned_digest(&unsigned)?;

    let mut sig_array = [0u8; 64];
    sig_array.copy_from_slice(signature_bytes);
    let signature = ed25519_dalek::Signature::from_bytes(&sig_array);

    match public_key.verify_strict(&hash, &signature) {
        Ok(()) => Ok(true),
        Err(_) => Ok(false),
    }
}

/// Parse a hex-encoded 32-byte Ed25519 seed.
pub fn signing_key_from_hex(seed_hex: &str) -> ComplianceResult<SigningKey> {
    let bytes = hex::decode(seed_hex.trim()).map_err(|e| {
        ComplianceError::attestation_error(format!("invalid hex for signing key: {}", e))
    })?;
    let seed: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        ComplianceError::attestation_error(format!(
            "signing key must be 32 bytes, got {}",
            bytes.len()
        ))
    })?;
    Ok(SigningKey::from_bytes(&seed))
}

fn unsigned_digest(envelope: &ClaimEnvelope) -> ComplianceResult<[u8; 32]> {
    let json = json_export::to_json(envelope)?;
    Ok(Sha256::digest(json.as_bytes()).into())
}
