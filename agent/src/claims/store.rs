//! Thread-safe in-memory claim store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::ConformanceClaim;

/// Shared map of claim id to claim.
///
/// Cloning the store clones the handle, not the claims. Writers take the
/// exclusive lock only for a single map insert of an already-built claim,
/// so readers never observe a partial entry.
#[derive(Debug, Clone, Default)]
pub struct ClaimStore {
    claims: Arc<RwLock<HashMap<String, ConformanceClaim>>>,
}

impl ClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a claim by its id.
    pub fn insert(&self, claim: ConformanceClaim) {
        let mut claims = self.claims.write().unwrap_or_else(PoisonError::into_inner);
        claims.insert(claim.claim_id.clone(), claim);
    }

    /// Copy of every stored claim, ordered by creation time then id.
    pub fn snapshot(&self) -> Vec<ConformanceClaim> {
        let mut snapshot: Vec<ConformanceClaim> = {
            let claims = self.claims.read().unwrap_or_else(PoisonError::into_inner);
            claims.values().cloned().collect()
        };
        snapshot.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.claim_id.cmp(&b.claim_id))
        });
        snapshot
    }

    pub fn get(&self, claim_id: &str) -> Option<ConformanceClaim> {
        let claims = self.claims.read().unwrap_or_else(PoisonError::into_inner);
        claims.get(claim_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.claims
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
