//! The single ingestion worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::claims::{ClaimFactory, ClaimStore};
use crate::controls::AssessmentPlan;
use crate::error::ComplianceResult;
use crate::evidence::{canonical_bytes, content_reference, RawEvidence};
use crate::export::{ClaimAttestor, EvidenceSink};
use crate::telemetry::ComplianceMetrics;

/// Everything needed to turn one evidence record into a stored claim.
pub(crate) struct Worker {
    pub factory: ClaimFactory,
    pub plan: AssessmentPlan,
    pub sink: Arc<dyn EvidenceSink>,
    pub attestor: Arc<dyn ClaimAttestor>,
    pub store: ClaimStore,
    pub metrics: Option<ComplianceMetrics>,
    pub processed: Arc<AtomicU64>,
    pub pending: Arc<watch::Sender<usize>>,
}

/// Result of processing one record.
#[derive(Debug)]
pub(crate) struct Processed {
    pub claim_id: String,
    pub evidence_ref: String,
    pub attestation_ref: String,
}

impl Worker {
    /// Consume evidence in FIFO order until the shutdown signal fires.
    ///
    /// The shutdown branch is polled first, so once `stop` has signalled no
    /// further item is dequeued. An item already being processed is always
    /// finished.
    pub async fn run(
        self,
        mut queue: mpsc::Receiver<RawEvidence>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(message = "completing graceful shutdown", event = "worker_shutdown");
                        break;
                    }
                }
                next = queue.recv() => match next {
                    Some(evidence) => {
                        self.handle(evidence).await;
                        self.pending.send_modify(|n| *n = n.saturating_sub(1));
                    }
                    None => {
                        debug!("ingestion queue closed");
                        break;
                    }
                },
            }
        }
    }

    async fn handle(&self, evidence: RawEvidence) {
        info!(
            message = "received raw evidence",
            event = "evidence_received",
            source = %evidence.source,
            evidence_id = %evidence.id
        );

        match self.process(&evidence).await {
            Ok(processed) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_processed(&evidence);
                }
                self.processed.fetch_add(1, Ordering::Relaxed);
                info!(
                    message = "claim recorded",
                    event = "claim_recorded",
                    evidence_id = %evidence.id,
                    claim_id = %processed.claim_id,
                    evidence_ref = %processed.evidence_ref,
                    attestation_ref = %processed.attestation_ref
                );
            }
            Err(e) => {
                warn!(
                    message = "skipping evidence due to processing error",
                    event = "evidence_skipped",
                    evidence_id = %evidence.id,
                    source = %evidence.source,
                    reason = e.reason(),
                    error = %e
                );
            }
        }
    }

    /// Export raw evidence, build and attest the claim, then store it.
    ///
    /// The claim reaches the store only after attestation succeeded.
    pub async fn process(&self, evidence: &RawEvidence) -> ComplianceResult<Processed> {
        let bytes = canonical_bytes(evidence)?;
        let evidence_ref = content_reference(&bytes);

        self.sink.export(&evidence_ref, &bytes).await?;

        let claim = self.factory.build(evidence, &evidence_ref, &self.plan)?;
        let attestation_ref = self.attestor.attest(&claim).await?;

        let claim_id = claim.claim_id.clone();
        self.store.insert(claim);

        Ok(Processed {
            claim_id,
            evidence_ref,
            attestation_ref,
        })
    }
}
