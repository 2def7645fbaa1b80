//! Compliance evidence ingestion and conformance claim generation.
//!
//! This crate provides:
//! - Raw evidence records and their canonical, content-addressed form (`evidence`)
//! - Per-source rules that derive an assessment from a decision (`assessment`)
//! - Conformance claims and the shared claim store (`claims`)
//! - Catalog placement of generated claims (`controls`)
//! - Evidence sinks, claim attestors and signed envelopes (`export`)
//! - OpenTelemetry counters and the compliance status gauge (`telemetry`)
//! - The ingestion agent with its bounded queue and worker (`agent`)

pub mod agent;
pub mod assessment;
pub mod claims;
pub mod controls;
pub mod error;
pub mod evidence;
pub mod export;
pub mod telemetry;

pub use agent::{Agent, AgentConfig, AgentState, IngestOutcome, RunMode, StopOutcome};
pub use assessment::AssessmentEngine;
pub use claims::{AssessmentStatus, ClaimFactory, ClaimStore, ConformanceClaim};
pub use error::{ComplianceError, ComplianceResult};
pub use evidence::{EvidenceSource, RawEvidence, Resource};
