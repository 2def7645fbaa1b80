//! The ingestion agent: bounded queue, single worker, lifecycle control.
//!
//! ```text
//! Idle --start--> Running --stop--> Draining --> Stopped
//! ```
//!
//! Producers call [`Agent::ingest`], which never waits: when the queue is
//! full the record is dropped and a warning is logged. One worker task
//! drains the queue in FIFO order. [`Agent::stop`] signals the worker,
//! flushes the backends and returns no later than its timeout; work still in
//! flight at that point may finish after `stop` returns, bounded by one
//! record.

pub mod config;
mod worker;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use opentelemetry::metrics::Meter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::assessment::AssessmentEngine;
use crate::claims::{ClaimFactory, ClaimStore};
use crate::error::{ComplianceError, ComplianceResult};
use crate::evidence::RawEvidence;
use crate::export::{ClaimAttestor, EvidenceSink};
use crate::telemetry::{self, ComplianceMetrics};

pub use config::{AgentConfig, RunMode};
use worker::Worker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// What happened to a record handed to [`Agent::ingest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Queued,
    /// The queue was full; the record was discarded.
    DroppedFull,
    /// The agent is not running; the record was discarded.
    NotRunning,
}

/// How [`Agent::stop`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Completed,
    /// The timeout elapsed first; cleanup continues in the background.
    TimedOut,
}

struct Lifecycle {
    state: AgentState,
    /// Set while `start` awaits telemetry setup.
    starting: bool,
    queue: Option<mpsc::Sender<RawEvidence>>,
    shutdown: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
    meter_provider: Option<SdkMeterProvider>,
    /// Flips to `true` once the first `stop` has finished cleaning up.
    cleaned_up: Option<watch::Receiver<bool>>,
}

enum StopStep {
    NotStarted,
    AlreadyStopping(Option<watch::Receiver<bool>>),
    Begin {
        shutdown: Option<watch::Sender<bool>>,
        worker: Option<JoinHandle<()>>,
        meter_provider: Option<SdkMeterProvider>,
        cleaned_up: watch::Sender<bool>,
    },
}

/// Turns ingested evidence into attested, stored conformance claims.
pub struct Agent {
    config: AgentConfig,
    factory: ClaimFactory,
    sink: Arc<dyn EvidenceSink>,
    attestor: Arc<dyn ClaimAttestor>,
    meter: Option<Meter>,
    store: ClaimStore,
    processed: Arc<AtomicU64>,
    /// Records accepted by `ingest` and not yet finished by the worker.
    pending: Arc<watch::Sender<usize>>,
    lifecycle: Mutex<Lifecycle>,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        sink: Arc<dyn EvidenceSink>,
        attestor: Arc<dyn ClaimAttestor>,
    ) -> Self {
        let (pending, _) = watch::channel(0);
        Self {
            config,
            factory: ClaimFactory::default(),
            sink,
            attestor,
            meter: None,
            store: ClaimStore::new(),
            processed: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(pending),
            lifecycle: Mutex::new(Lifecycle {
                state: AgentState::Idle,
                starting: false,
                queue: None,
                shutdown: None,
                worker: None,
                meter_provider: None,
                cleaned_up: None,
            }),
        }
    }

    /// Use `engine` instead of the default OPA/Kyverno/OpenSCAP rules.
    pub fn with_engine(mut self, engine: AssessmentEngine) -> Self {
        self.factory = ClaimFactory::new(engine);
        self
    }

    /// Register metrics on `meter` instead of building an OTLP pipeline.
    pub fn with_meter(mut self, meter: Meter) -> Self {
        self.meter = Some(meter);
        self
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn state(&self) -> AgentState {
        self.lifecycle().state
    }

    /// Shared handle to the claim store.
    pub fn store(&self) -> ClaimStore {
        self.store.clone()
    }

    /// Records fully processed since start.
    pub fn processed_count(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Records waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        match &self.lifecycle().queue {
            Some(queue) => queue.max_capacity() - queue.capacity(),
            None => 0,
        }
    }

    /// Set up telemetry, allocate the queue and spawn the worker.
    ///
    /// Only valid from `Idle`; a stopped agent cannot be restarted. When an
    /// OTLP endpoint is configured the collector must be reachable, otherwise
    /// the error is returned and the agent stays idle.
    pub async fn start(&self) -> ComplianceResult<()> {
        {
            let mut lifecycle = self.lifecycle();
            match lifecycle.state {
                AgentState::Idle if !lifecycle.starting => {}
                AgentState::Idle => {
                    return Err(ComplianceError::lifecycle_error("agent is already starting"))
                }
                AgentState::Stopped => {
                    return Err(ComplianceError::lifecycle_error(
                        "agent has been stopped and cannot be restarted",
                    ))
                }
                AgentState::Running | AgentState::Draining => {
                    return Err(ComplianceError::lifecycle_error("agent already started"))
                }
            }
            self.config.validate()?;
            lifecycle.starting = true;
        }

        let telemetry = self.init_telemetry().await;

        let mut lifecycle = self.lifecycle();
        lifecycle.starting = false;
        let (meter, meter_provider) = telemetry?;
        let metrics = meter.map(|meter| ComplianceMetrics::register(&meter, self.store.clone()));

        let (queue_tx, queue_rx) = mpsc::channel(self.config.queue_capacity);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = Worker {
            factory: self.factory.clone(),
            plan: self.config.plan.clone(),
            sink: Arc::clone(&self.sink),
            attestor: Arc::clone(&self.attestor),
            store: self.store.clone(),
            metrics,
            processed: Arc::clone(&self.processed),
            pending: Arc::clone(&self.pending),
        };
        let handle = tokio::spawn(worker.run(queue_rx, shutdown_rx));

        lifecycle.state = AgentState::Running;
        lifecycle.queue = Some(queue_tx);
        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.worker = Some(handle);
        lifecycle.meter_provider = meter_provider;

        info!(
            message = "agent started, listening for raw evidence",
            event = "startup",
            queue_capacity = self.config.queue_capacity,
            metrics = lifecycle.meter_provider.is_some() || self.meter.is_some()
        );
        Ok(())
    }

    async fn init_telemetry(&self) -> ComplianceResult<(Option<Meter>, Option<SdkMeterProvider>)> {
        match (&self.meter, &self.config.otel_endpoint) {
            (Some(meter), _) => Ok((Some(meter.clone()), None)),
            (None, Some(endpoint)) => {
                let provider = telemetry::init_meter_provider(
                    endpoint,
                    &self.config.service_name,
                    self.config.metrics_interval(),
                )
                .await?;
                info!(
                    message = "metrics pipeline ready",
                    event = "telemetry_init",
                    endpoint = %endpoint
                );
                Ok((Some(telemetry::agent_meter(&provider)), Some(provider)))
            }
            (None, None) => Ok((None, None)),
        }
    }

    /// Hand a record to the worker without waiting.
    pub fn ingest(&self, evidence: RawEvidence) -> IngestOutcome {
        let lifecycle = self.lifecycle();
        let queue = match (&lifecycle.state, &lifecycle.queue) {
            (AgentState::Running, Some(queue)) => queue,
            (state, _) => {
                warn!(
                    message = "agent not running, dropping evidence",
                    event = "evidence_dropped",
                    state = ?state,
                    evidence_id = %evidence.id,
                    source = %evidence.source
                );
                return IngestOutcome::NotRunning;
            }
        };

        self.pending.send_modify(|n| *n += 1);
        let outcome = match queue.try_send(evidence) {
            Ok(()) => return IngestOutcome::Queued,
            Err(TrySendError::Full(evidence)) => {
                warn!(
                    message = "raw evidence queue full, dropping evidence",
                    event = "evidence_dropped",
                    evidence_id = %evidence.id,
                    source = %evidence.source
                );
                IngestOutcome::DroppedFull
            }
            Err(TrySendError::Closed(evidence)) => {
                warn!(
                    message = "raw evidence queue closed, dropping evidence",
                    event = "evidence_dropped",
                    evidence_id = %evidence.id,
                    source = %evidence.source
                );
                IngestOutcome::NotRunning
            }
        };
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
        outcome
    }

    /// Wait until every accepted record has been processed or skipped.
    ///
    /// Returns `false` if `timeout` elapsed first. Does not stop the agent.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.subscribe();
        let settled = tokio::time::timeout(timeout, pending.wait_for(|n| *n == 0)).await;
        matches!(settled, Ok(Ok(_)))
    }

    /// Stop the worker and flush backends, waiting at most `timeout`.
    ///
    /// Records still queued are discarded. On `TimedOut` the worker and
    /// backend shutdown keep running in the background. The agent is
    /// `Stopped` afterwards either way. Calling this on an agent that was
    /// never started does nothing; calling it while another `stop` is in
    /// progress, or after one timed out, waits for that cleanup instead.
    pub async fn stop(&self, timeout: Duration) -> StopOutcome {
        let step = {
            let mut lifecycle = self.lifecycle();
            match lifecycle.state {
                AgentState::Idle => StopStep::NotStarted,
                AgentState::Draining | AgentState::Stopped => {
                    StopStep::AlreadyStopping(lifecycle.cleaned_up.clone())
                }
                AgentState::Running => {
                    let (cleaned_up, cleaned_up_rx) = watch::channel(false);
                    lifecycle.state = AgentState::Draining;
                    lifecycle.queue = None;
                    lifecycle.cleaned_up = Some(cleaned_up_rx);
                    StopStep::Begin {
                        shutdown: lifecycle.shutdown.take(),
                        worker: lifecycle.worker.take(),
                        meter_provider: lifecycle.meter_provider.take(),
                        cleaned_up,
                    }
                }
            }
        };

        match step {
            StopStep::NotStarted => StopOutcome::Completed,
            StopStep::AlreadyStopping(cleaned_up) => wait_for_cleanup(cleaned_up, timeout).await,
            StopStep::Begin {
                shutdown,
                worker,
                meter_provider,
                cleaned_up,
            } => {
                let outcome = self
                    .begin_stop(shutdown, worker, meter_provider, cleaned_up, timeout)
                    .await;
                self.lifecycle().state = AgentState::Stopped;
                outcome
            }
        }
    }

    async fn begin_stop(
        &self,
        shutdown: Option<watch::Sender<bool>>,
        worker: Option<JoinHandle<()>>,
        meter_provider: Option<SdkMeterProvider>,
        cleaned_up: watch::Sender<bool>,
        timeout: Duration,
    ) -> StopOutcome {
        info!(message = "stopping agent", event = "shutdown");

        if let Some(shutdown) = &shutdown {
            let _ = shutdown.send(true);
        }

        let attestor = Arc::clone(&self.attestor);
        let pending = Arc::clone(&self.pending);
        let cleanup = tokio::spawn(async move {
            if let Some(worker) = worker {
                if let Err(e) = worker.await {
                    error!(message = "ingestion worker failed", error = %e);
                }
            }
            // Whatever is left in the queue was discarded with the worker.
            pending.send_replace(0);
            if let Err(e) = attestor.shutdown().await {
                warn!(message = "attestor shutdown failed", error = %e);
            }
            if let Some(provider) = meter_provider {
                if let Err(e) = telemetry::shutdown_meter_provider(provider).await {
                    warn!(message = "telemetry shutdown failed", error = %e);
                }
            }
            cleaned_up.send_replace(true);
        });

        let outcome = match tokio::time::timeout(timeout, cleanup).await {
            Ok(Ok(())) => {
                info!(message = "graceful shutdown complete", event = "shutdown_complete");
                StopOutcome::Completed
            }
            Ok(Err(e)) => {
                error!(message = "shutdown task failed", error = %e);
                StopOutcome::Completed
            }
            Err(_) => {
                warn!(
                    message = "timed out during graceful shutdown, some cleanup operations might not have completed",
                    event = "shutdown_timeout",
                    timeout_ms = timeout.as_millis() as u64
                );
                StopOutcome::TimedOut
            }
        };

        drop(shutdown);
        outcome
    }

    /// Stop using the configured shutdown timeout.
    pub async fn shutdown(&self) -> StopOutcome {
        self.stop(self.config.shutdown_timeout()).await
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn wait_for_cleanup(
    cleaned_up: Option<watch::Receiver<bool>>,
    timeout: Duration,
) -> StopOutcome {
    let Some(mut cleaned_up) = cleaned_up else {
        return StopOutcome::Completed;
    };
    let outcome = match tokio::time::timeout(timeout, cleaned_up.wait_for(|done| *done)).await {
        // A closed channel means the cleanup task is gone.
        Ok(_) => StopOutcome::Completed,
        Err(_) => {
            warn!(
                message = "shutdown already in progress and not finished before the deadline",
                event = "shutdown_timeout",
                timeout_ms = timeout.as_millis() as u64
            );
            StopOutcome::TimedOut
        }
    };
    outcome
}
