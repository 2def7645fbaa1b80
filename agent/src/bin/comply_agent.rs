//! CLI for the compliance ingestion agent.
//!
//! Reads a JSON array of raw evidence records, feeds them through the agent
//! and stops it. With `--interval-secs` the file is re-read and re-ingested
//! on that period until Ctrl-C.
//!
//! Exit codes: 0 = clean stop, 1 = error or shutdown timeout.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use comply_agent::export::signing::signing_key_from_hex;
use comply_agent::export::{
    AuditLogAttestor, ClaimAttestor, DirectorySink, EnvelopeAttestor, EvidenceSink, MemorySink,
};
use comply_agent::{Agent, AgentConfig, IngestOutcome, RawEvidence, RunMode, StopOutcome};

#[derive(Parser)]
#[command(
    name = "comply-agent",
    about = "Turn policy-engine decisions into attested conformance claims"
)]
struct Args {
    /// JSON agent config file (queue, telemetry and assessment plan).
    /// Flags given on the command line override its values.
    #[arg(long, env = "COMPLY_AGENT_CONFIG")]
    config: Option<PathBuf>,
    /// Path to a JSON array of raw evidence records.
    #[arg(long, env = "COMPLY_AGENT_EVIDENCE")]
    evidence: PathBuf,
    /// Directory for content-addressed evidence and envelopes.
    /// Blobs are kept in memory when omitted.
    #[arg(long, env = "COMPLY_AGENT_SINK_DIR")]
    sink_dir: Option<PathBuf>,
    /// OTLP/gRPC collector endpoint for metrics.
    #[arg(long, env = "COMPLY_AGENT_OTEL_ENDPOINT")]
    otel_endpoint: Option<String>,
    /// Hex-encoded Ed25519 signing seed (32 bytes = 64 hex chars).
    /// Envelopes are exported unsigned when omitted.
    #[arg(long, env = "COMPLY_AGENT_SIGNING_KEY")]
    signing_key: Option<String>,
    /// Emit claims to the audit log instead of exporting envelopes.
    #[arg(long, env = "COMPLY_AGENT_AUDIT_LOG")]
    audit_log: bool,
    /// Capacity of the ingestion queue [default: 100].
    #[arg(long, env = "COMPLY_AGENT_QUEUE_CAPACITY")]
    queue_capacity: Option<usize>,
    /// Upper bound on graceful shutdown, in seconds [default: 7].
    #[arg(long, env = "COMPLY_AGENT_SHUTDOWN_TIMEOUT_SECS")]
    shutdown_timeout_secs: Option<u64>,
    /// Re-ingest the evidence file on this period until interrupted.
    #[arg(long, env = "COMPLY_AGENT_INTERVAL_SECS")]
    interval_secs: Option<u64>,
    /// Catalog recorded on every claim.
    #[arg(long, env = "COMPLY_AGENT_CATALOG_ID")]
    catalog_id: Option<String>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let exit_code = match run(args).await {
        Ok(StopOutcome::Completed) => 0,
        Ok(StopOutcome::TimedOut) => 1,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    };

    process::exit(exit_code);
}

async fn run(args: Args) -> Result<StopOutcome> {
    let config = build_config(&args)?;
    let mode = RunMode::from_interval_secs(args.interval_secs);

    let sink: Arc<dyn EvidenceSink> = match &args.sink_dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "exporting to directory sink");
            Arc::new(DirectorySink::new(dir))
        }
        None => {
            tracing::warn!("no --sink-dir given, exported blobs are kept in memory only");
            Arc::new(MemorySink::new())
        }
    };

    let attestor: Arc<dyn ClaimAttestor> = if args.audit_log {
        Arc::new(AuditLogAttestor)
    } else {
        let signing_key = args
            .signing_key
            .as_deref()
            .map(signing_key_from_hex)
            .transpose()
            .context("invalid --signing-key")?;
        Arc::new(EnvelopeAttestor::new(Arc::clone(&sink), signing_key))
    };

    let agent = Agent::new(config, sink, attestor);
    agent.start().await.context("failed to start agent")?;

    let result = match mode {
        RunMode::OneShot => match ingest_file(&agent, &args.evidence).await {
            Ok(_) => {
                if !agent.drain(agent.config().shutdown_timeout()).await {
                    tracing::warn!("queue not drained before the shutdown timeout");
                }
                Ok(())
            }
            Err(e) => Err(e),
        },
        // Ctrl-C stops right away; the worker still finishes its current record.
        RunMode::Continuous { interval } => run_continuous(&agent, &args.evidence, interval).await,
    };

    let outcome = agent.shutdown().await;

    tracing::info!(
        processed = agent.processed_count(),
        claims = agent.store().len(),
        "agent stopped"
    );
    result.map(|_| outcome)
}

/// Config file values, then command-line overrides.
fn build_config(args: &Args) -> Result<AgentConfig> {
    let mut config = match &args.config {
        Some(path) => AgentConfig::from_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => AgentConfig::default(),
    };
    if let Some(capacity) = args.queue_capacity {
        config.queue_capacity = capacity;
    }
    if let Some(secs) = args.shutdown_timeout_secs {
        config.shutdown_timeout_secs = secs;
    }
    if let Some(endpoint) = &args.otel_endpoint {
        config.otel_endpoint = Some(endpoint.clone());
    }
    if let Some(catalog_id) = &args.catalog_id {
        config.plan.catalog_id = catalog_id.clone();
    }
    Ok(config)
}

async fn run_continuous(agent: &Agent, path: &Path, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = ingest_file(agent, path).await {
                    tracing::warn!(error = %format!("{:#}", e), "ingestion round failed");
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                tracing::info!("received Ctrl-C, shutting down");
                return Ok(());
            }
        }
    }
}

/// Queue every record in `path`, returning how many were accepted.
async fn ingest_file(agent: &Agent, path: &Path) -> Result<usize> {
    let records = load_evidence(path).await?;
    let total = records.len();
    let mut queued = 0;
    for evidence in records {
        match agent.ingest(evidence) {
            IngestOutcome::Queued => queued += 1,
            IngestOutcome::DroppedFull | IngestOutcome::NotRunning => {}
        }
    }
    tracing::info!(path = %path.display(), total, queued, "evidence file ingested");
    Ok(queued)
}

async fn load_evidence(path: &Path) -> Result<Vec<RawEvidence>> {
    let data = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read evidence file '{}'", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("failed to parse evidence file '{}'", path.display()))
}
