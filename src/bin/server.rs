// Security Triage - engine process
// Wires the stores, tools and engine together and runs until shutdown.
// Run with: cargo run --bin server

//! # Triage Engine Process
//!
//! Builds the full engine from environment configuration:
//!
//! - session store: NATS JetStream KV when `TRIAGE_NATS_URL` is set,
//!   in-memory otherwise
//! - persistent store: Postgres via `TRIAGE_DATABASE_URL`
//! - tool adapters over the configured LLM provider
//! - HTTP clients for the PMS, access-control and notification services
//!
//! Exits 0 on a clean shutdown signal, non-zero when initialization fails.
//! Front-ends (HTTP, queue consumers) are expected to embed the library and
//! call `TriageEngine::submit` directly; this binary keeps a property's
//! engine warm and runs the periodic retention and session cleanup.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use security_triage::engine::dispatcher::EngineConfig;
use security_triage::engine::executor::{ActionExecutor, ExecutorConfig};
use security_triage::engine::workflow::{RunnerConfig, ToolSet, WorkflowRunner};
use security_triage::integrations::{
    HttpAccessControl, HttpNotificationGateway, HttpPropertySystem,
};
use security_triage::memory::{
    InMemorySessionStore, MemoryRetriever, NatsSessionStore, PersistentStore, SessionStore,
};
use security_triage::tools::{
    ComplianceChecker, HttpLlmClient, IncidentClassifier, IncidentPrioritizer, PerfSink,
    PlaybookSelector, RateLimiter, ResponseGenerator, SafetyGuardrails,
};
use security_triage::{TriageConfig, TriageEngine};

fn require(value: Option<String>, name: &str) -> Result<String, Box<dyn std::error::Error>> {
    value.ok_or_else(|| format!("missing required configuration: {}", name).into())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("starting security triage engine");
    let config = TriageConfig::from_env()?;

    // Session store: NATS KV when configured, in-memory otherwise. Callers
    // cannot tell which is active.
    let session: Arc<dyn SessionStore> = match &config.nats_url {
        Some(url) => {
            let store = NatsSessionStore::connect(url, config.session_ttl()).await?;
            info!(url, "session store: NATS JetStream KV");
            Arc::new(store)
        }
        None => {
            info!("session store: in-memory");
            Arc::new(InMemorySessionStore::new(config.session_ttl()))
        }
    };

    // Durable incident store
    let database_url = require(config.database_url.clone(), "TRIAGE_DATABASE_URL")?;
    let store = Arc::new(
        PersistentStore::connect(
            &database_url,
            config.retention_days,
            config.effective_audit_retention_days(),
        )
        .await?,
    );

    // LLM-backed tool adapters
    let llm = Arc::new(HttpLlmClient::new(
        &require(config.llm_base_url.clone(), "TRIAGE_LLM_BASE_URL")?,
        &require(config.llm_api_key.clone(), "TRIAGE_LLM_API_KEY")?,
        &config.llm_model,
        config.request_timeout(),
    )?);
    let (perf, perf_rx) = PerfSink::new();
    let tools = ToolSet {
        classifier: IncidentClassifier::new(
            llm.clone(),
            RateLimiter::per_minute(config.classification_rate_limit),
            perf.clone(),
        ),
        prioritizer: IncidentPrioritizer::new(
            llm.clone(),
            RateLimiter::per_minute(config.prioritization_rate_limit),
            perf.clone(),
        ),
        selector: PlaybookSelector::new(),
        responder: ResponseGenerator::new(
            llm,
            RateLimiter::per_minute(config.response_rate_limit),
            perf,
        ),
        compliance: ComplianceChecker::new(),
        safety: SafetyGuardrails::new(),
    };

    // External hotel systems
    let access = Arc::new(HttpAccessControl::new(
        &require(config.access_control_url.clone(), "TRIAGE_ACCESS_CONTROL_URL")?,
        &require(config.access_control_token.clone(), "TRIAGE_ACCESS_CONTROL_TOKEN")?,
        config.request_timeout(),
    )?);
    let pms = Arc::new(HttpPropertySystem::new(
        &require(config.pms_url.clone(), "TRIAGE_PMS_URL")?,
        &require(config.pms_token.clone(), "TRIAGE_PMS_TOKEN")?,
        config.request_timeout(),
    )?);
    let notifier = Arc::new(HttpNotificationGateway::new(
        &require(config.notification_url.clone(), "TRIAGE_NOTIFICATION_URL")?,
        &require(config.notification_token.clone(), "TRIAGE_NOTIFICATION_TOKEN")?,
        config.request_timeout(),
    )?);

    let executor = Arc::new(ActionExecutor::new(
        access,
        pms,
        notifier.clone(),
        store.clone(),
        ExecutorConfig::default(),
    ));

    let retriever = Arc::new(MemoryRetriever::new(0.7, 5).with_store(store.clone()));

    let runner = WorkflowRunner::new(tools, executor, notifier, session.clone())
        .with_store(store.clone())
        .with_retriever(retriever)
        .with_config(RunnerConfig {
            workflow_timeout: config.workflow_timeout(),
            ..Default::default()
        });

    let engine = TriageEngine::new(
        runner,
        Some(store.clone()),
        EngineConfig {
            worker_pool_size: config.worker_pool_size,
            queue_bound: config.queue_bound,
        },
    );
    engine.attach_perf_drain(perf_rx);

    // Periodic retention and session cleanup
    let cleanup_store = store.clone();
    let cleanup_session = session.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(3600));
        loop {
            interval.tick().await;
            if let Err(e) = cleanup_store.cleanup_old_records().await {
                error!(error = %e, "retention cleanup failed");
            }
            if let Err(e) = cleanup_session.cleanup().await {
                error!(error = %e, "session cleanup failed");
            }
        }
    });

    info!(
        workers = config.worker_pool_size,
        queue_bound = config.queue_bound,
        "engine ready"
    );

    tokio::signal::ctrl_c().await?;
    info!(in_progress = engine.in_progress(), "shutdown signal received");
    Ok(())
}
