// Triage engine facade - submission API, worker pool and dispatch loop

//! # Dispatcher
//!
//! The transport-agnostic submission API over a worker pool:
//!
//! - `submit` accepts an incident, enqueues it and returns a handle; when the
//!   bounded queue is full it fails fast with `queue_full`.
//! - A dispatch loop hands ready incidents (new or resumed after approval) to
//!   workers gated by a pool-sized semaphore. The same incident id is never
//!   on two workers at once: work items are created only at submission and
//!   at `resolve`, both of which require the incident to be off-worker.
//! - `resolve` applies a human decision to a paused incident and re-enqueues
//!   it from its checkpointed state. Workers never block on human input.
//! - `status` serves read-only snapshots from the session store (falling
//!   back to the durable state blob), never from worker-owned memory.

use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::workflow::{RunResult, WorkflowRunner};
use crate::memory::{PersistentStore, SearchFilters, SessionStore};
use crate::models::{IncidentMetadata, IncidentState};
use crate::tools::PerfSample;
use crate::{Result, TriageError};

/// Engine-level tuning knobs
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub worker_pool_size: usize,
    pub queue_bound: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 16,
            queue_bound: 1024,
        }
    }
}

/// Observable lifecycle of a submitted incident
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Handle returned by `submit`; awaits the run's terminal state
#[derive(Debug)]
pub struct RunHandle {
    pub incident_id: String,
    rx: watch::Receiver<RunStatus>,
}

impl RunHandle {
    /// Block until the workflow completes or fails. Paused runs keep the
    /// handle waiting; a later `resolve` lets them finish.
    pub async fn await_terminal(mut self) -> RunStatus {
        loop {
            let status = *self.rx.borrow();
            if status.is_terminal() {
                return status;
            }
            if self.rx.changed().await.is_err() {
                return *self.rx.borrow();
            }
        }
    }

    /// The most recent observed status, without waiting.
    pub fn current(&self) -> RunStatus {
        *self.rx.borrow()
    }
}

enum WorkItem {
    Start(Box<IncidentState>),
    Resume(Box<IncidentState>),
}

struct RunEntry {
    tx: watch::Sender<RunStatus>,
    cancel: CancellationToken,
}

struct EngineInner {
    runner: WorkflowRunner,
    session: Arc<dyn SessionStore>,
    store: Option<Arc<PersistentStore>>,
    queue_tx: mpsc::UnboundedSender<WorkItem>,
    /// Incidents accepted and not yet terminal or paused; compared against
    /// the queue bound on submission
    in_progress: AtomicUsize,
    queue_bound: usize,
    runs: DashMap<String, RunEntry>,
}

/// The core engine: submission API over a shared worker pool
pub struct TriageEngine {
    inner: Arc<EngineInner>,
}

impl TriageEngine {
    pub fn new(
        runner: WorkflowRunner,
        store: Option<Arc<PersistentStore>>,
        config: EngineConfig,
    ) -> Self {
        let session = runner.session_handle();
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(EngineInner {
            runner,
            session,
            store,
            queue_tx,
            in_progress: AtomicUsize::new(0),
            queue_bound: config.queue_bound,
            runs: DashMap::new(),
        });
        tokio::spawn(dispatch_loop(
            inner.clone(),
            queue_rx,
            config.worker_pool_size,
        ));
        Self { inner }
    }

    /// Accept a new incident. Returns immediately with a handle, or fails
    /// fast with `validation` (bad input) or `queue_full` (backpressure).
    pub async fn submit(
        &self,
        title: &str,
        description: &str,
        metadata: Option<IncidentMetadata>,
    ) -> Result<RunHandle> {
        if title.trim().is_empty() || description.trim().is_empty() {
            return Err(TriageError::Validation(
                "incident must have a title and a description".to_string(),
            ));
        }

        // Reserve a queue slot atomically; released when the run pauses or
        // terminates
        let bound = self.inner.queue_bound;
        if self
            .inner
            .in_progress
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                if current >= bound {
                    None
                } else {
                    Some(current + 1)
                }
            })
            .is_err()
        {
            return Err(TriageError::QueueFull(format!(
                "submission queue at its bound of {}",
                bound
            )));
        }

        let state = IncidentState::new(title, description, metadata.unwrap_or_default());
        let incident_id = state.incident_id.clone();

        // The session record exists before the worker starts so status
        // queries never observe a gap
        if let Err(error) = self.inner.session.put(&state).await {
            self.inner.in_progress.fetch_sub(1, Ordering::SeqCst);
            return Err(error);
        }

        let (tx, rx) = watch::channel(RunStatus::Queued);
        self.inner.runs.insert(
            incident_id.clone(),
            RunEntry {
                tx,
                cancel: CancellationToken::new(),
            },
        );

        if self
            .inner
            .queue_tx
            .send(WorkItem::Start(Box::new(state)))
            .is_err()
        {
            self.inner.in_progress.fetch_sub(1, Ordering::SeqCst);
            return Err(TriageError::Internal("dispatch loop stopped".to_string()));
        }

        info!(incident_id = %incident_id, "incident accepted");
        Ok(RunHandle { incident_id, rx })
    }

    /// Read-only snapshot of an incident's latest known state.
    pub async fn status(&self, incident_id: &str) -> Result<IncidentState> {
        if let Some(state) = self.inner.session.get(incident_id).await? {
            return Ok(state);
        }
        if let Some(checkpoint) = self.inner.session.latest_checkpoint(incident_id).await? {
            return checkpoint.restore();
        }
        if let Some(store) = &self.inner.store {
            if let Some(state) = store.load_state(incident_id).await? {
                return Ok(state);
            }
        }
        Err(TriageError::NotFound(format!(
            "no state for incident {}",
            incident_id
        )))
    }

    /// Apply a human decision to a paused incident and resume it from its
    /// checkpoint. Returns `not_found` for unknown incidents and
    /// `not_pending` when no matching approval is waiting.
    pub async fn resolve(
        &self,
        incident_id: &str,
        intervention_type: &str,
        approver: &str,
        decision: bool,
        notes: &str,
    ) -> Result<()> {
        let mut state = self.status(incident_id).await?;
        state.resolve_intervention(intervention_type, approver, decision, notes)?;
        self.inner.session.put(&state).await?;

        info!(
            incident_id,
            intervention_type, decision, "human decision applied, resuming workflow"
        );
        self.inner.in_progress.fetch_add(1, Ordering::SeqCst);
        self.mark(incident_id, RunStatus::Queued);
        self.inner
            .queue_tx
            .send(WorkItem::Resume(Box::new(state)))
            .map_err(|_| TriageError::Internal("dispatch loop stopped".to_string()))?;
        Ok(())
    }

    /// Cancel an incident. In-flight runs observe the cancellation token;
    /// paused runs have their pending approvals marked cancelled and route
    /// through error handling.
    pub async fn cancel(&self, incident_id: &str) -> Result<()> {
        if let Some(entry) = self.inner.runs.get(incident_id) {
            entry.cancel.cancel();
        }

        let mut state = self.status(incident_id).await?;
        if state.workflow_paused {
            let pending: Vec<String> = state
                .pending_approvals
                .iter()
                .map(|r| r.intervention_type.clone())
                .collect();
            for intervention_type in pending {
                state.resolve_intervention(&intervention_type, "system", false, "cancelled")?;
            }
            self.inner.session.put(&state).await?;
            self.inner.in_progress.fetch_add(1, Ordering::SeqCst);
            self.inner
                .queue_tx
                .send(WorkItem::Resume(Box::new(state)))
                .map_err(|_| TriageError::Internal("dispatch loop stopped".to_string()))?;
        }
        Ok(())
    }

    /// Search durable incident records.
    pub async fn search(
        &self,
        filters: &SearchFilters,
    ) -> Result<Vec<crate::memory::IncidentRecord>> {
        match &self.inner.store {
            Some(store) => store.search_incidents(filters).await,
            None => Ok(Vec::new()),
        }
    }

    /// Incidents accepted and not yet terminal or paused.
    pub fn in_progress(&self) -> usize {
        self.inner.in_progress.load(Ordering::SeqCst)
    }

    /// Drain tool performance samples into the metrics table.
    pub fn attach_perf_drain(&self, mut rx: mpsc::UnboundedReceiver<PerfSample>) {
        let store = self.inner.store.clone();
        tokio::spawn(async move {
            while let Some(sample) = rx.recv().await {
                if let Some(store) = &store {
                    let details = serde_json::json!({
                        "success": sample.success,
                        "confidence": sample.confidence,
                    });
                    if let Err(error) = store
                        .record_performance_metric(
                            None,
                            &format!("tool_{}", sample.tool),
                            sample.duration_ms as f64,
                            details,
                        )
                        .await
                    {
                        warn!(%error, "failed to record tool performance sample");
                    }
                }
            }
        });
    }

    fn mark(&self, incident_id: &str, status: RunStatus) {
        if let Some(entry) = self.inner.runs.get(incident_id) {
            let _ = entry.tx.send(status);
        }
    }
}

async fn dispatch_loop(
    inner: Arc<EngineInner>,
    mut queue_rx: mpsc::UnboundedReceiver<WorkItem>,
    worker_pool_size: usize,
) {
    let pool = Arc::new(Semaphore::new(worker_pool_size));
    while let Some(item) = queue_rx.recv().await {
        let permit = match pool.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let inner = inner.clone();
        tokio::spawn(async move {
            process_item(inner, item).await;
            drop(permit);
        });
    }
}

async fn process_item(inner: Arc<EngineInner>, item: WorkItem) {
    let state = match item {
        WorkItem::Start(state) | WorkItem::Resume(state) => *state,
    };
    let incident_id = state.incident_id.clone();

    let cancel = inner
        .runs
        .get(&incident_id)
        .map(|entry| entry.cancel.clone())
        .unwrap_or_default();
    set_status(&inner, &incident_id, RunStatus::Running);

    let result = inner.runner.run(state, cancel).await;
    // The queue slot frees as soon as the worker lets go of the incident
    inner.in_progress.fetch_sub(1, Ordering::SeqCst);

    match result {
        Ok(RunResult::Completed(state)) => {
            set_status(&inner, &incident_id, RunStatus::Completed);
            info!(incident_id = %state.incident_id, "workflow completed");
        }
        Ok(RunResult::Suspended(state)) => {
            set_status(&inner, &incident_id, RunStatus::Paused);
            info!(
                incident_id = %state.incident_id,
                pending = state.pending_approvals.len(),
                "workflow paused awaiting approval"
            );
        }
        Ok(RunResult::Failed(state)) => {
            set_status(&inner, &incident_id, RunStatus::Failed);
            warn!(
                incident_id = %state.incident_id,
                failed_steps = state.failed_steps.len(),
                "workflow terminated through error handling"
            );
        }
        Err(error) => {
            set_status(&inner, &incident_id, RunStatus::Failed);
            error!(incident_id = %incident_id, %error, "workflow run aborted");
            if let Some(store) = &inner.store {
                let _ = store
                    .record_performance_metric(
                        Some(&incident_id),
                        "workflow_abort",
                        1.0,
                        serde_json::json!({"error": error.to_string()}),
                    )
                    .await;
            }
        }
    }
}

fn set_status(inner: &Arc<EngineInner>, incident_id: &str, status: RunStatus) {
    if let Some(entry) = inner.runs.get(incident_id) {
        let _ = entry.tx.send(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{
        runner_with, runner_with_llm, FakeSystems, HangingLlm, GUEST_ACCESS_CLASSIFICATION,
        GUEST_ACCESS_RISK,
    };
    use crate::models::IncidentMetadata;
    use std::time::Duration;

    fn engine_with(runner: WorkflowRunner, config: EngineConfig) -> TriageEngine {
        TriageEngine::new(runner, None, config)
    }

    fn keycard_metadata() -> IncidentMetadata {
        IncidentMetadata {
            room_number: Some("1205".to_string()),
            property_code: Some("P01".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn submit_then_status_round_trips_the_incident_id() {
        let systems = Arc::new(FakeSystems::default());
        let engine = engine_with(
            runner_with(vec![GUEST_ACCESS_CLASSIFICATION, GUEST_ACCESS_RISK, "{}"], systems),
            EngineConfig::default(),
        );

        let handle = engine
            .submit(
                "Suspicious keycard activity",
                "Card KC_887234 used simultaneously at room 1205 and penthouse elevator within 30s",
                Some(keycard_metadata()),
            )
            .await
            .unwrap();

        let snapshot = engine.status(&handle.incident_id).await.unwrap();
        assert_eq!(snapshot.incident_id, handle.incident_id);
    }

    #[tokio::test]
    async fn autonomous_incident_runs_to_completion() {
        let systems = Arc::new(FakeSystems::default());
        let engine = engine_with(
            runner_with(
                vec![GUEST_ACCESS_CLASSIFICATION, GUEST_ACCESS_RISK, "{}"],
                systems.clone(),
            ),
            EngineConfig::default(),
        );

        let handle = engine
            .submit(
                "Suspicious keycard activity",
                "Card KC_887234 used simultaneously at room 1205 and penthouse elevator within 30s",
                Some(keycard_metadata()),
            )
            .await
            .unwrap();
        let incident_id = handle.incident_id.clone();

        let status = handle.await_terminal().await;
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(
            systems.revoked_cards.lock().unwrap().clone(),
            vec!["KC_887234".to_string()]
        );

        let snapshot = engine.status(&incident_id).await.unwrap();
        assert_eq!(snapshot.status, crate::models::IncidentStatus::Resolved);
        assert_eq!(engine.in_progress(), 0);
    }

    #[tokio::test]
    async fn resolve_resumes_a_paused_workflow() {
        let systems = Arc::new(FakeSystems::default());
        let classification = r#"{"category": "payment_fraud", "confidence": 0.88, "reasoning": "velocity", "alternative_categories": [], "extracted_entities": {}, "severity_indicators": []}"#;
        let risk = r#"{"risk_score": 7.0, "likelihood_score": 7.5, "confidence_score": 0.85, "risk_factors": [], "potential_impact": "chargebacks"}"#;
        let engine = engine_with(
            runner_with(vec![classification, risk, "{}"], systems.clone()),
            EngineConfig::default(),
        );

        let handle = engine
            .submit(
                "Card fraud at spa POS",
                "8 failed transactions on one card at the spa POS",
                None,
            )
            .await
            .unwrap();
        let incident_id = handle.incident_id.clone();

        // Wait for the pause
        let mut waited = 0;
        loop {
            let snapshot = engine.status(&incident_id).await.unwrap();
            if snapshot.workflow_paused {
                break;
            }
            waited += 1;
            assert!(waited < 200, "workflow never paused");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        engine
            .resolve(&incident_id, "legal_review", "legal_counsel", true, "cleared")
            .await
            .unwrap();

        assert_eq!(handle.await_terminal().await, RunStatus::Completed);
        assert_eq!(
            systems.compliance_reports.lock().unwrap().clone(),
            vec!["pci_dss".to_string()]
        );
    }

    #[tokio::test]
    async fn resolve_without_matching_approval_is_not_pending() {
        let systems = Arc::new(FakeSystems::default());
        let engine = engine_with(
            runner_with(vec![GUEST_ACCESS_CLASSIFICATION, GUEST_ACCESS_RISK, "{}"], systems),
            EngineConfig::default(),
        );

        let handle = engine
            .submit(
                "Suspicious keycard activity",
                "Card KC_887234 used simultaneously at room 1205 and penthouse elevator within 30s",
                Some(keycard_metadata()),
            )
            .await
            .unwrap();
        let incident_id = handle.incident_id.clone();
        handle.await_terminal().await;

        // Unknown incident: not found
        let err = engine
            .resolve("INC-missing", "legal_review", "gm", true, "")
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::NotFound(_)));

        // Known incident with nothing pending: not pending
        let err = engine
            .resolve(&incident_id, "legal_review", "gm", true, "")
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::NotPending(_)));
    }

    #[tokio::test]
    async fn empty_submission_is_rejected_as_validation() {
        let systems = Arc::new(FakeSystems::default());
        let engine = engine_with(runner_with(vec![], systems), EngineConfig::default());
        let err = engine.submit("", "", None).await.unwrap_err();
        assert!(matches!(err, TriageError::Validation(_)));
    }

    #[tokio::test]
    async fn queue_full_fires_exactly_at_the_bound() {
        let systems = Arc::new(FakeSystems::default());
        // A hanging model keeps every worker busy so submissions accumulate
        let engine = engine_with(
            runner_with_llm(Arc::new(HangingLlm), systems),
            EngineConfig {
                worker_pool_size: 1,
                queue_bound: 3,
            },
        );

        for i in 0..3 {
            engine
                .submit(&format!("incident {i}"), "queued while the pool is busy", None)
                .await
                .expect("accepted below the bound");
        }
        let err = engine
            .submit("incident 3", "one past the bound", None)
            .await
            .unwrap_err();
        assert!(matches!(err, TriageError::QueueFull(_)));
        assert_eq!(engine.in_progress(), 3);
    }
}
