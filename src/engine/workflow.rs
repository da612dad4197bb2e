// Workflow runner - the typed node graph over incident state

//! # Workflow Runner
//!
//! Executes the deterministic node graph over a single `IncidentState`:
//! validate -> classify -> assess risk -> safety gate -> prioritize -> select
//! playbook -> compliance gate -> approval gate -> generate response ->
//! execute actions -> document -> notify -> schedule follow-up -> update
//! metrics, with `handle_error` as the terminal error path.
//!
//! Each node is an async function over the state that either transitions,
//! suspends (human input required) or completes the run. The runner
//! checkpoints after every node transition — not every mutation — before
//! routing. Node failures are captured into `failed_steps` and route to
//! error handling; checkpoint write failures terminate the run.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::engine::decision::DecisionEngine;
use crate::engine::executor::ActionExecutor;
use crate::engine::gates::{
    approval_router, compliance_router, execution_router, resume_target, safety_router,
    ApprovalRoute, ComplianceRoute, SafetyRoute,
};
use crate::evaluation::{Evaluator, RoiCalculator};
use crate::integrations::{NotificationChannel, NotificationGateway};
use crate::memory::{MemoryRetriever, PersistentStore, SessionStore};
use crate::models::{Checkpoint, IncidentPriority, IncidentState, IncidentStatus, WorkflowStep};
use crate::tools::{
    ComplianceChecker, IncidentClassifier, IncidentPrioritizer, PlaybookSelector,
    ResponseGenerator, SafetyGuardrails,
};
use crate::{Result, TriageError};

/// Result of running one node
#[derive(Debug)]
pub enum NodeOutcome {
    /// Continue to the named step
    Transition(WorkflowStep),
    /// Pause for human input; the run releases its worker slot
    Suspended { reason: String },
    /// The workflow reached a terminal node
    Complete,
}

/// Terminal result of a run segment
#[derive(Debug)]
pub enum RunResult {
    /// The workflow finished successfully
    Completed(IncidentState),
    /// The workflow is paused awaiting a human decision
    Suspended(IncidentState),
    /// The workflow terminated through the error path
    Failed(IncidentState),
}

impl RunResult {
    pub fn state(&self) -> &IncidentState {
        match self {
            RunResult::Completed(s) | RunResult::Suspended(s) | RunResult::Failed(s) => s,
        }
    }
}

/// The tool adapters a runner drives
pub struct ToolSet {
    pub classifier: IncidentClassifier,
    pub prioritizer: IncidentPrioritizer,
    pub selector: PlaybookSelector,
    pub responder: ResponseGenerator,
    pub compliance: ComplianceChecker,
    pub safety: SafetyGuardrails,
}

/// Runner tuning knobs
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Per-node timeout for every node except action execution
    pub node_timeout: Duration,
    /// Retries for nodes failing with transient errors
    pub node_retries: u32,
    pub retry_base_ms: u64,
    /// Overall wall-clock budget for one run segment
    pub workflow_timeout: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            node_timeout: Duration::from_secs(300),
            node_retries: 3,
            retry_base_ms: 200,
            workflow_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Drives the workflow graph for one incident at a time
pub struct WorkflowRunner {
    tools: ToolSet,
    decision: DecisionEngine,
    evaluator: Evaluator,
    roi: RoiCalculator,
    executor: Arc<ActionExecutor>,
    notifier: Arc<dyn NotificationGateway>,
    session: Arc<dyn SessionStore>,
    store: Option<Arc<PersistentStore>>,
    retriever: Option<Arc<MemoryRetriever>>,
    config: RunnerConfig,
}

impl WorkflowRunner {
    pub fn new(
        tools: ToolSet,
        executor: Arc<ActionExecutor>,
        notifier: Arc<dyn NotificationGateway>,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            tools,
            decision: DecisionEngine::new(),
            evaluator: Evaluator::new(),
            roi: RoiCalculator::new(),
            executor,
            notifier,
            session,
            store: None,
            retriever: None,
            config: RunnerConfig::default(),
        }
    }

    pub fn with_store(mut self, store: Arc<PersistentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<MemoryRetriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_config(mut self, config: RunnerConfig) -> Self {
        self.config = config;
        self
    }

    /// The session store this runner checkpoints into. The dispatcher serves
    /// status queries from the same store.
    pub fn session_handle(&self) -> Arc<dyn SessionStore> {
        self.session.clone()
    }

    /// Run the workflow from the state's current step until it completes,
    /// suspends or fails. Exactly one node runs at a time; the state is
    /// checkpointed after every transition before routing continues.
    pub async fn run(
        &self,
        mut state: IncidentState,
        cancel: CancellationToken,
    ) -> Result<RunResult> {
        let deadline = Instant::now() + self.config.workflow_timeout;
        let mut sequence = self
            .session
            .latest_checkpoint(&state.incident_id)
            .await?
            .map(|c| c.sequence)
            .unwrap_or(0);
        let mut step = state.current_step;

        loop {
            if cancel.is_cancelled() && step != WorkflowStep::HandleError {
                state.mark_step_failed(step, "cancelled");
                step = WorkflowStep::HandleError;
                continue;
            }
            if Instant::now() >= deadline && step != WorkflowStep::HandleError {
                state.mark_step_failed(step, "workflow deadline exceeded");
                step = WorkflowStep::HandleError;
                continue;
            }

            let outcome = self.run_node_with_retries(step, &mut state, &cancel).await;

            let outcome = match outcome {
                Ok(outcome) => outcome,
                Err(error) => {
                    warn!(incident_id = %state.incident_id, step = %step, error = %error, "node failed");
                    state.mark_step_failed(step, error.to_string());
                    if step == WorkflowStep::HandleError {
                        // The error handler itself failed; stop without looping
                        state.status = IncidentStatus::Closed;
                        self.terminal_commit(&state).await;
                        return Ok(RunResult::Failed(state));
                    }
                    // The transition into error handling checkpoints like any
                    // other transition
                    sequence += 1;
                    if let Err(error) = self.write_checkpoint(&state, step, sequence).await {
                        return self.abort_on_checkpoint_failure(state, step, error).await;
                    }
                    step = WorkflowStep::HandleError;
                    continue;
                }
            };

            // Invariant violations are fatal and forensically recorded
            if let Err(violation) = state.check_invariants() {
                error!(incident_id = %state.incident_id, %violation, "state invariant violated");
                if let Some(store) = &self.store {
                    let _ = store
                        .record_performance_metric(
                            Some(&state.incident_id),
                            "invariant_violation",
                            1.0,
                            json!({"step": step, "error": violation.to_string()}),
                        )
                        .await;
                }
                return Err(violation);
            }

            // Checkpoint after the node, before routing. A write failure is
            // fatal for this run.
            sequence += 1;
            if let Err(error) = self.write_checkpoint(&state, step, sequence).await {
                return self.abort_on_checkpoint_failure(state, step, error).await;
            }

            match outcome {
                NodeOutcome::Transition(next) => {
                    step = next;
                }
                NodeOutcome::Suspended { reason } => {
                    info!(incident_id = %state.incident_id, reason, "workflow suspended for human input");
                    if let Some(store) = &self.store {
                        let _ = store.store_incident(&state, "suspended").await;
                    }
                    return Ok(RunResult::Suspended(state));
                }
                NodeOutcome::Complete => {
                    self.terminal_commit(&state).await;
                    return if state.status == IncidentStatus::Resolved {
                        Ok(RunResult::Completed(state))
                    } else {
                        Ok(RunResult::Failed(state))
                    };
                }
            }
        }
    }

    async fn write_checkpoint(
        &self,
        state: &IncidentState,
        step: WorkflowStep,
        sequence: u64,
    ) -> Result<()> {
        let checkpoint = Checkpoint::capture(state, step, sequence)?;
        self.session.append_checkpoint(&checkpoint).await?;
        self.session.put(state).await?;
        Ok(())
    }

    async fn abort_on_checkpoint_failure(
        &self,
        mut state: IncidentState,
        step: WorkflowStep,
        error: TriageError,
    ) -> Result<RunResult> {
        error!(incident_id = %state.incident_id, %error, "checkpoint write failed");
        state.mark_step_failed(step, format!("checkpoint write failed: {}", error));
        state.status = IncidentStatus::Closed;
        self.terminal_commit(&state).await;
        Ok(RunResult::Failed(state))
    }

    async fn terminal_commit(&self, state: &IncidentState) {
        if let Err(error) = self.session.put(state).await {
            warn!(incident_id = %state.incident_id, %error, "session write at terminal commit failed");
        }
        if let Some(store) = &self.store {
            if let Err(error) = store.store_incident(state, "terminal_commit").await {
                warn!(incident_id = %state.incident_id, %error, "persistent write at terminal commit failed");
            }
        }
    }

    async fn run_node_with_retries(
        &self,
        step: WorkflowStep,
        state: &mut IncidentState,
        cancel: &CancellationToken,
    ) -> Result<NodeOutcome> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let result = if step == WorkflowStep::ExecuteImmediateActions {
                // Action execution is bounded by per-action deadlines and the
                // workflow budget, not the per-node timeout
                self.run_node(step, state, cancel).await
            } else {
                match tokio::time::timeout(
                    self.config.node_timeout,
                    self.run_node(step, state, cancel),
                )
                .await
                {
                    Ok(result) => result,
                    Err(_) => Err(TriageError::Timeout(format!("node {} timed out", step))),
                }
            };

            match result {
                Err(error) if error.is_transient() && attempt <= self.config.node_retries => {
                    let backoff = Duration::from_millis(
                        self.config.retry_base_ms * 2u64.pow(attempt.min(8) - 1),
                    );
                    warn!(step = %step, attempt, "transient node failure, retrying");
                    tokio::time::sleep(backoff).await;
                }
                other => return other,
            }
        }
    }

    async fn run_node(
        &self,
        step: WorkflowStep,
        state: &mut IncidentState,
        cancel: &CancellationToken,
    ) -> Result<NodeOutcome> {
        match step {
            WorkflowStep::ValidateInput => self.validate_input(state).await,
            WorkflowStep::ClassifyIncident => self.classify_incident(state).await,
            WorkflowStep::AssessRisk => self.assess_risk(state).await,
            WorkflowStep::SafetyCheck => self.safety_check(state),
            WorkflowStep::PrioritizeIncident => self.prioritize_incident(state),
            WorkflowStep::SelectPlaybook => self.select_playbook(state),
            WorkflowStep::ComplianceCheck => self.compliance_check(state),
            WorkflowStep::HumanApprovalGate => self.human_approval_gate(state),
            WorkflowStep::GenerateResponse => self.generate_response(state).await,
            WorkflowStep::ExecuteImmediateActions => self.execute_actions(state, cancel).await,
            WorkflowStep::DocumentIncident => self.document_incident(state).await,
            WorkflowStep::NotifyStakeholders => self.notify_stakeholders(state).await,
            WorkflowStep::ScheduleFollowup => self.schedule_followup(state),
            WorkflowStep::UpdateMetrics => self.update_metrics(state).await,
            WorkflowStep::HandleError => self.handle_error(state).await,
        }
    }

    async fn validate_input(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::ValidateInput);

        if state.title.trim().is_empty() || state.description.trim().is_empty() {
            return Err(TriageError::Validation(
                "incident must have a title and a description".to_string(),
            ));
        }

        if let Some(retriever) = &self.retriever {
            match retriever
                .historical_context(&state.title, &state.description, None)
                .await
            {
                Ok(context) => {
                    state.historical_context.insert(
                        "similar_incidents".to_string(),
                        json!(context.similar_incidents.len()),
                    );
                    state
                        .historical_context
                        .insert("patterns".to_string(), serde_json::to_value(&context.patterns)?);
                }
                Err(error) => {
                    // Historical context is advisory; a retriever outage
                    // never blocks intake
                    warn!(%error, "historical context unavailable");
                }
            }
        }

        state.add_tool_result("input_validation", json!({"status": "passed"}));
        Ok(NodeOutcome::Transition(WorkflowStep::ClassifyIncident))
    }

    async fn classify_incident(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::ClassifyIncident);

        let result = self
            .tools
            .classifier
            .classify(&state.title, &state.description, &state.metadata)
            .await;
        state.category = Some(result.category);
        state.classification_confidence = Some(result.confidence);
        state.add_tool_result("classification", serde_json::to_value(&result)?);
        info!(
            incident_id = %state.incident_id,
            category = %result.category,
            confidence = result.confidence,
            "incident classified"
        );
        Ok(NodeOutcome::Transition(WorkflowStep::AssessRisk))
    }

    async fn assess_risk(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::AssessRisk);

        let category = state
            .category
            .ok_or_else(|| TriageError::UnsafeState("risk assessment before classification".to_string()))?;
        let assessment = self
            .tools
            .prioritizer
            .assess_risk(category, &state.description, &state.metadata)
            .await;
        state.add_tool_result("risk_assessment", serde_json::to_value(&assessment)?);
        state.risk_assessment = Some(assessment);
        Ok(NodeOutcome::Transition(WorkflowStep::SafetyCheck))
    }

    fn safety_check(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::SafetyCheck);

        let risk_score = state
            .risk_assessment
            .as_ref()
            .map(|r| r.risk_score)
            .unwrap_or(0.0);
        let result = self
            .tools
            .safety
            .check_safety(&state.description, state.category, risk_score);
        state.safety_guardrails_passed = result.passed;
        state.add_tool_result("safety_check", serde_json::to_value(&result)?);

        if !result.passed {
            // Gate signal: critical violations force the top priority band
            state.override_priority(
                IncidentPriority::Critical,
                "safety_gate",
                "critical safety violation detected",
            );
        } else if result.requires_human_review {
            state.request_intervention(
                "safety_review",
                &result.review_reason,
                IncidentPriority::High,
                "security_manager",
                None,
            )?;
        }

        match safety_router(state) {
            SafetyRoute::Continue => Ok(NodeOutcome::Transition(WorkflowStep::PrioritizeIncident)),
            SafetyRoute::HumanReview => Ok(NodeOutcome::Transition(WorkflowStep::HumanApprovalGate)),
            SafetyRoute::Reject => Err(TriageError::GateVeto(format!(
                "safety gate rejected the incident: {}",
                result.review_reason
            ))),
        }
    }

    fn prioritize_incident(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::PrioritizeIncident);

        let category = state
            .category
            .ok_or_else(|| TriageError::UnsafeState("prioritization before classification".to_string()))?;
        let assessment = state
            .risk_assessment
            .clone()
            .ok_or_else(|| TriageError::UnsafeState("prioritization before risk assessment".to_string()))?;
        let result = self
            .tools
            .prioritizer
            .prioritize(category, &assessment, &state.metadata);
        state.priority = Some(result.priority);
        state.add_tool_result("prioritization", serde_json::to_value(&result)?);
        Ok(NodeOutcome::Transition(WorkflowStep::SelectPlaybook))
    }

    fn select_playbook(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::SelectPlaybook);

        let category = state
            .category
            .ok_or_else(|| TriageError::UnsafeState("playbook selection before classification".to_string()))?;
        let selection = self.tools.selector.select(
            category,
            state.effective_priority(),
            state.risk_assessment.as_ref(),
        );
        state.add_tool_result("playbook_selection", serde_json::to_value(&selection)?);
        state.selected_playbook = Some(selection.recommended_playbook);
        Ok(NodeOutcome::Transition(WorkflowStep::ComplianceCheck))
    }

    fn compliance_check(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::ComplianceCheck);

        let category = state
            .category
            .ok_or_else(|| TriageError::UnsafeState("compliance check before classification".to_string()))?;
        let report = self
            .tools
            .compliance
            .check(category, &state.metadata, state.selected_playbook.as_ref());
        state.compliance_checks = report.framework_checks.clone();
        state.add_tool_result("compliance_check", serde_json::to_value(&report)?);

        if report.requires_legal_review {
            state.request_intervention(
                "legal_review",
                "Compliance requirements mandate legal review",
                state.effective_priority(),
                "legal_counsel",
                Some(240),
            )?;
        }

        match compliance_router(state) {
            ComplianceRoute::Approved => Ok(NodeOutcome::Transition(WorkflowStep::GenerateResponse)),
            ComplianceRoute::RequiresApproval => {
                Ok(NodeOutcome::Transition(WorkflowStep::HumanApprovalGate))
            }
            ComplianceRoute::Rejected => Err(TriageError::GateVeto(
                "compliance gate rejected the incident".to_string(),
            )),
        }
    }

    fn human_approval_gate(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::HumanApprovalGate);

        let expired = state.expire_stale_approvals(Utc::now());
        if !expired.is_empty() {
            return Err(TriageError::GateVeto(format!(
                "approval_timeout: {}",
                expired.join(", ")
            )));
        }

        // Low-risk requests clear automatically; so does a lone safety review,
        // which exists to force a second look at routing rather than to block.
        let lone_safety_review = state.pending_approvals.len() == 1
            && state.pending_approvals[0].intervention_type == "safety_review";
        let low_priority = matches!(
            state.effective_priority(),
            IncidentPriority::Low | IncidentPriority::Informational
        );
        if lone_safety_review || low_priority {
            let pending: Vec<String> = state
                .pending_approvals
                .iter()
                .map(|r| r.intervention_type.clone())
                .collect();
            for intervention_type in pending {
                state.resolve_intervention(
                    &intervention_type,
                    "system_auto_approval",
                    true,
                    "Auto-approved based on low risk assessment",
                )?;
            }
        }

        state.add_tool_result(
            "human_approval",
            json!({
                "pending_count": state.pending_approvals.len(),
                "approvals_recorded": state.approval_history.len(),
            }),
        );

        match approval_router(state) {
            ApprovalRoute::Pending => Ok(NodeOutcome::Suspended {
                reason: format!(
                    "awaiting {} approval",
                    state
                        .pending_approvals
                        .first()
                        .map(|r| r.intervention_type.as_str())
                        .unwrap_or("human")
                ),
            }),
            ApprovalRoute::Rejected => Err(TriageError::GateVeto(
                "human approver rejected the workflow".to_string(),
            )),
            ApprovalRoute::Approved => Ok(NodeOutcome::Transition(resume_target(state))),
        }
    }

    async fn generate_response(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::GenerateResponse);

        let plan = self.tools.responder.generate(state).await;
        state.add_tool_result("response_generation", serde_json::to_value(&plan)?);
        state.response_plan = Some(plan);
        Ok(NodeOutcome::Transition(WorkflowStep::ExecuteImmediateActions))
    }

    async fn execute_actions(
        &self,
        state: &mut IncidentState,
        cancel: &CancellationToken,
    ) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::ExecuteImmediateActions);

        let historical_success = match (&self.store, state.category) {
            (Some(store), Some(category)) => store
                .category_success_rate(category.as_str())
                .await
                .ok()
                .flatten(),
            _ => None,
        };

        let plan = self
            .decision
            .make_plan(state, historical_success, Utc::now());
        state.add_tool_result("decision_plan", serde_json::to_value(&plan)?);

        let authorized = plan.autonomous || human_execution_authorized(state);
        if !authorized {
            state.request_intervention(
                "management_approval",
                &plan.reasoning,
                state.effective_priority(),
                "security_manager",
                Some(120),
            )?;
            return Ok(NodeOutcome::Transition(WorkflowStep::HumanApprovalGate));
        }

        let report = self
            .executor
            .execute(&state.incident_id, &plan.actions, cancel)
            .await?;
        state.add_tool_result(
            "action_execution",
            json!({
                "planned": report.planned,
                "succeeded": report.succeeded(),
                "failed": report.failed(),
                "success_rate": report.success_rate,
                "escalate": report.escalate,
                "cancelled": report.cancelled,
                "rollbacks_performed": report.rollbacks_performed,
                "results": serde_json::to_value(&report.results)?,
            }),
        );

        if report.cancelled {
            return Err(TriageError::Timeout(
                "action execution cancelled mid-run".to_string(),
            ));
        }
        if report.escalate {
            state.request_intervention(
                "execution_review",
                "an action with an escalate failure policy failed",
                state.effective_priority(),
                "security_manager",
                Some(120),
            )?;
            return Ok(NodeOutcome::Transition(WorkflowStep::HumanApprovalGate));
        }
        if report.success_rate < 0.8 && report.success_rate >= 0.5 {
            state.record_metric(
                "execution_warning",
                json!(format!("automation success rate {:.2}", report.success_rate)),
            );
        }

        Ok(NodeOutcome::Transition(execution_router(state)))
    }

    async fn document_incident(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::DocumentIncident);

        if let Some(store) = &self.store {
            store.store_incident(state, "documented").await?;
        }
        state.add_tool_result(
            "documentation",
            json!({
                "incident_id": state.incident_id,
                "documented_at": state.updated_at.to_rfc3339(),
            }),
        );
        Ok(NodeOutcome::Transition(WorkflowStep::NotifyStakeholders))
    }

    async fn notify_stakeholders(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::NotifyStakeholders);

        let recipients: Vec<String> = state
            .tool_result("prioritization")
            .and_then(|v| v.get("stakeholders_to_notify"))
            .and_then(|v| v.as_array())
            .map(|list| {
                list.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_else(|| vec!["security_team".to_string()]);

        // Everything leaving the trust boundary is sanitized first
        let summary = self.tools.safety.sanitize_text(&format!(
            "Incident {}: {} ({} priority, {})",
            state.incident_id,
            state.title,
            state.effective_priority(),
            state
                .category
                .map(|c| c.to_string())
                .unwrap_or_else(|| "unclassified".to_string()),
        ));

        let sends = recipients.iter().map(|recipient| {
            let summary = summary.clone();
            async move {
                let outcome = self
                    .notifier
                    .send(
                        NotificationChannel::Messaging,
                        recipient,
                        "security incident update",
                        &summary,
                    )
                    .await;
                (recipient.clone(), outcome)
            }
        });

        let mut sent = 0usize;
        let mut failures = Vec::new();
        for (recipient, outcome) in futures::future::join_all(sends).await {
            match outcome {
                Ok(_) => sent += 1,
                Err(error) => {
                    // External delivery failures are recorded, never fatal
                    failures.push(json!({"recipient": recipient, "error": error.to_string()}));
                }
            }
        }

        state.add_tool_result(
            "notifications",
            json!({"sent": sent, "failed": failures, "count": recipients.len()}),
        );
        Ok(NodeOutcome::Transition(WorkflowStep::ScheduleFollowup))
    }

    fn schedule_followup(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::ScheduleFollowup);

        let tasks: Vec<serde_json::Value> = state
            .response_plan
            .as_ref()
            .map(|plan| {
                plan.follow_up_actions
                    .iter()
                    .map(|action| {
                        json!({
                            "action": action,
                            "scheduled_for": "24_hours",
                            "assignee": "security_team",
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        state.add_tool_result(
            "followup_scheduling",
            json!({"count": tasks.len(), "tasks": tasks}),
        );
        Ok(NodeOutcome::Transition(WorkflowStep::UpdateMetrics))
    }

    async fn update_metrics(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::UpdateMetrics);

        let report = self.evaluator.evaluate(state);
        for (dimension, score) in &report.scores {
            state.quality_scores.insert(dimension.clone(), *score);
        }
        state.quality_scores.insert("overall".to_string(), report.overall);

        let roi = self.roi.calculate(state);
        state.record_metric("roi_percentage", json!(roi.roi_percentage));
        state.record_metric("grade", json!(report.grade.to_string()));
        state.record_metric(
            "total_processing_seconds",
            json!(state.processing_seconds()),
        );
        state.record_metric("steps_completed", json!(state.completed_steps.len()));
        state.record_metric("steps_failed", json!(state.failed_steps.len()));
        state.record_metric("human_interventions", json!(state.approval_history.len()));

        if let Some(store) = &self.store {
            // The workflow is already done; a metrics-write blip must not
            // fail the run
            if let Err(error) = store
                .record_performance_metric(
                    Some(&state.incident_id),
                    "overall_quality",
                    report.overall,
                    json!({"grade": report.grade.to_string(), "roi_percentage": roi.roi_percentage}),
                )
                .await
            {
                warn!(incident_id = %state.incident_id, %error, "quality metric write failed");
            }
        }

        state.status = IncidentStatus::Resolved;
        state.resolved_at = Some(Utc::now());
        info!(
            incident_id = %state.incident_id,
            overall = report.overall,
            grade = %report.grade,
            "incident processing completed"
        );
        Ok(NodeOutcome::Complete)
    }

    async fn handle_error(&self, state: &mut IncidentState) -> Result<NodeOutcome> {
        state.update_step(WorkflowStep::HandleError);

        let summary = json!({
            "failed_steps": serde_json::to_value(&state.failed_steps)?,
            "error_count": state.failed_steps.len(),
            "last_error": state
                .failed_steps
                .last()
                .map(|f| f.error.clone())
                .unwrap_or_default(),
        });
        state.add_tool_result("error_handling", summary.clone());

        if let Some(store) = &self.store {
            let _ = store
                .record_performance_metric(Some(&state.incident_id), "workflow_error", 1.0, summary)
                .await;
        }

        state.status = IncidentStatus::Closed;
        Ok(NodeOutcome::Complete)
    }
}

/// Whether a human decision already authorizes execution: an approved legal
/// review, management approval or execution review all carry that authority.
fn human_execution_authorized(state: &IncidentState) -> bool {
    state.approval_history.iter().any(|record| {
        record.decision
            && matches!(
                record.intervention_type.as_str(),
                "legal_review" | "management_approval" | "execution_review"
            )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{
        runner_with, FakeSystems, GUEST_ACCESS_CLASSIFICATION, GUEST_ACCESS_RISK,
    };
    use crate::integrations::RoomStatus;
    use crate::models::IncidentMetadata;

    fn keycard_incident() -> IncidentState {
        IncidentState::new(
            "Suspicious keycard activity",
            "Card KC_887234 used simultaneously at room 1205 and penthouse elevator within 30s",
            IncidentMetadata {
                room_number: Some("1205".to_string()),
                property_code: Some("P01".to_string()),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn autonomous_guest_access_revoke_end_to_end() {
        let systems = Arc::new(FakeSystems::default());
        let runner = runner_with(
            vec![GUEST_ACCESS_CLASSIFICATION, GUEST_ACCESS_RISK, "{}"],
            systems.clone(),
        );

        let result = runner
            .run(keycard_incident(), CancellationToken::new())
            .await
            .unwrap();

        let state = match result {
            RunResult::Completed(state) => state,
            other => panic!("expected completion, got {:?}", other),
        };

        assert_eq!(state.category, Some(crate::models::IncidentCategory::GuestAccess));
        assert_eq!(state.priority, Some(IncidentPriority::High));
        assert!(state.safety_guardrails_passed);
        assert_eq!(state.status, IncidentStatus::Resolved);

        // The decision ran autonomously and drove both external systems
        let decision = state.tool_result("decision_plan").unwrap();
        assert_eq!(decision["autonomous"], true);
        assert_eq!(
            systems.revoked_cards.lock().unwrap().clone(),
            vec!["KC_887234".to_string()]
        );
        assert_eq!(
            systems.room_updates.lock().unwrap().clone(),
            vec![("1205".to_string(), RoomStatus::SecurityHold)]
        );

        let execution = state.tool_result("action_execution").unwrap();
        assert_eq!(execution["success_rate"], 1.0);

        // Grade at least B
        assert!(state.quality_scores["overall"] >= 0.8);
        assert!(state.pending_approvals.is_empty());
        assert!(!state.workflow_paused);
    }

    #[tokio::test]
    async fn pii_breach_pauses_after_compliance_until_resolved() {
        let systems = Arc::new(FakeSystems::default());
        let classification = r#"{"category": "pii_breach", "confidence": 0.9, "reasoning": "bulk export of guest records", "alternative_categories": [], "extracted_entities": {}, "severity_indicators": ["bulk_export"]}"#;
        let risk = r#"{"risk_score": 7.5, "likelihood_score": 8.0, "confidence_score": 0.85, "risk_factors": ["insider access"], "potential_impact": "mass data exposure"}"#;
        let runner = runner_with(vec![classification, risk, "{}"], systems.clone());

        let mut incident = keycard_incident();
        incident.title = "Bulk export of guest records".to_string();
        incident.description =
            "1,500 guest records exported by maintenance_user at 02:14".to_string();
        incident.metadata.location = Some("EU corporate block".to_string());
        incident.metadata.affected_guests = vec!["eu_g_1".to_string(), "eu_g_2".to_string()];

        let result = runner
            .run(incident, CancellationToken::new())
            .await
            .unwrap();

        let state = match result {
            RunResult::Suspended(state) => state,
            other => panic!("expected suspension, got {:?}", other),
        };

        // Paused after the compliance node on a legal review
        assert!(state.workflow_paused);
        assert_eq!(state.pending_approvals.len(), 1);
        assert_eq!(state.pending_approvals[0].intervention_type, "legal_review");
        assert_eq!(state.current_step, WorkflowStep::HumanApprovalGate);

        // Frameworks include DPDP and GDPR for the EU guests
        assert!(state
            .compliance_checks
            .contains_key(&crate::models::ComplianceFramework::Dpdp));
        assert!(state
            .compliance_checks
            .contains_key(&crate::models::ComplianceFramework::Gdpr));

        // The safety review auto-cleared, leaving its audit record
        assert!(state
            .approval_history
            .iter()
            .any(|r| r.intervention_type == "safety_review" && r.approver == "system_auto_approval"));

        // No executor activity before the human decision
        assert!(systems.revoked_cards.lock().unwrap().is_empty());
        assert!(state.tool_result("action_execution").is_none());

        // A human approves; the workflow resumes from the checkpointed state
        let mut resumed = state;
        resumed
            .resolve_intervention("legal_review", "legal_counsel", true, "notification text cleared")
            .unwrap();
        let result = runner
            .run(resumed, CancellationToken::new())
            .await
            .unwrap();
        let finished = match result {
            RunResult::Completed(state) => state,
            other => panic!("expected completion after approval, got {:?}", other),
        };
        assert!(finished.tool_result("action_execution").is_some());
        assert!(systems
            .compliance_reports
            .lock()
            .unwrap()
            .contains(&"dpdp".to_string()));
    }

    #[tokio::test]
    async fn payment_fraud_carries_the_24_hour_deadline_and_escalating_report() {
        let systems = Arc::new(FakeSystems::default());
        let classification = r#"{"category": "payment_fraud", "confidence": 0.88, "reasoning": "repeated card failures", "alternative_categories": [], "extracted_entities": {}, "severity_indicators": ["velocity"]}"#;
        let risk = r#"{"risk_score": 7.0, "likelihood_score": 7.5, "confidence_score": 0.85, "risk_factors": ["card testing"], "potential_impact": "chargeback exposure"}"#;
        let runner = runner_with(vec![classification, risk, "{}"], systems.clone());

        let mut incident = keycard_incident();
        incident.title = "Card fraud at spa POS".to_string();
        incident.description = "8 failed transactions on one card at the spa POS".to_string();

        let result = runner
            .run(incident, CancellationToken::new())
            .await
            .unwrap();
        let state = match result {
            RunResult::Suspended(state) => state,
            other => panic!("expected legal-review suspension, got {:?}", other),
        };

        let compliance = state.tool_result("compliance_check").unwrap();
        assert_eq!(compliance["requires_legal_review"], true);
        assert_eq!(
            compliance["notification_deadlines"]["card_brands"],
            "24 hours"
        );

        // Approve and finish; the plan files a PCI compliance report whose
        // failure policy escalates
        let mut resumed = state;
        resumed
            .resolve_intervention("legal_review", "legal_counsel", true, "")
            .unwrap();
        let result = runner.run(resumed, CancellationToken::new()).await.unwrap();
        let finished = match result {
            RunResult::Completed(state) => state,
            other => panic!("expected completion, got {:?}", other),
        };
        let decision = finished.tool_result("decision_plan").unwrap();
        let report_action = decision["actions"]
            .as_array()
            .unwrap()
            .iter()
            .find(|a| a["action_type"] == "compliance_report")
            .expect("plan includes a compliance report action");
        assert_eq!(report_action["failure_policy"], "escalate");
        assert_eq!(
            systems.compliance_reports.lock().unwrap().clone(),
            vec!["pci_dss".to_string()]
        );
    }

    #[tokio::test]
    async fn classification_parse_error_falls_back_and_continues() {
        let systems = Arc::new(FakeSystems::default());
        // Classification output is garbage; risk assessment is valid
        let runner = runner_with(
            vec!["definitely not json", GUEST_ACCESS_RISK, "{}"],
            systems,
        );

        let result = runner
            .run(keycard_incident(), CancellationToken::new())
            .await
            .unwrap();
        let state = match result {
            RunResult::Completed(state) => state,
            RunResult::Suspended(state) => state,
            other => panic!("workflow must continue after a parse error, got {:?}", other),
        };

        assert!(state.classification_confidence.unwrap() <= 0.8);
        let classification = state.tool_result("classification").unwrap();
        let indicators: Vec<String> = classification["severity_indicators"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert!(indicators.contains(&"parsing_error".to_string()));
    }

    #[tokio::test]
    async fn empty_input_routes_to_error_handling() {
        let systems = Arc::new(FakeSystems::default());
        let runner = runner_with(vec![], systems);
        let incident = IncidentState::new("", "", IncidentMetadata::default());

        let result = runner
            .run(incident, CancellationToken::new())
            .await
            .unwrap();
        let state = match result {
            RunResult::Failed(state) => state,
            other => panic!("expected failure, got {:?}", other),
        };
        assert_eq!(state.status, IncidentStatus::Closed);
        assert!(state
            .failed_steps
            .iter()
            .any(|f| f.step == WorkflowStep::ValidateInput));
    }

    #[tokio::test]
    async fn checkpoints_are_sequential_and_cover_every_transition() {
        let systems = Arc::new(FakeSystems::default());
        let runner = runner_with(
            vec![GUEST_ACCESS_CLASSIFICATION, GUEST_ACCESS_RISK, "{}"],
            systems,
        );
        let incident = keycard_incident();
        let incident_id = incident.incident_id.clone();
        let session = runner.session.clone();

        let result = runner.run(incident, CancellationToken::new()).await.unwrap();
        let state = match result {
            RunResult::Completed(state) => state,
            other => panic!("expected completion, got {:?}", other),
        };

        let checkpoints = session.checkpoints(&incident_id).await.unwrap();
        assert!(!checkpoints.is_empty());
        for window in checkpoints.windows(2) {
            assert_eq!(window[0].sequence + 1, window[1].sequence);
            assert!(window[0].timestamp <= window[1].timestamp);
        }
        // Every completed step has a checkpoint record
        for step in &state.completed_steps {
            assert!(
                checkpoints.iter().any(|c| c.step == *step),
                "no checkpoint for step {}",
                step
            );
        }
    }

    #[tokio::test]
    async fn cancellation_before_execution_routes_to_error() {
        let systems = Arc::new(FakeSystems::default());
        let runner = runner_with(
            vec![GUEST_ACCESS_CLASSIFICATION, GUEST_ACCESS_RISK, "{}"],
            systems.clone(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = runner.run(keycard_incident(), cancel).await.unwrap();
        let state = match result {
            RunResult::Failed(state) => state,
            other => panic!("expected failure, got {:?}", other),
        };
        assert!(!state.failed_steps.is_empty());
        assert!(systems.revoked_cards.lock().unwrap().is_empty());
    }
}
