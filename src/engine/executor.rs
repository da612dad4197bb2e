// Action executor - dependency-ordered execution across hotel systems

//! # Action Executor
//!
//! Executes a decision plan's actions honoring dependencies, per-system rate
//! limits and concurrency caps, per-action deadlines and retry policies, and
//! produces a completion report with the automation success rate.
//!
//! Scheduling is a ready-queue driven by a completion channel: an action
//! becomes eligible the moment its last dependency succeeds, with no polling.
//! Failures consult the per-action failure policy (`block` cancels dependents,
//! `proceed` lets them run, `escalate` hands the workflow back to the human
//! approval gate). Actions that return rollback tokens register them; on
//! cancellation the executor replays the tokens in reverse completion order,
//! best effort.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::integrations::{
    AccessControlSystem, NotificationChannel, NotificationGateway, PropertySystem, RoomStatus,
};
use crate::models::{Action, ActionType, Destination, FailurePolicy};
use crate::tools::RateLimiter;
use crate::{Result, TriageError};

/// Sink for actions that record into the engine's own stores rather than an
/// external system (documentation, investigation notes, compliance reports).
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record_compliance_event(
        &self,
        incident_id: &str,
        framework: &str,
        event_type: &str,
        details: serde_json::Value,
    ) -> Result<()>;

    async fn record_document(
        &self,
        incident_id: &str,
        name: &str,
        details: serde_json::Value,
    ) -> Result<()>;
}

#[async_trait]
impl AuditSink for crate::memory::PersistentStore {
    async fn record_compliance_event(
        &self,
        incident_id: &str,
        framework: &str,
        event_type: &str,
        details: serde_json::Value,
    ) -> Result<()> {
        crate::memory::PersistentStore::record_compliance_event(
            self,
            incident_id,
            framework,
            event_type,
            details,
        )
        .await
    }

    async fn record_document(
        &self,
        incident_id: &str,
        name: &str,
        details: serde_json::Value,
    ) -> Result<()> {
        self.record_performance_metric(Some(incident_id), &format!("document_{}", name), 1.0, details)
            .await
    }
}

/// Executor tuning knobs
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub global_concurrency: usize,
    pub access_control_concurrency: usize,
    pub pms_concurrency: usize,
    pub notification_concurrency: usize,
    /// Deadline = estimated duration x this multiplier
    pub timeout_multiplier: u32,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_cap_ms: u64,
    /// Whether notification actions may register rollback tokens
    pub rollback_notifications: bool,
    pub rate_limit_per_minute: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            global_concurrency: 8,
            access_control_concurrency: 2,
            pms_concurrency: 2,
            notification_concurrency: 8,
            timeout_multiplier: 3,
            max_retries: 3,
            backoff_base_ms: 250,
            backoff_cap_ms: 30_000,
            rollback_notifications: false,
            rate_limit_per_minute: 100,
        }
    }
}

/// Terminal status of a single action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// Completion record for a single action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: String,
    pub name: String,
    pub action_type: ActionType,
    pub status: ActionStatus,
    pub attempts: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_token: Option<String>,
}

/// Workflow-level outcome band for a completed execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Complete,
    CompleteWithWarnings,
    Escalate,
}

/// Completion report for an executed plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub planned: usize,
    pub results: Vec<ActionResult>,
    /// successful / planned
    pub success_rate: f64,
    /// True when a failed action carried the `escalate` policy
    pub escalate: bool,
    pub cancelled: bool,
    /// Rollback tokens invoked, in invocation order (reverse completion)
    pub rollbacks_performed: Vec<String>,
}

impl ExecutionReport {
    pub fn succeeded(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status == ActionStatus::Succeeded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.status != ActionStatus::Succeeded)
            .count()
    }

    /// The outcome-monitoring bands over the automation success rate.
    pub fn outcome(&self) -> ExecutionOutcome {
        if self.escalate || self.success_rate < 0.5 {
            ExecutionOutcome::Escalate
        } else if self.success_rate < 0.8 {
            ExecutionOutcome::CompleteWithWarnings
        } else {
            ExecutionOutcome::Complete
        }
    }
}

struct Completion {
    action_id: String,
    result: ActionResult,
}

/// Dependency-ordered action executor
pub struct ActionExecutor {
    access: Arc<dyn AccessControlSystem>,
    pms: Arc<dyn PropertySystem>,
    notifier: Arc<dyn NotificationGateway>,
    audit: Arc<dyn AuditSink>,
    config: ExecutorConfig,
    global: Arc<Semaphore>,
    system_slots: HashMap<Destination, Arc<Semaphore>>,
    buckets: HashMap<Destination, Arc<RateLimiter>>,
}

impl ActionExecutor {
    pub fn new(
        access: Arc<dyn AccessControlSystem>,
        pms: Arc<dyn PropertySystem>,
        notifier: Arc<dyn NotificationGateway>,
        audit: Arc<dyn AuditSink>,
        config: ExecutorConfig,
    ) -> Self {
        let mut system_slots = HashMap::new();
        system_slots.insert(
            Destination::AccessControl,
            Arc::new(Semaphore::new(config.access_control_concurrency)),
        );
        system_slots.insert(Destination::Pms, Arc::new(Semaphore::new(config.pms_concurrency)));
        system_slots.insert(
            Destination::Notifications,
            Arc::new(Semaphore::new(config.notification_concurrency)),
        );
        system_slots.insert(
            Destination::Internal,
            Arc::new(Semaphore::new(config.global_concurrency)),
        );

        let buckets = [
            Destination::AccessControl,
            Destination::Pms,
            Destination::Notifications,
            Destination::Internal,
        ]
        .into_iter()
        .map(|d| (d, RateLimiter::per_minute(config.rate_limit_per_minute)))
        .collect();

        Self {
            access,
            pms,
            notifier,
            audit,
            global: Arc::new(Semaphore::new(config.global_concurrency)),
            system_slots,
            buckets,
            config,
        }
    }

    /// Execute the plan's actions. Returns a report even when individual
    /// actions fail; only structural problems (unknown dependency, cycle)
    /// are errors.
    pub async fn execute(
        &self,
        incident_id: &str,
        actions: &[Action],
        cancel: &CancellationToken,
    ) -> Result<ExecutionReport> {
        validate_dependencies(actions)?;
        let planned = actions.len();
        if planned == 0 {
            return Ok(ExecutionReport {
                planned: 0,
                results: Vec::new(),
                success_rate: 1.0,
                escalate: false,
                cancelled: false,
                rollbacks_performed: Vec::new(),
            });
        }

        let by_id: HashMap<String, Action> =
            actions.iter().map(|a| (a.id.clone(), a.clone())).collect();
        let mut pending_deps: HashMap<String, usize> = actions
            .iter()
            .map(|a| (a.id.clone(), a.dependencies.len()))
            .collect();
        let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
        for action in actions {
            for dep in &action.dependencies {
                dependents
                    .entry(dep.clone())
                    .or_default()
                    .push(action.id.clone());
            }
        }

        let (tx, mut rx) = mpsc::channel::<Completion>(planned.max(1));
        let mut results: HashMap<String, ActionResult> = HashMap::new();
        let mut completion_order: Vec<String> = Vec::new();
        let mut spawned: HashSet<String> = HashSet::new();
        let mut halted = false;
        let mut escalate = false;
        let mut was_cancelled = false;

        // Seed the ready queue with dependency-free actions, lowest rank first
        let mut ready: VecDeque<String> = {
            let mut seeds: Vec<&Action> =
                actions.iter().filter(|a| a.dependencies.is_empty()).collect();
            seeds.sort_by_key(|a| a.priority);
            seeds.iter().map(|a| a.id.clone()).collect()
        };

        loop {
            // Spawn everything currently eligible
            while let Some(action_id) = ready.pop_front() {
                if halted || spawned.contains(&action_id) || results.contains_key(&action_id) {
                    continue;
                }
                let action = by_id[&action_id].clone();
                spawned.insert(action_id);
                self.spawn_action(incident_id, action, tx.clone(), cancel.clone());
            }

            if results.len() == planned {
                break;
            }

            let completion = tokio::select! {
                completion = rx.recv() => match completion {
                    Some(c) => c,
                    None => break,
                },
                _ = cancel.cancelled(), if !was_cancelled => {
                    was_cancelled = true;
                    halted = true;
                    // Unstarted actions are cancelled outright; in-flight ones
                    // observe the token and report back through the channel.
                    for action in actions {
                        if !spawned.contains(&action.id) && !results.contains_key(&action.id) {
                            results.insert(action.id.clone(), cancelled_result(action));
                        }
                    }
                    ready.clear();
                    if results.len() == planned {
                        break;
                    }
                    continue;
                }
            };

            let action = &by_id[&completion.action_id];
            let succeeded = completion.result.status == ActionStatus::Succeeded;
            if succeeded {
                completion_order.push(completion.action_id.clone());
            }
            results.insert(completion.action_id.clone(), completion.result);

            if succeeded || action.failure_policy == FailurePolicy::Proceed {
                // Dependents become eligible once their last dependency resolves
                if let Some(children) = dependents.get(&completion.action_id) {
                    let mut unlocked: Vec<&Action> = Vec::new();
                    for child in children {
                        let remaining = pending_deps
                            .get_mut(child)
                            .expect("dependent tracked in pending_deps");
                        *remaining -= 1;
                        if *remaining == 0 && !results.contains_key(child) {
                            unlocked.push(&by_id[child]);
                        }
                    }
                    unlocked.sort_by_key(|a| a.priority);
                    for action in unlocked {
                        ready.push_back(action.id.clone());
                    }
                }
            } else {
                match action.failure_policy {
                    FailurePolicy::Block => {
                        // Cancel the whole transitive closure of dependents
                        for blocked in transitive_dependents(&completion.action_id, &dependents) {
                            if !results.contains_key(&blocked) && !spawned.contains(&blocked) {
                                results.insert(blocked.clone(), cancelled_result(&by_id[&blocked]));
                            }
                        }
                    }
                    FailurePolicy::Escalate => {
                        escalate = true;
                        halted = true;
                        for action in actions {
                            if !spawned.contains(&action.id) && !results.contains_key(&action.id) {
                                results.insert(action.id.clone(), cancelled_result(action));
                            }
                        }
                        ready.clear();
                    }
                    FailurePolicy::Proceed => unreachable!("handled above"),
                }
            }

            if results.len() == planned {
                break;
            }
        }

        // Best-effort rollback of completed work when the run was cancelled
        let mut rollbacks_performed = Vec::new();
        if was_cancelled {
            rollbacks_performed = self.rollback(&completion_order, &results).await;
        }

        let success_rate = results
            .values()
            .filter(|r| r.status == ActionStatus::Succeeded)
            .count() as f64
            / planned as f64;

        let mut ordered: Vec<ActionResult> = actions
            .iter()
            .filter_map(|a| results.get(&a.id).cloned())
            .collect();
        // Defensive completeness: anything not accounted for is cancelled
        if ordered.len() < planned {
            for action in actions {
                if !ordered.iter().any(|r| r.action_id == action.id) {
                    ordered.push(cancelled_result(action));
                }
            }
        }

        info!(
            incident_id,
            planned,
            success_rate,
            escalate,
            cancelled = was_cancelled,
            "action execution finished"
        );

        Ok(ExecutionReport {
            planned,
            results: ordered,
            success_rate,
            escalate,
            cancelled: was_cancelled,
            rollbacks_performed,
        })
    }

    fn spawn_action(
        &self,
        incident_id: &str,
        action: Action,
        tx: mpsc::Sender<Completion>,
        cancel: CancellationToken,
    ) {
        let destination = action.destination();
        let global = self.global.clone();
        let slot = self.system_slots[&destination].clone();
        let bucket = self.buckets[&destination].clone();
        let access = self.access.clone();
        let pms = self.pms.clone();
        let notifier = self.notifier.clone();
        let audit = self.audit.clone();
        let config = self.config.clone();
        let incident_id = incident_id.to_string();

        tokio::spawn(async move {
            let result = run_action(
                &incident_id,
                &action,
                global,
                slot,
                bucket,
                access,
                pms,
                notifier,
                audit,
                &config,
                &cancel,
            )
            .await;
            let _ = tx
                .send(Completion {
                    action_id: action.id.clone(),
                    result,
                })
                .await;
        });
    }

    /// Invoke rollback tokens in reverse completion order. Rollback failures
    /// are captured but never retried.
    async fn rollback(
        &self,
        completion_order: &[String],
        results: &HashMap<String, ActionResult>,
    ) -> Vec<String> {
        let mut performed = Vec::new();
        for action_id in completion_order.iter().rev() {
            let result = match results.get(action_id) {
                Some(r) => r,
                None => continue,
            };
            let token = match &result.rollback_token {
                Some(t) => t.clone(),
                None => continue,
            };
            let outcome = match result.action_type {
                ActionType::AccessControl | ActionType::Lockdown => {
                    self.access.rollback(&token).await
                }
                ActionType::PmsUpdate => self.pms.rollback(&token).await,
                _ => continue,
            };
            match outcome {
                Ok(()) => performed.push(token),
                Err(e) => warn!(action_id = %action_id, error = %e, "rollback failed"),
            }
        }
        performed
    }
}

fn cancelled_result(action: &Action) -> ActionResult {
    ActionResult {
        action_id: action.id.clone(),
        name: action.name.clone(),
        action_type: action.action_type,
        status: ActionStatus::Cancelled,
        attempts: 0,
        started_at: None,
        completed_at: Some(Utc::now()),
        output: None,
        error: Some("cancelled".to_string()),
        rollback_token: None,
    }
}

/// Reject plans whose dependency graph is malformed: unknown ids or cycles.
fn validate_dependencies(actions: &[Action]) -> Result<()> {
    let ids: HashSet<&str> = actions.iter().map(|a| a.id.as_str()).collect();
    for action in actions {
        for dep in &action.dependencies {
            if !ids.contains(dep.as_str()) {
                return Err(TriageError::Validation(format!(
                    "action {} depends on unknown action {}",
                    action.id, dep
                )));
            }
        }
    }

    // Kahn's algorithm: if we cannot settle every node, there is a cycle
    let mut remaining: HashMap<&str, usize> = actions
        .iter()
        .map(|a| (a.id.as_str(), a.dependencies.len()))
        .collect();
    let mut queue: VecDeque<&str> = remaining
        .iter()
        .filter(|(_, deps)| **deps == 0)
        .map(|(id, _)| *id)
        .collect();
    let mut settled = 0usize;
    while let Some(id) = queue.pop_front() {
        settled += 1;
        for action in actions {
            if action.dependencies.iter().any(|d| d == id) {
                let entry = remaining.get_mut(action.id.as_str()).expect("known id");
                *entry -= 1;
                if *entry == 0 {
                    queue.push_back(action.id.as_str());
                }
            }
        }
    }
    if settled != actions.len() {
        return Err(TriageError::Validation(
            "action dependency graph contains a cycle".to_string(),
        ));
    }
    Ok(())
}

fn transitive_dependents(
    root: &str,
    dependents: &HashMap<String, Vec<String>>,
) -> Vec<String> {
    let mut out = Vec::new();
    let mut stack = vec![root.to_string()];
    let mut seen = HashSet::new();
    while let Some(id) = stack.pop() {
        if let Some(children) = dependents.get(&id) {
            for child in children {
                if seen.insert(child.clone()) {
                    out.push(child.clone());
                    stack.push(child.clone());
                }
            }
        }
    }
    out
}

#[allow(clippy::too_many_arguments)]
async fn run_action(
    incident_id: &str,
    action: &Action,
    global: Arc<Semaphore>,
    slot: Arc<Semaphore>,
    bucket: Arc<RateLimiter>,
    access: Arc<dyn AccessControlSystem>,
    pms: Arc<dyn PropertySystem>,
    notifier: Arc<dyn NotificationGateway>,
    audit: Arc<dyn AuditSink>,
    config: &ExecutorConfig,
    cancel: &CancellationToken,
) -> ActionResult {
    let mut result = ActionResult {
        action_id: action.id.clone(),
        name: action.name.clone(),
        action_type: action.action_type,
        status: ActionStatus::Failed,
        attempts: 0,
        started_at: None,
        completed_at: None,
        output: None,
        error: None,
        rollback_token: None,
    };

    // Concurrency caps: global first, then the destination slot. Acquisition
    // order is fixed everywhere, so the two semaphores cannot deadlock.
    let _global = match global.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            result.error = Some("executor shut down".to_string());
            return result;
        }
    };
    let _slot = match slot.acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            result.error = Some("executor shut down".to_string());
            return result;
        }
    };
    bucket.acquire().await;

    result.started_at = Some(Utc::now());
    let deadline =
        Duration::from_secs(action.estimated_duration_seconds * config.timeout_multiplier as u64);

    loop {
        result.attempts += 1;
        let attempt = tokio::select! {
            _ = cancel.cancelled() => {
                result.status = ActionStatus::Cancelled;
                result.error = Some("cancelled".to_string());
                result.completed_at = Some(Utc::now());
                return result;
            }
            outcome = tokio::time::timeout(
                deadline,
                dispatch(incident_id, action, &access, &pms, &notifier, &audit),
            ) => outcome,
        };

        match attempt {
            Err(_elapsed) => {
                // Deadline exceeded: abort, no retry
                result.error = Some(format!(
                    "deadline of {}s exceeded",
                    deadline.as_secs()
                ));
                break;
            }
            Ok(Ok((output, rollback_token))) => {
                result.status = ActionStatus::Succeeded;
                result.output = Some(output);
                result.rollback_token = rollback_token;
                result.error = None;
                break;
            }
            Ok(Err(error)) => {
                let transient = error.is_transient();
                result.error = Some(error.to_string());
                if transient && result.attempts <= config.max_retries {
                    let backoff = backoff_delay(
                        result.attempts,
                        config.backoff_base_ms,
                        config.backoff_cap_ms,
                    );
                    debug!(
                        action = %action.name,
                        attempt = result.attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            result.status = ActionStatus::Cancelled;
                            result.completed_at = Some(Utc::now());
                            return result;
                        }
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    continue;
                }
                break;
            }
        }
    }

    result.completed_at = Some(Utc::now());
    result
}

/// Exponential backoff with jitter: base * 2^(attempt-1), capped, plus up to
/// 20% random spread.
fn backoff_delay(attempt: u32, base_ms: u64, cap_ms: u64) -> Duration {
    let exponential = base_ms.saturating_mul(1u64 << (attempt - 1).min(16));
    let capped = exponential.min(cap_ms);
    let jitter = rand::thread_rng().gen_range(0..=capped / 5 + 1);
    Duration::from_millis(capped + jitter)
}

/// Route an action to its destination system and normalize the result into
/// (output, rollback token).
async fn dispatch(
    incident_id: &str,
    action: &Action,
    access: &Arc<dyn AccessControlSystem>,
    pms: &Arc<dyn PropertySystem>,
    notifier: &Arc<dyn NotificationGateway>,
    audit: &Arc<dyn AuditSink>,
) -> Result<(serde_json::Value, Option<String>)> {
    match action.action_type {
        ActionType::AccessControl => match action.string_param("operation") {
            Some("temporary_access") => {
                let staff_id = required_param(action, "staff_id")?;
                let areas: Vec<String> = action
                    .parameters
                    .get("areas")
                    .and_then(|v| v.as_array())
                    .map(|a| {
                        a.iter()
                            .filter_map(|v| v.as_str().map(String::from))
                            .collect()
                    })
                    .unwrap_or_default();
                let expires_at = Utc::now() + chrono::Duration::hours(4);
                let outcome = access
                    .create_temporary_access(staff_id, &areas, expires_at)
                    .await?;
                Ok((serde_json::to_value(&outcome)?, None))
            }
            _ => {
                let card_id = required_param(action, "card_id")?;
                let reason = action.string_param("reason").unwrap_or("security incident");
                let outcome = access
                    .revoke_access(card_id, reason, "security_triage")
                    .await?;
                let token = outcome.rollback_token.clone();
                Ok((serde_json::to_value(&outcome)?, token))
            }
        },
        ActionType::Lockdown => {
            let area_id = required_param(action, "area_id")?;
            let duration = action
                .parameters
                .get("duration_minutes")
                .and_then(|v| v.as_u64())
                .unwrap_or(30) as u32;
            let emergency = action
                .parameters
                .get("emergency")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);
            let outcome = access.lock_area(area_id, duration, emergency).await?;
            let token = outcome.rollback_token.clone();
            Ok((serde_json::to_value(&outcome)?, token))
        }
        ActionType::PmsUpdate => match action.string_param("operation") {
            Some("guest_note") => {
                let guest_id = required_param(action, "guest_id")?;
                let note = action.string_param("note").unwrap_or("security incident recorded");
                pms.add_guest_note(guest_id, note, incident_id).await?;
                Ok((json!({"noted": guest_id}), None))
            }
            _ => {
                let room = required_param(action, "room_number")?;
                let status = action
                    .parameters
                    .get("status")
                    .cloned()
                    .map(serde_json::from_value::<RoomStatus>)
                    .transpose()
                    .map_err(|e| TriageError::Validation(format!("bad room status: {}", e)))?
                    .unwrap_or(RoomStatus::SecurityHold);
                let reason = action.string_param("reason").unwrap_or("security incident");
                let token = pms
                    .update_room_status(room, status, reason, "security_triage", None)
                    .await?;
                Ok((json!({"room_number": room, "status": status}), token))
            }
        },
        ActionType::Notification => {
            let channel: NotificationChannel = action
                .parameters
                .get("channel")
                .cloned()
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| TriageError::Validation(format!("bad channel: {}", e)))?
                .unwrap_or(NotificationChannel::Messaging);
            let recipient = required_param(action, "recipient")?;
            let body = action
                .string_param("message")
                .unwrap_or("Security incident update: action required. See the incident record.");
            let receipt = notifier
                .send(channel, recipient, &action.name, body)
                .await?;
            // Notifications never register rollback; there is no meaningful
            // reverse operation for a delivered message.
            Ok((serde_json::to_value(&receipt)?, None))
        }
        ActionType::Investigation => {
            if let Some(card_id) = action.string_param("card_id") {
                let logs = access.access_logs(card_id, 24).await?;
                Ok((json!({"access_logs": logs.len()}), None))
            } else if let Some(room) = action.string_param("room_number") {
                let since = Utc::now() - chrono::Duration::days(7);
                let records = pms.occupancy_history(room, since).await?;
                Ok((json!({"occupancy_records": records.len()}), None))
            } else {
                audit
                    .record_document(incident_id, &action.name, json!({"kind": "investigation"}))
                    .await?;
                Ok((json!({"recorded": action.name}), None))
            }
        }
        ActionType::Documentation => {
            audit
                .record_document(
                    incident_id,
                    &action.name,
                    serde_json::to_value(&action.parameters)?,
                )
                .await?;
            Ok((json!({"recorded": action.name}), None))
        }
        ActionType::ComplianceReport => {
            let framework = action.string_param("framework").unwrap_or("dpdp");
            audit
                .record_compliance_event(
                    incident_id,
                    framework,
                    "report_filed",
                    serde_json::to_value(&action.parameters)?,
                )
                .await?;
            Ok((json!({"framework": framework, "filed": true}), None))
        }
    }
}

fn required_param<'a>(action: &'a Action, key: &str) -> Result<&'a str> {
    action.string_param(key).ok_or_else(|| {
        TriageError::Validation(format!("action {} missing parameter {}", action.name, key))
    })
}
