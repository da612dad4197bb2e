// Incident domain models - the workflow execution state

//! # Incident Models
//!
//! This module defines the root entity of the triage engine:
//! - `IncidentState`: the single mutable value threaded through every workflow node
//! - `WorkflowStep`: the named nodes of the workflow graph
//! - `RiskAssessment`, `IncidentMetadata`, `ResponsePlan`: nested analysis results
//! - `HumanInterventionRequest` / `ApprovalRecord`: the human-in-the-loop ledger
//!
//! The state is owned by exactly one worker while a workflow is in flight.
//! Every mutation helper bumps `updated_at` so history diffs and timeliness
//! scoring stay consistent without callers remembering to do it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

use super::compliance::ComplianceFramework;
use super::playbook::Playbook;
use crate::{Result, TriageError};

/// Pending approvals are a bounded queue per incident, not an unbounded list.
pub const MAX_PENDING_APPROVALS: usize = 8;

/// Incident priority levels based on hospitality security standards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentPriority {
    /// Security-related information only
    Informational,
    /// Minor security matter
    Low,
    /// Moderate security issue
    Medium,
    /// Significant security concern
    High,
    /// Immediate threat to safety or security
    Critical,
}

impl IncidentPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentPriority::Critical => "critical",
            IncidentPriority::High => "high",
            IncidentPriority::Medium => "medium",
            IncidentPriority::Low => "low",
            IncidentPriority::Informational => "informational",
        }
    }

    /// Maximum total processing time allowed for this priority, in minutes.
    /// Used both for routing urgency and for the timeliness score.
    pub fn sla_minutes(&self) -> u64 {
        match self {
            IncidentPriority::Critical => 15,
            IncidentPriority::High => 60,
            IncidentPriority::Medium => 240,
            IncidentPriority::Low => 1440,
            IncidentPriority::Informational => 4320,
        }
    }

    /// Impact multiplier applied by the business-impact calculator.
    pub fn severity_multiplier(&self) -> f64 {
        match self {
            IncidentPriority::Informational => 0.2,
            IncidentPriority::Low => 0.5,
            IncidentPriority::Medium => 1.0,
            IncidentPriority::High => 2.0,
            IncidentPriority::Critical => 3.5,
        }
    }
}

impl fmt::Display for IncidentPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hospitality-specific incident categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentCategory {
    /// Unauthorized guest access
    GuestAccess,
    /// Payment or billing fraud
    PaymentFraud,
    /// Personal data breach
    PiiBreach,
    /// Operational security violations
    OperationalSecurity,
    /// Vendor or contractor access issues
    VendorAccess,
    /// Physical security breaches
    PhysicalSecurity,
    /// Cybersecurity incidents
    CyberSecurity,
    /// Regulatory compliance issues
    ComplianceViolation,
}

impl IncidentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentCategory::GuestAccess => "guest_access",
            IncidentCategory::PaymentFraud => "payment_fraud",
            IncidentCategory::PiiBreach => "pii_breach",
            IncidentCategory::OperationalSecurity => "operational_security",
            IncidentCategory::VendorAccess => "vendor_access",
            IncidentCategory::PhysicalSecurity => "physical_security",
            IncidentCategory::CyberSecurity => "cyber_security",
            IncidentCategory::ComplianceViolation => "compliance_violation",
        }
    }

    pub fn all() -> [IncidentCategory; 8] {
        [
            IncidentCategory::GuestAccess,
            IncidentCategory::PaymentFraud,
            IncidentCategory::PiiBreach,
            IncidentCategory::OperationalSecurity,
            IncidentCategory::VendorAccess,
            IncidentCategory::PhysicalSecurity,
            IncidentCategory::CyberSecurity,
            IncidentCategory::ComplianceViolation,
        ]
    }
}

impl fmt::Display for IncidentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an incident record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IncidentStatus {
    Active,
    Resolved,
    Closed,
}

impl IncidentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IncidentStatus::Active => "active",
            IncidentStatus::Resolved => "resolved",
            IncidentStatus::Closed => "closed",
        }
    }
}

/// Named nodes of the workflow graph, in topological order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    ValidateInput,
    ClassifyIncident,
    AssessRisk,
    SafetyCheck,
    PrioritizeIncident,
    SelectPlaybook,
    ComplianceCheck,
    HumanApprovalGate,
    GenerateResponse,
    ExecuteImmediateActions,
    DocumentIncident,
    NotifyStakeholders,
    ScheduleFollowup,
    UpdateMetrics,
    HandleError,
}

impl WorkflowStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::ValidateInput => "validate_input",
            WorkflowStep::ClassifyIncident => "classify_incident",
            WorkflowStep::AssessRisk => "assess_risk",
            WorkflowStep::SafetyCheck => "safety_check",
            WorkflowStep::PrioritizeIncident => "prioritize_incident",
            WorkflowStep::SelectPlaybook => "select_playbook",
            WorkflowStep::ComplianceCheck => "compliance_check",
            WorkflowStep::HumanApprovalGate => "human_approval_gate",
            WorkflowStep::GenerateResponse => "generate_response",
            WorkflowStep::ExecuteImmediateActions => "execute_immediate_actions",
            WorkflowStep::DocumentIncident => "document_incident",
            WorkflowStep::NotifyStakeholders => "notify_stakeholders",
            WorkflowStep::ScheduleFollowup => "schedule_followup",
            WorkflowStep::UpdateMetrics => "update_metrics",
            WorkflowStep::HandleError => "handle_error",
        }
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Risk assessment for the incident
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Composite risk score in [0, 10]
    pub risk_score: f64,
    /// Named contributors to the score
    pub risk_factors: Vec<String>,
    /// Priority band implied by the risk score
    pub mitigation_urgency: IncidentPriority,
    /// Free-text impact summary
    pub potential_impact: String,
    /// Likelihood in [0, 10]
    pub likelihood_score: f64,
    /// Assessor confidence in [0, 1]
    pub confidence_score: f64,
}

impl RiskAssessment {
    /// Fixed priority banding over the composite risk score. Gate signals may
    /// override the banded priority, in which case the override is recorded on
    /// the incident.
    pub fn banded_priority(risk_score: f64) -> IncidentPriority {
        if risk_score >= 8.0 {
            IncidentPriority::Critical
        } else if risk_score >= 6.0 {
            IncidentPriority::High
        } else if risk_score >= 4.0 {
            IncidentPriority::Medium
        } else if risk_score >= 2.0 {
            IncidentPriority::Low
        } else {
            IncidentPriority::Informational
        }
    }
}

/// Metadata about the security incident
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncidentMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reported_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reporting_system: Option<String>,
    #[serde(default)]
    pub affected_systems: Vec<String>,
    #[serde(default)]
    pub affected_guests: Vec<String>,
    #[serde(default)]
    pub affected_employees: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_impact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_cost: Option<f64>,
}

/// Request for human intervention in the workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanInterventionRequest {
    /// What kind of sign-off is needed (safety_review, legal_review, ...)
    pub intervention_type: String,
    pub reason: String,
    pub requested_at: DateTime<Utc>,
    pub urgency: IncidentPriority,
    /// Snapshot of where the workflow was when the request was raised
    pub context: BTreeMap<String, serde_json::Value>,
    pub approver_role: String,
    /// Converts to a gate veto with reason `approval_timeout` once elapsed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
}

impl HumanInterventionRequest {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.timeout_minutes {
            Some(minutes) => now - self.requested_at > chrono::Duration::minutes(minutes as i64),
            None => false,
        }
    }
}

/// A processed human decision, appended to the approval history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub intervention_type: String,
    pub approver: String,
    pub decision: bool,
    pub notes: String,
    pub approved_at: DateTime<Utc>,
    /// The request this decision answers, embedded for the audit trail
    pub original_request: HumanInterventionRequest,
}

/// Structured incident response plan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePlan {
    pub immediate_actions: Vec<String>,
    pub investigation_steps: Vec<String>,
    pub containment_measures: Vec<String>,
    pub notification_requirements: Vec<String>,
    pub documentation_requirements: Vec<String>,
    pub follow_up_actions: Vec<String>,
}

/// A failed workflow step with the captured error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: WorkflowStep,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

/// A gate-driven priority override and the reason it was applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityOverride {
    pub priority: IncidentPriority,
    pub reason: String,
    pub source: String,
}

/// Main state object for the security incident triage workflow.
///
/// This state is passed between all nodes of the workflow and contains all
/// information about the incident being processed. Within a run it has a
/// single writer (the owning worker); at rest the session store caches the
/// latest copy and the persistent store holds the authoritative record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentState {
    // Core incident information
    pub incident_id: String,
    pub title: String,
    pub description: String,
    pub category: Option<IncidentCategory>,
    pub priority: Option<IncidentPriority>,
    pub status: IncidentStatus,

    // Timestamps
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    // Analysis results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification_confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_assessment: Option<RiskAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_playbook: Option<Playbook>,

    // Incident details
    #[serde(default)]
    pub metadata: IncidentMetadata,

    // Response planning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_plan: Option<ResponsePlan>,

    // Human intervention
    #[serde(default)]
    pub pending_approvals: Vec<HumanInterventionRequest>,
    #[serde(default)]
    pub approval_history: Vec<ApprovalRecord>,

    // Workflow control
    pub current_step: WorkflowStep,
    #[serde(default)]
    pub completed_steps: Vec<WorkflowStep>,
    #[serde(default)]
    pub failed_steps: Vec<StepFailure>,
    pub requires_human_intervention: bool,
    pub workflow_paused: bool,

    // Compliance and safety
    #[serde(default)]
    pub compliance_checks: BTreeMap<ComplianceFramework, bool>,
    pub safety_guardrails_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_override: Option<PriorityOverride>,

    // Tool execution results, keyed by tool name. Gates replay from these
    // records instead of re-querying any model.
    #[serde(default)]
    pub tool_results: HashMap<String, serde_json::Value>,

    // Evaluation and metrics
    #[serde(default)]
    pub processing_metrics: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub quality_scores: BTreeMap<String, f64>,

    // Memory and context
    #[serde(default)]
    pub session_context: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub historical_context: BTreeMap<String, serde_json::Value>,
}

impl IncidentState {
    /// Create a fresh incident entering the workflow at `validate_input`.
    pub fn new(title: impl Into<String>, description: impl Into<String>, metadata: IncidentMetadata) -> Self {
        let now = Utc::now();
        Self {
            incident_id: format!("INC-{}", Uuid::new_v4().simple()),
            title: title.into(),
            description: description.into(),
            category: None,
            priority: None,
            status: IncidentStatus::Active,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            classification_confidence: None,
            risk_assessment: None,
            selected_playbook: None,
            metadata,
            response_plan: None,
            pending_approvals: Vec::new(),
            approval_history: Vec::new(),
            current_step: WorkflowStep::ValidateInput,
            completed_steps: Vec::new(),
            failed_steps: Vec::new(),
            requires_human_intervention: false,
            workflow_paused: false,
            compliance_checks: BTreeMap::new(),
            safety_guardrails_passed: true,
            priority_override: None,
            tool_results: HashMap::new(),
            processing_metrics: BTreeMap::new(),
            quality_scores: BTreeMap::new(),
            session_context: BTreeMap::new(),
            historical_context: BTreeMap::new(),
        }
    }

    /// Advance to `step`, marking the step being left as completed. Re-entry
    /// into the current step (gate loops, node retries) records nothing: a
    /// step only completes by transitioning away from it. A step that failed
    /// never lands in `completed_steps`; the two lists stay disjoint.
    pub fn update_step(&mut self, step: WorkflowStep) {
        let advancing = self.current_step != step;
        let current_failed = self.failed_steps.iter().any(|f| f.step == self.current_step);
        if advancing && !current_failed && !self.completed_steps.contains(&self.current_step) {
            self.completed_steps.push(self.current_step);
        }
        self.current_step = step;
        self.updated_at = Utc::now();
    }

    /// Record a step failure. Failures are never silently dropped: the step
    /// lands in `failed_steps` and the error text in `tool_results`. A step
    /// that partially ran before failing is withdrawn from `completed_steps`.
    pub fn mark_step_failed(&mut self, step: WorkflowStep, error: impl Into<String>) {
        let error = error.into();
        self.completed_steps.retain(|s| *s != step);
        self.failed_steps.push(StepFailure {
            step,
            error: error.clone(),
            timestamp: Utc::now(),
        });
        self.tool_results
            .insert(format!("{}_failure", step), serde_json::Value::String(error));
        self.updated_at = Utc::now();
    }

    /// Add a tool execution result keyed by tool name.
    pub fn add_tool_result(&mut self, tool_name: &str, result: serde_json::Value) {
        self.tool_results.insert(tool_name.to_string(), result);
        self.updated_at = Utc::now();
    }

    pub fn tool_result(&self, tool_name: &str) -> Option<&serde_json::Value> {
        self.tool_results.get(tool_name)
    }

    /// The priority the workflow is currently operating under: a gate override
    /// if one was applied, otherwise the assessed priority.
    pub fn effective_priority(&self) -> IncidentPriority {
        if let Some(ov) = &self.priority_override {
            return ov.priority;
        }
        self.priority.unwrap_or(IncidentPriority::Medium)
    }

    /// Apply a gate-driven priority override, recording the source and reason.
    pub fn override_priority(&mut self, priority: IncidentPriority, source: &str, reason: &str) {
        self.priority_override = Some(PriorityOverride {
            priority,
            reason: reason.to_string(),
            source: source.to_string(),
        });
        self.updated_at = Utc::now();
    }

    /// Request human intervention, pausing the workflow.
    ///
    /// Re-requesting an intervention type that is already pending is a no-op.
    /// The pending queue is bounded; overflow is an invariant violation since
    /// the graph can only raise a handful of distinct intervention types.
    pub fn request_intervention(
        &mut self,
        intervention_type: &str,
        reason: &str,
        urgency: IncidentPriority,
        approver_role: &str,
        timeout_minutes: Option<u32>,
    ) -> Result<()> {
        if self
            .pending_approvals
            .iter()
            .any(|r| r.intervention_type == intervention_type)
        {
            return Ok(());
        }
        if self.pending_approvals.len() >= MAX_PENDING_APPROVALS {
            return Err(TriageError::UnsafeState(format!(
                "pending approval queue exceeded bound of {} on {}",
                MAX_PENDING_APPROVALS, self.incident_id
            )));
        }
        let mut context = BTreeMap::new();
        context.insert(
            "current_step".to_string(),
            serde_json::Value::String(self.current_step.to_string()),
        );
        context.insert(
            "incident_id".to_string(),
            serde_json::Value::String(self.incident_id.clone()),
        );
        self.pending_approvals.push(HumanInterventionRequest {
            intervention_type: intervention_type.to_string(),
            reason: reason.to_string(),
            requested_at: Utc::now(),
            urgency,
            context,
            approver_role: approver_role.to_string(),
            timeout_minutes,
        });
        self.requires_human_intervention = true;
        self.workflow_paused = true;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Process a human decision for a pending intervention request.
    ///
    /// Returns `NotPending` when no request with a matching intervention type
    /// exists. When the last pending request is resolved the paused flags clear.
    pub fn resolve_intervention(
        &mut self,
        intervention_type: &str,
        approver: &str,
        decision: bool,
        notes: &str,
    ) -> Result<ApprovalRecord> {
        let idx = self
            .pending_approvals
            .iter()
            .position(|r| r.intervention_type == intervention_type)
            .ok_or_else(|| {
                TriageError::NotPending(format!(
                    "no pending {} approval on {}",
                    intervention_type, self.incident_id
                ))
            })?;
        let request = self.pending_approvals.remove(idx);
        let record = ApprovalRecord {
            intervention_type: intervention_type.to_string(),
            approver: approver.to_string(),
            decision,
            notes: notes.to_string(),
            approved_at: Utc::now(),
            original_request: request,
        };
        self.approval_history.push(record.clone());

        if self.pending_approvals.is_empty() {
            self.requires_human_intervention = false;
            self.workflow_paused = false;
        }
        self.updated_at = Utc::now();
        Ok(record)
    }

    /// Expire pending requests whose timeout elapsed, marking them cancelled.
    /// Returns the intervention types that expired.
    pub fn expire_stale_approvals(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let mut expired = Vec::new();
        let mut remaining = Vec::new();
        for request in self.pending_approvals.drain(..) {
            if request.is_expired(now) {
                expired.push(request.intervention_type.clone());
                self.approval_history.push(ApprovalRecord {
                    intervention_type: request.intervention_type.clone(),
                    approver: "system".to_string(),
                    decision: false,
                    notes: "cancelled: approval_timeout".to_string(),
                    approved_at: now,
                    original_request: request,
                });
            } else {
                remaining.push(request);
            }
        }
        self.pending_approvals = remaining;
        if self.pending_approvals.is_empty() && !expired.is_empty() {
            self.requires_human_intervention = false;
            self.workflow_paused = false;
        }
        if !expired.is_empty() {
            self.updated_at = Utc::now();
        }
        expired
    }

    pub fn record_metric(&mut self, name: &str, value: serde_json::Value) {
        self.processing_metrics.insert(name.to_string(), value);
        self.updated_at = Utc::now();
    }

    /// Total wall-clock processing time so far, in seconds.
    pub fn processing_seconds(&self) -> f64 {
        (self.updated_at - self.created_at).num_milliseconds() as f64 / 1000.0
    }

    /// State invariants that must hold at every checkpoint. A violation is
    /// fatal for the run and recorded forensically, never repaired in place.
    pub fn check_invariants(&self) -> Result<()> {
        if self.workflow_paused != !self.pending_approvals.is_empty() {
            return Err(TriageError::UnsafeState(format!(
                "{}: workflow_paused={} with {} pending approvals",
                self.incident_id,
                self.workflow_paused,
                self.pending_approvals.len()
            )));
        }
        for failure in &self.failed_steps {
            if self.completed_steps.contains(&failure.step) {
                return Err(TriageError::UnsafeState(format!(
                    "{}: step {} is both completed and failed",
                    self.incident_id, failure.step
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> IncidentState {
        IncidentState::new(
            "Suspicious keycard activity",
            "Card KC_887234 used simultaneously at room 1205 and penthouse elevator",
            IncidentMetadata {
                room_number: Some("1205".to_string()),
                property_code: Some("P01".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn banded_priority_matches_fixed_bands() {
        assert_eq!(RiskAssessment::banded_priority(9.2), IncidentPriority::Critical);
        assert_eq!(RiskAssessment::banded_priority(8.0), IncidentPriority::Critical);
        assert_eq!(RiskAssessment::banded_priority(7.99), IncidentPriority::High);
        assert_eq!(RiskAssessment::banded_priority(6.0), IncidentPriority::High);
        assert_eq!(RiskAssessment::banded_priority(4.0), IncidentPriority::Medium);
        assert_eq!(RiskAssessment::banded_priority(2.0), IncidentPriority::Low);
        assert_eq!(RiskAssessment::banded_priority(1.9), IncidentPriority::Informational);
    }

    #[test]
    fn update_step_tracks_completed_steps_without_duplicates() {
        let mut state = test_state();
        state.update_step(WorkflowStep::ClassifyIncident);
        state.update_step(WorkflowStep::AssessRisk);
        assert_eq!(
            state.completed_steps,
            vec![WorkflowStep::ValidateInput, WorkflowStep::ClassifyIncident]
        );
        assert_eq!(state.current_step, WorkflowStep::AssessRisk);
    }

    #[test]
    fn intervention_request_pauses_and_resolution_resumes() {
        let mut state = test_state();
        state
            .request_intervention("safety_review", "critical violations", IncidentPriority::High, "security_manager", None)
            .unwrap();
        assert!(state.workflow_paused);
        assert!(state.requires_human_intervention);
        assert!(state.check_invariants().is_ok());

        let record = state
            .resolve_intervention("safety_review", "ops_manager", true, "verified on cameras")
            .unwrap();
        assert!(record.decision);
        assert!(!state.workflow_paused);
        assert!(state.pending_approvals.is_empty());
        assert_eq!(state.approval_history.len(), 1);
    }

    #[test]
    fn duplicate_intervention_type_is_a_noop() {
        let mut state = test_state();
        state
            .request_intervention("legal_review", "pci", IncidentPriority::High, "legal_counsel", Some(240))
            .unwrap();
        state
            .request_intervention("legal_review", "pci again", IncidentPriority::High, "legal_counsel", Some(240))
            .unwrap();
        assert_eq!(state.pending_approvals.len(), 1);
    }

    #[test]
    fn resolve_without_pending_returns_not_pending() {
        let mut state = test_state();
        let err = state
            .resolve_intervention("legal_review", "gm", true, "")
            .unwrap_err();
        assert!(matches!(err, TriageError::NotPending(_)));
    }

    #[test]
    fn expired_approvals_are_cancelled_into_history() {
        let mut state = test_state();
        state
            .request_intervention("legal_review", "pci", IncidentPriority::High, "legal_counsel", Some(240))
            .unwrap();
        let later = Utc::now() + chrono::Duration::minutes(241);
        let expired = state.expire_stale_approvals(later);
        assert_eq!(expired, vec!["legal_review".to_string()]);
        assert!(!state.workflow_paused);
        assert_eq!(state.approval_history.len(), 1);
        assert!(!state.approval_history[0].decision);
    }

    #[test]
    fn paused_flag_invariant_is_enforced() {
        let mut state = test_state();
        state.workflow_paused = true;
        assert!(matches!(
            state.check_invariants(),
            Err(TriageError::UnsafeState(_))
        ));
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = test_state();
        state.category = Some(IncidentCategory::GuestAccess);
        state.priority = Some(IncidentPriority::High);
        state.add_tool_result("classification", serde_json::json!({"confidence": 0.93}));
        let blob = serde_json::to_value(&state).unwrap();
        let restored: IncidentState = serde_json::from_value(blob).unwrap();
        assert_eq!(restored.incident_id, state.incident_id);
        assert_eq!(restored.category, Some(IncidentCategory::GuestAccess));
        assert_eq!(restored.tool_results["classification"]["confidence"], 0.93);
    }
}
