// Gate routers - pure, deterministic routing over recorded state

//! # Gate Layer
//!
//! Gates are pure functions `(state) -> route`. They read only the tool
//! results recorded on the incident state — never a live tool — so a
//! workflow replayed from a checkpoint routes exactly as it did the first
//! time. Node bodies record results; routers decide where the graph goes
//! next; the two never mix.

use crate::models::{IncidentState, WorkflowStep};

/// Routing decision after the safety-check node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyRoute {
    /// No blocking findings; continue down the main path
    Continue,
    /// Critical violation; the run is vetoed into error handling
    Reject,
    /// Findings require a human sign-off before continuing
    HumanReview,
}

/// Routing decision after the compliance-check node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceRoute {
    Approved,
    RequiresApproval,
    Rejected,
}

/// Routing decision after the human-approval gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalRoute {
    Approved,
    Rejected,
    Pending,
}

/// Route based on the recorded safety-check result.
pub fn safety_router(state: &IncidentState) -> SafetyRoute {
    if !state.safety_guardrails_passed {
        return SafetyRoute::Reject;
    }
    let requires_review = state
        .tool_result("safety_check")
        .and_then(|v| v.get("requires_human_review"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if requires_review {
        SafetyRoute::HumanReview
    } else {
        SafetyRoute::Continue
    }
}

/// Route based on the recorded compliance-check result.
pub fn compliance_router(state: &IncidentState) -> ComplianceRoute {
    let requires_legal = state
        .tool_result("compliance_check")
        .and_then(|v| v.get("requires_legal_review"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if requires_legal {
        return ComplianceRoute::RequiresApproval;
    }
    if state.compliance_checks.values().any(|passed| !passed) {
        return ComplianceRoute::Rejected;
    }
    ComplianceRoute::Approved
}

/// Route based on the approval ledger.
pub fn approval_router(state: &IncidentState) -> ApprovalRoute {
    if !state.pending_approvals.is_empty() {
        return ApprovalRoute::Pending;
    }
    if state.approval_history.iter().any(|record| !record.decision) {
        return ApprovalRoute::Rejected;
    }
    ApprovalRoute::Approved
}

/// Where an approved workflow resumes. Derived purely from how far the state
/// has progressed, so safety-review approvals rejoin the main path before
/// prioritization while plan approvals drop straight back into execution.
pub fn resume_target(state: &IncidentState) -> WorkflowStep {
    if state.tool_result("action_execution").is_some() {
        WorkflowStep::DocumentIncident
    } else if state.selected_playbook.is_none() {
        WorkflowStep::PrioritizeIncident
    } else if state.response_plan.is_none() {
        WorkflowStep::GenerateResponse
    } else {
        WorkflowStep::ExecuteImmediateActions
    }
}

/// Route after action execution, based on the recorded automation success
/// rate: at or above 0.5 the workflow documents and finishes (a warning is
/// recorded between 0.5 and 0.8); below 0.5 it escalates into error handling.
pub fn execution_router(state: &IncidentState) -> WorkflowStep {
    let success_rate = state
        .tool_result("action_execution")
        .and_then(|v| v.get("success_rate"))
        .and_then(|v| v.as_f64())
        .unwrap_or(1.0);
    if success_rate < 0.5 {
        WorkflowStep::HandleError
    } else {
        WorkflowStep::DocumentIncident
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentMetadata, IncidentPriority, Playbook, ResponsePlan};
    use crate::models::playbook::playbook_catalog;

    fn state() -> IncidentState {
        IncidentState::new("title", "description", IncidentMetadata::default())
    }

    fn any_playbook() -> Playbook {
        playbook_catalog()[0].clone()
    }

    #[test]
    fn safety_router_rejects_failed_guardrails() {
        let mut s = state();
        s.safety_guardrails_passed = false;
        assert_eq!(safety_router(&s), SafetyRoute::Reject);
    }

    #[test]
    fn safety_router_reads_the_recorded_result_only() {
        let mut s = state();
        s.add_tool_result("safety_check", serde_json::json!({"requires_human_review": true}));
        assert_eq!(safety_router(&s), SafetyRoute::HumanReview);
        s.add_tool_result("safety_check", serde_json::json!({"requires_human_review": false}));
        assert_eq!(safety_router(&s), SafetyRoute::Continue);
    }

    #[test]
    fn compliance_router_prefers_approval_over_rejection() {
        let mut s = state();
        s.add_tool_result("compliance_check", serde_json::json!({"requires_legal_review": true}));
        s.compliance_checks.insert(crate::models::ComplianceFramework::Dpdp, false);
        // Legal review wins: a human sees it before the rejection path would
        assert_eq!(compliance_router(&s), ComplianceRoute::RequiresApproval);
    }

    #[test]
    fn compliance_router_rejects_failed_frameworks() {
        let mut s = state();
        s.add_tool_result("compliance_check", serde_json::json!({"requires_legal_review": false}));
        s.compliance_checks.insert(crate::models::ComplianceFramework::Dpdp, false);
        assert_eq!(compliance_router(&s), ComplianceRoute::Rejected);
    }

    #[test]
    fn approval_router_tracks_the_ledger() {
        let mut s = state();
        assert_eq!(approval_router(&s), ApprovalRoute::Approved);

        s.request_intervention("legal_review", "pci", IncidentPriority::High, "legal_counsel", None)
            .unwrap();
        assert_eq!(approval_router(&s), ApprovalRoute::Pending);

        s.resolve_intervention("legal_review", "counsel", false, "not cleared").unwrap();
        assert_eq!(approval_router(&s), ApprovalRoute::Rejected);
    }

    #[test]
    fn resume_target_follows_workflow_progress() {
        let mut s = state();
        // Safety review happened before any playbook: rejoin at prioritize
        assert_eq!(resume_target(&s), WorkflowStep::PrioritizeIncident);

        s.selected_playbook = Some(any_playbook());
        assert_eq!(resume_target(&s), WorkflowStep::GenerateResponse);

        s.response_plan = Some(ResponsePlan::default());
        assert_eq!(resume_target(&s), WorkflowStep::ExecuteImmediateActions);

        s.add_tool_result("action_execution", serde_json::json!({"success_rate": 1.0}));
        assert_eq!(resume_target(&s), WorkflowStep::DocumentIncident);
    }

    #[test]
    fn execution_router_applies_the_success_bands() {
        let mut s = state();
        s.add_tool_result("action_execution", serde_json::json!({"success_rate": 0.9}));
        assert_eq!(execution_router(&s), WorkflowStep::DocumentIncident);
        s.add_tool_result("action_execution", serde_json::json!({"success_rate": 0.5}));
        assert_eq!(execution_router(&s), WorkflowStep::DocumentIncident);
        s.add_tool_result("action_execution", serde_json::json!({"success_rate": 0.49}));
        assert_eq!(execution_router(&s), WorkflowStep::HandleError);
    }

    #[test]
    fn routers_are_deterministic_on_identical_state() {
        let mut s = state();
        s.add_tool_result("safety_check", serde_json::json!({"requires_human_review": true}));
        let blob = serde_json::to_value(&s).unwrap();
        let replayed: IncidentState = serde_json::from_value(blob).unwrap();
        assert_eq!(safety_router(&s), safety_router(&replayed));
        assert_eq!(compliance_router(&s), compliance_router(&replayed));
        assert_eq!(approval_router(&s), approval_router(&replayed));
    }
}
