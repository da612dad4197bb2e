// Response plan generation

//! # Response Generator
//!
//! Builds the structured incident response plan. The skeleton is assembled
//! deterministically from the selected playbook, the category action tables
//! and the recorded compliance result; the model may then contribute
//! additional steps, which are merged with order-preserving deduplication.
//! Given the same input (including the same recorded model output) the
//! generator produces the same plan, and regenerating over an existing plan
//! returns it unchanged.

use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;

use super::llm::{LlmClient, LlmRequest};
use super::{PerfSink, RateLimiter};
use crate::models::{ComplianceReport, IncidentCategory, IncidentPriority, IncidentState, ResponsePlan};

const RESPONSE_SYSTEM_PROMPT: &str = r#"You are an expert hotel security incident response planner. Produce a response plan as a JSON object with these keys, each a list of short action strings:

- immediate_actions: priority actions for the first 30 minutes
- investigation_steps: detailed investigation procedures
- containment_measures: security containment actions
- notification_requirements: stakeholder notification plan
- documentation_requirements: required documentation
- follow_up_actions: post-incident follow-up activities

Keep actions concrete and executable by hotel security staff. Respect guest
privacy: never include raw personal data in action text."#;

#[derive(Deserialize, Default)]
struct RawResponsePlan {
    #[serde(default)]
    immediate_actions: Vec<String>,
    #[serde(default)]
    investigation_steps: Vec<String>,
    #[serde(default)]
    containment_measures: Vec<String>,
    #[serde(default)]
    notification_requirements: Vec<String>,
    #[serde(default)]
    documentation_requirements: Vec<String>,
    #[serde(default)]
    follow_up_actions: Vec<String>,
}

/// Structured response plan generator
pub struct ResponseGenerator {
    llm: Arc<dyn LlmClient>,
    limiter: Arc<RateLimiter>,
    perf: PerfSink,
}

impl ResponseGenerator {
    pub fn new(llm: Arc<dyn LlmClient>, limiter: Arc<RateLimiter>, perf: PerfSink) -> Self {
        Self { llm, limiter, perf }
    }

    /// Generate the response plan for an incident.
    ///
    /// Idempotent: if the state already carries a plan it is returned
    /// unchanged, so re-entering the node after a resume never duplicates
    /// steps.
    pub async fn generate(&self, state: &IncidentState) -> ResponsePlan {
        if let Some(existing) = &state.response_plan {
            return existing.clone();
        }

        let category = state.category.unwrap_or(IncidentCategory::OperationalSecurity);
        let mut plan = template_plan(state, category);

        self.limiter.acquire().await;
        let started = Instant::now();
        let request = LlmRequest::new(
            RESPONSE_SYSTEM_PROMPT,
            format!(
                "Plan the response for this incident:\n\nCATEGORY: {}\nPRIORITY: {}\nTITLE: {}\nDESCRIPTION: {}\nPLAYBOOK ACTIONS: {}",
                category,
                state.effective_priority(),
                state.title,
                state.description,
                state
                    .selected_playbook
                    .as_ref()
                    .map(|p| p.required_actions.join(", "))
                    .unwrap_or_else(|| "none".to_string()),
            ),
        );

        let mut enriched = false;
        match self.llm.complete(&request).await {
            Ok(text) => {
                if let Ok(raw) = serde_json::from_str::<RawResponsePlan>(&text) {
                    merge(&mut plan.immediate_actions, raw.immediate_actions);
                    merge(&mut plan.investigation_steps, raw.investigation_steps);
                    merge(&mut plan.containment_measures, raw.containment_measures);
                    merge(&mut plan.notification_requirements, raw.notification_requirements);
                    merge(&mut plan.documentation_requirements, raw.documentation_requirements);
                    merge(&mut plan.follow_up_actions, raw.follow_up_actions);
                    enriched = true;
                }
            }
            Err(_) => {
                // The template plan stands on its own; enrichment is optional.
            }
        }
        self.perf.record("response_generation", started, enriched, None);

        plan
    }
}

/// Merge additions into a section, preserving order and dropping duplicates.
fn merge(section: &mut Vec<String>, additions: Vec<String>) {
    for addition in additions {
        if !section.contains(&addition) {
            section.push(addition);
        }
    }
}

/// The deterministic skeleton of the response plan.
fn template_plan(state: &IncidentState, category: IncidentCategory) -> ResponsePlan {
    let mut plan = ResponsePlan::default();
    let priority = state.effective_priority();

    if priority == IncidentPriority::Critical {
        plan.immediate_actions
            .push("Executive notification within 30 minutes".to_string());
    }

    // Category-specific first moves
    let (immediate, investigation, containment): (&[&str], &[&str], &[&str]) = match category {
        IncidentCategory::GuestAccess => (
            &["Verify incident details with reporting staff", "Secure affected rooms and areas"],
            &["Review access logs for the affected credential", "Review guest folio and stay history"],
            &["Revoke compromised credentials", "Place affected rooms on security hold"],
        ),
        IncidentCategory::PaymentFraud => (
            &["Isolate affected payment terminals", "Preserve transaction evidence"],
            &["Analyze transaction patterns for the affected card", "Coordinate with payment processor fraud team"],
            &["Block the affected card in the property systems", "Enable enhanced transaction monitoring"],
        ),
        IncidentCategory::PiiBreach => (
            &["Contain the data exposure path", "Notify the privacy officer"],
            &["Determine scope of exposed records", "Identify the exfiltration vector"],
            &["Suspend implicated accounts", "Revoke access to affected data stores"],
        ),
        IncidentCategory::CyberSecurity => (
            &["Activate the incident response team", "Isolate affected systems from the network"],
            &["Collect forensic images before remediation", "Analyze attack vectors and persistence"],
            &["Block malicious indicators at the perimeter", "Reset credentials on affected systems"],
        ),
        IncidentCategory::PhysicalSecurity => (
            &["Secure the breach area", "Dispatch security staff to the location"],
            &["Review camera footage for the affected area", "Inspect for property damage or loss"],
            &["Restrict access to the affected area", "Increase patrol frequency"],
        ),
        _ => (
            &["Verify the reported violation"],
            &["Interview involved parties", "Review applicable procedures"],
            &["Apply corrective controls"],
        ),
    };
    plan.immediate_actions.extend(immediate.iter().map(|s| s.to_string()));
    plan.investigation_steps.extend(investigation.iter().map(|s| s.to_string()));
    plan.containment_measures.extend(containment.iter().map(|s| s.to_string()));

    // Playbook actions that document or notify land in their sections
    if let Some(playbook) = &state.selected_playbook {
        for action in &playbook.required_actions {
            if action.contains("notify") || action.contains("notification") {
                merge(&mut plan.notification_requirements, vec![action.replace('_', " ")]);
            } else if action.contains("document") || action.contains("report") {
                merge(&mut plan.documentation_requirements, vec![action.replace('_', " ")]);
            }
        }
    }

    // Compliance deadlines become notification requirements verbatim
    if let Some(value) = state.tool_result("compliance_check") {
        if let Ok(report) = serde_json::from_value::<ComplianceReport>(value.clone()) {
            for (recipient, deadline) in &report.notification_deadlines {
                merge(
                    &mut plan.notification_requirements,
                    vec![format!("Notify {} within {}", recipient.replace('_', " "), deadline)],
                );
            }
            for doc in &report.documentation_requirements {
                merge(&mut plan.documentation_requirements, vec![doc.replace('_', " ")]);
            }
        }
    }

    plan.notification_requirements
        .push("Notify security team".to_string());
    plan.documentation_requirements
        .push("Complete incident report".to_string());
    plan.follow_up_actions
        .push("Schedule post-incident review".to_string());
    if matches!(
        category,
        IncidentCategory::PiiBreach | IncidentCategory::PaymentFraud
    ) {
        plan.follow_up_actions
            .push("Track regulatory notification deadlines to closure".to_string());
    }

    plan
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IncidentMetadata;
    use crate::tools::llm::ScriptedLlm;

    fn generator(llm: ScriptedLlm) -> ResponseGenerator {
        ResponseGenerator::new(
            Arc::new(llm),
            RateLimiter::per_minute(50),
            PerfSink::disconnected(),
        )
    }

    fn guest_access_state() -> IncidentState {
        let mut state = IncidentState::new(
            "Suspicious keycard activity",
            "Card used at two locations simultaneously",
            IncidentMetadata::default(),
        );
        state.category = Some(IncidentCategory::GuestAccess);
        state.priority = Some(IncidentPriority::High);
        state
    }

    #[tokio::test]
    async fn same_input_and_model_output_produce_the_same_plan() {
        let state = guest_access_state();
        let enrichment =
            r#"{"investigation_steps": ["Interview the shift supervisor"], "immediate_actions": []}"#;
        let a = generator(ScriptedLlm::repeating(enrichment)).generate(&state).await;
        let b = generator(ScriptedLlm::repeating(enrichment)).generate(&state).await;
        assert_eq!(a, b);
        assert!(a
            .investigation_steps
            .contains(&"Interview the shift supervisor".to_string()));
    }

    #[tokio::test]
    async fn existing_plan_is_returned_unchanged() {
        let mut state = guest_access_state();
        let original = generator(ScriptedLlm::new(vec!["{}"])).generate(&state).await;
        state.response_plan = Some(original.clone());
        // A different scripted response must not alter the recorded plan
        let again = generator(ScriptedLlm::repeating(
            r#"{"immediate_actions": ["Something new"]}"#,
        ))
        .generate(&state)
        .await;
        assert_eq!(again, original);
    }

    #[tokio::test]
    async fn model_failure_still_yields_a_complete_template_plan() {
        let plan = generator(ScriptedLlm::new(vec![])).generate(&guest_access_state()).await;
        assert!(!plan.immediate_actions.is_empty());
        assert!(!plan.containment_measures.is_empty());
        assert!(plan
            .notification_requirements
            .contains(&"Notify security team".to_string()));
    }

    #[tokio::test]
    async fn compliance_deadlines_flow_into_notifications() {
        let mut state = guest_access_state();
        state.category = Some(IncidentCategory::PaymentFraud);
        let report = crate::tools::compliance::ComplianceChecker::new().check(
            IncidentCategory::PaymentFraud,
            &IncidentMetadata::default(),
            None,
        );
        state.add_tool_result("compliance_check", serde_json::to_value(&report).unwrap());
        let plan = generator(ScriptedLlm::new(vec!["{}"])).generate(&state).await;
        assert!(plan
            .notification_requirements
            .iter()
            .any(|n| n.contains("card brands") && n.contains("24 hours")));
    }

    #[tokio::test]
    async fn critical_priority_leads_with_executive_notification() {
        let mut state = guest_access_state();
        state.priority = Some(IncidentPriority::Critical);
        let plan = generator(ScriptedLlm::new(vec!["{}"])).generate(&state).await;
        assert_eq!(
            plan.immediate_actions[0],
            "Executive notification within 30 minutes"
        );
    }
}
