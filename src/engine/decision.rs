// Autonomous decision engine - impact, risk, autonomy and plan selection

//! # Decision Engine
//!
//! Given a classified, risk-assessed incident, the decision engine produces a
//! `DecisionPlan`: a business-impact assessment, seven-axis risk vectors, an
//! autonomy verdict (execute autonomously vs. escalate to a human approver)
//! and the optimal action plan chosen from generated candidates.
//!
//! Every score here is a fixed weighted sum over documented criteria, so the
//! same state (and the same wall-clock hour) always yields the same decision.

use chrono::{DateTime, Timelike, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::models::{
    Action, ActionType, AutonomyAssessment, BusinessImpact, CandidatePlan, CostBenefit,
    DecisionPlan, IncidentCategory, IncidentPriority, IncidentState, RiskVectors,
};

/// Financial impact above which escalation is mandatory, in rupees
const FINANCIAL_OVERRIDE_LIMIT: f64 = 100_000.0;
/// Financial impact below which the autonomy criterion scores full marks
const FINANCIAL_COMFORT_LIMIT: f64 = 50_000.0;
/// Guest-safety risk above which escalation is mandatory (strict comparison)
const GUEST_SAFETY_OVERRIDE: f64 = 0.8;
/// Classification confidence below which escalation is mandatory (strict)
const CONFIDENCE_OVERRIDE: f64 = 0.6;

struct CategoryImpact {
    base_financial: f64,
    guest_satisfaction: f64,
    operational: f64,
    reputation: f64,
    compliance: f64,
}

fn category_impact(category: IncidentCategory) -> CategoryImpact {
    match category {
        IncidentCategory::GuestAccess => CategoryImpact {
            base_financial: 5_000.0,
            guest_satisfaction: 0.6,
            operational: 0.4,
            reputation: 0.5,
            compliance: 0.3,
        },
        IncidentCategory::PaymentFraud => CategoryImpact {
            base_financial: 15_000.0,
            guest_satisfaction: 0.8,
            operational: 0.6,
            reputation: 0.7,
            compliance: 0.5,
        },
        IncidentCategory::PiiBreach => CategoryImpact {
            base_financial: 50_000.0,
            guest_satisfaction: 0.9,
            operational: 0.7,
            reputation: 0.9,
            compliance: 0.95,
        },
        IncidentCategory::CyberSecurity => CategoryImpact {
            base_financial: 75_000.0,
            guest_satisfaction: 0.7,
            operational: 0.9,
            reputation: 0.8,
            compliance: 0.6,
        },
        IncidentCategory::PhysicalSecurity => CategoryImpact {
            base_financial: 12_000.0,
            guest_satisfaction: 0.7,
            operational: 0.6,
            reputation: 0.6,
            compliance: 0.3,
        },
        IncidentCategory::ComplianceViolation => CategoryImpact {
            base_financial: 20_000.0,
            guest_satisfaction: 0.4,
            operational: 0.5,
            reputation: 0.6,
            compliance: 0.9,
        },
        IncidentCategory::VendorAccess => CategoryImpact {
            base_financial: 6_000.0,
            guest_satisfaction: 0.4,
            operational: 0.5,
            reputation: 0.4,
            compliance: 0.5,
        },
        IncidentCategory::OperationalSecurity => CategoryImpact {
            base_financial: 8_000.0,
            guest_satisfaction: 0.5,
            operational: 0.6,
            reputation: 0.4,
            compliance: 0.4,
        },
    }
}

fn category_urgency(category: IncidentCategory) -> f64 {
    match category {
        IncidentCategory::CyberSecurity => 2.0,
        IncidentCategory::PaymentFraud => 1.8,
        IncidentCategory::PiiBreach => 1.5,
        IncidentCategory::PhysicalSecurity => 1.4,
        IncidentCategory::GuestAccess => 1.3,
        _ => 1.0,
    }
}

/// Minimum autonomy score per category; below it the incident escalates
pub fn autonomy_threshold(category: IncidentCategory) -> f64 {
    match category {
        IncidentCategory::GuestAccess => 0.75,
        IncidentCategory::PaymentFraud => 0.70,
        IncidentCategory::PiiBreach => 0.65,
        IncidentCategory::OperationalSecurity => 0.80,
        IncidentCategory::VendorAccess => 0.75,
        IncidentCategory::PhysicalSecurity => 0.70,
        IncidentCategory::CyberSecurity => 0.60,
        IncidentCategory::ComplianceViolation => 0.50,
    }
}

fn critical_timeframe_minutes(category: IncidentCategory) -> Option<u32> {
    match category {
        IncidentCategory::CyberSecurity => Some(10),
        IncidentCategory::PaymentFraud => Some(15),
        IncidentCategory::GuestAccess => Some(30),
        IncidentCategory::PiiBreach => Some(60),
        _ => None,
    }
}

fn category_base_risks(category: IncidentCategory) -> RiskVectors {
    let (gs, ds, fin, op, legal, rep, esc) = match category {
        IncidentCategory::GuestAccess => (0.3, 0.3, 0.2, 0.3, 0.2, 0.3, 0.3),
        IncidentCategory::PaymentFraud => (0.1, 0.6, 0.8, 0.4, 0.6, 0.5, 0.4),
        IncidentCategory::PiiBreach => (0.2, 0.9, 0.6, 0.4, 0.9, 0.8, 0.5),
        IncidentCategory::CyberSecurity => (0.3, 0.8, 0.6, 0.8, 0.5, 0.6, 0.6),
        IncidentCategory::PhysicalSecurity => (0.7, 0.2, 0.3, 0.4, 0.2, 0.4, 0.4),
        IncidentCategory::OperationalSecurity => (0.2, 0.3, 0.2, 0.5, 0.3, 0.2, 0.2),
        IncidentCategory::VendorAccess => (0.2, 0.4, 0.3, 0.4, 0.4, 0.3, 0.3),
        IncidentCategory::ComplianceViolation => (0.1, 0.4, 0.3, 0.3, 0.9, 0.5, 0.3),
    };
    RiskVectors {
        guest_safety_risk: gs,
        data_security_risk: ds,
        financial_risk: fin,
        operational_risk: op,
        legal_compliance_risk: legal,
        reputation_risk: rep,
        escalation_risk: esc,
        ..Default::default()
    }
}

lazy_static! {
    static ref CARD_ID: Regex = Regex::new(r"\b[A-Z]{1,3}_?[0-9]{4,}\b").expect("card id pattern");
}

/// Multi-criteria autonomous decision engine
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn new() -> Self {
        Self
    }

    /// Business impact across five dimensions: category base values scaled by
    /// severity, scope (capped at 5x) and a time-of-day urgency factor.
    pub fn business_impact(&self, state: &IncidentState, now: DateTime<Utc>) -> BusinessImpact {
        let category = state.category.unwrap_or(IncidentCategory::OperationalSecurity);
        let base = category_impact(category);
        let severity = state.effective_priority().severity_multiplier();
        let scope = scope_multiplier(state);
        let urgency = urgency_factor(category, now.hour());

        BusinessImpact {
            financial_impact: base.base_financial * severity * scope,
            guest_satisfaction_impact: (base.guest_satisfaction * severity).min(1.0),
            operational_impact: (base.operational * severity).min(1.0),
            reputation_impact: (base.reputation * severity).min(1.0),
            compliance_impact: (base.compliance * severity).min(1.0),
            urgency_factor: urgency,
        }
    }

    /// Seven-axis risk vectors: category base values adjusted for the
    /// incident's scope, plus the legal/management flags the overrides read.
    pub fn risk_vectors(&self, state: &IncidentState) -> RiskVectors {
        let category = state.category.unwrap_or(IncidentCategory::OperationalSecurity);
        let mut vectors = category_base_risks(category);

        let guest_count = state.metadata.affected_guests.len();
        if guest_count > 50 {
            vectors.guest_safety_risk = (vectors.guest_safety_risk + 0.2).min(1.0);
            vectors.reputation_risk = (vectors.reputation_risk + 0.2).min(1.0);
        } else if guest_count > 0 {
            vectors.guest_safety_risk = (vectors.guest_safety_risk + 0.1).min(1.0);
        }
        if state
            .metadata
            .affected_systems
            .iter()
            .any(|s| s.to_lowercase().contains("payment") || s.to_lowercase().contains("pos"))
        {
            vectors.financial_risk = (vectors.financial_risk + 0.2).min(1.0);
        }
        let risk_score = state
            .risk_assessment
            .as_ref()
            .map(|r| r.risk_score)
            .unwrap_or(5.0);
        if risk_score >= 8.0 {
            vectors.escalation_risk = (vectors.escalation_risk + 0.3).min(1.0);
        }

        // The compliance gate's recorded verdict is authoritative for legal review
        vectors.requires_legal_review = state
            .tool_result("compliance_check")
            .and_then(|v| v.get("requires_legal_review"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        vectors.requires_management_approval = risk_score >= 8.0
            || state.effective_priority() == IncidentPriority::Critical
            || state.metadata.estimated_cost.map_or(false, |c| c > FINANCIAL_OVERRIDE_LIMIT);
        vectors.critical_timeframe_minutes = critical_timeframe_minutes(category);

        vectors
    }

    /// Weighted eight-criteria autonomy assessment with hard overrides. Any
    /// single override condition forces escalation regardless of the score.
    pub fn assess_autonomy(
        &self,
        state: &IncidentState,
        impact: &BusinessImpact,
        vectors: &RiskVectors,
        historical_success: Option<f64>,
    ) -> AutonomyAssessment {
        let category = state.category.unwrap_or(IncidentCategory::OperationalSecurity);
        let mut scores = BTreeMap::new();

        scores.insert(
            "financial_threshold".to_string(),
            if impact.financial_impact < FINANCIAL_COMFORT_LIMIT { 1.0 } else { 0.0 },
        );
        scores.insert("safety_risk".to_string(), 1.0 - vectors.guest_safety_risk);
        scores.insert(
            "classification_confidence".to_string(),
            state.classification_confidence.unwrap_or(0.5),
        );
        scores.insert(
            "compliance_simple".to_string(),
            if vectors.requires_legal_review { 0.0 } else { 1.0 },
        );
        scores.insert(
            "operational_impact".to_string(),
            (1.0 - impact.operational_impact).max(0.0),
        );
        let time_factor = match vectors.critical_timeframe_minutes {
            Some(minutes) if minutes < 15 => 0.3,
            Some(minutes) if minutes < 60 => 0.8,
            _ => 1.0,
        };
        scores.insert("time_sensitivity".to_string(), time_factor);
        scores.insert(
            "historical_success".to_string(),
            historical_success.unwrap_or(0.8),
        );
        let system_complexity =
            (state.metadata.affected_systems.len() as f64 / 4.0).min(1.0);
        scores.insert("system_complexity".to_string(), 1.0 - system_complexity);

        let autonomy_score = 0.20 * scores["financial_threshold"]
            + 0.25 * scores["safety_risk"]
            + 0.15 * scores["classification_confidence"]
            + 0.15 * scores["compliance_simple"]
            + 0.10 * scores["operational_impact"]
            + 0.05 * scores["time_sensitivity"]
            + 0.05 * scores["historical_success"]
            + 0.05 * scores["system_complexity"];

        let threshold = autonomy_threshold(category);

        // Strict comparisons: exactly 0.8 safety risk or exactly 0.6
        // confidence does not trip the override.
        let override_conditions = [
            vectors.requires_legal_review,
            vectors.requires_management_approval,
            impact.financial_impact > FINANCIAL_OVERRIDE_LIMIT,
            vectors.guest_safety_risk > GUEST_SAFETY_OVERRIDE,
            state.classification_confidence.unwrap_or(0.5) < CONFIDENCE_OVERRIDE,
        ];
        let override_met = override_conditions.iter().any(|c| *c);

        let can_proceed = autonomy_score >= threshold && !override_met;
        let reasoning = if override_met {
            "Override condition met - requires human intervention".to_string()
        } else {
            format!(
                "Autonomy score {:.2} {} threshold {:.2} for {}",
                autonomy_score,
                if autonomy_score >= threshold { "meets" } else { "below" },
                threshold,
                category
            )
        };

        AutonomyAssessment {
            can_proceed_autonomously: can_proceed,
            confidence: autonomy_score,
            reasoning,
            criteria_scores: scores,
            override_conditions_met: override_met,
        }
    }

    /// Generate candidate action plans from the selected playbook and the
    /// incident's scope parameters.
    pub fn generate_candidates(&self, state: &IncidentState) -> Vec<CandidatePlan> {
        let category = state.category.unwrap_or(IncidentCategory::OperationalSecurity);
        match category {
            IncidentCategory::GuestAccess => guest_access_candidates(state),
            IncidentCategory::PaymentFraud => payment_fraud_candidates(state),
            IncidentCategory::PiiBreach => pii_breach_candidates(state),
            IncidentCategory::CyberSecurity => cyber_candidates(state),
            IncidentCategory::PhysicalSecurity => physical_candidates(state),
            _ => default_candidates(state),
        }
    }

    /// Score candidates on effectiveness, efficiency, risk mitigation,
    /// inverse complexity and resource availability; pick the best. Ties
    /// break by lower complexity, then lower estimated cost.
    pub fn select_plan<'a>(
        &self,
        candidates: &'a [CandidatePlan],
        vectors: &RiskVectors,
    ) -> Option<(&'a CandidatePlan, BTreeMap<String, f64>)> {
        let mut best: Option<(&CandidatePlan, f64, BTreeMap<String, f64>)> = None;

        for plan in candidates {
            let effectiveness = plan.success_probability;
            let efficiency =
                1.0 - (plan.estimated_total_duration_seconds as f64 / 7200.0).min(1.0);
            let risk_mitigation = mitigation_score(plan, vectors);
            let complexity = plan.complexity();
            let resource_availability = 0.9 - 0.1 * (plan.actions.len() as f64 / 10.0).min(1.0);

            let total = 0.35 * effectiveness
                + 0.20 * efficiency
                + 0.25 * risk_mitigation
                + 0.10 * (1.0 - complexity)
                + 0.10 * resource_availability;

            let breakdown: BTreeMap<String, f64> = [
                ("effectiveness".to_string(), effectiveness),
                ("efficiency".to_string(), efficiency),
                ("risk_mitigation".to_string(), risk_mitigation),
                ("complexity".to_string(), complexity),
                ("resource_availability".to_string(), resource_availability),
                ("total".to_string(), total),
            ]
            .into_iter()
            .collect();

            let replace = match &best {
                None => true,
                Some((current, current_total, _)) => {
                    total > *current_total
                        || (total == *current_total
                            && (complexity < current.complexity()
                                || (complexity == current.complexity()
                                    && plan.estimated_cost < current.estimated_cost)))
                }
            };
            if replace {
                best = Some((plan, total, breakdown));
            }
        }

        best.map(|(plan, _, breakdown)| (plan, breakdown))
    }

    /// The full decision: analyze, assess autonomy, pick the optimal plan and
    /// assemble the `DecisionPlan` with its timeline and rationale.
    pub fn make_plan(
        &self,
        state: &IncidentState,
        historical_success: Option<f64>,
        now: DateTime<Utc>,
    ) -> DecisionPlan {
        let impact = self.business_impact(state, now);
        let vectors = self.risk_vectors(state);
        let autonomy = self.assess_autonomy(state, &impact, &vectors, historical_success);
        let candidates = self.generate_candidates(state);

        let (selected, breakdown) = match self.select_plan(&candidates, &vectors) {
            Some((plan, breakdown)) => (plan.clone(), breakdown),
            None => (fallback_candidate(state), BTreeMap::new()),
        };

        let timeline = schedule(&selected.actions, now);
        let cost_benefit = cost_benefit(&selected, &impact);
        let rollback_plan = rollback_plan(&selected);

        let reasoning = format!(
            "{} | Impact score {:.2} | Overall risk {:.2} | Plan '{}' scored {:.3} across {} actions",
            autonomy.reasoning,
            impact.total_impact_score(),
            vectors.overall_risk_score(),
            selected.name,
            breakdown.get("total").copied().unwrap_or(0.0),
            selected.actions.len(),
        );
        if autonomy.can_proceed_autonomously {
            info!(incident_id = %state.incident_id, plan = %selected.name, "autonomous execution approved");
        } else {
            debug!(incident_id = %state.incident_id, "decision escalates to human approver");
        }

        DecisionPlan {
            incident_id: state.incident_id.clone(),
            decision_timestamp: now,
            autonomous: autonomy.can_proceed_autonomously,
            confidence: autonomy.confidence,
            reasoning,
            actions: selected.actions.clone(),
            execution_timeline: timeline,
            expected_outcome: selected.expected_outcome.clone(),
            success_probability: selected.success_probability,
            business_impact: impact,
            cost_benefit,
            alternative_plans_considered: candidates.iter().map(|c| c.name.clone()).collect(),
            risk_mitigation_measures: mitigation_measures(&vectors),
            escalation_triggers: escalation_triggers(&vectors),
            rollback_plan,
        }
    }
}

impl Default for DecisionEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope multiplier from affected guests and systems, capped at 5x.
fn scope_multiplier(state: &IncidentState) -> f64 {
    let mut multiplier = 1.0;
    let guests = state.metadata.affected_guests.len();
    if guests > 100 {
        multiplier *= 3.0;
    } else if guests > 10 {
        multiplier *= 2.0;
    } else if guests > 1 {
        multiplier *= 1.5;
    }
    multiplier *= 1.0 + state.metadata.affected_systems.len() as f64 * 0.2;
    multiplier.min(5.0)
}

/// Night-hour incidents (22:00-06:00) are more urgent: fewer staff, more
/// guests in-house.
fn urgency_factor(category: IncidentCategory, hour: u32) -> f64 {
    let base = category_urgency(category);
    if hour >= 22 || hour <= 6 {
        base * 1.2
    } else {
        base
    }
}

fn mitigation_score(plan: &CandidatePlan, vectors: &RiskVectors) -> f64 {
    let mut score: f64 = 0.5;
    let has = |t: ActionType| plan.actions.iter().any(|a| a.action_type == t);
    if vectors.guest_safety_risk > 0.5 && (has(ActionType::Lockdown) || has(ActionType::AccessControl)) {
        score += 0.2;
    }
    if vectors.data_security_risk > 0.5 && has(ActionType::Investigation) {
        score += 0.15;
    }
    if vectors.legal_compliance_risk > 0.5 && has(ActionType::ComplianceReport) {
        score += 0.15;
    }
    if has(ActionType::Documentation) {
        score += 0.05;
    }
    score.min(1.0)
}

fn mitigation_measures(vectors: &RiskVectors) -> Vec<String> {
    let mut measures = vec!["Checkpoint after every workflow step".to_string()];
    if vectors.guest_safety_risk > 0.5 {
        measures.push("Security staff dispatched before access changes".to_string());
    }
    if vectors.data_security_risk > 0.5 {
        measures.push("Affected data stores isolated pending investigation".to_string());
    }
    if vectors.requires_legal_review {
        measures.push("Legal counsel reviews outbound notifications".to_string());
    }
    measures
}

fn escalation_triggers(vectors: &RiskVectors) -> Vec<String> {
    let mut triggers = vec![
        "automation success rate below 0.5".to_string(),
        "rollback failure on any completed action".to_string(),
    ];
    if let Some(minutes) = vectors.critical_timeframe_minutes {
        triggers.push(format!("response exceeds the {}-minute critical window", minutes));
    }
    if vectors.escalation_risk > 0.5 {
        triggers.push("incident scope grows beyond the assessed impact".to_string());
    }
    triggers
}

/// Dependency-aware schedule: each action starts when its slowest dependency
/// finishes.
fn schedule(actions: &[Action], start: DateTime<Utc>) -> BTreeMap<String, DateTime<Utc>> {
    let mut timeline: BTreeMap<String, DateTime<Utc>> = BTreeMap::new();
    let by_id: BTreeMap<&str, &Action> = actions.iter().map(|a| (a.id.as_str(), a)).collect();

    // Actions are generated in dependency order, so one pass suffices.
    for action in actions {
        let mut earliest = start;
        for dep in &action.dependencies {
            if let (Some(dep_start), Some(dep_action)) = (timeline.get(dep), by_id.get(dep.as_str())) {
                let dep_end = *dep_start
                    + chrono::Duration::seconds(dep_action.estimated_duration_seconds as i64);
                if dep_end > earliest {
                    earliest = dep_end;
                }
            }
        }
        timeline.insert(action.id.clone(), earliest);
    }
    timeline
}

fn cost_benefit(plan: &CandidatePlan, impact: &BusinessImpact) -> CostBenefit {
    let implementation_cost = plan.estimated_cost;
    let avoided_costs = impact.financial_impact * 0.8;
    // Manual handling of the same incident is roughly an order of magnitude
    // slower than the automated plan.
    let manual_seconds = plan.estimated_total_duration_seconds as f64 * 10.0;
    let efficiency_value =
        (manual_seconds - plan.estimated_total_duration_seconds as f64) / 3600.0 * 50.0;
    let satisfaction_value = impact.guest_satisfaction_impact * 10_000.0;
    let reputation_value = impact.reputation_impact * 25_000.0;

    let total_benefit = avoided_costs + efficiency_value + satisfaction_value + reputation_value;
    let net_benefit = total_benefit - implementation_cost;
    let roi_percentage = if implementation_cost > 0.0 {
        net_benefit / implementation_cost * 100.0
    } else {
        0.0
    };

    CostBenefit {
        implementation_cost,
        avoided_costs,
        efficiency_value,
        satisfaction_value,
        reputation_value,
        total_benefit,
        net_benefit,
        roi_percentage,
    }
}

fn rollback_plan(plan: &CandidatePlan) -> Option<Vec<String>> {
    let reversible: Vec<String> = plan
        .actions
        .iter()
        .filter(|a| a.rollback_possible)
        .map(|a| format!("rollback {}", a.name))
        .collect();
    if reversible.is_empty() {
        None
    } else {
        Some(reversible)
    }
}

/// Extract a keycard identifier from classification entities or the raw text.
fn extract_card_id(state: &IncidentState) -> Option<String> {
    if let Some(entities) = state
        .tool_result("classification")
        .and_then(|v| v.get("extracted_entities"))
        .and_then(|v| v.get("card_ids"))
        .and_then(|v| v.as_array())
    {
        if let Some(id) = entities.first().and_then(|v| v.as_str()) {
            return Some(id.to_string());
        }
    }
    CARD_ID
        .find(&format!("{} {}", state.title, state.description))
        .map(|m| m.as_str().to_string())
}

fn notify_action(order: u32, recipient_role: &str) -> Action {
    Action::new(ActionType::Notification, format!("notify_{}", recipient_role))
        .with_parameter("channel", serde_json::json!("messaging"))
        .with_parameter("recipient", serde_json::json!(recipient_role))
        .with_priority(order)
        .with_duration(30)
}

fn document_action(order: u32) -> Action {
    Action::new(ActionType::Documentation, "document_findings")
        .with_priority(order)
        .with_duration(120)
}

fn guest_access_candidates(state: &IncidentState) -> Vec<CandidatePlan> {
    let card_id = extract_card_id(state).unwrap_or_else(|| "unknown_card".to_string());
    let room = state.metadata.room_number.clone();

    // Containment-first: revoke, hold the room, then notify and document
    let mut revoke = Action::new(ActionType::AccessControl, "revoke_keycard")
        .with_parameter("operation", serde_json::json!("revoke"))
        .with_parameter("card_id", serde_json::json!(card_id))
        .with_parameter("reason", serde_json::json!("suspicious simultaneous use"))
        .with_priority(1)
        .with_duration(60);
    revoke.rollback_possible = true;
    revoke.success_criteria.push("card disabled across all areas".to_string());

    let mut actions = vec![revoke.clone()];
    if let Some(room) = &room {
        let mut hold = Action::new(ActionType::PmsUpdate, "room_security_hold")
            .with_parameter("operation", serde_json::json!("room_status"))
            .with_parameter("room_number", serde_json::json!(room))
            .with_parameter("status", serde_json::json!("security_hold"))
            .with_priority(2)
            .with_duration(60)
            .depends_on(&revoke.id);
        hold.rollback_possible = true;
        actions.push(hold);
    }
    let notify = notify_action(3, "security_team").depends_on(&revoke.id);
    let document = document_action(4).depends_on(&notify.id);
    actions.push(notify);
    actions.push(document);

    let containment = CandidatePlan {
        name: "containment_first".to_string(),
        actions,
        expected_outcome: "Compromised credential disabled and affected room secured".to_string(),
        success_probability: 0.92,
        estimated_total_duration_seconds: 270,
        estimated_cost: 500.0,
    };

    // Investigate-first: pull access logs before revoking
    let investigate = Action::new(ActionType::Investigation, "pull_access_logs")
        .with_parameter("card_id", serde_json::json!(card_id))
        .with_priority(1)
        .with_duration(300);
    let mut late_revoke = Action::new(ActionType::AccessControl, "revoke_keycard")
        .with_parameter("operation", serde_json::json!("revoke"))
        .with_parameter("card_id", serde_json::json!(card_id))
        .with_parameter("reason", serde_json::json!("confirmed misuse"))
        .with_priority(2)
        .with_duration(60)
        .depends_on(&investigate.id);
    late_revoke.rollback_possible = true;
    let notify2 = notify_action(3, "security_team").depends_on(&late_revoke.id);
    let investigate_first = CandidatePlan {
        name: "investigate_first".to_string(),
        actions: vec![investigate, late_revoke, notify2],
        expected_outcome: "Misuse confirmed from logs before credential revocation".to_string(),
        success_probability: 0.80,
        estimated_total_duration_seconds: 420,
        estimated_cost: 700.0,
    };

    vec![containment, investigate_first]
}

fn payment_fraud_candidates(state: &IncidentState) -> Vec<CandidatePlan> {
    let terminal = state
        .metadata
        .affected_systems
        .first()
        .cloned()
        .unwrap_or_else(|| "pos_terminal".to_string());

    let investigate = Action::new(ActionType::Investigation, "analyze_transactions")
        .with_parameter("system", serde_json::json!(terminal))
        .with_priority(1)
        .with_duration(600);
    let report = Action::new(ActionType::ComplianceReport, "file_card_brand_notification")
        .with_parameter("framework", serde_json::json!("pci_dss"))
        .with_parameter("deadline_hours", serde_json::json!(24))
        .with_priority(2)
        .with_duration(300)
        .depends_on(&investigate.id);
    let notify = notify_action(3, "finance_team").depends_on(&investigate.id);
    let document = document_action(4).depends_on(&report.id);

    vec![CandidatePlan {
        name: "fraud_containment".to_string(),
        actions: vec![investigate, report, notify, document],
        expected_outcome: "Fraudulent activity contained and card brands notified within 24 hours"
            .to_string(),
        success_probability: 0.85,
        estimated_total_duration_seconds: 1020,
        estimated_cost: 1500.0,
    }]
}

fn pii_breach_candidates(_state: &IncidentState) -> Vec<CandidatePlan> {
    let investigate = Action::new(ActionType::Investigation, "scope_data_exposure")
        .with_priority(1)
        .with_duration(900);
    let report = Action::new(ActionType::ComplianceReport, "prepare_breach_notification")
        .with_parameter("framework", serde_json::json!("dpdp"))
        .with_parameter("deadline_hours", serde_json::json!(72))
        .with_priority(2)
        .with_duration(600)
        .depends_on(&investigate.id);
    let notify = notify_action(3, "privacy_officer");
    let document = document_action(4).depends_on(&report.id);

    vec![CandidatePlan {
        name: "breach_response".to_string(),
        actions: vec![investigate, report, notify, document],
        expected_outcome: "Exposure scoped and regulatory notifications prepared".to_string(),
        success_probability: 0.82,
        estimated_total_duration_seconds: 1620,
        estimated_cost: 2500.0,
    }]
}

fn cyber_candidates(state: &IncidentState) -> Vec<CandidatePlan> {
    let area = state
        .metadata
        .affected_systems
        .first()
        .cloned()
        .unwrap_or_else(|| "server_room".to_string());
    let mut lockdown = Action::new(ActionType::Lockdown, "lock_server_area")
        .with_parameter("area_id", serde_json::json!(area))
        .with_parameter("duration_minutes", serde_json::json!(120))
        .with_parameter("emergency", serde_json::json!(true))
        .with_priority(1)
        .with_duration(120);
    lockdown.rollback_possible = true;
    let investigate = Action::new(ActionType::Investigation, "collect_forensics")
        .with_priority(2)
        .with_duration(1800)
        .depends_on(&lockdown.id);
    let notify = notify_action(3, "it_security").depends_on(&lockdown.id);
    let document = document_action(4).depends_on(&investigate.id);

    vec![CandidatePlan {
        name: "isolate_and_investigate".to_string(),
        actions: vec![lockdown, investigate, notify, document],
        expected_outcome: "Affected infrastructure isolated and forensics preserved".to_string(),
        success_probability: 0.78,
        estimated_total_duration_seconds: 2100,
        estimated_cost: 4000.0,
    }]
}

fn physical_candidates(state: &IncidentState) -> Vec<CandidatePlan> {
    let area = state
        .metadata
        .location
        .clone()
        .unwrap_or_else(|| "affected_area".to_string());
    let mut lockdown = Action::new(ActionType::Lockdown, "secure_breach_area")
        .with_parameter("area_id", serde_json::json!(area))
        .with_parameter("duration_minutes", serde_json::json!(60))
        .with_parameter("emergency", serde_json::json!(false))
        .with_priority(1)
        .with_duration(180);
    lockdown.rollback_possible = true;
    let notify = notify_action(2, "security_team").depends_on(&lockdown.id);
    let document = document_action(3).depends_on(&notify.id);

    vec![CandidatePlan {
        name: "secure_area".to_string(),
        actions: vec![lockdown, notify, document],
        expected_outcome: "Breach area secured and patrols increased".to_string(),
        success_probability: 0.88,
        estimated_total_duration_seconds: 330,
        estimated_cost: 800.0,
    }]
}

fn default_candidates(_state: &IncidentState) -> Vec<CandidatePlan> {
    let investigate = Action::new(ActionType::Investigation, "investigate_violation")
        .with_priority(1)
        .with_duration(600);
    let notify = notify_action(2, "security_team").depends_on(&investigate.id);
    let document = document_action(3).depends_on(&investigate.id);

    vec![CandidatePlan {
        name: "investigate_and_correct".to_string(),
        actions: vec![investigate, notify, document],
        expected_outcome: "Violation investigated and corrective actions recorded".to_string(),
        success_probability: 0.85,
        estimated_total_duration_seconds: 750,
        estimated_cost: 600.0,
    }]
}

fn fallback_candidate(state: &IncidentState) -> CandidatePlan {
    default_candidates(state)
        .into_iter()
        .next()
        .expect("default candidate set is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{IncidentMetadata, RiskAssessment};
    use chrono::TimeZone;

    fn keycard_state() -> IncidentState {
        let mut state = IncidentState::new(
            "Suspicious keycard activity",
            "Card KC_887234 used simultaneously at room 1205 and penthouse elevator within 30s",
            IncidentMetadata {
                room_number: Some("1205".to_string()),
                property_code: Some("P01".to_string()),
                ..Default::default()
            },
        );
        state.category = Some(IncidentCategory::GuestAccess);
        state.priority = Some(IncidentPriority::High);
        state.classification_confidence = Some(0.93);
        state.risk_assessment = Some(RiskAssessment {
            risk_score: 6.5,
            risk_factors: vec![],
            mitigation_urgency: IncidentPriority::High,
            potential_impact: String::new(),
            likelihood_score: 7.0,
            confidence_score: 0.9,
        });
        state
    }

    fn daytime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap()
    }

    #[test]
    fn night_hours_scale_urgency() {
        let engine = DecisionEngine::new();
        let state = keycard_state();
        let day = engine.business_impact(&state, daytime());
        let night = engine
            .business_impact(&state, Utc.with_ymd_and_hms(2025, 6, 10, 23, 0, 0).unwrap());
        assert!((night.urgency_factor - day.urgency_factor * 1.2).abs() < 1e-9);
    }

    #[test]
    fn scope_multiplier_caps_at_five() {
        let mut state = keycard_state();
        state.metadata.affected_guests = (0..200).map(|i| format!("g{i}")).collect();
        state.metadata.affected_systems = (0..20).map(|i| format!("s{i}")).collect();
        assert_eq!(scope_multiplier(&state), 5.0);
    }

    #[test]
    fn keycard_scenario_is_autonomous() {
        let engine = DecisionEngine::new();
        let state = keycard_state();
        let impact = engine.business_impact(&state, daytime());
        let vectors = engine.risk_vectors(&state);
        let autonomy = engine.assess_autonomy(&state, &impact, &vectors, None);
        assert!(autonomy.can_proceed_autonomously, "{}", autonomy.reasoning);
        assert!(!autonomy.override_conditions_met);
    }

    #[test]
    fn guest_safety_override_is_strict_at_the_boundary() {
        let engine = DecisionEngine::new();
        let state = keycard_state();
        let impact = engine.business_impact(&state, daytime());

        let mut at_boundary = engine.risk_vectors(&state);
        at_boundary.guest_safety_risk = 0.8;
        let assessment = engine.assess_autonomy(&state, &impact, &at_boundary, None);
        assert!(!assessment.override_conditions_met, "0.8 must not trip the override");

        let mut above = engine.risk_vectors(&state);
        above.guest_safety_risk = 0.801;
        let assessment = engine.assess_autonomy(&state, &impact, &above, None);
        assert!(assessment.override_conditions_met, "0.801 must trip the override");
    }

    #[test]
    fn confidence_override_is_strict_at_the_boundary() {
        let engine = DecisionEngine::new();
        let mut state = keycard_state();
        let impact = engine.business_impact(&state, daytime());
        let vectors = engine.risk_vectors(&state);

        state.classification_confidence = Some(0.6);
        let at = engine.assess_autonomy(&state, &impact, &vectors, None);
        assert!(!at.override_conditions_met, "exactly 0.6 must not trip the override");

        state.classification_confidence = Some(0.59);
        let below = engine.assess_autonomy(&state, &impact, &vectors, None);
        assert!(below.override_conditions_met);
    }

    #[test]
    fn legal_review_forces_escalation_regardless_of_score() {
        let engine = DecisionEngine::new();
        let mut state = keycard_state();
        state.add_tool_result("compliance_check", serde_json::json!({"requires_legal_review": true}));
        let impact = engine.business_impact(&state, daytime());
        let vectors = engine.risk_vectors(&state);
        let autonomy = engine.assess_autonomy(&state, &impact, &vectors, None);
        assert!(!autonomy.can_proceed_autonomously);
        assert!(autonomy.override_conditions_met);
    }

    #[test]
    fn keycard_plan_revokes_the_card_and_holds_the_room() {
        let engine = DecisionEngine::new();
        let plan = engine.make_plan(&keycard_state(), None, daytime());
        assert!(plan.autonomous);

        let revoke = plan
            .actions
            .iter()
            .find(|a| a.action_type == ActionType::AccessControl)
            .expect("plan contains an access-control revoke");
        assert_eq!(revoke.string_param("card_id"), Some("KC_887234"));

        let hold = plan
            .actions
            .iter()
            .find(|a| a.action_type == ActionType::PmsUpdate)
            .expect("plan contains a room status update");
        assert_eq!(hold.string_param("room_number"), Some("1205"));
        assert_eq!(hold.string_param("status"), Some("security_hold"));
        // Room hold waits for the revoke
        assert!(hold.dependencies.contains(&revoke.id));
    }

    #[test]
    fn payment_fraud_plan_escalates_compliance_report_failures() {
        let engine = DecisionEngine::new();
        let mut state = keycard_state();
        state.category = Some(IncidentCategory::PaymentFraud);
        let plan = engine.make_plan(&state, None, daytime());
        let report = plan
            .actions
            .iter()
            .find(|a| a.action_type == ActionType::ComplianceReport)
            .expect("fraud plan files a compliance report");
        assert_eq!(report.failure_policy, crate::models::FailurePolicy::Escalate);
    }

    #[test]
    fn timeline_respects_dependencies() {
        let engine = DecisionEngine::new();
        let plan = engine.make_plan(&keycard_state(), None, daytime());
        for action in &plan.actions {
            let start = plan.execution_timeline[&action.id];
            for dep in &action.dependencies {
                let dep_action = plan.actions.iter().find(|a| &a.id == dep).unwrap();
                let dep_end = plan.execution_timeline[dep]
                    + chrono::Duration::seconds(dep_action.estimated_duration_seconds as i64);
                assert!(start >= dep_end, "{} scheduled before its dependency finished", action.name);
            }
        }
    }

    #[test]
    fn selection_prefers_the_higher_scoring_candidate() {
        let engine = DecisionEngine::new();
        let state = keycard_state();
        let candidates = engine.generate_candidates(&state);
        let vectors = engine.risk_vectors(&state);
        let (selected, breakdown) = engine.select_plan(&candidates, &vectors).unwrap();
        assert_eq!(selected.name, "containment_first");
        assert!(breakdown["total"] > 0.0);
    }

    #[test]
    fn decisions_are_deterministic_given_the_same_clock() {
        let engine = DecisionEngine::new();
        let state = keycard_state();
        let a = engine.make_plan(&state, Some(0.85), daytime());
        let b = engine.make_plan(&state, Some(0.85), daytime());
        assert_eq!(a.autonomous, b.autonomous);
        assert_eq!(a.confidence, b.confidence);
        assert_eq!(a.actions.len(), b.actions.len());
        assert_eq!(a.cost_benefit.roi_percentage, b.cost_benefit.roi_percentage);
    }
}
