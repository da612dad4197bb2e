// Decision plans - the output of the autonomous decision engine

//! # Decision Plan Models
//!
//! These types capture the decision engine's full analysis of an incident:
//! the multi-dimensional business impact, the risk vectors, whether the
//! incident may be handled autonomously, and the action plan selected for
//! execution together with its rationale.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::action::Action;

/// Business impact assessment across the five tracked dimensions.
///
/// Financial impact is in rupees; the soft dimensions are on a [0, 1] scale.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusinessImpact {
    pub financial_impact: f64,
    pub guest_satisfaction_impact: f64,
    pub operational_impact: f64,
    pub reputation_impact: f64,
    pub compliance_impact: f64,
    /// Time sensitivity multiplier applied on top of the weighted sum
    pub urgency_factor: f64,
}

impl BusinessImpact {
    /// Financial impact is normalized against ₹1,00,000 before weighting.
    pub const FINANCIAL_NORMALIZATION: f64 = 100_000.0;

    /// Weighted total impact score, scaled by the urgency factor.
    pub fn total_impact_score(&self) -> f64 {
        let normalized_financial = (self.financial_impact / Self::FINANCIAL_NORMALIZATION).min(1.0);
        let total = 0.25 * normalized_financial
            + 0.20 * self.guest_satisfaction_impact
            + 0.20 * self.operational_impact
            + 0.20 * self.reputation_impact
            + 0.15 * self.compliance_impact;
        total * self.urgency_factor
    }
}

/// Multi-dimensional risk assessment, each axis in [0, 1]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskVectors {
    pub guest_safety_risk: f64,
    pub data_security_risk: f64,
    pub financial_risk: f64,
    pub operational_risk: f64,
    pub legal_compliance_risk: f64,
    pub reputation_risk: f64,
    pub escalation_risk: f64,

    #[serde(default)]
    pub requires_legal_review: bool,
    #[serde(default)]
    pub requires_management_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical_timeframe_minutes: Option<u32>,
}

impl RiskVectors {
    /// Weighted mean over the first six axes; guest safety weighted highest.
    /// Escalation risk informs the escalation triggers, not the overall score.
    pub fn overall_risk_score(&self) -> f64 {
        0.25 * self.guest_safety_risk
            + 0.20 * self.data_security_risk
            + 0.15 * self.financial_risk
            + 0.15 * self.operational_risk
            + 0.15 * self.legal_compliance_risk
            + 0.10 * self.reputation_risk
    }
}

/// Assessment of whether an incident can be handled autonomously
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutonomyAssessment {
    pub can_proceed_autonomously: bool,
    /// The weighted autonomy score, also used as decision confidence
    pub confidence: f64,
    pub reasoning: String,
    pub criteria_scores: BTreeMap<String, f64>,
    pub override_conditions_met: bool,
}

/// A candidate action plan produced by the plan generator, before selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidatePlan {
    pub name: String,
    pub actions: Vec<Action>,
    pub expected_outcome: String,
    pub success_probability: f64,
    pub estimated_total_duration_seconds: u64,
    pub estimated_cost: f64,
}

impl CandidatePlan {
    /// Plan complexity in [0, 1]: more actions and more cross-system
    /// coordination mean a more complex plan.
    pub fn complexity(&self) -> f64 {
        let systems: std::collections::HashSet<_> =
            self.actions.iter().map(|a| a.destination()).collect();
        let action_load = (self.actions.len() as f64 / 10.0).min(1.0);
        let system_load = (systems.len() as f64 / 4.0).min(1.0);
        (0.6 * action_load + 0.4 * system_load).min(1.0)
    }
}

/// Cost/benefit summary for a selected plan, all amounts in rupees
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostBenefit {
    pub implementation_cost: f64,
    pub avoided_costs: f64,
    pub efficiency_value: f64,
    pub satisfaction_value: f64,
    pub reputation_value: f64,
    pub total_benefit: f64,
    pub net_benefit: f64,
    pub roi_percentage: f64,
}

/// Complete autonomous decision and execution plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionPlan {
    pub incident_id: String,
    pub decision_timestamp: DateTime<Utc>,
    /// Whether the engine may execute without a human approver
    pub autonomous: bool,
    pub confidence: f64,
    pub reasoning: String,

    // Actions and execution
    pub actions: Vec<Action>,
    /// Action id -> scheduled execution start
    pub execution_timeline: BTreeMap<String, DateTime<Utc>>,
    pub expected_outcome: String,
    pub success_probability: f64,

    // Business justification
    pub business_impact: BusinessImpact,
    pub cost_benefit: CostBenefit,
    pub alternative_plans_considered: Vec<String>,

    // Risk management
    pub risk_mitigation_measures: Vec<String>,
    pub escalation_triggers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_plan: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::action::ActionType;

    #[test]
    fn impact_score_weights_and_normalizes_financial() {
        let impact = BusinessImpact {
            financial_impact: 200_000.0, // clamps to 1.0 after normalization
            guest_satisfaction_impact: 0.5,
            operational_impact: 0.5,
            reputation_impact: 0.5,
            compliance_impact: 0.5,
            urgency_factor: 1.0,
        };
        // 0.25*1.0 + (0.20 + 0.20 + 0.20 + 0.15) * 0.5
        let expected = 0.25 + 0.75 * 0.5;
        assert!((impact.total_impact_score() - expected).abs() < 1e-9);
    }

    #[test]
    fn urgency_scales_the_impact_score() {
        let mut impact = BusinessImpact {
            financial_impact: 50_000.0,
            guest_satisfaction_impact: 0.6,
            operational_impact: 0.4,
            reputation_impact: 0.5,
            compliance_impact: 0.3,
            urgency_factor: 1.0,
        };
        let base = impact.total_impact_score();
        impact.urgency_factor = 1.2;
        assert!((impact.total_impact_score() - base * 1.2).abs() < 1e-9);
    }

    #[test]
    fn overall_risk_is_the_weighted_mean_of_six_axes() {
        let vectors = RiskVectors {
            guest_safety_risk: 1.0,
            data_security_risk: 0.0,
            financial_risk: 0.0,
            operational_risk: 0.0,
            legal_compliance_risk: 0.0,
            reputation_risk: 0.0,
            escalation_risk: 1.0, // not part of the weighted mean
            ..Default::default()
        };
        assert!((vectors.overall_risk_score() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn complexity_grows_with_actions_and_systems() {
        let simple = CandidatePlan {
            name: "single".to_string(),
            actions: vec![Action::new(ActionType::Notification, "notify_team")],
            expected_outcome: String::new(),
            success_probability: 0.9,
            estimated_total_duration_seconds: 60,
            estimated_cost: 100.0,
        };
        let busy = CandidatePlan {
            name: "coordinated".to_string(),
            actions: vec![
                Action::new(ActionType::AccessControl, "revoke"),
                Action::new(ActionType::PmsUpdate, "hold_room"),
                Action::new(ActionType::Notification, "notify"),
                Action::new(ActionType::Documentation, "record"),
            ],
            expected_outcome: String::new(),
            success_probability: 0.9,
            estimated_total_duration_seconds: 300,
            estimated_cost: 500.0,
        };
        assert!(busy.complexity() > simple.complexity());
    }
}
