// Quality evaluator - seven weighted dimensions per incident

//! # Quality Evaluator
//!
//! Scores a finished (or failed) incident across accuracy, completeness,
//! timeliness, safety, compliance, efficiency and quality. Weights sum to
//! 1.0; the overall score maps onto an A-F grade. Timeliness compares total
//! processing time against the priority's SLA.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::IncidentState;

/// Per-dimension weights; they sum to 1.0
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionWeights {
    pub accuracy: f64,
    pub completeness: f64,
    pub timeliness: f64,
    pub safety: f64,
    pub compliance: f64,
    pub efficiency: f64,
    pub quality: f64,
}

impl Default for DimensionWeights {
    fn default() -> Self {
        Self {
            accuracy: 0.20,
            completeness: 0.18,
            timeliness: 0.15,
            safety: 0.20,
            compliance: 0.15,
            efficiency: 0.07,
            quality: 0.05,
        }
    }
}

/// Letter grade over the overall weighted score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Grade::A
        } else if score >= 0.8 {
            Grade::B
        } else if score >= 0.7 {
            Grade::C
        } else if score >= 0.6 {
            Grade::D
        } else {
            Grade::F
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(letter)
    }
}

/// Full evaluation result for one incident
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityReport {
    pub scores: BTreeMap<String, f64>,
    pub overall: f64,
    pub grade: Grade,
}

/// Seven-dimension incident evaluator
pub struct Evaluator {
    weights: DimensionWeights,
}

impl Evaluator {
    pub fn new() -> Self {
        Self {
            weights: DimensionWeights::default(),
        }
    }

    pub fn with_weights(weights: DimensionWeights) -> Self {
        Self { weights }
    }

    pub fn evaluate(&self, state: &IncidentState) -> QualityReport {
        let accuracy = self.accuracy(state);
        let completeness = self.completeness(state);
        let timeliness = self.timeliness(state);
        let safety = self.safety(state);
        let compliance = self.compliance(state);
        let efficiency = self.efficiency(state);
        let quality = self.quality(state);

        let overall = self.weights.accuracy * accuracy
            + self.weights.completeness * completeness
            + self.weights.timeliness * timeliness
            + self.weights.safety * safety
            + self.weights.compliance * compliance
            + self.weights.efficiency * efficiency
            + self.weights.quality * quality;

        let scores: BTreeMap<String, f64> = [
            ("accuracy", accuracy),
            ("completeness", completeness),
            ("timeliness", timeliness),
            ("safety", safety),
            ("compliance", compliance),
            ("efficiency", efficiency),
            ("quality", quality),
        ]
        .into_iter()
        .map(|(name, score)| (name.to_string(), score))
        .collect();

        QualityReport {
            scores,
            overall,
            grade: Grade::from_score(overall),
        }
    }

    /// Classification and risk confidence, blended.
    fn accuracy(&self, state: &IncidentState) -> f64 {
        let classification = state.classification_confidence.unwrap_or(0.5);
        let risk = state
            .risk_assessment
            .as_ref()
            .map(|r| r.confidence_score)
            .unwrap_or(0.5);
        (classification + risk) / 2.0
    }

    /// Fraction of response-plan sections actually populated.
    fn completeness(&self, state: &IncidentState) -> f64 {
        match &state.response_plan {
            Some(plan) => {
                let sections = [
                    &plan.immediate_actions,
                    &plan.investigation_steps,
                    &plan.containment_measures,
                    &plan.notification_requirements,
                    &plan.documentation_requirements,
                    &plan.follow_up_actions,
                ];
                let filled = sections.iter().filter(|s| !s.is_empty()).count();
                filled as f64 / sections.len() as f64
            }
            None => 0.2,
        }
    }

    /// Processing time against the priority's SLA band.
    fn timeliness(&self, state: &IncidentState) -> f64 {
        let sla_seconds = state.effective_priority().sla_minutes() as f64 * 60.0;
        let ratio = state.processing_seconds() / sla_seconds;
        if ratio <= 0.5 {
            1.0
        } else if ratio <= 1.0 {
            0.9
        } else if ratio <= 1.5 {
            0.7
        } else if ratio <= 2.0 {
            0.5
        } else {
            0.2
        }
    }

    /// Guardrail outcome: clean pass, pass-with-review, or failure.
    fn safety(&self, state: &IncidentState) -> f64 {
        if !state.safety_guardrails_passed {
            return 0.2;
        }
        let reviewed = state
            .tool_result("safety_check")
            .and_then(|v| v.get("requires_human_review"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        if reviewed {
            0.85
        } else {
            1.0
        }
    }

    /// Fraction of applicable frameworks passing; neutral-high when none apply.
    fn compliance(&self, state: &IncidentState) -> f64 {
        if state.compliance_checks.is_empty() {
            return 0.9;
        }
        let passed = state.compliance_checks.values().filter(|p| **p).count();
        passed as f64 / state.compliance_checks.len() as f64
    }

    /// Automation rate blended with the workflow-step success ratio.
    fn efficiency(&self, state: &IncidentState) -> f64 {
        let interventions = state.approval_history.len() as f64;
        let automation_rate = (1.0 - 0.2 * interventions).max(0.0);
        let total_steps = state.completed_steps.len() + state.failed_steps.len();
        let step_success = if total_steps == 0 {
            0.5
        } else {
            state.completed_steps.len() as f64 / total_steps as f64
        };
        0.6 * automation_rate + 0.4 * step_success
    }

    /// Output quality: fallbacks and missing artifacts pull the score down.
    fn quality(&self, state: &IncidentState) -> f64 {
        let mut score: f64 = 0.8;
        if state.response_plan.is_some() {
            score += 0.2;
        }
        let used_fallback = state
            .tool_result("classification")
            .and_then(|v| v.get("severity_indicators"))
            .and_then(|v| v.as_array())
            .map(|indicators| indicators.iter().any(|i| i == "parsing_error"))
            .unwrap_or(false);
        if used_fallback {
            score -= 0.3;
        }
        score.clamp(0.0, 1.0)
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        IncidentCategory, IncidentMetadata, IncidentPriority, ResponsePlan, RiskAssessment,
        WorkflowStep,
    };

    fn successful_state() -> IncidentState {
        let mut state = IncidentState::new(
            "Suspicious keycard activity",
            "keycard misuse",
            IncidentMetadata::default(),
        );
        state.category = Some(IncidentCategory::GuestAccess);
        state.priority = Some(IncidentPriority::High);
        state.classification_confidence = Some(0.93);
        state.risk_assessment = Some(RiskAssessment {
            risk_score: 6.5,
            risk_factors: vec![],
            mitigation_urgency: IncidentPriority::High,
            potential_impact: String::new(),
            likelihood_score: 6.0,
            confidence_score: 0.9,
        });
        state.response_plan = Some(ResponsePlan {
            immediate_actions: vec!["revoke".to_string()],
            investigation_steps: vec!["logs".to_string()],
            containment_measures: vec!["hold".to_string()],
            notification_requirements: vec!["notify".to_string()],
            documentation_requirements: vec!["report".to_string()],
            follow_up_actions: vec!["review".to_string()],
        });
        state.compliance_checks.insert(crate::models::ComplianceFramework::Dpdp, true);
        state.completed_steps = vec![
            WorkflowStep::ValidateInput,
            WorkflowStep::ClassifyIncident,
            WorkflowStep::AssessRisk,
        ];
        state
    }

    #[test]
    fn fast_clean_run_grades_at_least_b() {
        let report = Evaluator::new().evaluate(&successful_state());
        assert!(report.overall >= 0.8, "overall was {}", report.overall);
        assert!(matches!(report.grade, Grade::A | Grade::B));
    }

    #[test]
    fn weights_sum_to_one() {
        let w = DimensionWeights::default();
        let sum = w.accuracy + w.completeness + w.timeliness + w.safety + w.compliance + w.efficiency + w.quality;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn grade_bands_match_the_thresholds() {
        assert_eq!(Grade::from_score(0.95), Grade::A);
        assert_eq!(Grade::from_score(0.9), Grade::A);
        assert_eq!(Grade::from_score(0.85), Grade::B);
        assert_eq!(Grade::from_score(0.75), Grade::C);
        assert_eq!(Grade::from_score(0.65), Grade::D);
        assert_eq!(Grade::from_score(0.5), Grade::F);
    }

    #[test]
    fn timeliness_band_degrades_with_elapsed_time() {
        let mut state = successful_state();
        // Within half the one-hour SLA
        state.updated_at = state.created_at + chrono::Duration::minutes(20);
        assert_eq!(Evaluator::new().timeliness(&state), 1.0);
        state.updated_at = state.created_at + chrono::Duration::minutes(55);
        assert_eq!(Evaluator::new().timeliness(&state), 0.9);
        state.updated_at = state.created_at + chrono::Duration::minutes(85);
        assert_eq!(Evaluator::new().timeliness(&state), 0.7);
        state.updated_at = state.created_at + chrono::Duration::minutes(110);
        assert_eq!(Evaluator::new().timeliness(&state), 0.5);
        state.updated_at = state.created_at + chrono::Duration::minutes(300);
        assert_eq!(Evaluator::new().timeliness(&state), 0.2);
    }

    #[test]
    fn interventions_reduce_efficiency() {
        let mut state = successful_state();
        let clean = Evaluator::new().efficiency(&state);
        state
            .request_intervention("legal_review", "pci", IncidentPriority::High, "legal_counsel", None)
            .unwrap();
        state.resolve_intervention("legal_review", "counsel", true, "").unwrap();
        let with_intervention = Evaluator::new().efficiency(&state);
        assert!(with_intervention < clean);
    }

    #[test]
    fn failed_guardrails_floor_the_safety_score() {
        let mut state = successful_state();
        state.safety_guardrails_passed = false;
        assert_eq!(Evaluator::new().safety(&state), 0.2);
    }
}
