// Playbook selection and customization

//! # Playbook Selector
//!
//! Filters the immutable catalog by incident category, then customizes a copy
//! of the chosen entry for the incident at hand: action timeouts scale with
//! priority, and an executive-notification step is appended for high-risk
//! incidents. The catalog entry itself is never mutated.

use serde::{Deserialize, Serialize};

use crate::models::playbook::{default_playbook, playbook_catalog, ActionRequirement};
use crate::models::{IncidentCategory, IncidentPriority, Playbook, RiskAssessment};

/// Timeout floor when halving for critical incidents, in minutes
const MIN_TIMEOUT_MINUTES: u32 = 5;
/// Timeout ceiling when doubling for low-priority incidents, in minutes
const MAX_TIMEOUT_MINUTES: u32 = 480;

/// Result of playbook selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybookSelection {
    pub recommended_playbook: Playbook,
    pub applicable_playbooks: Vec<String>,
    pub selection_reasoning: String,
    pub estimated_completion_time: String,
}

/// Selects and customizes security playbooks. Stateless; the catalog is a
/// process-wide constant.
pub struct PlaybookSelector;

impl PlaybookSelector {
    pub fn new() -> Self {
        Self
    }

    /// Select a playbook for the incident. Falls back to the
    /// operational-security playbook when no catalog entry matches.
    pub fn select(
        &self,
        category: IncidentCategory,
        priority: IncidentPriority,
        risk_assessment: Option<&RiskAssessment>,
    ) -> PlaybookSelection {
        let applicable: Vec<&Playbook> = playbook_catalog()
            .iter()
            .filter(|p| p.applies_to(category))
            .collect();

        let (base, reasoning) = match applicable.first() {
            Some(playbook) => (
                *playbook,
                format!(
                    "Selected {} for category {} at {} priority",
                    playbook.name, category, priority
                ),
            ),
            None => (
                default_playbook(),
                format!(
                    "No catalog entry for category {}; defaulted to {}",
                    category,
                    default_playbook().name
                ),
            ),
        };

        let risk_score = risk_assessment.map(|r| r.risk_score).unwrap_or(5.0);
        let customized = customize(base, priority, risk_score);
        let action_count = customized.required_actions.len();

        PlaybookSelection {
            recommended_playbook: customized,
            applicable_playbooks: applicable
                .iter()
                .map(|p| p.playbook_id.clone())
                .collect(),
            selection_reasoning: reasoning,
            estimated_completion_time: estimate_completion(priority, action_count),
        }
    }
}

impl Default for PlaybookSelector {
    fn default() -> Self {
        Self::new()
    }
}

/// Customize a catalog playbook for a specific incident.
fn customize(playbook: &Playbook, priority: IncidentPriority, risk_score: f64) -> Playbook {
    let mut customized = playbook.clone();
    customized.playbook_id = format!("{}_customized", playbook.playbook_id);
    customized.name = format!("{} (Customized)", playbook.name);

    // Critical incidents halve action timeouts; low and informational double them.
    match priority {
        IncidentPriority::Critical => {
            for requirement in customized.action_requirements.values_mut() {
                if let Some(timeout) = requirement.timeout_minutes {
                    requirement.timeout_minutes = Some((timeout / 2).max(MIN_TIMEOUT_MINUTES));
                }
            }
        }
        IncidentPriority::Low | IncidentPriority::Informational => {
            for requirement in customized.action_requirements.values_mut() {
                if let Some(timeout) = requirement.timeout_minutes {
                    requirement.timeout_minutes = Some((timeout * 2).min(MAX_TIMEOUT_MINUTES));
                }
            }
        }
        _ => {}
    }

    // High-risk incidents append an executive notification step.
    if risk_score >= 8.0
        && !customized
            .required_actions
            .iter()
            .any(|a| a == "executive_notification")
    {
        customized
            .required_actions
            .push("executive_notification".to_string());
        customized.action_requirements.insert(
            "executive_notification".to_string(),
            ActionRequirement {
                requires_human_approval: false,
                requires_documentation: true,
                timeout_minutes: Some(30),
                ..Default::default()
            },
        );
    }

    customized
}

fn estimate_completion(priority: IncidentPriority, action_count: usize) -> String {
    let minutes_per_action: u64 = match priority {
        IncidentPriority::Critical => 15,
        IncidentPriority::High => 30,
        IncidentPriority::Medium => 60,
        IncidentPriority::Low => 120,
        IncidentPriority::Informational => 240,
    };
    let total_minutes = action_count as u64 * minutes_per_action;
    if total_minutes < 60 {
        format!("{} minutes", total_minutes)
    } else if total_minutes < 1440 {
        format!("{} hours", total_minutes / 60)
    } else {
        format!("{} days", total_minutes / 1440)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk(score: f64) -> RiskAssessment {
        RiskAssessment {
            risk_score: score,
            risk_factors: vec![],
            mitigation_urgency: RiskAssessment::banded_priority(score),
            potential_impact: String::new(),
            likelihood_score: 5.0,
            confidence_score: 0.8,
        }
    }

    #[test]
    fn category_filter_picks_the_matching_playbook() {
        let selection = PlaybookSelector::new().select(
            IncidentCategory::PaymentFraud,
            IncidentPriority::High,
            Some(&risk(7.0)),
        );
        assert!(selection
            .recommended_playbook
            .playbook_id
            .starts_with("payment_fraud_response"));
        assert_eq!(selection.applicable_playbooks, vec!["payment_fraud_response"]);
    }

    #[test]
    fn critical_priority_halves_timeouts_with_a_floor() {
        let selection = PlaybookSelector::new().select(
            IncidentCategory::PaymentFraud,
            IncidentPriority::Critical,
            Some(&risk(7.0)),
        );
        let requirements = &selection.recommended_playbook.action_requirements;
        // 15 minutes halves to 7, still above the 5-minute floor
        assert_eq!(
            requirements["isolate_affected_systems"].timeout_minutes,
            Some(7)
        );
        // 60 minutes halves to 30
        assert_eq!(
            requirements["notify_payment_processors"].timeout_minutes,
            Some(30)
        );
    }

    #[test]
    fn low_priority_doubles_timeouts_with_a_ceiling() {
        let selection = PlaybookSelector::new().select(
            IncidentCategory::GuestAccess,
            IncidentPriority::Low,
            Some(&risk(3.0)),
        );
        assert_eq!(
            selection.recommended_playbook.action_requirements["secure_affected_areas"]
                .timeout_minutes,
            Some(60)
        );
    }

    #[test]
    fn high_risk_appends_executive_notification() {
        let selection = PlaybookSelector::new().select(
            IncidentCategory::PiiBreach,
            IncidentPriority::Critical,
            Some(&risk(8.5)),
        );
        assert!(selection
            .recommended_playbook
            .required_actions
            .contains(&"executive_notification".to_string()));
        let selection_low = PlaybookSelector::new().select(
            IncidentCategory::PiiBreach,
            IncidentPriority::Medium,
            Some(&risk(5.0)),
        );
        assert!(!selection_low
            .recommended_playbook
            .required_actions
            .contains(&"executive_notification".to_string()));
    }

    #[test]
    fn catalog_entries_stay_immutable_across_selections() {
        let before = playbook_catalog()
            .iter()
            .find(|p| p.playbook_id == "payment_fraud_response")
            .unwrap()
            .clone();
        let _ = PlaybookSelector::new().select(
            IncidentCategory::PaymentFraud,
            IncidentPriority::Critical,
            Some(&risk(9.0)),
        );
        let after = playbook_catalog()
            .iter()
            .find(|p| p.playbook_id == "payment_fraud_response")
            .unwrap();
        assert_eq!(&before, after);
    }
}
