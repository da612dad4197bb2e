// Risk assessment and incident prioritization

//! # Prioritization Tool
//!
//! Two responsibilities: assess incident risk (LLM-backed, with a
//! category-table fallback when the model output is unparseable) and derive
//! the incident priority. Priority is always derivable from the risk score
//! through a fixed banding; only safety and compliance gates may override it,
//! and those overrides are recorded on the incident with their reason.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use super::llm::{LlmClient, LlmRequest};
use super::{PerfSink, RateLimiter};
use crate::models::{IncidentCategory, IncidentMetadata, IncidentPriority, RiskAssessment};

const RISK_SYSTEM_PROMPT: &str = r#"You are an expert hospitality security risk analyst. Assess the risk of the incident on these scales:

- risk_score: composite risk, 0.0 (none) to 10.0 (extreme)
- likelihood_score: probability the threat materializes further, 0.0 to 10.0
- confidence_score: your confidence in this assessment, 0.0 to 1.0

Hospitality risk factors to weigh: guest safety (+2 points), payment system
impact (+1.5), brand reputation threat (+1.5), regulatory compliance (+1),
peak season timing (+0.5).

Respond with a JSON object:
{
  "risk_score": <0.0-10.0>,
  "likelihood_score": <0.0-10.0>,
  "confidence_score": <0.0-1.0>,
  "risk_factors": ["<named contributors>"],
  "potential_impact": "<impact summary>"
}"#;

/// Result of incident prioritization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrioritizationResult {
    pub priority: IncidentPriority,
    pub reasoning: String,
    pub risk_assessment: RiskAssessment,
    pub recommended_sla: String,
    pub stakeholders_to_notify: Vec<String>,
    pub immediate_actions_required: bool,
}

#[derive(Deserialize)]
struct RawRiskAssessment {
    risk_score: f64,
    likelihood_score: f64,
    #[serde(default = "default_confidence")]
    confidence_score: f64,
    #[serde(default)]
    risk_factors: Vec<String>,
    #[serde(default)]
    potential_impact: String,
}

fn default_confidence() -> f64 {
    0.7
}

/// Render incident metadata for inclusion in an LLM prompt
fn metadata_summary(metadata: &IncidentMetadata) -> String {
    serde_json::to_string_pretty(metadata).unwrap_or_else(|_| format!("{:?}", metadata))
}

/// Fallback risk score per category when the model output is unusable
fn fallback_risk_score(category: IncidentCategory) -> f64 {
    match category {
        IncidentCategory::PiiBreach => 8.0,
        IncidentCategory::PaymentFraud => 7.5,
        IncidentCategory::CyberSecurity => 7.0,
        IncidentCategory::ComplianceViolation => 6.5,
        IncidentCategory::PhysicalSecurity => 6.0,
        IncidentCategory::GuestAccess => 5.5,
        IncidentCategory::VendorAccess => 5.0,
        IncidentCategory::OperationalSecurity => 4.0,
    }
}

/// AI-powered risk assessment and deterministic priority derivation
pub struct IncidentPrioritizer {
    llm: Arc<dyn LlmClient>,
    limiter: Arc<RateLimiter>,
    perf: PerfSink,
}

impl IncidentPrioritizer {
    pub fn new(llm: Arc<dyn LlmClient>, limiter: Arc<RateLimiter>, perf: PerfSink) -> Self {
        Self { llm, limiter, perf }
    }

    /// Assess incident risk. Parse failures fall back to the category table
    /// with a reduced confidence score.
    pub async fn assess_risk(
        &self,
        category: IncidentCategory,
        description: &str,
        metadata: &IncidentMetadata,
    ) -> RiskAssessment {
        self.limiter.acquire().await;
        let started = Instant::now();

        let request = LlmRequest::new(
            RISK_SYSTEM_PROMPT,
            format!(
                "Assess the risk for this incident:\n\nCATEGORY: {}\nDESCRIPTION: {}\n\nMETADATA:\n{}",
                category,
                description,
                metadata_summary(metadata)
            ),
        );

        let assessment = match self.llm.complete(&request).await {
            Ok(text) => match serde_json::from_str::<RawRiskAssessment>(&text) {
                Ok(raw) => {
                    let risk_score = raw.risk_score.clamp(0.0, 10.0);
                    RiskAssessment {
                        risk_score,
                        risk_factors: raw.risk_factors,
                        mitigation_urgency: RiskAssessment::banded_priority(risk_score),
                        potential_impact: if raw.potential_impact.is_empty() {
                            "Moderate impact expected".to_string()
                        } else {
                            raw.potential_impact
                        },
                        likelihood_score: raw.likelihood_score.clamp(0.0, 10.0),
                        confidence_score: raw.confidence_score.clamp(0.0, 1.0),
                    }
                }
                Err(err) => fallback_risk_assessment(category, &err.to_string()),
            },
            Err(err) => fallback_risk_assessment(category, &err.to_string()),
        };

        self.perf.record(
            "risk_assessment",
            started,
            true,
            Some(assessment.confidence_score),
        );
        assessment
    }

    /// Derive the priority and notification plan from the risk assessment.
    /// Deterministic: the priority is the fixed banding over the risk score.
    pub fn prioritize(
        &self,
        category: IncidentCategory,
        risk_assessment: &RiskAssessment,
        metadata: &IncidentMetadata,
    ) -> PrioritizationResult {
        let priority = RiskAssessment::banded_priority(risk_assessment.risk_score);
        let stakeholders = determine_stakeholders(priority, category, metadata);

        PrioritizationResult {
            priority,
            reasoning: format!(
                "Risk score {:.1}/10 places this {} incident in the {} band (likelihood {:.1}, confidence {:.2})",
                risk_assessment.risk_score,
                category,
                priority,
                risk_assessment.likelihood_score,
                risk_assessment.confidence_score
            ),
            risk_assessment: risk_assessment.clone(),
            recommended_sla: sla_for(priority).to_string(),
            stakeholders_to_notify: stakeholders,
            immediate_actions_required: matches!(
                priority,
                IncidentPriority::Critical | IncidentPriority::High
            ),
        }
    }
}

pub fn sla_for(priority: IncidentPriority) -> &'static str {
    match priority {
        IncidentPriority::Critical => "15 minutes",
        IncidentPriority::High => "1 hour",
        IncidentPriority::Medium => "4 hours",
        IncidentPriority::Low => "24 hours",
        IncidentPriority::Informational => "72 hours",
    }
}

fn fallback_risk_assessment(category: IncidentCategory, error: &str) -> RiskAssessment {
    let risk_score = fallback_risk_score(category);
    RiskAssessment {
        risk_score,
        risk_factors: vec![
            format!("fallback_assessment_{}", category),
            "llm_parsing_error".to_string(),
        ],
        mitigation_urgency: RiskAssessment::banded_priority(risk_score),
        potential_impact: format!(
            "Estimated {} impact based on category {} ({})",
            RiskAssessment::banded_priority(risk_score),
            category,
            error
        ),
        likelihood_score: 5.0,
        confidence_score: 0.5,
    }
}

fn determine_stakeholders(
    priority: IncidentPriority,
    category: IncidentCategory,
    _metadata: &IncidentMetadata,
) -> Vec<String> {
    let mut stakeholders = vec!["security_team".to_string()];

    match priority {
        IncidentPriority::Critical => stakeholders.extend([
            "security_manager".to_string(),
            "operations_manager".to_string(),
            "general_manager".to_string(),
        ]),
        IncidentPriority::High => stakeholders.extend([
            "security_manager".to_string(),
            "operations_manager".to_string(),
        ]),
        IncidentPriority::Medium => stakeholders.push("security_manager".to_string()),
        _ => {}
    }

    let category_stakeholders: &[&str] = match category {
        IncidentCategory::PaymentFraud => &["finance_team", "revenue_manager"],
        IncidentCategory::PiiBreach => &["privacy_officer", "legal_team"],
        IncidentCategory::CyberSecurity => &["it_security", "it_manager"],
        IncidentCategory::ComplianceViolation => &["compliance_officer", "legal_team"],
        IncidentCategory::GuestAccess => &["front_office", "housekeeping_manager"],
        IncidentCategory::VendorAccess => &["procurement", "vendor_manager"],
        _ => &[],
    };
    stakeholders.extend(category_stakeholders.iter().map(|s| s.to_string()));

    // Deduplicate while preserving order
    let mut seen = std::collections::HashSet::new();
    stakeholders.retain(|s| seen.insert(s.clone()));
    stakeholders
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::llm::ScriptedLlm;

    fn prioritizer(llm: ScriptedLlm) -> IncidentPrioritizer {
        IncidentPrioritizer::new(
            Arc::new(llm),
            RateLimiter::per_minute(100),
            PerfSink::disconnected(),
        )
    }

    #[tokio::test]
    async fn model_scores_are_clamped_and_banded() {
        let llm = ScriptedLlm::new(vec![
            r#"{"risk_score": 12.5, "likelihood_score": 7.0, "confidence_score": 0.9, "risk_factors": ["keycard cloning"], "potential_impact": "unauthorized room entry"}"#,
        ]);
        let assessment = prioritizer(llm)
            .assess_risk(
                IncidentCategory::GuestAccess,
                "cloned keycard used",
                &IncidentMetadata::default(),
            )
            .await;
        assert_eq!(assessment.risk_score, 10.0);
        assert_eq!(assessment.mitigation_urgency, IncidentPriority::Critical);
    }

    #[tokio::test]
    async fn parse_failure_uses_category_fallback_scores() {
        let llm = ScriptedLlm::new(vec!["garbage"]);
        let assessment = prioritizer(llm)
            .assess_risk(
                IncidentCategory::PiiBreach,
                "records exported",
                &IncidentMetadata::default(),
            )
            .await;
        assert_eq!(assessment.risk_score, 8.0);
        assert_eq!(assessment.confidence_score, 0.5);
        assert!(assessment
            .risk_factors
            .contains(&"llm_parsing_error".to_string()));
    }

    #[test]
    fn priority_is_derived_from_the_fixed_banding() {
        let p = prioritizer(ScriptedLlm::new(vec![]));
        let assessment = RiskAssessment {
            risk_score: 6.5,
            risk_factors: vec![],
            mitigation_urgency: IncidentPriority::High,
            potential_impact: String::new(),
            likelihood_score: 6.0,
            confidence_score: 0.9,
        };
        let result = p.prioritize(
            IncidentCategory::GuestAccess,
            &assessment,
            &IncidentMetadata::default(),
        );
        assert_eq!(result.priority, IncidentPriority::High);
        assert_eq!(result.recommended_sla, "1 hour");
        assert!(result.immediate_actions_required);
        assert!(result
            .stakeholders_to_notify
            .contains(&"front_office".to_string()));
    }

    #[test]
    fn stakeholders_are_deduplicated_in_order() {
        let stakeholders = determine_stakeholders(
            IncidentPriority::Critical,
            IncidentCategory::PiiBreach,
            &IncidentMetadata::default(),
        );
        assert_eq!(stakeholders[0], "security_team");
        let unique: std::collections::HashSet<_> = stakeholders.iter().collect();
        assert_eq!(unique.len(), stakeholders.len());
        assert!(stakeholders.contains(&"privacy_officer".to_string()));
    }
}
