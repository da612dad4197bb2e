// Playbook catalog - immutable response templates bound to incident categories

//! # Playbook Models
//!
//! A playbook is a named template of required actions and per-action policy
//! bound to one or more incident categories. The catalog is immutable at
//! runtime; the selector copies an entry before scaling timeouts or appending
//! risk-driven steps, so the catalog itself is never mutated.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::compliance::ComplianceFramework;
use super::incident::IncidentCategory;

/// Requirements for a specific action in incident response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRequirement {
    #[serde(default)]
    pub requires_human_approval: bool,
    #[serde(default)]
    pub requires_compliance_check: bool,
    #[serde(default)]
    pub requires_legal_review: bool,
    #[serde(default = "default_true")]
    pub requires_documentation: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_minutes: Option<u32>,
}

fn default_true() -> bool {
    true
}

impl ActionRequirement {
    fn approval(timeout_minutes: Option<u32>) -> Self {
        Self {
            requires_human_approval: true,
            requires_documentation: true,
            timeout_minutes,
            ..Default::default()
        }
    }

    fn documented(timeout_minutes: Option<u32>) -> Self {
        Self {
            requires_documentation: true,
            timeout_minutes,
            ..Default::default()
        }
    }
}

/// Security response playbook definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub playbook_id: String,
    pub name: String,
    pub description: String,
    pub applicable_categories: Vec<IncidentCategory>,
    /// Ordered action names; execution order is refined by the decision engine
    pub required_actions: Vec<String>,
    pub action_requirements: BTreeMap<String, ActionRequirement>,
    pub escalation_criteria: BTreeMap<String, String>,
    pub compliance_frameworks: Vec<ComplianceFramework>,
}

impl Playbook {
    pub fn applies_to(&self, category: IncidentCategory) -> bool {
        self.applicable_categories.contains(&category)
    }

    /// Whether any action in this playbook needs legal review before execution.
    pub fn needs_legal_review(&self) -> bool {
        self.action_requirements
            .values()
            .any(|r| r.requires_legal_review)
    }
}

fn requirements(entries: Vec<(&str, ActionRequirement)>) -> BTreeMap<String, ActionRequirement> {
    entries
        .into_iter()
        .map(|(name, req)| (name.to_string(), req))
        .collect()
}

fn criteria(entries: Vec<(&str, &str)>) -> BTreeMap<String, String> {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

lazy_static! {
    static ref CATALOG: Vec<Playbook> = vec![
        Playbook {
            playbook_id: "guest_access_standard".to_string(),
            name: "Guest Access Incident Response".to_string(),
            description: "Standard response for unauthorized guest access incidents".to_string(),
            applicable_categories: vec![IncidentCategory::GuestAccess],
            required_actions: vec![
                "verify_incident_details".to_string(),
                "secure_affected_areas".to_string(),
                "investigate_access_method".to_string(),
                "review_guest_history".to_string(),
                "update_access_controls".to_string(),
                "document_findings".to_string(),
                "notify_stakeholders".to_string(),
            ],
            action_requirements: requirements(vec![
                ("secure_affected_areas", ActionRequirement::approval(Some(30))),
                ("update_access_controls", ActionRequirement::approval(None)),
                ("notify_stakeholders", ActionRequirement::documented(None)),
            ]),
            escalation_criteria: criteria(vec![
                ("guest_safety_risk", "immediate_escalation"),
                ("multiple_properties", "regional_manager"),
                ("media_attention", "corporate_communications"),
            ]),
            compliance_frameworks: vec![ComplianceFramework::Dpdp, ComplianceFramework::PciDss],
        },
        Playbook {
            playbook_id: "payment_fraud_response".to_string(),
            name: "Payment Fraud Incident Response".to_string(),
            description: "Comprehensive response for payment fraud incidents".to_string(),
            applicable_categories: vec![IncidentCategory::PaymentFraud],
            required_actions: vec![
                "isolate_affected_systems".to_string(),
                "preserve_evidence".to_string(),
                "notify_payment_processors".to_string(),
                "conduct_fraud_analysis".to_string(),
                "implement_fraud_controls".to_string(),
                "notify_affected_customers".to_string(),
                "file_regulatory_reports".to_string(),
                "coordinate_with_authorities".to_string(),
            ],
            action_requirements: requirements(vec![
                ("isolate_affected_systems", ActionRequirement::approval(Some(15))),
                (
                    "notify_payment_processors",
                    ActionRequirement {
                        requires_human_approval: true,
                        requires_compliance_check: true,
                        requires_documentation: true,
                        timeout_minutes: Some(60),
                        ..Default::default()
                    },
                ),
                (
                    "notify_affected_customers",
                    ActionRequirement {
                        requires_human_approval: true,
                        requires_legal_review: true,
                        requires_documentation: true,
                        ..Default::default()
                    },
                ),
                (
                    "file_regulatory_reports",
                    ActionRequirement {
                        requires_legal_review: true,
                        requires_compliance_check: true,
                        requires_documentation: true,
                        ..Default::default()
                    },
                ),
            ]),
            escalation_criteria: criteria(vec![
                ("fraud_amount_threshold", "50000"),
                ("multiple_cards_affected", "immediate_escalation"),
                ("law_enforcement_required", "legal_team"),
            ]),
            compliance_frameworks: vec![ComplianceFramework::PciDss, ComplianceFramework::Dpdp],
        },
        Playbook {
            playbook_id: "pii_breach_response".to_string(),
            name: "Personal Data Breach Response".to_string(),
            description: "Comprehensive response for personal data breaches".to_string(),
            applicable_categories: vec![IncidentCategory::PiiBreach],
            required_actions: vec![
                "contain_breach".to_string(),
                "assess_data_exposure".to_string(),
                "preserve_forensic_evidence".to_string(),
                "notify_privacy_officer".to_string(),
                "conduct_impact_assessment".to_string(),
                "prepare_breach_notifications".to_string(),
                "implement_remediation".to_string(),
                "update_security_controls".to_string(),
                "conduct_lessons_learned".to_string(),
            ],
            action_requirements: requirements(vec![
                ("contain_breach", ActionRequirement::approval(Some(30))),
                ("notify_privacy_officer", ActionRequirement::documented(Some(60))),
                (
                    "prepare_breach_notifications",
                    ActionRequirement {
                        requires_legal_review: true,
                        requires_compliance_check: true,
                        requires_documentation: true,
                        ..Default::default()
                    },
                ),
                ("implement_remediation", ActionRequirement::approval(None)),
            ]),
            escalation_criteria: criteria(vec![
                ("high_risk_data", "immediate_escalation"),
                ("large_number_affected", "regulatory_notification_required"),
                ("media_exposure_risk", "corporate_communications"),
            ]),
            compliance_frameworks: vec![ComplianceFramework::Dpdp, ComplianceFramework::Gdpr],
        },
        Playbook {
            playbook_id: "cybersecurity_response".to_string(),
            name: "Cybersecurity Incident Response".to_string(),
            description: "Response for cybersecurity threats and attacks".to_string(),
            applicable_categories: vec![IncidentCategory::CyberSecurity],
            required_actions: vec![
                "activate_incident_team".to_string(),
                "isolate_affected_systems".to_string(),
                "collect_forensic_evidence".to_string(),
                "analyze_attack_vectors".to_string(),
                "implement_containment".to_string(),
                "eradicate_threats".to_string(),
                "recover_systems".to_string(),
                "conduct_post_incident_review".to_string(),
            ],
            action_requirements: requirements(vec![
                ("activate_incident_team", ActionRequirement::documented(Some(15))),
                ("isolate_affected_systems", ActionRequirement::approval(Some(30))),
                ("collect_forensic_evidence", ActionRequirement::approval(None)),
                ("recover_systems", ActionRequirement::approval(None)),
            ]),
            escalation_criteria: criteria(vec![
                ("critical_systems_affected", "immediate_escalation"),
                ("ransomware_detected", "executive_notification"),
                ("customer_data_risk", "privacy_officer_notification"),
            ]),
            compliance_frameworks: vec![ComplianceFramework::Dpdp, ComplianceFramework::PciDss],
        },
        Playbook {
            playbook_id: "operational_security".to_string(),
            name: "Operational Security Incident Response".to_string(),
            description: "Response for operational security violations".to_string(),
            applicable_categories: vec![
                IncidentCategory::OperationalSecurity,
                IncidentCategory::VendorAccess,
                IncidentCategory::ComplianceViolation,
            ],
            required_actions: vec![
                "investigate_violation".to_string(),
                "interview_involved_parties".to_string(),
                "review_security_procedures".to_string(),
                "implement_corrective_actions".to_string(),
                "provide_additional_training".to_string(),
                "update_policies".to_string(),
                "monitor_compliance".to_string(),
            ],
            action_requirements: requirements(vec![
                ("investigate_violation", ActionRequirement::documented(None)),
                ("interview_involved_parties", ActionRequirement::approval(None)),
                ("implement_corrective_actions", ActionRequirement::approval(None)),
            ]),
            escalation_criteria: criteria(vec![
                ("repeat_violations", "hr_notification"),
                ("safety_risk", "immediate_escalation"),
                ("policy_gap_identified", "policy_review_required"),
            ]),
            compliance_frameworks: vec![ComplianceFramework::Dpdp],
        },
        Playbook {
            playbook_id: "physical_security".to_string(),
            name: "Physical Security Incident Response".to_string(),
            description: "Response for physical security breaches".to_string(),
            applicable_categories: vec![IncidentCategory::PhysicalSecurity],
            required_actions: vec![
                "secure_breach_area".to_string(),
                "review_security_footage".to_string(),
                "conduct_facility_inspection".to_string(),
                "update_access_controls".to_string(),
                "coordinate_with_security".to_string(),
                "implement_additional_measures".to_string(),
                "conduct_staff_briefing".to_string(),
            ],
            action_requirements: requirements(vec![
                ("secure_breach_area", ActionRequirement::approval(Some(15))),
                ("coordinate_with_security", ActionRequirement::documented(None)),
                ("implement_additional_measures", ActionRequirement::approval(None)),
            ]),
            escalation_criteria: criteria(vec![
                ("guest_area_affected", "immediate_escalation"),
                ("valuables_missing", "law_enforcement"),
                ("safety_systems_compromised", "emergency_protocols"),
            ]),
            compliance_frameworks: vec![],
        },
    ];
}

/// The immutable playbook catalog.
pub fn playbook_catalog() -> &'static [Playbook] {
    &CATALOG
}

/// The fallback playbook used when no catalog entry matches a category.
pub fn default_playbook() -> &'static Playbook {
    CATALOG
        .iter()
        .find(|p| p.playbook_id == "operational_security")
        .expect("operational_security playbook present in catalog")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_resolves_to_at_least_one_playbook() {
        for category in IncidentCategory::all() {
            let matches: Vec<_> = playbook_catalog()
                .iter()
                .filter(|p| p.applies_to(category))
                .collect();
            assert!(
                !matches.is_empty(),
                "category {} has no playbook",
                category
            );
        }
    }

    #[test]
    fn payment_fraud_playbook_requires_legal_review() {
        let playbook = playbook_catalog()
            .iter()
            .find(|p| p.playbook_id == "payment_fraud_response")
            .unwrap();
        assert!(playbook.needs_legal_review());
        assert!(playbook
            .compliance_frameworks
            .contains(&ComplianceFramework::PciDss));
    }

    #[test]
    fn catalog_serializes_round_trip() {
        let playbook = default_playbook();
        let json = serde_json::to_string(playbook).unwrap();
        let restored: Playbook = serde_json::from_str(&json).unwrap();
        assert_eq!(&restored, playbook);
    }
}
