// Compliance checking - deterministic regulatory rule tables

//! # Compliance Checker
//!
//! Validates incidents against the regulatory frameworks that apply to
//! hospitality operations: DPDP (always the baseline for Indian properties),
//! GDPR when EU residents are involved, PCI DSS for payment incidents.
//!
//! The checker is entirely rule-table driven. The compliance router is a gate,
//! and gates must route identically when a checkpointed workflow replays, so
//! no model call is allowed to influence this result.

use crate::models::{
    ComplianceFramework, ComplianceReport, ComplianceRequirement, IncidentCategory,
    IncidentMetadata, Playbook,
};

/// Compliance checking for hospitality security incidents
pub struct ComplianceChecker;

impl ComplianceChecker {
    pub fn new() -> Self {
        Self
    }

    /// Check compliance requirements for an incident.
    pub fn check(
        &self,
        category: IncidentCategory,
        metadata: &IncidentMetadata,
        playbook: Option<&Playbook>,
    ) -> ComplianceReport {
        let mut report = ComplianceReport::default();

        for framework in applicable_frameworks(category, metadata) {
            // Pass/fail is a statement about notification duties: a framework
            // with an unmet mandatory deadline starts out failing and is
            // cleared when the required notifications are filed.
            report.framework_checks.insert(framework, true);
            apply_framework_rules(&mut report, framework, category, metadata);
        }

        if let Some(playbook) = playbook {
            if playbook.needs_legal_review() {
                report.requires_legal_review = true;
                report
                    .documentation_requirements
                    .push("legal_review_record".to_string());
            }
        }

        // Breach-notification duties always put counsel in the loop before
        // anything leaves the property.
        if report.requires_regulatory_notification {
            report.requires_legal_review = true;
        }

        if report.requires_legal_review
            && !report
                .risk_mitigation_actions
                .contains(&"legal_counsel_review".to_string())
        {
            report
                .risk_mitigation_actions
                .push("legal_counsel_review".to_string());
        }

        report
    }
}

impl Default for ComplianceChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Determine which frameworks apply to the incident. DPDP is always included
/// as the baseline for Indian operations.
pub fn applicable_frameworks(
    category: IncidentCategory,
    metadata: &IncidentMetadata,
) -> Vec<ComplianceFramework> {
    let mut applicable = Vec::new();

    if matches!(
        category,
        IncidentCategory::PiiBreach | IncidentCategory::OperationalSecurity
    ) {
        applicable.push(ComplianceFramework::Dpdp);
        if involves_eu_residents(metadata) {
            applicable.push(ComplianceFramework::Gdpr);
        }
    }

    if category == IncidentCategory::PaymentFraud {
        applicable.push(ComplianceFramework::PciDss);
    }

    if !applicable.contains(&ComplianceFramework::Dpdp) {
        applicable.push(ComplianceFramework::Dpdp);
    }

    applicable
}

fn involves_eu_residents(metadata: &IncidentMetadata) -> bool {
    let location_markers = metadata
        .location
        .as_deref()
        .map(|l| {
            let lower = l.to_lowercase();
            lower.contains("international") || lower.contains("eu")
        })
        .unwrap_or(false);
    location_markers
        || metadata
            .affected_guests
            .iter()
            .any(|guest| guest.starts_with("eu_"))
}

fn apply_framework_rules(
    report: &mut ComplianceReport,
    framework: ComplianceFramework,
    category: IncidentCategory,
    metadata: &IncidentMetadata,
) {
    match framework {
        ComplianceFramework::Dpdp => {
            if category == IncidentCategory::PiiBreach {
                report.requirements.push(ComplianceRequirement {
                    requirement_id: "DPDP_BREACH_001".to_string(),
                    framework,
                    description: "Assess risk to data principal and notify DPB within 72 hours if significant harm likely".to_string(),
                    mandatory: true,
                    timeline_hours: Some(72),
                    responsible_party: "privacy_officer".to_string(),
                    evidence_required: vec![
                        "risk_assessment".to_string(),
                        "harm_analysis".to_string(),
                        "notification_copy".to_string(),
                    ],
                });
                report
                    .notification_deadlines
                    .insert("data_protection_board".to_string(), "72 hours".to_string());
                report.requires_regulatory_notification = true;
            }
        }
        ComplianceFramework::PciDss => {
            if category == IncidentCategory::PaymentFraud {
                report.requirements.push(ComplianceRequirement {
                    requirement_id: "PCI_INCIDENT_001".to_string(),
                    framework,
                    description: "Notify card brands and acquiring bank within 24 hours of suspected compromise".to_string(),
                    mandatory: true,
                    timeline_hours: Some(24),
                    responsible_party: "payments_team".to_string(),
                    evidence_required: vec![
                        "incident_report".to_string(),
                        "forensic_logs".to_string(),
                        "remediation_plan".to_string(),
                    ],
                });
                report
                    .notification_deadlines
                    .insert("card_brands".to_string(), "24 hours".to_string());
                report
                    .notification_deadlines
                    .insert("acquiring_bank".to_string(), "24 hours".to_string());
                report.requires_legal_review = true;
            }
        }
        ComplianceFramework::Gdpr => {
            if category == IncidentCategory::PiiBreach {
                report.requirements.push(ComplianceRequirement {
                    requirement_id: "GDPR_BREACH_001".to_string(),
                    framework,
                    description: "Notify relevant EU supervisory authority within 72 hours".to_string(),
                    mandatory: true,
                    timeline_hours: Some(72),
                    responsible_party: "privacy_officer".to_string(),
                    evidence_required: vec![
                        "breach_assessment".to_string(),
                        "notification_form".to_string(),
                        "impact_analysis".to_string(),
                    ],
                });
                report
                    .notification_deadlines
                    .insert("supervisory_authority".to_string(), "72 hours".to_string());

                if metadata.affected_guests.len() > 100 {
                    report.requirements.push(ComplianceRequirement {
                        requirement_id: "GDPR_INDIVIDUAL_001".to_string(),
                        framework,
                        description: "Notify affected individuals without undue delay if high risk".to_string(),
                        mandatory: true,
                        timeline_hours: Some(72),
                        responsible_party: "customer_service".to_string(),
                        evidence_required: vec![
                            "individual_notifications".to_string(),
                            "communication_records".to_string(),
                        ],
                    });
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpdp_is_always_the_baseline() {
        let frameworks =
            applicable_frameworks(IncidentCategory::PhysicalSecurity, &IncidentMetadata::default());
        assert_eq!(frameworks, vec![ComplianceFramework::Dpdp]);
    }

    #[test]
    fn eu_guests_bring_gdpr_into_scope() {
        let metadata = IncidentMetadata {
            affected_guests: vec!["eu_g_1021".to_string()],
            ..Default::default()
        };
        let frameworks = applicable_frameworks(IncidentCategory::PiiBreach, &metadata);
        assert!(frameworks.contains(&ComplianceFramework::Gdpr));
        assert!(frameworks.contains(&ComplianceFramework::Dpdp));
    }

    #[test]
    fn payment_fraud_gets_the_24_hour_card_brand_deadline() {
        let report = ComplianceChecker::new().check(
            IncidentCategory::PaymentFraud,
            &IncidentMetadata::default(),
            None,
        );
        assert_eq!(
            report.notification_deadlines.get("card_brands"),
            Some(&"24 hours".to_string())
        );
        assert_eq!(
            report.notification_deadlines.get("acquiring_bank"),
            Some(&"24 hours".to_string())
        );
        assert!(report.requires_legal_review);
    }

    #[test]
    fn pii_breach_requires_regulatory_notification_and_legal_review() {
        let report = ComplianceChecker::new().check(
            IncidentCategory::PiiBreach,
            &IncidentMetadata::default(),
            None,
        );
        assert!(report.requires_regulatory_notification);
        assert!(report.requires_legal_review);
        assert_eq!(
            report.notification_deadlines.get("data_protection_board"),
            Some(&"72 hours".to_string())
        );
    }

    #[test]
    fn large_gdpr_breach_adds_individual_notification_duty() {
        let metadata = IncidentMetadata {
            location: Some("EU corporate block".to_string()),
            affected_guests: (0..150).map(|i| format!("eu_g_{i}")).collect(),
            ..Default::default()
        };
        let report =
            ComplianceChecker::new().check(IncidentCategory::PiiBreach, &metadata, None);
        assert!(report
            .requirements
            .iter()
            .any(|r| r.requirement_id == "GDPR_INDIVIDUAL_001"));
    }

    #[test]
    fn guest_access_without_playbook_requirements_passes_clean() {
        let report = ComplianceChecker::new().check(
            IncidentCategory::GuestAccess,
            &IncidentMetadata::default(),
            None,
        );
        assert!(!report.requires_legal_review);
        assert!(report.all_frameworks_pass());
        assert!(report.notification_deadlines.is_empty());
    }

    #[test]
    fn repeated_checks_are_identical() {
        let checker = ComplianceChecker::new();
        let metadata = IncidentMetadata {
            affected_guests: vec!["eu_g_7".to_string()],
            ..Default::default()
        };
        let a = checker.check(IncidentCategory::PiiBreach, &metadata, None);
        let b = checker.check(IncidentCategory::PiiBreach, &metadata, None);
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            serde_json::to_value(&b).unwrap()
        );
    }
}
