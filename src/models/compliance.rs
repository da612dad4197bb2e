// Compliance gate result models

//! # Compliance Models
//!
//! Regulatory frameworks relevant to hospitality operations and the result of
//! checking an incident against them. Framework applicability and notification
//! deadlines are decided by fixed rule tables so the compliance gate routes
//! identically on checkpoint replay.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Relevant compliance frameworks for hospitality
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceFramework {
    /// Data Protection and Digital Privacy Act (India); always the baseline
    Dpdp,
    /// Payment Card Industry Data Security Standard
    PciDss,
    /// General Data Protection Regulation (EU residents)
    Gdpr,
    /// California Consumer Privacy Act
    Ccpa,
    /// Sarbanes-Oxley Act
    Sox,
    /// Health Insurance Portability and Accountability Act
    Hipaa,
}

impl ComplianceFramework {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceFramework::Dpdp => "dpdp",
            ComplianceFramework::PciDss => "pci_dss",
            ComplianceFramework::Gdpr => "gdpr",
            ComplianceFramework::Ccpa => "ccpa",
            ComplianceFramework::Sox => "sox",
            ComplianceFramework::Hipaa => "hipaa",
        }
    }
}

impl fmt::Display for ComplianceFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Individual compliance requirement with its deadline and evidence trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceRequirement {
    pub requirement_id: String,
    pub framework: ComplianceFramework,
    pub description: String,
    #[serde(default = "default_mandatory")]
    pub mandatory: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeline_hours: Option<u32>,
    pub responsible_party: String,
    #[serde(default)]
    pub evidence_required: Vec<String>,
}

fn default_mandatory() -> bool {
    true
}

/// Result of compliance checking for an incident
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Pass/fail per applicable framework
    #[serde(default)]
    pub framework_checks: BTreeMap<ComplianceFramework, bool>,
    #[serde(default)]
    pub requirements: Vec<ComplianceRequirement>,
    #[serde(default)]
    pub violations: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub requires_legal_review: bool,
    #[serde(default)]
    pub requires_regulatory_notification: bool,
    /// Recipient -> deadline description, e.g. `card_brands: 24 hours`
    #[serde(default)]
    pub notification_deadlines: BTreeMap<String, String>,
    #[serde(default)]
    pub documentation_requirements: Vec<String>,
    #[serde(default)]
    pub risk_mitigation_actions: Vec<String>,
}

impl ComplianceReport {
    pub fn all_frameworks_pass(&self) -> bool {
        self.framework_checks.values().all(|passed| *passed)
    }

    pub fn applicable_frameworks(&self) -> Vec<ComplianceFramework> {
        self.framework_checks.keys().copied().collect()
    }
}
