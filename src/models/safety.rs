// Safety gate result models

//! # Safety Models
//!
//! Results of the safety guardrails check. The safety tool is fully
//! deterministic (regex PII detection, keyword threat scoring), so the same
//! content always produces byte-identical violations and sanitized output —
//! a requirement for gates that replay from checkpoints.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an individual safety violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViolationSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationSeverity::Low => "low",
            ViolationSeverity::Medium => "medium",
            ViolationSeverity::High => "high",
            ViolationSeverity::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Overall risk classification of a safety check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// Individual safety violation detected in incident content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyViolation {
    /// Machine-readable violation tag, e.g. `pii_exposure_credit_card`
    pub violation_type: String,
    pub severity: ViolationSeverity,
    pub description: String,
    /// Never the raw matched content; only counts or masked fragments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_content: Option<String>,
    pub recommendation: String,
}

/// Sanitized text plus how many replacements were made. The original content
/// is never carried here; it stays only in the durable incident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedContent {
    pub text: String,
    pub replacements: usize,
}

/// Result of the safety guardrails check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheck {
    /// False iff any critical violation was found
    pub passed: bool,
    pub overall_risk_level: RiskLevel,
    #[serde(default)]
    pub violations: Vec<SafetyViolation>,
    #[serde(default)]
    pub content_flags: Vec<String>,
    pub requires_human_review: bool,
    #[serde(default)]
    pub review_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sanitized_content: Option<SanitizedContent>,
    #[serde(default)]
    pub risk_factors: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl SafetyCheck {
    pub fn critical_violations(&self) -> impl Iterator<Item = &SafetyViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Critical)
    }

    pub fn high_violations(&self) -> impl Iterator<Item = &SafetyViolation> {
        self.violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::High)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering_places_critical_highest() {
        assert!(ViolationSeverity::Critical > ViolationSeverity::High);
        assert!(ViolationSeverity::High > ViolationSeverity::Medium);
        assert!(ViolationSeverity::Medium > ViolationSeverity::Low);
    }

    #[test]
    fn severity_serializes_lowercase() {
        let json = serde_json::to_string(&ViolationSeverity::Critical).unwrap();
        assert_eq!(json, "\"critical\"");
    }
}
