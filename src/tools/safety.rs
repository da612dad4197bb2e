// Safety guardrails - PII detection, threat scoring and content sanitization

//! # Safety Guardrails Tool
//!
//! Multiple layers of safety checks for incident content: PII detection,
//! threat-indicator scoring and hospitality-specific content screening.
//!
//! Everything here is deterministic — fixed regex tables and keyword lists,
//! evaluated in a fixed order — because the safety gate replays this tool's
//! recorded result when a workflow resumes from a checkpoint. The same content
//! always produces byte-identical violations and sanitized output.

use regex::Regex;
use lazy_static::lazy_static;

use crate::models::{
    IncidentCategory, RiskLevel, SafetyCheck, SafetyViolation, SanitizedContent,
    ViolationSeverity,
};

/// PII detectors, evaluated in this order. Order matters for sanitization:
/// the most specific patterns (card numbers) must mask before the generic ones.
struct PiiPattern {
    name: &'static str,
    regex: Regex,
    severity: ViolationSeverity,
}

lazy_static! {
    static ref PII_PATTERNS: Vec<PiiPattern> = vec![
        PiiPattern {
            name: "credit_card",
            regex: Regex::new(
                r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13}|3[0-9]{13}|6(?:011|5[0-9]{2})[0-9]{12})\b"
            ).expect("credit card pattern"),
            severity: ViolationSeverity::High,
        },
        PiiPattern {
            name: "email",
            regex: Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b")
                .expect("email pattern"),
            severity: ViolationSeverity::Medium,
        },
        PiiPattern {
            name: "phone",
            regex: Regex::new(r"\+[1-9]\d{6,14}\b|\(\d{3}\)\s?\d{3}-?\d{4}|\b\d{3}-\d{3}-\d{4}\b")
                .expect("phone pattern"),
            severity: ViolationSeverity::Medium,
        },
        PiiPattern {
            name: "aadhaar",
            regex: Regex::new(r"\b[2-9][0-9]{3}\s[0-9]{4}\s[0-9]{4}\b").expect("aadhaar pattern"),
            severity: ViolationSeverity::High,
        },
        PiiPattern {
            name: "pan",
            regex: Regex::new(r"\b[A-Z]{5}[0-9]{4}[A-Z]\b").expect("pan pattern"),
            severity: ViolationSeverity::High,
        },
        PiiPattern {
            name: "passport",
            regex: Regex::new(r"\b[A-PR-WY][1-9][0-9]\s?[0-9]{4}[1-9]\b").expect("passport pattern"),
            severity: ViolationSeverity::High,
        },
        PiiPattern {
            name: "ip_address",
            regex: Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("ip pattern"),
            severity: ViolationSeverity::Medium,
        },
        PiiPattern {
            name: "room_number",
            regex: Regex::new(r"(?i)\broom\s*[#:]?\s*[0-9]{3,4}[a-z]?\b").expect("room pattern"),
            severity: ViolationSeverity::Medium,
        },
    ];
}

/// Threat indicator keyword groups
const VIOLENCE_INDICATORS: &[&str] = &[
    "attack", "assault", "violence", "weapon", "harm", "injury", "blood", "fight",
    "aggression", "danger", "emergency",
];

const SECURITY_BREACH_INDICATORS: &[&str] = &[
    "unauthorized", "breach", "compromise", "infiltration", "intrusion", "hack", "malware",
    "ransomware", "phishing", "exploit",
];

const FRAUD_INDICATORS: &[&str] = &[
    "fraud", "scam", "deception", "counterfeit", "forgery", "identity theft",
    "credit card fraud", "billing fraud",
];

const PRIVACY_INDICATORS: &[&str] = &[
    "data leak", "exposure", "unauthorized access", "privacy breach", "exported",
    "confidential", "sensitive data",
];

const HOSPITALITY_INDICATORS: &[&str] = &[
    "guest safety", "property damage", "theft", "burglary", "trespassing", "vandalism",
    "evacuation", "lockdown",
];

const INAPPROPRIATE_KEYWORDS: &[&str] = &[
    "discriminat", "harassment", "threat", "violence", "illegal", "malicious", "harmful",
];

/// Comprehensive safety guardrails for incident processing.
///
/// Stateless and cheap to share; construct once and call concurrently.
pub struct SafetyGuardrails;

impl SafetyGuardrails {
    pub fn new() -> Self {
        Self
    }

    /// Perform the full safety check over incident content.
    pub fn check_safety(
        &self,
        incident_description: &str,
        category: Option<IncidentCategory>,
        risk_score: f64,
    ) -> SafetyCheck {
        let mut violations = Vec::new();
        violations.extend(self.check_content(incident_description));
        let pii_violations = self.detect_pii(incident_description);
        let had_pii = !pii_violations.is_empty();
        violations.extend(pii_violations);
        violations.extend(self.assess_threats(incident_description, category));

        let critical_count = violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::Critical)
            .count();
        let high_count = violations
            .iter()
            .filter(|v| v.severity == ViolationSeverity::High)
            .count();

        // Passed iff no critical violation; risk level tracks the worst finding.
        let passed = critical_count == 0;
        let overall_risk_level = if critical_count > 0 {
            RiskLevel::Critical
        } else if high_count > 0 {
            RiskLevel::High
        } else if !violations.is_empty() {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        let requires_human_review = critical_count > 0
            || high_count > 2
            || risk_score >= 8.0
            || category == Some(IncidentCategory::PiiBreach);

        let review_reason = if critical_count > 0 {
            let types: Vec<&str> = violations
                .iter()
                .filter(|v| v.severity == ViolationSeverity::Critical)
                .map(|v| v.violation_type.as_str())
                .collect();
            format!("Critical safety violations detected: {}", types.join(", "))
        } else if high_count > 2 {
            "Multiple high-severity safety concerns require review".to_string()
        } else if risk_score >= 8.0 {
            format!("High risk score ({risk_score}/10) requires human oversight")
        } else if category == Some(IncidentCategory::PiiBreach) {
            "PII breach incidents require mandatory human review".to_string()
        } else {
            String::new()
        };

        let sanitized_content = if had_pii {
            Some(self.sanitize(incident_description))
        } else {
            None
        };

        let content_flags: Vec<String> = dedup_preserving_order(
            violations.iter().map(|v| v.violation_type.clone()).collect(),
        );
        let risk_factors = content_flags.clone();
        let recommendations = self.recommendations(&violations, category, risk_score);

        SafetyCheck {
            passed,
            overall_risk_level,
            violations,
            content_flags,
            requires_human_review,
            review_reason,
            sanitized_content,
            risk_factors,
            recommendations,
        }
    }

    /// Mask PII in `text`. The masking rules preserve length exactly, so
    /// sanitization is idempotent and never shrinks content:
    /// - credit cards keep the first four and last four digits,
    /// - emails keep the first character of the local part and the domain,
    /// - everything else is replaced character-for-character with `*`.
    pub fn sanitize(&self, text: &str) -> SanitizedContent {
        let mut sanitized = text.to_string();
        let mut replacements = 0usize;

        for pattern in PII_PATTERNS.iter() {
            let result = pattern.regex.replace_all(&sanitized, |caps: &regex::Captures| {
                replacements += 1;
                mask_match(pattern.name, &caps[0])
            });
            sanitized = result.into_owned();
        }

        SanitizedContent {
            text: sanitized,
            replacements,
        }
    }

    /// Convenience wrapper returning only the masked text.
    pub fn sanitize_text(&self, text: &str) -> String {
        self.sanitize(text).text
    }

    fn check_content(&self, content: &str) -> Vec<SafetyViolation> {
        let lower = content.to_lowercase();
        INAPPROPRIATE_KEYWORDS
            .iter()
            .filter(|keyword| lower.contains(*keyword))
            .map(|keyword| SafetyViolation {
                violation_type: "inappropriate_content".to_string(),
                severity: ViolationSeverity::Medium,
                description: format!("Potentially inappropriate content detected: {}", keyword),
                detected_content: Some((*keyword).to_string()),
                recommendation: "Review content for appropriateness".to_string(),
            })
            .collect()
    }

    fn detect_pii(&self, content: &str) -> Vec<SafetyViolation> {
        let mut violations = Vec::new();
        for pattern in PII_PATTERNS.iter() {
            let count = pattern.regex.find_iter(content).count();
            if count > 0 {
                violations.push(SafetyViolation {
                    violation_type: format!("pii_exposure_{}", pattern.name),
                    severity: pattern.severity,
                    description: format!(
                        "Potential {} exposure detected",
                        pattern.name.replace('_', " ")
                    ),
                    detected_content: Some(format!("{} instances found", count)),
                    recommendation: format!(
                        "Redact or mask {} information",
                        pattern.name.replace('_', " ")
                    ),
                });
            }
        }
        violations
    }

    fn assess_threats(
        &self,
        content: &str,
        category: Option<IncidentCategory>,
    ) -> Vec<SafetyViolation> {
        let lower = content.to_lowercase();
        let groups: [(&str, &[&str]); 5] = [
            ("violence", VIOLENCE_INDICATORS),
            ("security_breach", SECURITY_BREACH_INDICATORS),
            ("fraud", FRAUD_INDICATORS),
            ("privacy_violation", PRIVACY_INDICATORS),
            ("hospitality_threats", HOSPITALITY_INDICATORS),
        ];

        let mut violations = Vec::new();
        for (threat_type, indicators) in groups {
            let count = indicators.iter().filter(|i| lower.contains(*i)).count();
            if count == 0 {
                continue;
            }
            // A violence keyword or a pile-up of indicators is critical.
            let severity = if threat_type == "violence" || count >= 3 {
                ViolationSeverity::Critical
            } else if matches!(threat_type, "security_breach" | "fraud")
                && matches!(
                    category,
                    Some(IncidentCategory::CyberSecurity) | Some(IncidentCategory::PaymentFraud)
                )
            {
                ViolationSeverity::High
            } else {
                ViolationSeverity::Medium
            };
            violations.push(SafetyViolation {
                violation_type: format!("threat_indicator_{}", threat_type),
                severity,
                description: format!(
                    "Threat indicators detected: {}",
                    threat_type.replace('_', " ")
                ),
                detected_content: Some(format!("{} indicators found", count)),
                recommendation: format!(
                    "Assess and respond to {} indicators",
                    threat_type.replace('_', " ")
                ),
            });
        }
        violations
    }

    fn recommendations(
        &self,
        violations: &[SafetyViolation],
        category: Option<IncidentCategory>,
        risk_score: f64,
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if violations
            .iter()
            .any(|v| v.severity == ViolationSeverity::Critical)
        {
            recommendations.push("Immediate escalation required for critical safety violations".to_string());
        }
        if violations.iter().any(|v| v.violation_type.starts_with("pii_exposure")) {
            recommendations.push("Implement PII redaction and data minimization procedures".to_string());
            recommendations.push("Review data handling policies and staff training".to_string());
        }
        if violations.iter().any(|v| v.violation_type.starts_with("threat_indicator")) {
            recommendations.push("Activate threat response procedures".to_string());
            recommendations.push("Coordinate with security team for threat assessment".to_string());
        }
        if category == Some(IncidentCategory::PiiBreach) {
            recommendations.push("Conduct privacy impact assessment".to_string());
            recommendations.push("Review data protection compliance requirements".to_string());
        }
        if category == Some(IncidentCategory::CyberSecurity) {
            recommendations.push("Implement cyber security incident response plan".to_string());
            recommendations.push("Isolate affected systems pending investigation".to_string());
        }
        if risk_score >= 8.0 {
            recommendations.push("Executive notification required for high-risk incident".to_string());
            recommendations.push("Consider external expert consultation".to_string());
        }

        dedup_preserving_order(recommendations)
    }
}

impl Default for SafetyGuardrails {
    fn default() -> Self {
        Self::new()
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

fn mask_match(pattern_name: &str, original: &str) -> String {
    match pattern_name {
        "credit_card" => {
            // Keep first 4 and last 4 digits, star the middle
            if original.len() >= 8 {
                let first: String = original.chars().take(4).collect();
                let last: String = original
                    .chars()
                    .skip(original.chars().count() - 4)
                    .collect();
                let stars = "*".repeat(original.chars().count() - 8);
                format!("{}{}{}", first, stars, last)
            } else {
                "*".repeat(original.chars().count())
            }
        }
        "email" => {
            // Keep first character of the local part and the full domain
            match original.split_once('@') {
                Some((local, domain)) if !local.is_empty() => {
                    let first = local.chars().next().map(String::from).unwrap_or_default();
                    let stars = "*".repeat(local.chars().count() - 1);
                    format!("{}{}@{}", first, stars, domain)
                }
                _ => "*".repeat(original.chars().count()),
            }
        }
        _ => "*".repeat(original.chars().count()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guardrails() -> SafetyGuardrails {
        SafetyGuardrails::new()
    }

    #[test]
    fn credit_card_masking_keeps_first_and_last_four() {
        let sanitized = guardrails().sanitize_text("charged to 4111111111111111 last night");
        assert!(sanitized.contains("4111********1111"));
        assert!(!sanitized.contains("4111111111111111"));
    }

    #[test]
    fn email_masking_keeps_first_char_and_domain() {
        let sanitized = guardrails().sanitize_text("contact priya.sharma@example.com for details");
        assert!(sanitized.contains("p***********@example.com"));
    }

    #[test]
    fn room_numbers_are_fully_masked() {
        let sanitized = guardrails().sanitize_text("seen entering room 1205 after checkout");
        assert!(!sanitized.contains("1205"));
        assert!(sanitized.contains("*********"));
    }

    #[test]
    fn sanitizer_is_idempotent_and_never_shrinks() {
        let inputs = [
            "card 4111111111111111 for guest a.kumar@example.in in room 1205",
            "aadhaar 2345 6789 1234 exposed from 10.0.12.4",
            "no pii at all in this text",
        ];
        let guard = guardrails();
        for input in inputs {
            let once = guard.sanitize_text(input);
            let twice = guard.sanitize_text(&once);
            assert_eq!(once, twice, "sanitize must be idempotent for {input:?}");
            assert!(once.chars().count() >= input.chars().count());
        }
    }

    #[test]
    fn same_content_yields_identical_checks() {
        let guard = guardrails();
        let description = "unauthorized export of guest data from room 1205, contact j.doe@example.com";
        let a = guard.check_safety(description, Some(IncidentCategory::PiiBreach), 6.0);
        let b = guard.check_safety(description, Some(IncidentCategory::PiiBreach), 6.0);
        assert_eq!(a.violations, b.violations);
        assert_eq!(a.sanitized_content, b.sanitized_content);
        assert_eq!(a.content_flags, b.content_flags);
    }

    #[test]
    fn violence_keyword_is_critical_and_fails_the_check() {
        let check = guardrails().check_safety(
            "guest threatened staff with a weapon near the lobby",
            Some(IncidentCategory::PhysicalSecurity),
            5.0,
        );
        assert!(!check.passed);
        assert_eq!(check.overall_risk_level, RiskLevel::Critical);
        assert!(check.requires_human_review);
        assert!(check.review_reason.contains("Critical safety violations"));
    }

    #[test]
    fn pii_breach_category_always_requires_review() {
        let check = guardrails().check_safety(
            "1,500 guest records exported by maintenance_user at 02:14",
            Some(IncidentCategory::PiiBreach),
            7.0,
        );
        assert!(check.requires_human_review);
        assert!(check.review_reason.contains("mandatory human review"));
        // Export of records is a privacy threat indicator, not a critical one
        assert!(check.passed);
    }

    #[test]
    fn risk_score_boundary_triggers_review_at_eight() {
        let guard = guardrails();
        let below = guard.check_safety("routine badge audit follow-up", Some(IncidentCategory::OperationalSecurity), 7.99);
        let at = guard.check_safety("routine badge audit follow-up", Some(IncidentCategory::OperationalSecurity), 8.0);
        assert!(!below.requires_human_review);
        assert!(at.requires_human_review);
    }

    #[test]
    fn keycard_scenario_passes_without_review() {
        let check = guardrails().check_safety(
            "Card KC_887234 used simultaneously at room 1205 and penthouse elevator within 30s",
            Some(IncidentCategory::GuestAccess),
            6.5,
        );
        assert!(check.passed);
        assert!(!check.requires_human_review);
        // The room reference is still masked on the way out
        let sanitized = check.sanitized_content.expect("room number sanitized");
        assert!(!sanitized.text.contains("room 1205"));
    }
}
