// Core domain models for the security triage engine
// These are the data structures threaded through the workflow

//! # Domain Models Module
//!
//! This module contains the core domain models for the triage engine. They are
//! deliberately free of engine logic: nodes, gates and stores all operate on
//! these types, and every one of them serializes cleanly to JSON so the same
//! shape flows through checkpoints, session records and the durable store.

// Incident root entity, category/priority/status enums, risk assessment,
// metadata, human-intervention requests and workflow bookkeeping
pub mod incident;

// Immutable playbook catalog with per-action requirements
pub mod playbook;

// Executable response actions and their failure policies
pub mod action;

// Decision plans, business impact, risk vectors and autonomy assessments
pub mod plan;

// Safety gate results: violations, content flags, sanitized content
pub mod safety;

// Compliance gate results: frameworks, requirements, notification deadlines
pub mod compliance;

// Append-only checkpoint and history records
pub mod checkpoint;

// Re-export main types for convenience
pub use incident::{
    ApprovalRecord, HumanInterventionRequest, IncidentCategory, IncidentMetadata,
    IncidentPriority, IncidentState, IncidentStatus, PriorityOverride, ResponsePlan,
    RiskAssessment, StepFailure, WorkflowStep,
};

pub use playbook::{playbook_catalog, ActionRequirement, Playbook};

pub use action::{Action, ActionType, Destination, FailurePolicy};

pub use plan::{
    AutonomyAssessment, BusinessImpact, CandidatePlan, CostBenefit, DecisionPlan, RiskVectors,
};

pub use safety::{RiskLevel, SafetyCheck, SafetyViolation, SanitizedContent, ViolationSeverity};

pub use compliance::{ComplianceFramework, ComplianceReport, ComplianceRequirement};

pub use checkpoint::{Checkpoint, HistoryRecord};
