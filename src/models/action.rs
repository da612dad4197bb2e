// Response actions - the units of work the executor runs

//! # Action Models
//!
//! An `Action` is a single unit of work the action executor schedules against
//! an external hotel system (or records internally). Actions carry explicit
//! dependency lists; the executor derives a topological order and a per-system
//! schedule from them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Types of autonomous response actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    AccessControl,
    PmsUpdate,
    Notification,
    Documentation,
    Investigation,
    ComplianceReport,
    Lockdown,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::AccessControl => "access_control",
            ActionType::PmsUpdate => "pms_update",
            ActionType::Notification => "notification",
            ActionType::Documentation => "documentation",
            ActionType::Investigation => "investigation",
            ActionType::ComplianceReport => "compliance_report",
            ActionType::Lockdown => "lockdown",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Destination system an action executes against. Rate limits and concurrency
/// caps are keyed by destination, not by action type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    AccessControl,
    Pms,
    Notifications,
    /// Documentation, investigation records and compliance reports stay inside
    /// the engine's own stores
    Internal,
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Destination::AccessControl => "access_control",
            Destination::Pms => "pms",
            Destination::Notifications => "notifications",
            Destination::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// What happens to dependents when an action fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Dependents are cancelled
    Block,
    /// Dependents run as if the action had succeeded
    Proceed,
    /// The workflow re-enters the human approval gate
    Escalate,
}

impl FailurePolicy {
    /// Per-type defaults: access changes and lockdowns block their dependents,
    /// notifications are advisory, compliance reports must never fail quietly.
    pub fn default_for(action_type: ActionType) -> Self {
        match action_type {
            ActionType::AccessControl | ActionType::Lockdown => FailurePolicy::Block,
            ActionType::Notification => FailurePolicy::Proceed,
            ActionType::ComplianceReport => FailurePolicy::Escalate,
            _ => FailurePolicy::Block,
        }
    }
}

/// A single autonomous response action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub action_type: ActionType,
    pub name: String,
    pub description: String,
    /// Parameters passed to the destination system (card ids, room numbers,
    /// notification channels, ...)
    pub parameters: HashMap<String, serde_json::Value>,
    /// Execution order priority; lower ranks schedule first among eligible actions
    pub priority: u32,
    pub estimated_duration_seconds: u64,
    /// IDs of actions that must succeed before this one becomes eligible
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub rollback_possible: bool,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub failure_conditions: Vec<String>,
    pub failure_policy: FailurePolicy,
}

impl Action {
    pub fn new(action_type: ActionType, name: impl Into<String>) -> Self {
        Self {
            id: format!("act_{}", Uuid::new_v4().simple()),
            action_type,
            name: name.into(),
            description: String::new(),
            parameters: HashMap::new(),
            priority: 10,
            estimated_duration_seconds: 60,
            dependencies: Vec::new(),
            rollback_possible: false,
            success_criteria: Vec::new(),
            failure_conditions: Vec::new(),
            failure_policy: FailurePolicy::default_for(action_type),
        }
    }

    pub fn with_parameter(mut self, key: &str, value: serde_json::Value) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_duration(mut self, seconds: u64) -> Self {
        self.estimated_duration_seconds = seconds;
        self
    }

    pub fn depends_on(mut self, action_id: &str) -> Self {
        self.dependencies.push(action_id.to_string());
        self
    }

    pub fn string_param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }

    /// The system this action executes against.
    pub fn destination(&self) -> Destination {
        match self.action_type {
            ActionType::AccessControl | ActionType::Lockdown => Destination::AccessControl,
            ActionType::PmsUpdate => Destination::Pms,
            ActionType::Notification => Destination::Notifications,
            ActionType::Documentation
            | ActionType::Investigation
            | ActionType::ComplianceReport => Destination::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_failure_policies_follow_destination_rules() {
        assert_eq!(
            FailurePolicy::default_for(ActionType::AccessControl),
            FailurePolicy::Block
        );
        assert_eq!(
            FailurePolicy::default_for(ActionType::Lockdown),
            FailurePolicy::Block
        );
        assert_eq!(
            FailurePolicy::default_for(ActionType::Notification),
            FailurePolicy::Proceed
        );
        assert_eq!(
            FailurePolicy::default_for(ActionType::ComplianceReport),
            FailurePolicy::Escalate
        );
    }

    #[test]
    fn destinations_group_action_types() {
        let revoke = Action::new(ActionType::AccessControl, "revoke_keycard");
        let lockdown = Action::new(ActionType::Lockdown, "lock_floor_12");
        let note = Action::new(ActionType::Documentation, "document_findings");
        assert_eq!(revoke.destination(), Destination::AccessControl);
        assert_eq!(lockdown.destination(), Destination::AccessControl);
        assert_eq!(note.destination(), Destination::Internal);
    }

    #[test]
    fn builder_accumulates_dependencies_and_parameters() {
        let first = Action::new(ActionType::AccessControl, "revoke_keycard");
        let second = Action::new(ActionType::PmsUpdate, "flag_room")
            .depends_on(&first.id)
            .with_parameter("room_number", serde_json::json!("1205"));
        assert_eq!(second.dependencies, vec![first.id.clone()]);
        assert_eq!(second.string_param("room_number"), Some("1205"));
    }
}
