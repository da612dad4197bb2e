// Checkpoint and history records - the append-only audit trail

//! # Checkpoint Models
//!
//! A `Checkpoint` is a persisted snapshot of `IncidentState` taken after each
//! node transition. Within an incident, checkpoints are strictly ordered by a
//! monotonic sequence number; resume logic restores from the latest one.
//! `HistoryRecord` rows are retained independently of the incident row for
//! the audit retention window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::incident::{IncidentState, WorkflowStep};
use crate::Result;

/// A persisted snapshot of workflow state after a node transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub incident_id: String,
    pub step: WorkflowStep,
    /// Monotonic per-incident sequence; consecutive checkpoints differ by one
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    /// Full `IncidentState` as JSON
    pub state: serde_json::Value,
}

impl Checkpoint {
    pub fn capture(state: &IncidentState, step: WorkflowStep, sequence: u64) -> Result<Self> {
        Ok(Self {
            incident_id: state.incident_id.clone(),
            step,
            sequence,
            timestamp: Utc::now(),
            state: serde_json::to_value(state)?,
        })
    }

    pub fn restore(&self) -> Result<IncidentState> {
        Ok(serde_json::from_value(self.state.clone())?)
    }
}

/// Append-only record of a state-changing event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub incident_id: String,
    pub timestamp: DateTime<Utc>,
    /// created, step_completed, approval_resolved, closed, ...
    pub change_type: String,
    /// Sanitized JSON diff or event detail; raw PII never lands here
    pub detail: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::incident::IncidentMetadata;

    #[test]
    fn checkpoint_round_trips_full_state() {
        let mut state = IncidentState::new("title", "description", IncidentMetadata::default());
        state.update_step(WorkflowStep::ClassifyIncident);
        state.add_tool_result("classification", serde_json::json!({"category": "guest_access"}));

        let checkpoint = Checkpoint::capture(&state, state.current_step, 3).unwrap();
        let restored = checkpoint.restore().unwrap();

        assert_eq!(restored.incident_id, state.incident_id);
        assert_eq!(restored.current_step, WorkflowStep::ClassifyIncident);
        assert_eq!(checkpoint.sequence, 3);
        assert_eq!(
            restored.tool_results["classification"]["category"],
            "guest_access"
        );
    }
}
