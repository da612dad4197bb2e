// Shared fakes for engine tests

//! In-process stand-ins for the three external hotel systems plus the audit
//! sink, recording every call so tests can assert on executor behavior
//! without any network.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::executor::{ActionExecutor, AuditSink, ExecutorConfig};
use crate::engine::workflow::{ToolSet, WorkflowRunner};
use crate::integrations::{
    AccessControlOutcome, AccessControlSystem, GuestProfile, NotificationChannel,
    NotificationGateway, NotificationReceipt, PropertySystem, RoomStatus,
};
use crate::memory::{InMemorySessionStore, SessionStore};
use crate::tools::llm::{LlmClient, LlmRequest, ScriptedLlm};
use crate::tools::{
    ComplianceChecker, IncidentClassifier, IncidentPrioritizer, PerfSink, PlaybookSelector,
    RateLimiter, ResponseGenerator, SafetyGuardrails,
};
use crate::Result;

pub(crate) const GUEST_ACCESS_CLASSIFICATION: &str = r#"{"category": "guest_access", "confidence": 0.93, "reasoning": "simultaneous keycard use", "alternative_categories": [], "extracted_entities": {"card_ids": ["KC_887234"]}, "severity_indicators": ["simultaneous_use"]}"#;
pub(crate) const GUEST_ACCESS_RISK: &str = r#"{"risk_score": 6.5, "likelihood_score": 7.0, "confidence_score": 0.9, "risk_factors": ["credential cloning"], "potential_impact": "unauthorized room entry"}"#;

/// All-success fake for the three external systems plus the audit sink.
#[derive(Default)]
pub(crate) struct FakeSystems {
    pub revoked_cards: Mutex<Vec<String>>,
    pub room_updates: Mutex<Vec<(String, RoomStatus)>>,
    pub notifications: Mutex<Vec<String>>,
    pub compliance_reports: Mutex<Vec<String>>,
}

#[async_trait]
impl AccessControlSystem for FakeSystems {
    async fn revoke_access(
        &self,
        card_id: &str,
        _reason: &str,
        _revoked_by: &str,
    ) -> Result<AccessControlOutcome> {
        self.revoked_cards.lock().unwrap().push(card_id.to_string());
        Ok(AccessControlOutcome {
            success: true,
            action: "revoke".to_string(),
            target: card_id.to_string(),
            affected_areas: vec!["all".to_string()],
            rollback_token: Some(format!("rb_{card_id}")),
            expires_at: None,
        })
    }

    async fn create_temporary_access(
        &self,
        staff_id: &str,
        _areas: &[String],
        expires_at: DateTime<Utc>,
    ) -> Result<AccessControlOutcome> {
        Ok(AccessControlOutcome {
            success: true,
            action: "temporary_access".to_string(),
            target: staff_id.to_string(),
            affected_areas: vec![],
            rollback_token: None,
            expires_at: Some(expires_at),
        })
    }

    async fn lock_area(
        &self,
        area_id: &str,
        _duration_minutes: u32,
        _emergency: bool,
    ) -> Result<AccessControlOutcome> {
        Ok(AccessControlOutcome {
            success: true,
            action: "area_lockdown".to_string(),
            target: area_id.to_string(),
            affected_areas: vec![area_id.to_string()],
            rollback_token: Some(format!("rb_{area_id}")),
            expires_at: None,
        })
    }

    async fn access_logs(&self, _card_id: &str, _hours_back: u32) -> Result<Vec<serde_json::Value>> {
        Ok(vec![])
    }

    async fn rollback(&self, _token: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl PropertySystem for FakeSystems {
    async fn guest_by_room(&self, _room_number: &str) -> Result<Option<GuestProfile>> {
        Ok(None)
    }

    async fn update_room_status(
        &self,
        room_number: &str,
        status: RoomStatus,
        _reason: &str,
        _updated_by: &str,
        _expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<String>> {
        self.room_updates
            .lock()
            .unwrap()
            .push((room_number.to_string(), status));
        Ok(Some(format!("rb_room_{room_number}")))
    }

    async fn add_guest_note(&self, _guest_id: &str, _summary: &str, _incident_id: &str) -> Result<()> {
        Ok(())
    }

    async fn occupancy_history(
        &self,
        _room_number: &str,
        _start_time: DateTime<Utc>,
    ) -> Result<Vec<serde_json::Value>> {
        Ok(vec![])
    }

    async fn rollback(&self, _token: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl NotificationGateway for FakeSystems {
    async fn send(
        &self,
        _channel: NotificationChannel,
        recipient: &str,
        _subject: &str,
        body: &str,
    ) -> Result<NotificationReceipt> {
        self.notifications
            .lock()
            .unwrap()
            .push(format!("{recipient}:{body}"));
        Ok(NotificationReceipt {
            success: true,
            message_id: "msg_1".to_string(),
            delivery_status: "delivered".to_string(),
            timestamp: Utc::now(),
        })
    }
}

#[async_trait]
impl AuditSink for FakeSystems {
    async fn record_compliance_event(
        &self,
        _incident_id: &str,
        framework: &str,
        _event_type: &str,
        _details: serde_json::Value,
    ) -> Result<()> {
        self.compliance_reports
            .lock()
            .unwrap()
            .push(framework.to_string());
        Ok(())
    }

    async fn record_document(
        &self,
        _incident_id: &str,
        _name: &str,
        _details: serde_json::Value,
    ) -> Result<()> {
        Ok(())
    }
}

/// An LLM client that never answers; drives backpressure tests.
pub(crate) struct HangingLlm;

#[async_trait]
impl LlmClient for HangingLlm {
    async fn complete(&self, _request: &LlmRequest) -> Result<String> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(String::new())
    }
}

/// Build a runner over scripted LLM output and the given fakes.
pub(crate) fn runner_with(llm_responses: Vec<&str>, systems: Arc<FakeSystems>) -> WorkflowRunner {
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlm::new(llm_responses));
    runner_with_llm(llm, systems)
}

pub(crate) fn runner_with_llm(llm: Arc<dyn LlmClient>, systems: Arc<FakeSystems>) -> WorkflowRunner {
    let tools = ToolSet {
        classifier: IncidentClassifier::new(
            llm.clone(),
            RateLimiter::per_minute(100),
            PerfSink::disconnected(),
        ),
        prioritizer: IncidentPrioritizer::new(
            llm.clone(),
            RateLimiter::per_minute(100),
            PerfSink::disconnected(),
        ),
        selector: PlaybookSelector::new(),
        responder: ResponseGenerator::new(
            llm,
            RateLimiter::per_minute(50),
            PerfSink::disconnected(),
        ),
        compliance: ComplianceChecker::new(),
        safety: SafetyGuardrails::new(),
    };
    let executor = Arc::new(ActionExecutor::new(
        systems.clone(),
        systems.clone(),
        systems.clone(),
        systems.clone(),
        ExecutorConfig::default(),
    ));
    let session: Arc<dyn SessionStore> =
        Arc::new(InMemorySessionStore::new(Duration::from_secs(3600)));
    WorkflowRunner::new(tools, executor, systems, session)
}
