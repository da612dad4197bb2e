// Access control system client

//! # Access Control Integration
//!
//! Keycard management, temporary staff access and emergency area lockdown.
//! Revocations and lockdowns return rollback tokens; the executor registers
//! them and replays them in reverse completion order on workflow abort.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tracing::warn;

use crate::tools::llm::classify_http_failure;
use crate::{Result, TriageError};

/// Outcome of an access-control operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControlOutcome {
    pub success: bool,
    pub action: String,
    /// Card id or area id the operation targeted
    pub target: String,
    #[serde(default)]
    pub affected_areas: Vec<String>,
    /// Opaque token enabling reversal of this state change
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rollback_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Contract over the property's access-control back end
#[async_trait]
pub trait AccessControlSystem: Send + Sync {
    /// Immediately revoke keycard access across all property areas.
    async fn revoke_access(
        &self,
        card_id: &str,
        reason: &str,
        revoked_by: &str,
    ) -> Result<AccessControlOutcome>;

    /// Create temporary access credentials for security staff.
    async fn create_temporary_access(
        &self,
        staff_id: &str,
        areas: &[String],
        expires_at: DateTime<Utc>,
    ) -> Result<AccessControlOutcome>;

    /// Lock down an area, optionally flagged as an emergency.
    async fn lock_area(
        &self,
        area_id: &str,
        duration_minutes: u32,
        emergency: bool,
    ) -> Result<AccessControlOutcome>;

    /// Access log entries for a card over the trailing window.
    async fn access_logs(&self, card_id: &str, hours_back: u32) -> Result<Vec<serde_json::Value>>;

    /// Reverse a prior operation using its rollback token.
    async fn rollback(&self, token: &str) -> Result<()>;
}

/// HTTP client for the access-control service
pub struct HttpAccessControl {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpAccessControl {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TriageError::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &text, "access control"));
        }
        Ok(response
            .json()
            .await
            .map_err(|e| TriageError::ParseError(format!("access control response: {}", e)))?)
    }
}

fn request_error(e: reqwest::Error) -> TriageError {
    if e.is_timeout() {
        TriageError::Timeout(format!("access control request timed out: {}", e))
    } else {
        TriageError::TransientIo(format!("access control request failed: {}", e))
    }
}

#[async_trait]
impl AccessControlSystem for HttpAccessControl {
    async fn revoke_access(
        &self,
        card_id: &str,
        reason: &str,
        revoked_by: &str,
    ) -> Result<AccessControlOutcome> {
        let data = self
            .post(
                "/api/v1/access/revoke",
                json!({
                    "card_id": card_id,
                    "reason": reason,
                    "revoked_by": revoked_by,
                }),
            )
            .await?;
        Ok(AccessControlOutcome {
            success: true,
            action: "revoke".to_string(),
            target: card_id.to_string(),
            affected_areas: string_list(&data, "affected_areas"),
            rollback_token: data
                .get("rollback_token")
                .and_then(|v| v.as_str())
                .map(String::from),
            expires_at: None,
        })
    }

    async fn create_temporary_access(
        &self,
        staff_id: &str,
        areas: &[String],
        expires_at: DateTime<Utc>,
    ) -> Result<AccessControlOutcome> {
        let data = self
            .post(
                "/api/v1/access/temporary",
                json!({
                    "staff_id": staff_id,
                    "areas": areas,
                    "expires_at": expires_at.to_rfc3339(),
                }),
            )
            .await?;
        Ok(AccessControlOutcome {
            success: true,
            action: "temporary_access".to_string(),
            target: data
                .get("temp_card_id")
                .and_then(|v| v.as_str())
                .unwrap_or(staff_id)
                .to_string(),
            affected_areas: areas.to_vec(),
            rollback_token: None,
            expires_at: Some(expires_at),
        })
    }

    async fn lock_area(
        &self,
        area_id: &str,
        duration_minutes: u32,
        emergency: bool,
    ) -> Result<AccessControlOutcome> {
        if emergency {
            warn!(area_id, duration_minutes, "emergency lockdown initiated");
        }
        let data = self
            .post(
                "/api/v1/areas/lockdown",
                json!({
                    "area_id": area_id,
                    "duration_minutes": duration_minutes,
                    "emergency": emergency,
                }),
            )
            .await?;
        Ok(AccessControlOutcome {
            success: true,
            action: "area_lockdown".to_string(),
            target: area_id.to_string(),
            affected_areas: vec![area_id.to_string()],
            rollback_token: data
                .get("rollback_token")
                .and_then(|v| v.as_str())
                .map(String::from),
            expires_at: data
                .get("expires_at")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc)),
        })
    }

    async fn access_logs(&self, card_id: &str, hours_back: u32) -> Result<Vec<serde_json::Value>> {
        let response = self
            .client
            .get(format!("{}/api/v1/access/logs/{}", self.base_url, card_id))
            .query(&[("hours_back", hours_back)])
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &text, "access control"));
        }
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TriageError::ParseError(format!("access log response: {}", e)))?;
        Ok(data
            .get("access_logs")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn rollback(&self, token: &str) -> Result<()> {
        self.post("/api/v1/access/rollback", json!({ "rollback_token": token }))
            .await?;
        Ok(())
    }
}

fn string_list(data: &serde_json::Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
