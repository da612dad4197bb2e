// Property management system client

//! # PMS Integration
//!
//! Guest lookup, room status management, guest notes and occupancy history.
//! Guest data returned from the PMS is treated as sensitive: callers must
//! sanitize anything from here before it reaches logs or notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;

use crate::tools::llm::classify_http_failure;
use crate::{Result, TriageError};

/// Room status values the PMS understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Available,
    Occupied,
    Maintenance,
    OutOfOrder,
    SecurityHold,
}

impl RoomStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Available => "available",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
            RoomStatus::OutOfOrder => "out_of_order",
            RoomStatus::SecurityHold => "security_hold",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Guest profile as the PMS returns it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuestProfile {
    pub guest_id: String,
    pub room_number: String,
    #[serde(default)]
    pub vip_status: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_date: Option<DateTime<Utc>>,
}

/// Contract over the property-management back end
#[async_trait]
pub trait PropertySystem: Send + Sync {
    /// Look up the registered guest for a room, if any.
    async fn guest_by_room(&self, room_number: &str) -> Result<Option<GuestProfile>>;

    /// Update a room's status; returns a rollback token when the PMS
    /// supports reverting the change.
    async fn update_room_status(
        &self,
        room_number: &str,
        status: RoomStatus,
        reason: &str,
        updated_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<String>>;

    /// Attach an incident note to a guest profile.
    async fn add_guest_note(&self, guest_id: &str, summary: &str, incident_id: &str) -> Result<()>;

    /// Room occupancy history from `start_time` onward, for investigations.
    async fn occupancy_history(
        &self,
        room_number: &str,
        start_time: DateTime<Utc>,
    ) -> Result<Vec<serde_json::Value>>;

    /// Reverse a prior room-status change using its rollback token.
    async fn rollback(&self, token: &str) -> Result<()>;
}

/// HTTP client for the property-management service
pub struct HttpPropertySystem {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpPropertySystem {
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

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.token))
    }
}

fn request_error(e: reqwest::Error) -> TriageError {
    if e.is_timeout() {
        TriageError::Timeout(format!("PMS request timed out: {}", e))
    } else {
        TriageError::TransientIo(format!("PMS request failed: {}", e))
    }
}

async fn read_json(response: reqwest::Response, context: &str) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(classify_http_failure(status, &text, "PMS"));
    }
    response
        .json()
        .await
        .map_err(|e| TriageError::ParseError(format!("{}: {}", context, e)))
}

#[async_trait]
impl PropertySystem for HttpPropertySystem {
    async fn guest_by_room(&self, room_number: &str) -> Result<Option<GuestProfile>> {
        let response = self
            .auth(self.client.get(format!(
                "{}/api/v1/guests/by-room/{}",
                self.base_url, room_number
            )))
            .send()
            .await
            .map_err(request_error)?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let data = read_json(response, "guest lookup response").await?;
        Ok(serde_json::from_value(data).ok())
    }

    async fn update_room_status(
        &self,
        room_number: &str,
        status: RoomStatus,
        reason: &str,
        updated_by: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Option<String>> {
        let response = self
            .auth(self.client.post(format!("{}/api/v1/rooms/status", self.base_url)))
            .json(&json!({
                "room_number": room_number,
                "status": status,
                "reason": reason,
                "updated_by": updated_by,
                "expires_at": expires_at.map(|d| d.to_rfc3339()),
            }))
            .send()
            .await
            .map_err(request_error)?;
        let data = read_json(response, "room status response").await?;
        Ok(data
            .get("rollback_token")
            .and_then(|v| v.as_str())
            .map(String::from))
    }

    async fn add_guest_note(&self, guest_id: &str, summary: &str, incident_id: &str) -> Result<()> {
        let response = self
            .auth(self.client.post(format!("{}/api/v1/guests/notes", self.base_url)))
            .json(&json!({
                "guest_id": guest_id,
                "note": summary,
                "incident_id": incident_id,
                "created_by": "security_triage",
            }))
            .send()
            .await
            .map_err(request_error)?;
        read_json(response, "guest note response").await?;
        Ok(())
    }

    async fn occupancy_history(
        &self,
        room_number: &str,
        start_time: DateTime<Utc>,
    ) -> Result<Vec<serde_json::Value>> {
        let response = self
            .auth(self.client.get(format!(
                "{}/api/v1/rooms/{}/occupancy-history",
                self.base_url, room_number
            )))
            .query(&[("start_time", start_time.to_rfc3339())])
            .send()
            .await
            .map_err(request_error)?;
        let data = read_json(response, "occupancy history response").await?;
        Ok(data
            .get("occupancy_records")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    async fn rollback(&self, token: &str) -> Result<()> {
        let response = self
            .auth(self.client.post(format!("{}/api/v1/rooms/status/rollback", self.base_url)))
            .json(&json!({ "rollback_token": token }))
            .send()
            .await
            .map_err(request_error)?;
        read_json(response, "room status rollback response").await?;
        Ok(())
    }
}
