// Notification gateway client

//! # Notification Integration
//!
//! Per-channel stakeholder notification. Message bodies must already be
//! sanitized by the caller: the gateway is outside the trust boundary, so no
//! raw PII may reach it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use std::time::Duration;

use crate::tools::llm::classify_http_failure;
use crate::{Result, TriageError};

/// Delivery channels the orchestrator can use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    Sms,
    Email,
    Phone,
    Webhook,
    Push,
    Messaging,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Sms => "sms",
            NotificationChannel::Email => "email",
            NotificationChannel::Phone => "phone",
            NotificationChannel::Webhook => "webhook",
            NotificationChannel::Push => "push",
            NotificationChannel::Messaging => "messaging",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-send delivery receipt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationReceipt {
    pub success: bool,
    pub message_id: String,
    pub delivery_status: String,
    pub timestamp: DateTime<Utc>,
}

/// Contract over the notification back end
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<NotificationReceipt>;
}

/// HTTP client for the notification service
pub struct HttpNotificationGateway {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpNotificationGateway {
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
}

#[async_trait]
impl NotificationGateway for HttpNotificationGateway {
    async fn send(
        &self,
        channel: NotificationChannel,
        recipient: &str,
        subject: &str,
        body: &str,
    ) -> Result<NotificationReceipt> {
        let response = self
            .client
            .post(format!("{}/api/v1/notifications/{}", self.base_url, channel))
            .header("Authorization", format!("Bearer {}", self.token))
            .json(&json!({
                "recipient": recipient,
                "subject": subject,
                "body": body,
            }))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TriageError::Timeout(format!("notification request timed out: {}", e))
                } else {
                    TriageError::TransientIo(format!("notification request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, &text, "notifications"));
        }

        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TriageError::ParseError(format!("notification response: {}", e)))?;

        Ok(NotificationReceipt {
            success: data.get("success").and_then(|v| v.as_bool()).unwrap_or(true),
            message_id: data
                .get("message_id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            delivery_status: data
                .get("delivery_status")
                .and_then(|v| v.as_str())
                .unwrap_or("queued")
                .to_string(),
            timestamp: Utc::now(),
        })
    }
}
