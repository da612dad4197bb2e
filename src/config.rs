// Environment-driven configuration

//! # Configuration
//!
//! All tuning knobs and connection strings come from the environment with the
//! `TRIAGE_` prefix (a `.env` file is honored in development). Missing values
//! fall back to documented defaults; connection strings have no defaults and
//! their absence is an initialization failure in the binary.

use config::{Config, Environment};
use dotenv::dotenv;
use serde::Deserialize;
use std::time::Duration;

use crate::{Result, TriageError};

fn default_worker_pool_size() -> usize {
    16
}
fn default_queue_bound() -> usize {
    1024
}
fn default_workflow_timeout_secs() -> u64 {
    30 * 60
}
fn default_session_ttl_hours() -> u64 {
    24
}
fn default_retention_days() -> i64 {
    365
}
fn default_classification_rate_limit() -> u32 {
    100
}
fn default_response_rate_limit() -> u32 {
    50
}
fn default_prioritization_rate_limit() -> u32 {
    100
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_llm_model() -> String {
    "gpt-4o".to_string()
}

/// Engine configuration, loaded from `TRIAGE_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct TriageConfig {
    // Stores
    pub database_url: Option<String>,
    pub nats_url: Option<String>,

    // LLM provider
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    // External hotel systems
    pub pms_url: Option<String>,
    pub pms_token: Option<String>,
    pub access_control_url: Option<String>,
    pub access_control_token: Option<String>,
    pub notification_url: Option<String>,
    pub notification_token: Option<String>,

    // Engine tuning
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_queue_bound")]
    pub queue_bound: usize,
    #[serde(default = "default_workflow_timeout_secs")]
    pub default_workflow_timeout_secs: u64,
    #[serde(default = "default_session_ttl_hours")]
    pub session_ttl_hours: u64,

    // Retention
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Defaults to twice the incident retention when unset
    pub audit_retention_days: Option<i64>,

    // Per-tool rate limits, operations per minute
    #[serde(default = "default_classification_rate_limit")]
    pub classification_rate_limit: u32,
    #[serde(default = "default_response_rate_limit")]
    pub response_rate_limit: u32,
    #[serde(default = "default_prioritization_rate_limit")]
    pub prioritization_rate_limit: u32,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl TriageConfig {
    /// Load configuration from the environment (and `.env` in development).
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        let config = Config::builder()
            .add_source(Environment::with_prefix("TRIAGE"))
            .build()
            .map_err(|e| TriageError::Internal(format!("configuration error: {}", e)))?;
        config
            .try_deserialize()
            .map_err(|e| TriageError::Internal(format!("configuration error: {}", e)))
    }

    pub fn effective_audit_retention_days(&self) -> i64 {
        self.audit_retention_days.unwrap_or(self.retention_days * 2)
    }

    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.default_workflow_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_hours * 3600)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            nats_url: None,
            llm_base_url: None,
            llm_api_key: None,
            llm_model: default_llm_model(),
            pms_url: None,
            pms_token: None,
            access_control_url: None,
            access_control_token: None,
            notification_url: None,
            notification_token: None,
            worker_pool_size: default_worker_pool_size(),
            queue_bound: default_queue_bound(),
            default_workflow_timeout_secs: default_workflow_timeout_secs(),
            session_ttl_hours: default_session_ttl_hours(),
            retention_days: default_retention_days(),
            audit_retention_days: None,
            classification_rate_limit: default_classification_rate_limit(),
            response_rate_limit: default_response_rate_limit(),
            prioritization_rate_limit: default_prioritization_rate_limit(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = TriageConfig::default();
        assert_eq!(config.worker_pool_size, 16);
        assert_eq!(config.queue_bound, 1024);
        assert_eq!(config.workflow_timeout(), Duration::from_secs(1800));
        assert_eq!(config.session_ttl(), Duration::from_secs(86_400));
        assert_eq!(config.classification_rate_limit, 100);
        assert_eq!(config.response_rate_limit, 50);
        assert_eq!(config.prioritization_rate_limit, 100);
    }

    #[test]
    fn audit_retention_defaults_to_twice_incident_retention() {
        let mut config = TriageConfig::default();
        assert_eq!(config.effective_audit_retention_days(), 730);
        config.audit_retention_days = Some(1000);
        assert_eq!(config.effective_audit_retention_days(), 1000);
    }
}
